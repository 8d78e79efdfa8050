//! # Configuration Module
//!
//! Server settings come from the CLI (see [`crate::cli`]); runtime tuning
//! comes from environment variables.
//!
//! ## Environment Variables
//!
//! ### `MAYPOLE_STACK_SIZE`
//!
//! Stack size in bytes for worker coroutines. Accepts decimal (`65536`) or
//! hexadecimal (`0x10000`). Default: `0x10000` (64 KB).
//!
//! Total worker stack memory is `stack_size x workers`, so tune it down for
//! very large pools and up for handlers with deep call chains.
//!
//! ```bash
//! export MAYPOLE_STACK_SIZE=0x8000
//! ```

use serde::{Deserialize, Serialize};
use std::env;

/// Where and how the HTTP server runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    pub listen: String,
    /// TCP port to bind.
    pub port: u16,
    /// Number of request workers in the pool.
    pub workers: usize,
    /// Accepted for compatibility; the listener is a single accept loop, so
    /// this is logged and ignored.
    pub reuse_port: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0".to_string(),
            port: 8080,
            workers: 4,
            reuse_port: false,
        }
    }
}

impl ServerConfig {
    /// The bind address in `host:port` form.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.listen, self.port)
    }
}

/// Runtime tuning loaded from environment variables.
///
/// ```rust
/// use maypole::config::RuntimeConfig;
///
/// let config = RuntimeConfig::from_env();
/// assert!(config.stack_size > 0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for worker coroutines in bytes (default: 64 KB / 0x10000).
    pub stack_size: usize,
}

impl RuntimeConfig {
    pub const DEFAULT_STACK_SIZE: usize = 0x10000;

    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let stack_size = match env::var("MAYPOLE_STACK_SIZE") {
            Ok(val) => {
                if let Some(hex) = val.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).unwrap_or(Self::DEFAULT_STACK_SIZE)
                } else {
                    val.parse().unwrap_or(Self::DEFAULT_STACK_SIZE)
                }
            }
            Err(_) => Self::DEFAULT_STACK_SIZE,
        };
        RuntimeConfig { stack_size }
    }
}
