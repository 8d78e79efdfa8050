use may::coroutine::JoinHandle;
use may_minihttp::HttpServiceFactory;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;
use tracing::info;

/// Wrapper around may_minihttp's listener loop.
///
/// Takes a [`HttpServiceFactory`] so every accepted connection gets its own
/// service instance (and with it, its own connection events).
pub struct HttpServer<F>(pub F);

/// Handle to a running HTTP server.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    /// The address the server was asked to bind.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the listener to accept connections.
    ///
    /// Polls with TCP connects; errors with `TimedOut` after ~250ms.
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop the listener and wait for it to finish.
    pub fn stop(self) {
        info!(addr = %self.addr, "stopping http server");
        // SAFETY: cancelling the listener coroutine is the intended shutdown
        // path; the handle is valid because we own it, and nothing else joins
        // it after this.
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
    }

    /// Block until the listener exits on its own.
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

impl<F: HttpServiceFactory> HttpServer<F> {
    /// Bind `addr` and serve connections until stopped.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let handle = self.0.start(addr)?;
        info!(addr = %addr, "http server listening");
        Ok(ServerHandle { addr, handle })
    }
}
