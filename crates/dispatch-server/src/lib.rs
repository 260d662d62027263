//! HTTP front end shared by the fleet and customer services

#![warn(missing_docs)]

pub mod http;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use dispatch_core::RequestHandler;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors starting the HTTP server
#[derive(Debug, Error)]
pub enum ServeError {
    /// The listening socket could not be created
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        /// Requested listen address
        addr: String,
        /// Underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    /// The server is not listening on a TCP socket
    #[error("server is not bound to an IP address")]
    NotTcp,
    /// A worker thread could not be spawned
    #[error("cannot spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// A running HTTP server dispatching to a [`RequestHandler`]
pub struct ServerHandle<H: RequestHandler> {
    server: Arc<tiny_http::Server>,
    addr: SocketAddr,
    handler: Arc<H>,
    workers: Vec<JoinHandle<()>>,
    stopping: Arc<AtomicBool>,
}

/// Consecutive receive failures after which a worker gives up
const MAX_RECV_FAILURES: u32 = 10;

/// Pause after the first receive failure, doubled on every further one
const RECV_BACKOFF: Duration = Duration::from_millis(10);

fn http_loop<H: RequestHandler>(server: &tiny_http::Server, handler: &H, stopping: &AtomicBool) {
    let mut failures = 0;
    loop {
        match server.recv() {
            Ok(rq) => {
                failures = 0;
                if let Some(rq) = http::parse(rq) {
                    debug!(request = %rq.request_id(), url = rq.url(), "HTTP request received");
                    handler.handle(rq);
                }
            }
            Err(_) if stopping.load(Ordering::Acquire) => break,
            Err(err) => {
                failures += 1;
                let Some(backoff) = recv_backoff(failures) else {
                    error!(%err, failures, "HTTP receive keeps failing, stopping worker");
                    break;
                };
                warn!(%err, failures, "HTTP receive failed");
                thread::sleep(backoff);
            }
        }
    }
}

/// Pause before retrying after `failures` consecutive receive errors, or
/// [`None`] once the worker should give up
fn recv_backoff(failures: u32) -> Option<Duration> {
    (1..MAX_RECV_FAILURES)
        .contains(&failures)
        .then(|| RECV_BACKOFF * (1 << (failures - 1)))
}

/// Listen on `addr` and serve requests with `threads` worker threads.
///
/// Port 0 picks a free port, see [`ServerHandle::addr`].
pub fn serve<H>(handler: H, addr: &str, threads: usize) -> Result<ServerHandle<H>, ServeError>
where
    H: RequestHandler + Send + Sync + 'static,
{
    let server = tiny_http::Server::http(addr).map_err(|source| ServeError::Bind {
        addr: addr.to_owned(),
        source,
    })?;
    let local = server.server_addr().to_ip().ok_or(ServeError::NotTcp)?;

    let server = Arc::new(server);
    let handler = Arc::new(handler);
    let stopping = Arc::new(AtomicBool::new(false));

    let mut workers = Vec::with_capacity(threads.max(1));
    for i in 0..threads.max(1) {
        let (srv, handler, stop) = (server.clone(), handler.clone(), stopping.clone());
        let worker = thread::Builder::new()
            .name(format!("http_{i}"))
            .spawn(move || http_loop(&srv, &*handler, &stop));
        match worker {
            Ok(worker) => workers.push(worker),
            Err(err) => {
                stop_workers(&server, &stopping, workers);
                return Err(err.into());
            }
        }
    }
    info!(address = %format!("http://{local}"), threads = workers.len(), "Starting");

    Ok(ServerHandle {
        server,
        addr: local,
        handler,
        workers,
        stopping,
    })
}

fn stop_workers(server: &tiny_http::Server, stopping: &AtomicBool, workers: Vec<JoinHandle<()>>) {
    stopping.store(true, Ordering::Release);
    // Every call wakes exactly one blocked `recv`.
    for _ in &workers {
        server.unblock();
    }
    for worker in workers {
        if worker.join().is_err() {
            warn!("HTTP worker panicked");
        }
    }
}

impl<H: RequestHandler> ServerHandle<H> {
    /// Address the server is listening on
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL of the server, e.g. `http://127.0.0.1:8087`
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The handler serving requests
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Block until all worker threads have exited
    ///
    /// Workers only exit after [`ServerHandle::shutdown`], so this blocks for
    /// the lifetime of the process.
    pub fn wait(self) {
        let Self {
            handler, workers, ..
        } = self;
        for worker in workers {
            if worker.join().is_err() {
                warn!("HTTP worker panicked");
            }
        }
        shutdown_handler(handler);
    }

    /// Stop accepting requests, wait for in-flight requests and shut the
    /// handler down
    pub fn shutdown(self) {
        let Self {
            server,
            handler,
            workers,
            stopping,
            ..
        } = self;
        stop_workers(&server, &stopping, workers);
        shutdown_handler(handler);
    }
}

fn shutdown_handler<H: RequestHandler>(handler: Arc<H>) {
    match Arc::into_inner(handler) {
        Some(handler) => handler.shutdown(),
        None => warn!("handler still shared, skipping shutdown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_failures_back_off_then_stop() {
        assert_eq!(recv_backoff(1), Some(Duration::from_millis(10)));
        assert_eq!(recv_backoff(2), Some(Duration::from_millis(20)));
        assert_eq!(
            recv_backoff(MAX_RECV_FAILURES - 1),
            Some(Duration::from_millis(2560))
        );
        assert_eq!(recv_backoff(MAX_RECV_FAILURES), None);
        assert_eq!(recv_backoff(MAX_RECV_FAILURES + 1), None);
    }
}
