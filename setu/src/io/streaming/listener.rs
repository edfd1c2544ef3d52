//! Accept loop shared by the inbound TCP servers.

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Read timeout on accepted connections, so handlers can poll `running`.
pub(crate) const CONNECTION_READ_TIMEOUT: Duration = Duration::from_millis(500);

const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// Accept connections until `running` clears, spawning one handler thread
/// per client. Joins every handler before returning.
pub(crate) fn run_accept_loop<F>(
    listener: TcpListener,
    name: &'static str,
    running: Arc<AtomicBool>,
    handler: F,
) where
    F: Fn(TcpStream) + Send + Sync + 'static,
{
    let handler = Arc::new(handler);
    let mut connections: Vec<JoinHandle<()>> = Vec::new();

    while running.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nonblocking(false) {
                    log::warn!("{}: failed to set blocking mode for {}: {}", name, addr, e);
                    continue;
                }
                if let Err(e) = stream.set_read_timeout(Some(CONNECTION_READ_TIMEOUT)) {
                    log::warn!("{}: failed to set read timeout: {}", name, e);
                }
                log::info!("{}: client connected: {}", name, addr);

                let handler = Arc::clone(&handler);
                match thread::Builder::new()
                    .name(format!("{}-conn", name))
                    .spawn(move || handler(stream))
                {
                    Ok(handle) => connections.push(handle),
                    Err(e) => log::error!("{}: failed to spawn connection thread: {}", name, e),
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                log::error!("{}: error accepting connection: {}", name, e);
                thread::sleep(ACCEPT_POLL);
            }
        }

        connections.retain(|handle| !handle.is_finished());
    }

    for handle in connections {
        let _ = handle.join();
    }
    log::info!("{}: listener stopped", name);
}

/// True for I/O errors that just mean the peer went away.
pub(crate) fn is_disconnect(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
    )
}
