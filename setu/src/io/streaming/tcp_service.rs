//! TCP query service endpoint.
//!
//! Request/response over length-prefixed frames: the client writes one
//! [`QueryRequest`], the server answers with one [`ServiceReply`]. Requests
//! are forwarded to the query thread and bounded by `query.timeout_ms`.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use super::listener::{is_disconnect, run_accept_loop};
use super::messages::ServiceReply;
use super::wire::Serializer;
use crate::error::{Error, Result};
use crate::state::{QueryRequest, QuerySender, send_query_sync};

/// Query service handle.
pub struct ServiceServer {
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServiceServer {
    /// Bind and start serving queries.
    pub fn spawn(
        bind_address: &str,
        serializer: Serializer,
        query_tx: QuerySender,
        timeout_ms: u64,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(bind_address)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let handle = thread::Builder::new()
            .name("service-server".into())
            .spawn(move || {
                let conn_running = Arc::clone(&running);
                run_accept_loop(listener, "service-server", running, move |stream| {
                    if let Err(e) =
                        serve_connection(stream, &serializer, &query_tx, timeout_ms, &conn_running)
                    {
                        log::error!("Service connection error: {}", e);
                    }
                });
            })?;

        log::info!("Query service listening on {}", local_addr);
        Ok(Self { local_addr, handle })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the server and all connection threads to finish.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

fn serve_connection(
    mut stream: TcpStream,
    serializer: &Serializer,
    query_tx: &QuerySender,
    timeout_ms: u64,
    running: &AtomicBool,
) -> Result<()> {
    let mut buffer = Vec::new();

    while running.load(Ordering::Relaxed) {
        match serializer.read_frame_into(&mut stream, &mut buffer, running) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(Error::Io(ref e)) if is_disconnect(e) => return Ok(()),
            Err(e) => return Err(e),
        }

        let reply = match serializer.deserialize::<QueryRequest>(&buffer) {
            Ok(request) => {
                log::debug!("Service request: {:?}", request);
                match send_query_sync(query_tx, request, timeout_ms) {
                    Ok(response) => ServiceReply::Ok(response),
                    Err(e) => {
                        log::warn!("Query failed: {}", e);
                        ServiceReply::Err(e.to_string())
                    }
                }
            }
            Err(e) => ServiceReply::Err(format!("malformed request: {}", e)),
        };

        serializer.write_frame(&mut stream, &reply)?;
    }

    Ok(())
}
