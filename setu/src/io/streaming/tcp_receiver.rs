//! TCP sensor receiver.
//!
//! Inbound images, IMU and odometry arrive as length-prefixed [`Message`]
//! frames. Each connected client gets its own reader thread; every decoded
//! message goes straight to the [`IngestRouter`].
//!
//! # Connection Lifecycle
//!
//! ```text
//! 1. Client connects to the sensor port
//! 2. Server spawns a reader thread for this client
//! 3. Reader loop decodes frames until disconnect or shutdown
//! ```
//!
//! - **Read timeout**: 500ms so readers notice shutdown
//! - **Oversized frame**: connection closed
//! - **Undecodable frame**: logged and skipped, connection stays open

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use super::listener::{is_disconnect, run_accept_loop};
use super::messages::Message;
use super::wire::Serializer;
use crate::error::{Error, Result};
use crate::ingest::IngestRouter;

/// Initial capacity for the frame buffer (IMU-sized)
const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Inbound sensor server handle.
pub struct SensorServer {
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl SensorServer {
    /// Bind and start accepting sensor clients.
    pub fn spawn(
        bind_address: &str,
        serializer: Serializer,
        router: Arc<IngestRouter>,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(bind_address)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let handle = thread::Builder::new()
            .name("sensor-server".into())
            .spawn(move || {
                let conn_running = Arc::clone(&running);
                run_accept_loop(listener, "sensor-server", running, move |stream| {
                    let mut receiver = SensorReceiver::new(
                        serializer.clone(),
                        Arc::clone(&router),
                        Arc::clone(&conn_running),
                    );
                    if let Err(e) = receiver.run(stream) {
                        log::error!("Sensor connection error: {}", e);
                    }
                });
            })?;

        log::info!("Sensor server listening on {}", local_addr);
        Ok(Self { local_addr, handle })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the server and all reader threads to finish.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

/// Reader loop for one sensor client.
struct SensorReceiver {
    serializer: Serializer,
    router: Arc<IngestRouter>,
    running: Arc<AtomicBool>,
    read_buffer: Vec<u8>,
    received: u64,
    malformed: u64,
}

impl SensorReceiver {
    fn new(serializer: Serializer, router: Arc<IngestRouter>, running: Arc<AtomicBool>) -> Self {
        Self {
            serializer,
            router,
            running,
            read_buffer: Vec::with_capacity(INITIAL_BUFFER_CAPACITY),
            received: 0,
            malformed: 0,
        }
    }

    fn run(&mut self, stream: TcpStream) -> Result<()> {
        let peer = stream.peer_addr().ok();
        let result = self.read_loop(stream);
        log::info!(
            "Sensor client {:?} closed ({} messages, {} malformed)",
            peer,
            self.received,
            self.malformed
        );
        result
    }

    fn read_loop(&mut self, mut stream: TcpStream) -> Result<()> {
        while self.running.load(Ordering::Relaxed) {
            match self
                .serializer
                .read_frame_into(&mut stream, &mut self.read_buffer, &self.running)
            {
                Ok(true) => self.dispatch(),
                Ok(false) => {}
                Err(Error::Io(ref e)) if is_disconnect(e) => {
                    return Ok(());
                }
                Err(e) => {
                    let _ = stream.shutdown(std::net::Shutdown::Both);
                    return Err(e);
                }
            }
        }

        let _ = stream.shutdown(std::net::Shutdown::Both);
        Ok(())
    }

    fn dispatch(&mut self) {
        match self.serializer.deserialize::<Message>(&self.read_buffer) {
            Ok(message) => {
                self.received += 1;
                log::trace!("Sensor message on '{}'", message.topic);
                self.router.route(message);
            }
            Err(e) => {
                self.malformed += 1;
                log::warn!("Discarding malformed sensor frame: {}", e);
            }
        }
    }
}
