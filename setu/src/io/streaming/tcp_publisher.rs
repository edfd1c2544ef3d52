//! Outbound stream publisher using TCP sockets.
//!
//! Broadcasts every published [`Message`] to all connected clients.
//!
//! Producers (tracking lane, publisher threads, query thread) push into a
//! lock-free queue and return immediately. A dedicated thread owns the TCP
//! listener, accepts clients and drains the queue. When the queue is full the
//! oldest message is evicted, so slow consumers see the most recent state.

use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_queue::ArrayQueue;
use log::{debug, error, info, warn};

use super::messages::Message;
use super::wire::Serializer;
use crate::error::Result;
use crate::io::sink::OutputSink;

/// Messages broadcast per loop iteration before checking for new clients.
const MAX_BATCH: usize = 50;

/// TCP stream publisher
pub struct StreamPublisher {
    queue: Arc<ArrayQueue<Message>>,
    evicted: Arc<AtomicU64>,
    local_addr: SocketAddr,
    publisher_thread: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl StreamPublisher {
    /// Bind the listener and spawn the publisher thread.
    ///
    /// # Arguments
    /// - `bind_address`: TCP bind address (e.g., "0.0.0.0:5601")
    /// - `serializer`: Wire format for outgoing frames
    /// - `capacity`: Messages buffered before the oldest is evicted
    pub fn new(bind_address: &str, serializer: Serializer, capacity: usize) -> Result<Self> {
        let listener = TcpListener::bind(bind_address)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let queue = Arc::new(ArrayQueue::new(capacity.max(1)));
        let shutdown = Arc::new(AtomicBool::new(false));

        let publisher_thread = {
            let queue = Arc::clone(&queue);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("stream-publisher".to_string())
                .spawn(move || {
                    Self::publisher_thread_loop(listener, serializer, queue, shutdown);
                })?
        };

        info!("Stream publisher listening on {}", local_addr);

        Ok(Self {
            queue,
            evicted: Arc::new(AtomicU64::new(0)),
            local_addr,
            publisher_thread: Some(publisher_thread),
            shutdown,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Messages dropped because the queue was full.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    fn publisher_thread_loop(
        listener: TcpListener,
        serializer: Serializer,
        queue: Arc<ArrayQueue<Message>>,
        shutdown: Arc<AtomicBool>,
    ) {
        let mut clients: Vec<TcpStream> = Vec::new();
        let mut published = 0u64;
        let mut buffer = Vec::with_capacity(4096);

        while !shutdown.load(Ordering::Relaxed) {
            // Accept new client connections (non-blocking)
            match listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nonblocking(false) {
                        warn!("Failed to set blocking mode for client {}: {}", addr, e);
                    } else {
                        let _ = stream.set_nodelay(true);
                        info!("Stream client connected: {}", addr);
                        clients.push(stream);
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => {
                    error!("Error accepting stream client: {}", e);
                }
            }

            let mut batch = 0;
            while let Some(message) = queue.pop() {
                if let Err(e) =
                    Self::broadcast_to_clients(&mut clients, &serializer, &message, &mut buffer)
                {
                    debug!("Failed to publish {}: {}", message.topic, e);
                } else {
                    published += 1;
                }

                batch += 1;
                if batch >= MAX_BATCH {
                    break;
                }
            }

            if queue.is_empty() {
                thread::sleep(Duration::from_millis(5));
            }
        }

        info!("Stream publisher exiting ({} messages published)", published);
    }

    /// Broadcast one message to all connected clients, dropping dead ones.
    fn broadcast_to_clients(
        clients: &mut Vec<TcpStream>,
        serializer: &Serializer,
        message: &Message,
        buffer: &mut Vec<u8>,
    ) -> Result<()> {
        if clients.is_empty() {
            return Ok(());
        }

        serializer.encode_frame(message, buffer)?;

        clients.retain_mut(|client| match client.write_all(buffer) {
            Ok(_) => true,
            Err(e) => {
                if let Ok(addr) = client.peer_addr() {
                    debug!("Stream client {} disconnected: {}", addr, e);
                }
                false
            }
        });

        Ok(())
    }

    /// Stop the publisher
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

impl OutputSink for StreamPublisher {
    fn publish(&self, message: Message) {
        if self.queue.force_push(message).is_some() {
            let n = self.evicted.fetch_add(1, Ordering::Relaxed) + 1;
            if n % 100 == 1 {
                warn!("Stream publisher queue full ({} messages evicted)", n);
            }
        }
    }
}

impl Drop for StreamPublisher {
    fn drop(&mut self) {
        self.stop();

        if let Some(thread) = self.publisher_thread.take() {
            let _ = thread.join();
        }
    }
}
