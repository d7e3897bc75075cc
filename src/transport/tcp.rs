//! TCP transports.
//!
//! The server accepts any number of clients, broadcasts every write to all of
//! them and funnels all inbound traffic into one shared bounded queue.  The
//! client keeps a single connection to a remote and reconnects with a fixed
//! backoff on any transport error.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::RECONNECT_DELAY;
use crate::error::{MuxError, Result};

/// Bytes per read from a socket, and the inbound block queue bound.
const READ_BLOCK_SIZE: usize = 1000;
const INBOUND_QUEUE_BLOCKS: usize = 1000;

/// Byte-level reassembly of queued inbound blocks.
struct Inbound {
    rx:     tokio::sync::Mutex<mpsc::Receiver<Vec<u8>>>,
    buffer: Mutex<VecDeque<u8>>,
}

impl Inbound {
    fn new(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self { rx: tokio::sync::Mutex::new(rx), buffer: Mutex::new(VecDeque::new()) }
    }

    async fn read(&self, length: usize, cancelled: &AtomicBool) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(length);
        while out.len() < length {
            if let Some(b) = self.buffer.lock().unwrap().pop_front() {
                out.push(b);
                continue;
            }
            if cancelled.load(Ordering::Relaxed) {
                return Err(MuxError::TransportClosed);
            }
            let block = self
                .rx
                .lock()
                .await
                .recv()
                .await
                .ok_or(MuxError::TransportClosed)?;
            self.buffer.lock().unwrap().extend(block);
        }
        Ok(out)
    }

    fn clear(&self) {
        self.buffer.lock().unwrap().clear();
    }
}

fn enqueue_block(tx: &mpsc::Sender<Vec<u8>>, block: Vec<u8>, who: &str) {
    if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(block) {
        warn!("{who}: read queue is full, dropping block");
    }
}

// ── Server ────────────────────────────────────────────────────────────────────

struct Client {
    addr:   std::net::SocketAddr,
    writer: Arc<tokio::sync::Mutex<OwnedWriteHalf>>,
}

pub struct TcpServer {
    port:      u16,
    clients:   Arc<Mutex<Vec<Client>>>,
    inbound:   Inbound,
    tx:        mpsc::Sender<Vec<u8>>,
    tasks:     Mutex<Vec<JoinHandle<()>>>,
    cancelled: Arc<AtomicBool>,
}

impl TcpServer {
    pub fn new(port: u16) -> Self {
        let (tx, rx) = mpsc::channel(INBOUND_QUEUE_BLOCKS);
        Self {
            port,
            clients: Arc::new(Mutex::new(Vec::new())),
            inbound: Inbound::new(rx),
            tx,
            tasks: Mutex::new(Vec::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn initialize(&self) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.port)).await?;
        info!("TCP server: listening on port {}", self.port);

        let clients = Arc::clone(&self.clients);
        let tx = self.tx.clone();
        let cancelled = Arc::clone(&self.cancelled);
        let accept = tokio::spawn(async move {
            loop {
                let (stream, addr) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("TCP server: accept failed: {e}");
                        continue;
                    }
                };
                info!("TCP server: client {addr} connected");
                let (mut read_half, write_half) = stream.into_split();
                clients.lock().unwrap().push(Client {
                    addr,
                    writer: Arc::new(tokio::sync::Mutex::new(write_half)),
                });

                let clients = Arc::clone(&clients);
                let tx = tx.clone();
                let cancelled = Arc::clone(&cancelled);
                tokio::spawn(async move {
                    let mut buf = vec![0u8; READ_BLOCK_SIZE];
                    loop {
                        match read_half.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => {
                                if cancelled.load(Ordering::Relaxed) {
                                    break;
                                }
                                enqueue_block(&tx, buf[..n].to_vec(), "TCP server");
                            }
                        }
                    }
                    info!("TCP server: client {addr} disconnected");
                    clients.lock().unwrap().retain(|c| c.addr != addr);
                });
            }
        });
        self.tasks.lock().unwrap().push(accept);
        Ok(())
    }

    pub async fn read(&self, length: usize) -> Result<Vec<u8>> {
        self.inbound.read(length, &self.cancelled).await
    }

    /// Broadcast to every connected client; returns the payload length when
    /// at least one client received it.
    pub async fn write(&self, data: &[u8]) -> Result<usize> {
        let writers: Vec<_> = {
            let clients = self.clients.lock().unwrap();
            if clients.is_empty() {
                info!("TCP server: not writing, no client connected");
                return Ok(0);
            }
            clients.iter().map(|c| (c.addr, Arc::clone(&c.writer))).collect()
        };
        for (addr, writer) in writers {
            if let Err(e) = writer.lock().await.write_all(data).await {
                warn!("TCP server: write to {addr} failed: {e}");
                self.clients.lock().unwrap().retain(|c| c.addr != addr);
            }
        }
        Ok(data.len())
    }

    pub async fn flush(&self) -> Result<()> {
        self.inbound.clear();
        Ok(())
    }

    pub async fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
        self.clients.lock().unwrap().clear();
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

pub struct TcpClient {
    address:   String,
    port:      u16,
    writer:    Arc<tokio::sync::Mutex<Option<OwnedWriteHalf>>>,
    inbound:   Inbound,
    tx:        mpsc::Sender<Vec<u8>>,
    conn_task: Mutex<Option<JoinHandle<()>>>,
    cancelled: Arc<AtomicBool>,
}

impl TcpClient {
    pub fn new(address: String, port: u16) -> Self {
        let (tx, rx) = mpsc::channel(INBOUND_QUEUE_BLOCKS);
        Self {
            address,
            port,
            writer: Arc::new(tokio::sync::Mutex::new(None)),
            inbound: Inbound::new(rx),
            tx,
            conn_task: Mutex::new(None),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn initialize(&self) -> Result<()> {
        let address = self.address.clone();
        let port = self.port;
        let writer = Arc::clone(&self.writer);
        let tx = self.tx.clone();
        let cancelled = Arc::clone(&self.cancelled);

        let task = tokio::spawn(async move {
            while !cancelled.load(Ordering::Relaxed) {
                info!("TCP client: trying to connect to {address}:{port}...");
                match TcpStream::connect((address.as_str(), port)).await {
                    Ok(stream) => {
                        info!("TCP client: connected to {address}:{port}");
                        let (mut read_half, write_half) = stream.into_split();
                        *writer.lock().await = Some(write_half);

                        let mut buf = vec![0u8; READ_BLOCK_SIZE];
                        loop {
                            match read_half.read(&mut buf).await {
                                Ok(0) => {
                                    warn!("TCP client: {address}:{port} closed the connection");
                                    break;
                                }
                                Ok(n) => enqueue_block(&tx, buf[..n].to_vec(), "TCP client"),
                                Err(e) => {
                                    warn!("TCP client: read from {address}:{port} failed: {e}");
                                    break;
                                }
                            }
                        }
                        *writer.lock().await = None;
                    }
                    Err(e) => warn!("TCP client: connect to {address}:{port} failed: {e}"),
                }
                if cancelled.load(Ordering::Relaxed) {
                    break;
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        });
        *self.conn_task.lock().unwrap() = Some(task);
        Ok(())
    }

    pub async fn read(&self, length: usize) -> Result<Vec<u8>> {
        self.inbound.read(length, &self.cancelled).await
    }

    pub async fn write(&self, data: &[u8]) -> Result<usize> {
        let mut guard = self.writer.lock().await;
        match guard.as_mut() {
            Some(w) => match w.write_all(data).await {
                Ok(()) => Ok(data.len()),
                Err(e) => {
                    warn!("TCP client: write failed: {e}");
                    *guard = None;
                    Ok(0)
                }
            },
            None => {
                info!("TCP client: not writing, not connected");
                Ok(0)
            }
        }
    }

    pub async fn flush(&self) -> Result<()> {
        self.inbound.clear();
        Ok(())
    }

    pub async fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        if let Some(task) = self.conn_task.lock().unwrap().take() {
            task.abort();
        }
        *self.writer.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_client_round_trip() {
        // Grab an ephemeral port for the test.
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let server = TcpServer::new(port);
        server.initialize().await.unwrap();

        let client = TcpClient::new("127.0.0.1".into(), port);
        client.initialize().await.unwrap();

        // Wait for the connection to be established on both ends.
        for _ in 0..100 {
            if client.write(b"hello").await.unwrap() == 5 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        let got = server.read(5).await.unwrap();
        assert_eq!(got, b"hello");

        server.write(b"world").await.unwrap();
        let got = client.read(5).await.unwrap();
        assert_eq!(got, b"world");

        client.cancel().await;
        server.cancel().await;
    }
}
