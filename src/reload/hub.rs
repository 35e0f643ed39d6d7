//! WebSocket hub for live reload.
//!
//! ```text
//! acceptor thread ──handshake──► clients ◄── reader thread (drops closed)
//!                                   ▲
//!                       Notifier::reload (broadcast)
//! ```

use std::io::ErrorKind;
use std::net::{IpAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use tungstenite::protocol::Message;
use tungstenite::{Error as WsError, WebSocket};

use super::message::ReloadMessage;
use super::server::{MAX_PORT_RETRIES, try_bind_port};
use crate::{debug, log};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// A client that has not finished its handshake by then is dropped.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Something that can tell browsers to reload.
pub trait Notifier: Send + Sync {
    fn reload(&self, reason: &str);
}

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

/// Accepts reload clients and broadcasts reload messages to them.
pub struct ReloadHub {
    clients: Clients,
    port: u16,
    stopped: Arc<AtomicBool>,
}

impl ReloadHub {
    /// Bind the reload socket and start accepting clients.
    ///
    /// Returns the hub with the port actually bound.
    pub fn start(interface: IpAddr, base_port: u16) -> Result<Arc<Self>> {
        let (listener, port) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
        listener.set_nonblocking(true)?;

        let hub = Arc::new(Self {
            clients: Arc::new(Mutex::new(Vec::new())),
            port,
            stopped: Arc::new(AtomicBool::new(false)),
        });

        let clients = Arc::clone(&hub.clients);
        let stopped = Arc::clone(&hub.stopped);
        thread::Builder::new()
            .name("sitepipe-reload-accept".into())
            .spawn(move || accept_loop(listener, clients, stopped))?;

        let clients = Arc::clone(&hub.clients);
        let stopped = Arc::clone(&hub.stopped);
        thread::Builder::new()
            .name("sitepipe-reload-read".into())
            .spawn(move || reader_loop(clients, stopped))?;

        debug!("reload"; "listening on {}:{}", interface, port);
        Ok(hub)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Stop accepting and close every client.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        for mut ws in self.clients.lock().drain(..) {
            let _ = ws.close(None);
            let _ = ws.flush();
        }
    }
}

impl Notifier for ReloadHub {
    fn reload(&self, reason: &str) {
        let text = ReloadMessage::reload(reason).to_json();
        let mut clients = self.clients.lock();
        let before = clients.len();

        clients.retain_mut(|ws| match ws.send(Message::Text(text.clone().into())) {
            Ok(()) => true,
            // Queued; the reader loop flushes it.
            Err(WsError::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => true,
            Err(e) => {
                debug!("reload"; "dropping client: {}", e);
                false
            }
        });

        debug!("reload"; "reload ({}) sent to {}/{} clients", reason, clients.len(), before);
    }
}

impl Drop for ReloadHub {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

fn accept_loop(listener: TcpListener, clients: Clients, stopped: Arc<AtomicBool>) {
    while !stopped.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                debug!("reload"; "client connected: {}", addr);
                // Blocking for the handshake, non-blocking for polling reads after.
                let _ = stream.set_nonblocking(false);
                let _ = stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT));
                match tungstenite::accept(stream) {
                    Ok(ws) => {
                        let _ = ws.get_ref().set_read_timeout(None);
                        let _ = ws.get_ref().set_nonblocking(true);
                        clients.lock().push(ws);
                    }
                    Err(e) => log!("reload"; "handshake failed: {}", e),
                }
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                log!("reload"; "accept error: {}", e);
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

/// Poll clients for close frames and flush queued writes.
fn reader_loop(clients: Clients, stopped: Arc<AtomicBool>) {
    while !stopped.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL);

        clients.lock().retain_mut(|ws| {
            loop {
                match ws.read() {
                    Ok(Message::Close(_)) => return false,
                    Ok(_) => continue,
                    Err(WsError::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(_) => return false,
                }
            }
            match ws.flush() {
                Ok(()) => true,
                Err(WsError::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => true,
                Err(_) => false,
            }
        });
    }
}
