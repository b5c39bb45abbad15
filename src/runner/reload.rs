//! Live reload transport.
//!
//! Browsers open a WebSocket to the reload port through the snippet from
//! [`Environment::get_refresh_script`](crate::core::Environment::get_refresh_script).
//! Every `()` sent on the channel returned by [`start`] becomes one `"reload"`
//! message to each connected client.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::sync::mpsc::{Sender, channel};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::{debug, warn};
use tungstenite::{Message, WebSocket};

/// Preferred reload port. Taken ports fall back to an ephemeral one.
pub const RELOAD_PORT: u16 = 1337;

/// Newest clients kept open, older ones are closed.
const MAX_CLIENTS: usize = 10;

/// Binds the reload port on loopback.
pub fn reserve_port() -> std::io::Result<(TcpListener, u16)> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, RELOAD_PORT))
        .or_else(|_| TcpListener::bind((Ipv4Addr::LOCALHOST, 0)))?;

    let port = listener.local_addr()?.port();
    Ok((listener, port))
}

/// Starts accepting clients on `server` and returns the broadcast channel.
/// Both threads live until the process exits or the sender is dropped.
pub fn start(server: TcpListener) -> Sender<()> {
    let hub = Arc::new(Hub::default());
    let (tx, rx) = channel::<()>();

    let accepting = hub.clone();
    thread::spawn(move || {
        for stream in server.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("reload client failed to connect: {e}");
                    continue;
                }
            };

            match tungstenite::accept(stream) {
                Ok(socket) => accepting.join(socket),
                Err(e) => debug!("reload handshake failed: {e}"),
            }
        }
    });

    thread::spawn(move || {
        while rx.recv().is_ok() {
            let reached = hub.broadcast();
            debug!("reload sent to {reached} clients");
        }
    });

    tx
}

/// Connected browsers, oldest first.
struct Hub<S = TcpStream> {
    clients: Mutex<Vec<WebSocket<S>>>,
}

impl<S> Default for Hub<S> {
    fn default() -> Self {
        Self {
            clients: Mutex::new(Vec::new()),
        }
    }
}

impl<S: Read + Write> Hub<S> {
    fn clients(&self) -> MutexGuard<'_, Vec<WebSocket<S>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a client, closing the oldest ones past [`MAX_CLIENTS`].
    fn join(&self, socket: WebSocket<S>) {
        let mut clients = self.clients();
        clients.push(socket);

        let excess = clients.len().saturating_sub(MAX_CLIENTS);
        for mut stale in clients.drain(..excess) {
            let _ = stale.close(None);
        }
    }

    /// Sends `"reload"` to every client and forgets the ones that are gone.
    /// Returns how many clients got the message.
    fn broadcast(&self) -> usize {
        let mut clients = self.clients();

        clients.retain_mut(|socket| match socket.send(Message::text("reload")) {
            Ok(()) => true,
            Err(e) => {
                debug!("dropping reload client: {e}");
                false
            }
        });

        clients.len()
    }
}
