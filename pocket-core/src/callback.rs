//! Local callback listener.
//!
//! The service redirects the user's browser to a local address once the
//! request token has been approved. The listener binds that address, answers
//! the browser, and signals the waiting flow exactly once. It carries no
//! payload: the hit itself is the signal.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), pocket_core::CallbackError> {
//! use pocket_core::CallbackListener;
//!
//! let listener = CallbackListener::bind("127.0.0.1").await?;
//! println!("Redirect to {}", listener.redirect_uri());
//! listener.wait(None).await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Body served to the browser on the callback hit.
pub const AUTHORIZED_BODY: &str = "Authorized.\n";

/// Error type for the callback listener.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// The local address could not be bound.
    #[error("failed to bind callback listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// No callback arrived within the configured limit.
    #[error("no authorization callback within {0:?}")]
    TimedOut(Duration),

    /// The listener stopped before signalling.
    #[error("callback listener stopped unexpectedly")]
    Closed,
}

/// Single-use slot for the completion signal.
type SignalSlot = Arc<Mutex<Option<oneshot::Sender<()>>>>;

/// An ephemeral local HTTP endpoint that detects the authorization redirect.
///
/// The accept loop runs in its own task from [`bind`](Self::bind) until the
/// listener is consumed by [`wait`](Self::wait) or dropped.
#[derive(Debug)]
pub struct CallbackListener {
    local_addr: SocketAddr,
    signal: Option<oneshot::Receiver<()>>,
    server: JoinHandle<()>,
}

impl CallbackListener {
    /// Bind an ephemeral port on `host` and start accepting connections.
    pub async fn bind(host: &str) -> Result<Self, CallbackError> {
        let addr = format!("{}:0", host);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| CallbackError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| CallbackError::Bind { addr, source })?;

        let (tx, rx) = oneshot::channel();
        let slot: SignalSlot = Arc::new(Mutex::new(Some(tx)));
        let server = tokio::spawn(accept_loop(listener, slot));

        tracing::info!("Listening for authorization callback on {}", local_addr);

        Ok(Self {
            local_addr,
            signal: Some(rx),
            server,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The redirect target to hand to the service.
    pub fn redirect_uri(&self) -> String {
        format!("http://{}/", self.local_addr)
    }

    /// Suspend until the browser reaches the callback.
    ///
    /// With a `timeout` the wait gives up after that long. Without one it
    /// only ends on the callback or when the caller drops the future. The
    /// listener is shut down however this returns.
    pub async fn wait(mut self, timeout: Option<Duration>) -> Result<(), CallbackError> {
        let signal = self.signal.take().ok_or(CallbackError::Closed)?;

        let expired = async {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        let result = tokio::select! {
            received = signal => received.map_err(|_| CallbackError::Closed),
            _ = expired => Err(CallbackError::TimedOut(timeout.unwrap_or_default())),
        };

        self.server.abort();
        tracing::debug!("Callback listener on {} closed", self.local_addr);

        result
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn accept_loop(listener: TcpListener, slot: SignalSlot) {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                tracing::debug!("Callback connection from {}", peer);
                tokio::spawn(handle_connection(socket, Arc::clone(&slot)));
            }
            Err(e) => {
                tracing::warn!("Failed to accept callback connection: {}", e);
            }
        }
    }
}

async fn handle_connection(mut socket: TcpStream, slot: SignalSlot) {
    let mut buffer = [0; 4096];
    let n = match socket.read(&mut buffer).await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!("Failed to read callback request: {}", e);
            return;
        }
    };

    let request = String::from_utf8_lossy(&buffer[..n]);
    let mut parts = request.lines().next().unwrap_or_default().split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    let path = target.split('?').next().unwrap_or_default();

    let response = if method == "GET" && is_callback_path(path) {
        if fire(&slot) {
            tracing::info!("Authorization callback received");
        } else {
            tracing::debug!("Repeated callback hit on {}", path);
        }
        http_response("200 OK", AUTHORIZED_BODY)
    } else {
        tracing::debug!("Ignoring callback noise: {} {}", method, target);
        http_response("404 Not Found", "Not Found\n")
    };

    if let Err(e) = socket.write_all(response.as_bytes()).await {
        tracing::warn!("Failed to answer callback request: {}", e);
    }
    let _ = socket.shutdown().await;
}

/// Browser requests that must not count as the callback.
fn is_callback_path(path: &str) -> bool {
    !path.is_empty() && path != "/favicon.ico"
}

/// Send the signal if nobody has yet. Returns whether this call sent it.
fn fire(slot: &SignalSlot) -> bool {
    let sender = match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };

    match sender {
        Some(tx) => {
            // The receiver may already be gone after a timeout.
            let _ = tx.send(());
            true
        }
        None => false,
    }
}

fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
}
