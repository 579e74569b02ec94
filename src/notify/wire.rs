//! Coordinator session protocol.
//!
//! One JSON object per line in each direction. A session is: `login`, one `call`, then
//! the client closes the connection. Every request is answered with a reply whose
//! `status` is `ok` or `error`.

use crate::types::ChangeNotification;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Name of the remote procedure that queues a change.
pub const ADD_CHANGE: &str = "addChange";

/// Longest reply line accepted from the coordinator.
const MAX_REPLY_BYTES: u64 = 64 * 1024;

/// Client-to-coordinator frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Login { username: String, password: String },
    Call { method: String, payload: serde_json::Value },
}

/// Coordinator-to-client frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    Ok,
    Error { message: String },
}

/// Ways a session can fail. All of them mean "not accepted".
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connect to {address} failed: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    #[error("session I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("login rejected: {0}")]
    AuthFailed(String),

    #[error("change rejected: {0}")]
    Rejected(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("coordinator closed the connection")]
    Closed,
}

/// Credentials presented at login
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Open a session, log in, call `addChange`, and close the connection.
///
/// The connection is shut down on every path out of this function.
pub async fn deliver(
    host: &str,
    port: u16,
    credentials: &Credentials,
    change: &ChangeNotification,
) -> Result<(), SessionError> {
    let address = format!("{}:{}", host, port);
    let mut stream = TcpStream::connect((host, port))
        .await
        .map_err(|source| SessionError::Connect {
            address: address.clone(),
            source,
        })?;
    info!(coordinator = %address, "Connected to build coordinator");

    let outcome = run_session(&mut stream, credentials, change).await;
    if let Err(e) = stream.shutdown().await {
        debug!(coordinator = %address, error = %e, "Shutdown after session failed");
    }
    outcome
}

async fn run_session(
    stream: &mut TcpStream,
    credentials: &Credentials,
    change: &ChangeNotification,
) -> Result<(), SessionError> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);

    let login = Request::Login {
        username: credentials.username.clone(),
        password: credentials.password.clone(),
    };
    send(&mut write_half, &login).await?;
    if let Reply::Error { message } = receive(&mut reader).await? {
        return Err(SessionError::AuthFailed(message));
    }

    let payload = serde_json::to_value(change)
        .map_err(|e| SessionError::Protocol(format!("cannot encode change: {}", e)))?;
    let call = Request::Call {
        method: ADD_CHANGE.to_string(),
        payload,
    };
    send(&mut write_half, &call).await?;
    match receive(&mut reader).await? {
        Reply::Ok => Ok(()),
        Reply::Error { message } => Err(SessionError::Rejected(message)),
    }
}

async fn send<W>(writer: &mut W, request: &Request) -> Result<(), SessionError>
where
    W: AsyncWriteExt + Unpin,
{
    let mut line = serde_json::to_vec(request)
        .map_err(|e| SessionError::Protocol(format!("cannot encode request: {}", e)))?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

async fn receive<R>(reader: &mut R) -> Result<Reply, SessionError>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut line = String::new();
    let read = (&mut *reader)
        .take(MAX_REPLY_BYTES)
        .read_line(&mut line)
        .await?;
    if read == 0 {
        return Err(SessionError::Closed);
    }
    if !line.ends_with('\n') {
        return Err(SessionError::Protocol("reply line too long".to_string()));
    }
    serde_json::from_str(line.trim_end())
        .map_err(|e| SessionError::Protocol(format!("malformed reply: {}", e)))
}
