use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::cmd::{Command, ParseError, Response};
use crate::connection::{Connection, Event, Role};
use crate::frame::{Envelope, ERROR_TYPE};

#[derive(Debug)]
struct Listener {
    listener: TcpListener,
    data_dir: PathBuf,
}

/// Lifecycle of one accepted connection. Exactly one request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    AwaitingRequest,
    Dispatching,
    Responded,
    Closed,
}

#[derive(Debug)]
struct Handler {
    connection: Connection,
    data_dir: PathBuf,
    state: SessionState,
}

/// Serves connections until `shutdown` completes. Sessions already running
/// are left to finish on their own.
pub async fn run(listener: TcpListener, data_dir: PathBuf, shutdown: impl Future) {
    let mut server = Listener { listener, data_dir };

    tokio::select! {
        res = server.run() => {
            if let Err(err) = res {
                error!(cause = %err, "failed to accept");
            }
        }
        _ = shutdown => {
            info!("shutting down");
        }
    }
}

impl Listener {
    /// Accepts connections forever, spawning one task per connection. Nothing
    /// is shared between tasks; each session opens its own `Db`.
    async fn run(&mut self) -> crate::Result<()> {
        info!(data_dir = %self.data_dir.display(), "waiting for clients to connect");

        loop {
            let socket = self.accept().await?;

            let mut handler = Handler {
                connection: Connection::new(socket, Role::Server),
                data_dir: self.data_dir.clone(),
                state: SessionState::Connected,
            };

            let peer = handler
                .connection
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "unknown".to_string());

            let span = info_span!("session", %peer);

            tokio::spawn(
                async move {
                    info!("client connected");

                    if let Err(err) = handler.run().await {
                        error!(cause = %err, "connection error");
                    }

                    info!("client disconnected");
                }
                .instrument(span),
            );
        }
    }

    /// Transient accept errors are retried with exponential backoff; after
    /// the sixth failure in a row the error is returned.
    async fn accept(&mut self) -> crate::Result<TcpStream> {
        let mut backoff = 1;

        loop {
            match self.listener.accept().await {
                Ok((socket, _)) => return Ok(socket),
                Err(err) => {
                    if backoff > 32 {
                        return Err(err.into());
                    }
                    warn!(error = %err, backoff, "accept failed; retrying");
                }
            }

            tokio::time::sleep(Duration::from_secs(backoff)).await;

            backoff *= 2;
        }
    }
}

impl Handler {
    async fn run(&mut self) -> crate::Result<()> {
        self.connection.write_frame(&Envelope::handshake()).await?;
        self.transition(SessionState::AwaitingRequest);

        let served = self.serve().await;

        if let Err(err) = self.connection.close().await {
            debug!(error = %err, "shutdown after response failed");
        }
        self.transition(SessionState::Closed);

        served
    }

    async fn serve(&mut self) -> crate::Result<()> {
        let envelope = match self.connection.read_event().await {
            Ok(Some(Event::Request(envelope))) => envelope,
            Ok(Some(other)) => {
                return Err(format!("unexpected event on server connection: {:?}", other).into())
            }
            Ok(None) => {
                debug!("peer closed before sending a request");
                return Ok(());
            }
            Err(err) => {
                warn!(error = %err, "unreadable request");
                return self
                    .reply_error(format!("Invalid message received: {}", err))
                    .await;
            }
        };

        self.transition(SessionState::Dispatching);

        let command = match Command::from_envelope(&envelope) {
            Ok(command) => command,
            Err(ParseError::UnknownType(kind)) => {
                warn!(%kind, "invalid request type; no response sent");
                return Ok(());
            }
            Err(err) => {
                warn!(kind = %envelope.kind, error = %err, "invalid request message");
                return self
                    .reply_error(format!("Invalid JSON message sent: {}", err))
                    .await;
            }
        };

        let kind = command.kind();
        info!(user = command.user(), command = kind, "dispatching");

        let data_dir = self.data_dir.clone();
        let response = tokio::task::spawn_blocking(move || command.execute(&data_dir)).await?;

        if !response.success {
            debug!(command = kind, error = ?response.error, "command failed");
        }

        self.connection
            .write(kind, Some(response.to_message()?))
            .await?;
        self.transition(SessionState::Responded);

        Ok(())
    }

    async fn reply_error(&mut self, message: String) -> crate::Result<()> {
        let response = Response::failure(ERROR_TYPE, message);

        self.connection
            .write(ERROR_TYPE, Some(response.to_message()?))
            .await?;
        self.transition(SessionState::Responded);

        Ok(())
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "session state");
        self.state = next;
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connected => "connected",
            SessionState::AwaitingRequest => "awaiting-request",
            SessionState::Dispatching => "dispatching",
            SessionState::Responded => "responded",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
