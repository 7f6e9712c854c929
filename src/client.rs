use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::cmd::{Command, Response};
use crate::connection::{Connection, Event, Role};
use crate::frame::{Envelope, ERROR_TYPE};

/// Issues exactly one command per connection.
pub struct Client {
    connection: Connection,
}

impl Client {
    pub async fn connect<T: ToSocketAddrs>(addr: T) -> crate::Result<Client> {
        let socket = TcpStream::connect(addr).await?;
        let connection = Connection::new(socket, Role::Client);

        Ok(Client { connection })
    }

    /// Sends `command` and waits for the response carrying the same type.
    /// The server's handshake is consumed silently.
    pub async fn send(mut self, command: Command) -> crate::Result<Response> {
        let envelope = command.into_envelope()?;
        let kind = envelope.kind.clone();

        self.connection.write_frame(&envelope).await?;

        loop {
            let envelope = match self.connection.read_event().await? {
                Some(Event::Response(envelope)) => envelope,
                Some(other) => {
                    return Err(format!("unexpected event on client connection: {:?}", other).into())
                }
                None => return Err("connection closed before a response arrived".into()),
            };

            if envelope.is_handshake() {
                debug!("connection established");
                continue;
            }

            if envelope.kind == kind {
                return read_response(&envelope);
            }

            if envelope.kind == ERROR_TYPE {
                let response = read_response(&envelope)?;
                let message = response
                    .error
                    .unwrap_or_else(|| "server rejected the request".to_string());

                return Err(message.into());
            }

            return Err(format!("Message type {} is not valid", envelope.kind).into());
        }
    }
}

fn read_response(envelope: &Envelope) -> crate::Result<Response> {
    let message = envelope
        .message
        .as_deref()
        .ok_or_else(|| format!("'{}' response carries no message", envelope.kind))?;

    Ok(serde_json::from_str(message)?)
}
