use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

use crate::frame::{Envelope, FrameDecoder};

/// Which side of the protocol a connection plays. Decides only how decoded
/// envelopes are labelled, never the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
    Unbound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Received by the accepting side.
    Request(Envelope),
    /// Received by the initiating side.
    Response(Envelope),
    Message(Envelope),
}

impl Role {
    pub fn bind(self, envelope: Envelope) -> Event {
        match self {
            Role::Client => Event::Response(envelope),
            Role::Server => Event::Request(envelope),
            Role::Unbound => Event::Message(envelope),
        }
    }
}

impl Event {
    pub fn envelope(&self) -> &Envelope {
        match self {
            Event::Request(envelope) | Event::Response(envelope) | Event::Message(envelope) => {
                envelope
            }
        }
    }
}

#[derive(Debug)]
pub struct Connection {
    stream: BufWriter<TcpStream>,
    decoder: FrameDecoder,
    role: Role,
}

impl Connection {
    pub fn new(socket: TcpStream, role: Role) -> Connection {
        Connection {
            stream: BufWriter::new(socket),
            decoder: FrameDecoder::new(),
            role,
        }
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.get_ref().peer_addr()
    }

    /// Waits for the next complete frame. `Ok(None)` means the peer closed the
    /// stream cleanly between frames.
    pub async fn read_frame(&mut self) -> crate::Result<Option<Envelope>> {
        loop {
            if let Some(envelope) = self.decoder.decode()? {
                return Ok(Some(envelope));
            }

            if 0 == self.stream.read_buf(self.decoder.buffer_mut()).await? {
                if self.decoder.is_empty() {
                    return Ok(None);
                } else {
                    return Err("connection reset by peer".into());
                }
            }
        }
    }

    /// Like `read_frame`, with the envelope labelled by this connection's role.
    pub async fn read_event(&mut self) -> crate::Result<Option<Event>> {
        let role = self.role;

        Ok(self.read_frame().await?.map(|envelope| role.bind(envelope)))
    }

    /// Writes one `{"type":..,"message":..}` frame and flushes it.
    pub async fn write(&mut self, kind: &str, message: Option<String>) -> crate::Result<()> {
        let envelope = Envelope::new(kind, message);

        self.write_frame(&envelope).await
    }

    pub async fn write_frame(&mut self, envelope: &Envelope) -> crate::Result<()> {
        let bytes = envelope.encode()?;

        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;

        Ok(())
    }

    /// Flushes pending bytes and shuts down the write half.
    pub async fn close(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}
