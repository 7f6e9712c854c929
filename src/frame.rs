use std::fmt;
use std::io::Cursor;

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

pub const DELIMITER: u8 = b'\n';

/// Upper bound for a single frame still waiting for its delimiter.
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

/// Handshake type sent by the server as soon as a connection is accepted.
pub const VALID_CONNECTION: &str = "validConnection";

/// Type of the envelope sent back when a request could not be understood.
pub const ERROR_TYPE: &str = "error";

/// One decoded frame: `{"type": ..., "message": ...}`.
///
/// `message` is an opaque string; its content depends on `kind` and is
/// interpreted by the `cmd` module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug)]
pub enum Error {
    /// Not enough buffered bytes to complete a frame.
    Incomplete,
    /// A delimited frame whose content is not an envelope.
    Invalid(serde_json::Error),
    /// Buffered bytes exceeded `MAX_FRAME_LEN` without a delimiter.
    TooLong(usize),
}

impl Envelope {
    pub fn new(kind: impl ToString, message: Option<String>) -> Envelope {
        Envelope {
            kind: kind.to_string(),
            message,
        }
    }

    pub fn handshake() -> Envelope {
        Envelope::new(VALID_CONNECTION, None)
    }

    pub fn is_handshake(&self) -> bool {
        self.kind == VALID_CONNECTION
    }

    /// Checks whether `src` holds one complete frame, leaving the cursor
    /// just past its delimiter.
    pub fn check(src: &mut Cursor<&[u8]>) -> Result<(), Error> {
        get_line(src)?;
        Ok(())
    }

    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Envelope, Error> {
        let line = get_line(src)?;

        serde_json::from_slice(line).map_err(Error::Invalid)
    }

    /// Serialized form including the trailing delimiter.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = serde_json::to_vec(self)?;
        buf.push(DELIMITER);

        Ok(buf)
    }
}

/// Accumulates chunks of a byte stream and yields one envelope per
/// delimiter, in arrival order.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> FrameDecoder {
        FrameDecoder {
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Appends a chunk. Split points are arbitrary, including the middle of a
    /// multi-byte character.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.put_slice(chunk);
    }

    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Pops the next complete frame. `Ok(None)` means more bytes are needed.
    ///
    /// A frame that fails to decode is consumed together with its delimiter
    /// before the error is returned, so the caller decides whether to keep
    /// reading.
    pub fn decode(&mut self) -> Result<Option<Envelope>, Error> {
        let mut buf = Cursor::new(&self.buffer[..]);

        match Envelope::check(&mut buf) {
            Ok(()) => {
                let len = buf.position() as usize;

                buf.set_position(0);

                let parsed = Envelope::parse(&mut buf);

                self.buffer.advance(len);

                parsed.map(Some)
            }
            Err(Error::Incomplete) if self.buffer.len() > MAX_FRAME_LEN => {
                Err(Error::TooLong(self.buffer.len()))
            }
            Err(Error::Incomplete) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Drains every complete frame currently buffered.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames { decoder: self }
    }
}

pub struct Frames<'a> {
    decoder: &'a mut FrameDecoder,
}

impl Iterator for Frames<'_> {
    type Item = Result<Envelope, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decoder.decode().transpose()
    }
}

/// A "line" is every byte up to the next delimiter; the delimiter itself is
/// skipped but not returned.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let bytes = *src.get_ref();

    match bytes[start..].iter().position(|b| *b == DELIMITER) {
        Some(offset) => {
            let end = start + offset;
            src.set_position((end + 1) as u64);

            Ok(&bytes[start..end])
        }
        None => Err(Error::Incomplete),
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Incomplete => "stream ended early".fmt(fmt),
            Error::Invalid(err) => write!(fmt, "protocol error; invalid frame: {}", err),
            Error::TooLong(len) => write!(fmt, "protocol error; frame exceeds {} bytes", len),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Invalid(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(decoder: &mut FrameDecoder) -> Vec<Envelope> {
        decoder
            .frames()
            .collect::<Result<Vec<_>, _>>()
            .expect("valid frames")
    }

    #[test]
    fn every_split_point_yields_both_frames_in_order() {
        let first = r#"{"type":"add","message":"{\"user\":\"ana\"}"}"#;
        let second = r#"{"type":"list"}"#;
        let stream = format!("{}\n{}\n", first, second);
        let bytes = stream.as_bytes();

        let expected = vec![
            serde_json::from_str::<Envelope>(first).unwrap(),
            serde_json::from_str::<Envelope>(second).unwrap(),
        ];

        for a in 0..=bytes.len() {
            for b in a..=bytes.len() {
                let mut decoder = FrameDecoder::new();
                let mut events = Vec::new();

                for chunk in [&bytes[..a], &bytes[a..b], &bytes[b..]] {
                    decoder.extend(chunk);
                    events.extend(drain(&mut decoder));
                }

                assert_eq!(events, expected, "split at {} and {}", a, b);
                assert!(decoder.is_empty());
            }
        }
    }

    #[test]
    fn partial_frame_stays_buffered() {
        let mut decoder = FrameDecoder::new();

        decoder.extend(br#"{"type": "change", "message": "13"#);
        assert!(drain(&mut decoder).is_empty());

        decoder.extend(br#"26"}"#);
        assert!(drain(&mut decoder).is_empty());

        decoder.extend(b"\n");
        assert_eq!(
            drain(&mut decoder),
            vec![Envelope::new("change", Some("1326".to_string()))]
        );
    }

    #[test]
    fn several_frames_in_one_chunk_and_a_leftover() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"{\"type\":\"a\"}\n{\"type\":\"b\"}\n{\"type\":");

        let kinds: Vec<String> = drain(&mut decoder).into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec!["a", "b"]);
        assert!(!decoder.is_empty());

        decoder.extend(b"\"c\"}\n");
        assert_eq!(drain(&mut decoder), vec![Envelope::new("c", None)]);
    }

    #[test]
    fn utf8_split_across_chunks() {
        let frame = "{\"type\":\"add\",\"message\":\"Pokémon\"}\n".as_bytes();
        let split = frame.iter().position(|b| *b == 0xC3).unwrap() + 1;

        let mut decoder = FrameDecoder::new();
        decoder.extend(&frame[..split]);
        assert!(drain(&mut decoder).is_empty());
        decoder.extend(&frame[split..]);

        assert_eq!(
            drain(&mut decoder),
            vec![Envelope::new("add", Some("Pokémon".to_string()))]
        );
    }

    #[test]
    fn invalid_frame_is_reported_and_consumed() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"not json\n{\"type\":\"list\"}\n");

        assert!(matches!(decoder.decode(), Err(Error::Invalid(_))));
        assert_eq!(decoder.decode().unwrap(), Some(Envelope::new("list", None)));
        assert_eq!(decoder.decode().unwrap(), None);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"{\"type\": \"change\", \"prev\": 13, \"curr\": 26}\n");

        assert_eq!(drain(&mut decoder), vec![Envelope::new("change", None)]);
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(&vec![b'x'; MAX_FRAME_LEN + 1]);

        assert!(matches!(decoder.decode(), Err(Error::TooLong(_))));
    }

    #[test]
    fn encode_matches_wire_format() {
        let encoded = Envelope::new("test", Some("hello".to_string()))
            .encode()
            .unwrap();
        assert_eq!(encoded, b"{\"type\":\"test\",\"message\":\"hello\"}\n");

        let handshake = Envelope::handshake().encode().unwrap();
        assert_eq!(handshake, b"{\"type\":\"validConnection\"}\n");
    }
}
