use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::Envelope;
use crate::funko::Funko;

/// Content of a request envelope's `message`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Payload {
    pub user: String,
    #[serde(
        rename = "funkoId",
        alias = "funkoID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub funko_id: Option<String>,
    #[serde(rename = "funkoData", default, skip_serializing_if = "Option::is_none")]
    pub funko_data: Option<Funko>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unknown command type '{0}'")]
    UnknownType(String),

    #[error("'{0}' request carries no message")]
    MissingMessage(String),

    #[error("malformed request message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("request is missing '{0}'")]
    MissingField(&'static str),
}

/// Cursor over a decoded request. Each field can be taken once.
#[derive(Debug)]
pub(crate) struct Parse {
    kind: String,
    payload: Payload,
}

impl Parse {
    pub(crate) fn new(envelope: &Envelope) -> Result<Parse, ParseError> {
        let message = envelope
            .message
            .as_deref()
            .ok_or_else(|| ParseError::MissingMessage(envelope.kind.clone()))?;

        let payload: Payload = serde_json::from_str(message)?;

        Ok(Parse {
            kind: envelope.kind.clone(),
            payload,
        })
    }

    pub(crate) fn kind(&self) -> &str {
        &self.kind
    }

    pub(crate) fn user(&mut self) -> String {
        std::mem::take(&mut self.payload.user)
    }

    pub(crate) fn next_funko_id(&mut self) -> Result<String, ParseError> {
        self.payload
            .funko_id
            .take()
            .ok_or(ParseError::MissingField("funkoId"))
    }

    pub(crate) fn next_funko(&mut self) -> Result<Funko, ParseError> {
        self.payload
            .funko_data
            .take()
            .ok_or(ParseError::MissingField("funkoData"))
    }
}
