use std::fmt;

use serde::{Deserialize, Serialize};

use crate::funko::Funko;

/// Structured result of one command, sent back as the response envelope's
/// `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "type")]
    pub kind: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Output>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Output {
    Text(String),
    Funkos(Vec<Funko>),
}

impl Response {
    pub fn success(kind: impl ToString, output: Output) -> Response {
        Response {
            kind: kind.to_string(),
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failure(kind: impl ToString, error: impl ToString) -> Response {
        Response {
            kind: kind.to_string(),
            success: false,
            output: None,
            error: Some(error.to_string()),
        }
    }

    /// Attaches a non-fatal diagnostic to a successful result.
    pub fn with_warning(mut self, warning: impl ToString) -> Response {
        self.error = Some(warning.to_string());
        self
    }

    pub fn to_message(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Text(text) => f.write_str(text),
            Output::Funkos(funkos) => {
                for (i, funko) in funkos.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", funko)?;
                }
                Ok(())
            }
        }
    }
}
