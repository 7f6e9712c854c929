use std::path::Path;

use tracing::{error, warn};

mod parse;
mod response;

use crate::db::{Db, UpdateOutcome};
use crate::frame::Envelope;
use crate::funko::Funko;
use parse::Parse;
pub use parse::{ParseError, Payload};
pub use response::{Output, Response};

pub const ADD: &str = "add";
pub const UPDATE: &str = "update";
pub const REMOVE: &str = "remove";
pub const READ: &str = "read";
pub const LIST: &str = "list";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add(Add),
    Update(Update),
    Remove(Remove),
    Read(Read),
    List(List),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Add {
    pub user: String,
    pub funko: Funko,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub user: String,
    pub funko_id: String,
    pub funko: Funko,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Remove {
    pub user: String,
    pub funko_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Read {
    pub user: String,
    pub funko_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub user: String,
}

impl Command {
    /// Decodes the request payload, then selects the command by envelope type.
    pub fn from_envelope(envelope: &Envelope) -> Result<Command, ParseError> {
        let mut parse = Parse::new(envelope)?;
        let kind = parse.kind().to_string();

        let command = match kind.as_str() {
            ADD => Command::Add(Add::parse(&mut parse)?),
            UPDATE => Command::Update(Update::parse(&mut parse)?),
            REMOVE => Command::Remove(Remove::parse(&mut parse)?),
            READ => Command::Read(Read::parse(&mut parse)?),
            LIST => Command::List(List::parse(&mut parse)?),
            other => return Err(ParseError::UnknownType(other.to_string())),
        };

        Ok(command)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Command::Add(_) => ADD,
            Command::Update(_) => UPDATE,
            Command::Remove(_) => REMOVE,
            Command::Read(_) => READ,
            Command::List(_) => LIST,
        }
    }

    pub fn user(&self) -> &str {
        match self {
            Command::Add(cmd) => &cmd.user,
            Command::Update(cmd) => &cmd.user,
            Command::Remove(cmd) => &cmd.user,
            Command::Read(cmd) => &cmd.user,
            Command::List(cmd) => &cmd.user,
        }
    }

    pub fn into_envelope(self) -> Result<Envelope, serde_json::Error> {
        let kind = self.kind();

        let payload = match self {
            Command::Add(cmd) => cmd.into_payload(),
            Command::Update(cmd) => cmd.into_payload(),
            Command::Remove(cmd) => cmd.into_payload(),
            Command::Read(cmd) => cmd.into_payload(),
            Command::List(cmd) => cmd.into_payload(),
        };

        Ok(Envelope::new(kind, Some(serde_json::to_string(&payload)?)))
    }

    pub fn apply(self, db: &mut Db) -> Response {
        match self {
            Command::Add(cmd) => cmd.apply(db),
            Command::Update(cmd) => cmd.apply(db),
            Command::Remove(cmd) => cmd.apply(db),
            Command::Read(cmd) => cmd.apply(db),
            Command::List(cmd) => cmd.apply(db),
        }
    }

    /// Opens a fresh `Db` for the command's user and applies the command.
    /// Blocking; storage failures come back as a failed `Response`.
    pub fn execute(self, data_dir: &Path) -> Response {
        match Db::open(self.user(), data_dir) {
            Ok(mut db) => self.apply(&mut db),
            Err(err) => {
                error!(user = self.user(), error = %err, "could not open collection");
                Response::failure(self.kind(), err)
            }
        }
    }
}

impl Add {
    pub fn new(user: impl ToString, funko: Funko) -> Add {
        Add {
            user: user.to_string(),
            funko,
        }
    }

    fn parse(parse: &mut Parse) -> Result<Add, ParseError> {
        let funko = parse.next_funko()?;

        Ok(Add {
            user: parse.user(),
            funko,
        })
    }

    fn into_payload(self) -> Payload {
        Payload {
            user: self.user,
            funko_id: None,
            funko_data: Some(self.funko),
        }
    }

    pub fn apply(self, db: &mut Db) -> Response {
        let id = self.funko.id().to_string();

        match db.add(self.funko) {
            Ok(()) => Response::success(
                ADD,
                Output::Text(format!(
                    "Funko with ID {} has been added to the collection.",
                    id
                )),
            ),
            Err(err) => Response::failure(ADD, err),
        }
    }
}

impl Update {
    pub fn new(user: impl ToString, funko_id: impl ToString, funko: Funko) -> Update {
        Update {
            user: user.to_string(),
            funko_id: funko_id.to_string(),
            funko,
        }
    }

    fn parse(parse: &mut Parse) -> Result<Update, ParseError> {
        let funko_id = parse.next_funko_id()?;
        let funko = parse.next_funko()?;

        Ok(Update {
            user: parse.user(),
            funko_id,
            funko,
        })
    }

    fn into_payload(self) -> Payload {
        Payload {
            user: self.user,
            funko_id: Some(self.funko_id),
            funko_data: Some(self.funko),
        }
    }

    pub fn apply(self, db: &mut Db) -> Response {
        let outcome = match db.update(&self.funko_id, self.funko) {
            Ok(outcome) => outcome,
            Err(err) => return Response::failure(UPDATE, err),
        };

        let text = match &outcome {
            UpdateOutcome::Replaced { .. } => format!(
                "Funko with ID {} has been modified in the collection.",
                self.funko_id
            ),
            UpdateOutcome::Dropped { collided_with, .. } => {
                warn!(
                    user = db.user(),
                    id = %self.funko_id,
                    collided_with = %collided_with,
                    "update collided with another record"
                );
                format!(
                    "Funko with ID {} has been removed from the collection; ID {} already belongs to another Funko, so the new data was not stored.",
                    self.funko_id, collided_with
                )
            }
        };

        let response = Response::success(UPDATE, Output::Text(text));

        match outcome.stale_file() {
            Some(err) => response.with_warning(err),
            None => response,
        }
    }
}

impl Remove {
    pub fn new(user: impl ToString, funko_id: impl ToString) -> Remove {
        Remove {
            user: user.to_string(),
            funko_id: funko_id.to_string(),
        }
    }

    fn parse(parse: &mut Parse) -> Result<Remove, ParseError> {
        let funko_id = parse.next_funko_id()?;

        Ok(Remove {
            user: parse.user(),
            funko_id,
        })
    }

    fn into_payload(self) -> Payload {
        Payload {
            user: self.user,
            funko_id: Some(self.funko_id),
            funko_data: None,
        }
    }

    pub fn apply(self, db: &mut Db) -> Response {
        match db.remove(&self.funko_id) {
            Ok(_) => Response::success(
                REMOVE,
                Output::Text(format!(
                    "Funko with ID {} has been removed from the collection.",
                    self.funko_id
                )),
            ),
            Err(err) => Response::failure(REMOVE, err),
        }
    }
}

impl Read {
    pub fn new(user: impl ToString, funko_id: impl ToString) -> Read {
        Read {
            user: user.to_string(),
            funko_id: funko_id.to_string(),
        }
    }

    fn parse(parse: &mut Parse) -> Result<Read, ParseError> {
        let funko_id = parse.next_funko_id()?;

        Ok(Read {
            user: parse.user(),
            funko_id,
        })
    }

    fn into_payload(self) -> Payload {
        Payload {
            user: self.user,
            funko_id: Some(self.funko_id),
            funko_data: None,
        }
    }

    pub fn apply(self, db: &mut Db) -> Response {
        match db.show(&self.funko_id) {
            Ok(funko) => Response::success(READ, Output::Funkos(vec![funko.clone()])),
            Err(err) => Response::failure(READ, err),
        }
    }
}

impl List {
    pub fn new(user: impl ToString) -> List {
        List {
            user: user.to_string(),
        }
    }

    fn parse(parse: &mut Parse) -> Result<List, ParseError> {
        Ok(List { user: parse.user() })
    }

    fn into_payload(self) -> Payload {
        Payload {
            user: self.user,
            ..Payload::default()
        }
    }

    pub fn apply(self, db: &mut Db) -> Response {
        Response::success(LIST, Output::Funkos(db.list().to_vec()))
    }
}
