use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::funko::Funko;

/// One user's collection, loaded in full from `<base_dir>/<user>/`.
///
/// The in-memory list is authoritative only for the lifetime of this value;
/// nothing is shared between instances, so two `Db`s for the same user see
/// whatever was on disk when each was opened.
#[derive(Debug)]
pub struct Db {
    user: String,
    dir: PathBuf,
    funkos: Vec<Funko>,
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("A Funko with ID {0} already exists in the collection.")]
    DuplicateId(String),

    #[error("A Funko with ID {0} does not exist in the collection.")]
    NotFound(String),

    #[error("Invalid {kind} '{value}': it must be a single path component")]
    InvalidKey { kind: &'static str, value: String },

    #[error("Error modifying file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not load {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result of a successful `Db::update`.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// The record now holds the new data under the new id.
    Replaced { stale_file: Option<DbError> },
    /// The new id belonged to another record: the old record was removed and
    /// the new data was not stored.
    /// On disk only the old record's file is deleted. Nothing is written and
    /// the other record's file is left untouched.
    Dropped {
        collided_with: String,
        stale_file: Option<DbError>,
    },
}

impl UpdateOutcome {
    /// Failure to delete the file of the record being replaced. Not fatal.
    pub fn stale_file(&self) -> Option<&DbError> {
        match self {
            UpdateOutcome::Replaced { stale_file } | UpdateOutcome::Dropped { stale_file, .. } => {
                stale_file.as_ref()
            }
        }
    }
}

impl Db {
    /// Creates `base_dir` and the user's directory when missing, then reads
    /// every `*.json` file in file-name order.
    pub fn open(user: &str, base_dir: impl AsRef<Path>) -> Result<Db, DbError> {
        check_key("user", user)?;

        let dir = base_dir.as_ref().join(user);
        fs::create_dir_all(&dir).map_err(|source| io_error(&dir, source))?;

        let funkos = load(&dir)?;

        debug!(user, count = funkos.len(), dir = %dir.display(), "collection loaded");

        Ok(Db {
            user: user.to_string(),
            dir,
            funkos,
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.funkos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funkos.is_empty()
    }

    pub fn add(&mut self, funko: Funko) -> Result<(), DbError> {
        check_key("id", funko.id())?;

        if self.position(funko.id()).is_some() {
            return Err(DbError::DuplicateId(funko.id().to_string()));
        }

        self.write_funko(&funko)?;
        self.funkos.push(funko);

        Ok(())
    }

    /// Replaces the record `id` with `funko`, keeping its position.
    ///
    /// When `funko` carries the id of a different existing record, the record
    /// `id` is removed and `funko` is discarded; see `UpdateOutcome::Dropped`.
    pub fn update(&mut self, id: &str, funko: Funko) -> Result<UpdateOutcome, DbError> {
        let index = self
            .position(id)
            .ok_or_else(|| DbError::NotFound(id.to_string()))?;

        check_key("id", funko.id())?;

        if funko.id() != id && self.position(funko.id()).is_some() {
            let stale_file = self.delete_stale_file(id);
            self.funkos.remove(index);

            return Ok(UpdateOutcome::Dropped {
                collided_with: funko.id().to_string(),
                stale_file,
            });
        }

        // New file first: a failed write must leave the old record on disk.
        self.write_funko(&funko)?;

        let stale_file = if funko.id() != id {
            self.delete_stale_file(id)
        } else {
            None
        };
        self.funkos[index] = funko;

        Ok(UpdateOutcome::Replaced { stale_file })
    }

    pub fn remove(&mut self, id: &str) -> Result<Funko, DbError> {
        let index = self
            .position(id)
            .ok_or_else(|| DbError::NotFound(id.to_string()))?;

        self.delete_file(id)?;

        Ok(self.funkos.remove(index))
    }

    /// Every record in load/insertion order.
    pub fn list(&self) -> &[Funko] {
        &self.funkos
    }

    pub fn show(&self, id: &str) -> Result<&Funko, DbError> {
        self.funkos
            .iter()
            .find(|funko| funko.id() == id)
            .ok_or_else(|| DbError::NotFound(id.to_string()))
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.funkos.iter().position(|funko| funko.id() == id)
    }

    fn funko_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn write_funko(&self, funko: &Funko) -> Result<(), DbError> {
        let path = self.funko_path(funko.id());

        let json = serde_json::to_string_pretty(funko)
            .map_err(|err| io_error(&path, io::Error::new(io::ErrorKind::InvalidData, err)))?;

        fs::write(&path, json).map_err(|source| io_error(&path, source))
    }

    fn delete_file(&self, id: &str) -> Result<(), DbError> {
        let path = self.funko_path(id);

        fs::remove_file(&path).map_err(|source| io_error(&path, source))
    }

    fn delete_stale_file(&self, id: &str) -> Option<DbError> {
        let err = self.delete_file(id).err()?;
        warn!(user = %self.user, id, error = %err, "could not delete replaced record file");

        Some(err)
    }
}

fn load(dir: &Path) -> Result<Vec<Funko>, DbError> {
    let mut paths = Vec::new();

    for entry in fs::read_dir(dir).map_err(|source| io_error(dir, source))? {
        let path = entry.map_err(|source| io_error(dir, source))?.path();

        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }

    paths.sort();

    let mut funkos: Vec<Funko> = Vec::with_capacity(paths.len());

    for path in paths {
        let content = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
        let funko: Funko = serde_json::from_str(&content)
            .map_err(|source| DbError::Corrupt { path: path.clone(), source })?;

        if let Err(err) = check_key("id", funko.id()) {
            warn!(path = %path.display(), error = %err, "skipping record");
            continue;
        }

        if funkos.iter().any(|loaded| loaded.id() == funko.id()) {
            warn!(path = %path.display(), id = funko.id(), "skipping record with duplicate id");
            continue;
        }

        funkos.push(funko);
    }

    Ok(funkos)
}

/// `user` and record ids end up as path components.
fn check_key(kind: &'static str, value: &str) -> Result<(), DbError> {
    let invalid = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0']);

    if invalid {
        return Err(DbError::InvalidKey {
            kind,
            value: value.to_string(),
        });
    }

    Ok(())
}

fn io_error(path: &Path, source: io::Error) -> DbError {
    DbError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funko::tests::{data, funko};

    fn renamed(id: &str, name: &str) -> Funko {
        let mut data = data(id);
        data.name = name.to_string();
        Funko::new(data).unwrap()
    }

    fn files(db: &Db) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(db.dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn ids(db: &Db) -> Vec<&str> {
        db.list().iter().map(|funko| funko.id()).collect()
    }

    #[test]
    fn open_creates_directories() {
        let temp = tempfile::tempdir().unwrap();
        let base = temp.path().join("funkos");

        let db = Db::open("ana", &base).unwrap();

        assert!(base.join("ana").is_dir());
        assert!(db.is_empty());
        assert_eq!(db.user(), "ana");
    }

    #[test]
    fn add_writes_one_pretty_file() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Db::open("ana", temp.path()).unwrap();

        db.add(funko("42")).unwrap();

        assert_eq!(ids(&db), vec!["42"]);
        assert_eq!(files(&db), vec!["42.json"]);

        let content = fs::read_to_string(db.dir().join("42.json")).unwrap();
        assert!(content.contains("\n  \"id\": \"42\""));
        assert_eq!(serde_json::from_str::<Funko>(&content).unwrap(), funko("42"));
    }

    #[test]
    fn add_duplicate_changes_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Db::open("ana", temp.path()).unwrap();
        db.add(funko("1")).unwrap();
        let before = fs::read_to_string(db.dir().join("1.json")).unwrap();

        let err = db.add(renamed("1", "Robin")).unwrap_err();

        assert!(matches!(err, DbError::DuplicateId(ref id) if id == "1"));
        assert_eq!(db.show("1").unwrap().name(), "Batman");
        assert_eq!(files(&db), vec!["1.json"]);
        assert_eq!(fs::read_to_string(db.dir().join("1.json")).unwrap(), before);
    }

    #[test]
    fn add_rejects_path_like_ids() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Db::open("ana", temp.path()).unwrap();

        for id in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(db.add(funko(id)), Err(DbError::InvalidKey { .. })));
        }
        assert!(files(&db).is_empty());
    }

    #[test]
    fn open_rejects_path_like_users() {
        let temp = tempfile::tempdir().unwrap();

        assert!(matches!(
            Db::open("../escape", temp.path()),
            Err(DbError::InvalidKey { kind: "user", .. })
        ));
    }

    #[test]
    fn reopen_sees_persisted_records_in_file_name_order() {
        let temp = tempfile::tempdir().unwrap();
        {
            let mut db = Db::open("ana", temp.path()).unwrap();
            db.add(funko("b")).unwrap();
            db.add(funko("a")).unwrap();
            db.add(funko("c")).unwrap();
            assert_eq!(ids(&db), vec!["b", "a", "c"]);
        }

        let db = Db::open("ana", temp.path()).unwrap();
        assert_eq!(ids(&db), vec!["a", "b", "c"]);
    }

    #[test]
    fn list_keeps_insertion_order() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Db::open("ana", temp.path()).unwrap();

        for id in ["9", "10", "1"] {
            db.add(funko(id)).unwrap();
        }

        assert_eq!(ids(&db), vec!["9", "10", "1"]);
    }

    #[test]
    fn users_are_isolated() {
        let temp = tempfile::tempdir().unwrap();
        Db::open("ana", temp.path()).unwrap().add(funko("1")).unwrap();

        assert!(Db::open("bob", temp.path()).unwrap().is_empty());
    }

    #[test]
    fn remove_missing_changes_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Db::open("ana", temp.path()).unwrap();
        db.add(funko("1")).unwrap();

        let err = db.remove("nope").unwrap_err();

        assert!(matches!(err, DbError::NotFound(_)));
        assert!(err.to_string().contains("does not exist"));
        assert_eq!(files(&db), vec!["1.json"]);
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn remove_deletes_record_and_file() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Db::open("ana", temp.path()).unwrap();
        db.add(funko("1")).unwrap();
        db.add(funko("2")).unwrap();

        let removed = db.remove("1").unwrap();

        assert_eq!(removed.id(), "1");
        assert_eq!(ids(&db), vec!["2"]);
        assert_eq!(files(&db), vec!["2.json"]);
    }

    #[test]
    fn remove_aborts_when_file_cannot_be_deleted() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Db::open("ana", temp.path()).unwrap();
        db.add(funko("1")).unwrap();
        fs::remove_file(db.dir().join("1.json")).unwrap();

        assert!(matches!(db.remove("1"), Err(DbError::Io { .. })));
        assert_eq!(ids(&db), vec!["1"]);
    }

    #[test]
    fn update_replaces_in_place_and_renames_file() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Db::open("ana", temp.path()).unwrap();
        db.add(funko("1")).unwrap();
        db.add(funko("2")).unwrap();

        let outcome = db.update("1", renamed("7", "Joker")).unwrap();

        assert!(matches!(outcome, UpdateOutcome::Replaced { stale_file: None }));
        assert_eq!(ids(&db), vec!["7", "2"]);
        assert_eq!(db.show("7").unwrap().name(), "Joker");
        assert_eq!(files(&db), vec!["2.json", "7.json"]);
    }

    #[test]
    fn update_same_id_rewrites_file() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Db::open("ana", temp.path()).unwrap();
        db.add(funko("1")).unwrap();

        let outcome = db.update("1", renamed("1", "Robin")).unwrap();

        assert!(outcome.stale_file().is_none());
        assert_eq!(files(&db), vec!["1.json"]);

        let reopened = Db::open("ana", temp.path()).unwrap();
        assert_eq!(reopened.show("1").unwrap().name(), "Robin");
    }

    #[test]
    fn update_missing_is_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Db::open("ana", temp.path()).unwrap();

        assert!(matches!(
            db.update("1", funko("1")),
            Err(DbError::NotFound(_))
        ));
        assert!(files(&db).is_empty());
    }

    #[test]
    fn update_missing_is_not_found_even_with_path_like_new_id() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Db::open("ana", temp.path()).unwrap();
        db.add(funko("1")).unwrap();

        assert!(matches!(
            db.update("nope", funko("a/b")),
            Err(DbError::NotFound(ref id)) if id == "nope"
        ));
        assert!(matches!(
            db.update("1", funko("a/b")),
            Err(DbError::InvalidKey { .. })
        ));
        assert_eq!(files(&db), vec!["1.json"]);
    }

    #[test]
    fn update_onto_other_id_drops_the_old_record() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Db::open("ana", temp.path()).unwrap();
        db.add(funko("1")).unwrap();
        db.add(funko("2")).unwrap();

        let outcome = db.update("1", renamed("2", "Joker")).unwrap();

        assert!(matches!(
            outcome,
            UpdateOutcome::Dropped { ref collided_with, stale_file: None } if collided_with == "2"
        ));
        assert_eq!(ids(&db), vec!["2"]);
        assert_eq!(db.show("2").unwrap().name(), "Batman");
        assert_eq!(files(&db), vec!["2.json"]);
    }

    #[test]
    fn update_reports_stale_file_but_still_writes() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Db::open("ana", temp.path()).unwrap();
        db.add(funko("1")).unwrap();
        fs::remove_file(db.dir().join("1.json")).unwrap();

        let outcome = db.update("1", renamed("3", "Joker")).unwrap();

        assert!(matches!(outcome.stale_file(), Some(DbError::Io { .. })));
        assert_eq!(files(&db), vec!["3.json"]);
        assert_eq!(ids(&db), vec!["3"]);
    }

    #[test]
    fn update_keeps_old_record_when_new_file_cannot_be_written() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Db::open("ana", temp.path()).unwrap();
        db.add(funko("1")).unwrap();
        fs::create_dir(db.dir().join("3.json")).unwrap();

        assert!(matches!(
            db.update("1", renamed("3", "Joker")),
            Err(DbError::Io { .. })
        ));
        assert!(db.dir().join("1.json").is_file());
        assert_eq!(ids(&db), vec!["1"]);

        let reopened = Db::open("ana", temp.path()).unwrap();
        assert_eq!(ids(&reopened), vec!["1"]);
        assert_eq!(reopened.show("1").unwrap().name(), "Batman");
    }

    #[test]
    fn show_finds_or_reports_missing() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Db::open("ana", temp.path()).unwrap();
        db.add(funko("1")).unwrap();

        assert_eq!(db.show("1").unwrap(), &funko("1"));
        assert!(matches!(db.show("2"), Err(DbError::NotFound(_))));
    }

    #[test]
    fn corrupt_file_fails_open() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("ana");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("bad.json"), "{ not json").unwrap();

        assert!(matches!(
            Db::open("ana", temp.path()),
            Err(DbError::Corrupt { .. })
        ));
    }

    #[test]
    fn load_ignores_other_files_and_duplicate_ids() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("ana");
        fs::create_dir_all(&dir).unwrap();

        let json = serde_json::to_string_pretty(&funko("1")).unwrap();
        fs::write(dir.join("1.json"), &json).unwrap();
        fs::write(dir.join("copy.json"), &json).unwrap();
        fs::write(dir.join("notes.txt"), "hello").unwrap();

        let db = Db::open("ana", temp.path()).unwrap();
        assert_eq!(ids(&db), vec!["1"]);
    }
}
