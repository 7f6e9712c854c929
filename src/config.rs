use std::env;
use std::path::PathBuf;

use crate::DEFAULT_PORT;

pub const ADDR_ENV: &str = "FUNKO_ADDR";
pub const DATA_DIR_ENV: &str = "FUNKO_DATA_DIR";

pub const DEFAULT_DATA_DIR: &str = "data";

/// Where the server listens and where collections are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub addr: String,
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl Config {
    /// Defaults overridden by `FUNKO_ADDR` / `FUNKO_DATA_DIR` when set.
    pub fn from_env() -> Config {
        Config::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Config {
        let mut config = Config::default();

        if let Some(addr) = lookup(ADDR_ENV).filter(|v| !v.is_empty()) {
            config.addr = addr;
        }
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }

        config
    }

    /// Command-line values win over whatever is already set.
    pub fn with_overrides(mut self, addr: Option<String>, data_dir: Option<PathBuf>) -> Config {
        if let Some(addr) = addr {
            self.addr = addr;
        }
        if let Some(data_dir) = data_dir {
            self.data_dir = data_dir;
        }
        self
    }
}
