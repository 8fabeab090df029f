//! # Preference Store
//!
//! Boolean preferences keyed under a namespace. The clock only ever stores its display-mode
//! flag, but the store keeps the general `get_bool`/`set_bool` shape of the host's API.
//!
//! [`FilePreferences`] persists to a TOML file with one table per namespace:
//! ```toml
//! [clock_settings]
//! is_analog = true
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Namespace holding the clock's preferences.
pub const NAMESPACE: &str = "clock_settings";

/// Key of the persisted display-mode flag.
pub const KEY_IS_ANALOG: &str = "is_analog";

#[derive(Error, Debug)]
pub enum PrefsError {
    /// Reading or writing the backing file failed
    #[error("preference IO: {0}")]
    Io(#[from] io::Error),

    /// The backing file is not valid TOML
    #[error("preference file malformed: {0}")]
    Parse(#[from] toml::de::Error),

    /// The stored value exists but is not a boolean
    #[error("preference {key} is not a boolean")]
    NotBool { key: String },
}

/// Boolean key/value storage owned by the host.
pub trait PreferenceStore: Send + Sync {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, PrefsError>;
    fn set_bool(&self, key: &str, value: bool) -> Result<(), PrefsError>;
}

/// Preferences persisted as a TOML document on disk.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    namespace: String,
    // Serializes read-modify-write of the file
    write: Mutex<()>,
}

impl FilePreferences {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::with_namespace(path, NAMESPACE)
    }

    pub fn with_namespace<P: AsRef<Path>>(path: P, namespace: &str) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            namespace: namespace.to_string(),
            write: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<toml::Table, PrefsError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents.parse::<toml::Table>()?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(toml::Table::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl PreferenceStore for FilePreferences {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, PrefsError> {
        let document = self.read_document()?;
        let value = document
            .get(&self.namespace)
            .and_then(|ns| ns.as_table())
            .and_then(|ns| ns.get(key));

        match value {
            None => Ok(None),
            Some(value) => value.as_bool().map(Some).ok_or_else(|| PrefsError::NotBool {
                key: key.to_string(),
            }),
        }
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), PrefsError> {
        let _write = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        let mut document = self.read_document()?;

        let namespace = document
            .entry(self.namespace.clone())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if !namespace.is_table() {
            *namespace = toml::Value::Table(toml::Table::new());
        }
        if let Some(table) = namespace.as_table_mut() {
            table.insert(key.to_string(), toml::Value::Boolean(value));
        }

        fs::write(&self.path, document.to_string())?;
        Ok(())
    }
}

/// Volatile preferences, for hosts without storage and for tests.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, bool>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, PrefsError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).copied())
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), PrefsError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value);
        Ok(())
    }
}
