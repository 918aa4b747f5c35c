//! Flat-file credential store
//!
//! The store file holds one `<service>:<password>` record per line. It is
//! read fully when the store is loaded and rewritten fully on persist.
//! Nothing guards the file against a second process doing the same thing;
//! the last writer wins.

use rand::{CryptoRng, Rng};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::generator::generate_password;

/// Store-specific errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to create store file {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read store file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write store file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid service name: {0}")]
    InvalidService(String),
}

/// A load that hit an I/O error part way through.
///
/// Carries the records read before the failure so the caller can carry on
/// with them.
#[derive(Error, Debug)]
#[error("{source} (continuing with {} recovered entries)", .store.len())]
pub struct PartialLoad {
    store: CredentialStore,
    #[source]
    source: StoreError,
}

impl PartialLoad {
    fn new(store: CredentialStore, source: StoreError) -> Self {
        Self { store, source }
    }

    /// The underlying error
    pub fn error(&self) -> &StoreError {
        &self.source
    }

    /// Take the entries recovered before the failure
    pub fn into_store(self) -> CredentialStore {
        self.store
    }
}

/// Outcome of a lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieved {
    /// The service already had a password
    Existing(String),
    /// A new password was generated and inserted
    Generated(String),
}

impl Retrieved {
    pub fn password(&self) -> &str {
        match self {
            Self::Existing(password) | Self::Generated(password) => password,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Generated(_))
    }
}

/// In-memory view of the store file
#[derive(Default)]
pub struct CredentialStore {
    entries: BTreeMap<String, String>,
    dirty: bool,
}

// Passwords stay out of debug output.
impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("services", &self.entries.keys().collect::<Vec<_>>())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl FromIterator<(String, String)> for CredentialStore {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            dirty: false,
        }
    }
}

impl CredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store from `path`, creating an empty file if none exists
    pub fn load(path: &Path) -> Result<Self, PartialLoad> {
        let mut store = Self::new();

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return match create_empty(path) {
                    Ok(()) => {
                        info!(path = %path.display(), "created empty store file");
                        Ok(store)
                    }
                    Err(source) => Err(PartialLoad::new(
                        store,
                        StoreError::Create {
                            path: path.to_path_buf(),
                            source,
                        },
                    )),
                };
            }
            Err(source) => {
                return Err(PartialLoad::new(
                    store,
                    StoreError::Read {
                        path: path.to_path_buf(),
                        source,
                    },
                ))
            }
        };

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(source) => {
                    return Err(PartialLoad::new(
                        store,
                        StoreError::Read {
                            path: path.to_path_buf(),
                            source,
                        },
                    ))
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            match parse_line(&line) {
                Some((service, password)) => {
                    store
                        .entries
                        .insert(service.to_string(), password.to_string());
                }
                None => debug!(line = index + 1, "skipping malformed store line"),
            }
        }

        debug!(path = %path.display(), entries = store.len(), "loaded store");
        Ok(store)
    }

    /// Return the password for `service`, generating and inserting one if
    /// the service is not stored yet. Never touches the file.
    pub fn lookup_or_generate<R>(
        &mut self,
        service: &str,
        rng: &mut R,
    ) -> Result<Retrieved, StoreError>
    where
        R: Rng + CryptoRng,
    {
        validate_service(service)?;

        if let Some(password) = self.entries.get(service) {
            return Ok(Retrieved::Existing(password.clone()));
        }

        let password = generate_password(rng);
        self.entries.insert(service.to_string(), password.clone());
        self.dirty = true;
        info!(service, "generated new password");

        Ok(Retrieved::Generated(password))
    }

    /// Rewrite the whole store file at `path`
    pub fn persist(&mut self, path: &Path) -> Result<(), StoreError> {
        self.write_to(path).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        if let Err(e) = restrict_permissions(path) {
            warn!(path = %path.display(), error = %e, "could not restrict store file permissions");
        }

        self.dirty = false;
        debug!(path = %path.display(), entries = self.len(), "persisted store");
        Ok(())
    }

    fn write_to(&self, path: &Path) -> io::Result<()> {
        ensure_parent(path)?;

        let mut writer = BufWriter::new(open_truncated(path)?);
        for (service, password) in &self.entries {
            writeln!(writer, "{}:{}", service, password)?;
        }
        writer.flush()
    }

    /// Get the stored password for `service`
    pub fn get(&self, service: &str) -> Option<&str> {
        self.entries.get(service).map(String::as_str)
    }

    pub fn contains(&self, service: &str) -> bool {
        self.entries.contains_key(service)
    }

    /// Iterate records in service-name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(service, password)| (service.as_str(), password.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a password was generated since the last load or persist
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Split a store line on its first colon and trim both halves
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (service, password) = line.split_once(':')?;
    Some((service.trim(), password.trim()))
}

/// Check that `service` can be written to and read back from the store file
pub fn validate_service(service: &str) -> Result<(), StoreError> {
    if service.is_empty() {
        return Err(StoreError::InvalidService(
            "Service name cannot be empty".to_string(),
        ));
    }

    if service.trim() != service {
        return Err(StoreError::InvalidService(format!(
            "Surrounding whitespace in '{}'",
            service
        )));
    }

    for c in [':', '\n', '\r'] {
        if service.contains(c) {
            return Err(StoreError::InvalidService(format!(
                "Invalid character {:?} in '{}'",
                c,
                service.escape_debug()
            )));
        }
    }

    Ok(())
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn create_empty(path: &Path) -> io::Result<()> {
    ensure_parent(path)?;
    open_truncated(path)?;
    Ok(())
}

fn open_truncated(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options.open(path)
}

fn restrict_permissions(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}
