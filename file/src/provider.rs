use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use sessionkit_core::{FileProviderConfig, Provider, Session, SessionError, SessionResult};
use sessionkit_memory::MemoryProvider;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// File-backed implementation of Provider.
///
/// Each session is stored as `dir/prefix + id`. A [`MemoryProvider`] indexes
/// the live sessions so `commit` and `destroy` act on the copy the application
/// is mutating.
#[derive(Debug)]
pub struct FileProvider {
    index: MemoryProvider,
    dir: PathBuf,
    prefix: String,
    /// Serializes access to the session directory
    lock: RwLock<()>,
}

impl FileProvider {
    /// Create a provider writing files named `prefix + id` into `dir`.
    ///
    /// The directory is not created; see [`FileProvider::ensure_dir`].
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            index: MemoryProvider::new(),
            dir: dir.into(),
            prefix: prefix.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn from_config(config: &FileProviderConfig) -> Self {
        Self::new(config.dir.clone(), config.prefix.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Create the session directory (owner-only on unix) if it is missing
    pub fn ensure_dir(&self) -> SessionResult<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(&self.dir)?;
        }
        #[cfg(not(unix))]
        fs::create_dir_all(&self.dir)?;

        Ok(())
    }

    /// Path of the file backing session `id`.
    ///
    /// Ids that could escape the session directory are rejected.
    pub fn path_for(&self, id: &str) -> SessionResult<PathBuf> {
        let unsafe_id = id.is_empty()
            || id == "."
            || id == ".."
            || id.contains(['/', '\\', '\0']);
        if unsafe_id {
            return Err(SessionError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{}{}", self.prefix, id)))
    }

    fn save(&self, session: &Session) -> SessionResult<()> {
        let path = self.path_for(session.id())?;
        let _guard = self
            .lock
            .write()
            .map_err(|_| SessionError::lock_poisoned("directory write"))?;

        // Encode before touching the file so a failure leaves it intact.
        let bytes = session.encode()?;
        write_private(&self.dir, &path, &bytes)?;

        debug!("Saved session {} to {}", session.id(), path.display());
        Ok(())
    }

    /// Decode a session file without registering it as live.
    fn load(&self, id: &str) -> SessionResult<Session> {
        let path = self.path_for(id)?;
        let _guard = self
            .lock
            .read()
            .map_err(|_| SessionError::lock_poisoned("directory read"))?;
        read_session_file(id, &path)
    }

    fn remove_file(&self, path: &Path) -> SessionResult<()> {
        let _guard = self
            .lock
            .write()
            .map_err(|_| SessionError::lock_poisoned("directory write"))?;
        fs::remove_file(path)?;
        Ok(())
    }

    /// Remove the file at `path` if the session it holds has expired.
    ///
    /// The expiry check and the removal happen under one write lock so a
    /// concurrent save of the same id cannot be deleted in between.
    fn remove_if_expired(&self, id: &str, path: &Path) -> SessionResult<bool> {
        let _guard = self
            .lock
            .write()
            .map_err(|_| SessionError::lock_poisoned("directory write"))?;

        if !read_session_file(id, path)?.is_expired() {
            return Ok(false);
        }
        fs::remove_file(path)?;

        // A re-initialised id keeps its live entry; its save is waiting on
        // this lock.
        if self.index.read(id).is_ok_and(|live| live.is_expired()) {
            let _ = self.index.destroy(id);
        }
        Ok(true)
    }
}

impl Provider for FileProvider {
    fn init(&self, session: &Session) -> SessionResult<()> {
        self.path_for(session.id())?;
        self.index.init(session)?;
        self.save(session)
    }

    fn read(&self, id: &str) -> SessionResult<Session> {
        let session = self.load(id)?;
        self.index.init(&session)?;
        Ok(session)
    }

    fn destroy(&self, id: &str) -> SessionResult<()> {
        self.index.read(id)?;
        // A live entry whose file has vanished is an inconsistency worth
        // surfacing, so the io error propagates.
        self.remove_file(&self.path_for(id)?)?;
        self.index.destroy(id)?;

        debug!("Destroyed session file for {}", id);
        Ok(())
    }

    fn commit(&self, id: &str) -> SessionResult<()> {
        let session = self.index.read(id)?;
        self.save(&session)
    }

    /// Remove every expired session file in the directory.
    ///
    /// Files that fail to decode are skipped. Subdirectories are not entered.
    fn cleanup(&self) -> SessionResult<usize> {
        let mut removed = 0;

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }

            let file_name = entry.file_name();
            let Some(id) = file_name
                .to_str()
                .and_then(|name| name.strip_prefix(self.prefix.as_str()))
            else {
                continue;
            };

            match self.remove_if_expired(id, &entry.path()) {
                Ok(true) => {
                    removed += 1;
                    debug!("Cleaned up expired session: {}", id);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(error = %e, "Skipping session file {}", entry.path().display());
                }
            }
        }

        if removed > 0 {
            info!("Cleaned up {} expired sessions in {}", removed, self.dir.display());
        }
        Ok(removed)
    }
}

fn read_session_file(id: &str, path: &Path) -> SessionResult<Session> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(SessionError::NotFound(id.to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    Session::decode(id, &bytes)
}

/// Replace `path` with `bytes`, readable only by the owner.
///
/// The bytes go to a temporary file in `dir` that is synced and then renamed
/// over `path`, so readers see either the old contents or the new ones.
fn write_private(dir: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = NamedTempFile::new_in(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
