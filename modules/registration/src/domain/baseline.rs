use mk_facts::FactMapping;
use parking_lot::RwLock;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Default location of the file-backed baseline
pub const DEFAULT_BASELINE_PATH: &str = "/tmp/mk_prev_facts.json";

#[derive(Debug, thiserror::Error)]
pub enum BaselineError {
    #[error("baseline I/O failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode baseline: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Storage for the last fact mapping the server accepted
pub trait BaselineStore: Send + Sync {
    /// `true` when `current` differs from the stored baseline, or when there
    /// is no baseline yet
    ///
    /// # Errors
    /// Returns `BaselineError` if the stored baseline cannot be read.
    fn has_changed(&self, current: &FactMapping) -> Result<bool, BaselineError>;

    /// Replace the baseline with `current`
    ///
    /// # Errors
    /// Returns `BaselineError` if the baseline cannot be written; the previous
    /// baseline is then still in place.
    fn save(&self, current: &FactMapping) -> Result<(), BaselineError>;

    /// # Errors
    /// Returns `BaselineError` if the stored baseline cannot be read.
    fn load(&self) -> Result<Option<FactMapping>, BaselineError>;
}

/// Baseline kept in memory only; lost when the process exits
#[derive(Debug, Default)]
pub struct InMemoryBaselineStore {
    baseline: RwLock<Option<FactMapping>>,
}

impl InMemoryBaselineStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_baseline(facts: FactMapping) -> Self {
        Self {
            baseline: RwLock::new(Some(facts)),
        }
    }
}

impl BaselineStore for InMemoryBaselineStore {
    fn has_changed(&self, current: &FactMapping) -> Result<bool, BaselineError> {
        Ok(self.baseline.read().as_ref() != Some(current))
    }

    fn save(&self, current: &FactMapping) -> Result<(), BaselineError> {
        *self.baseline.write() = Some(current.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<FactMapping>, BaselineError> {
        Ok(self.baseline.read().clone())
    }
}

#[derive(Debug)]
enum Cached {
    NotLoaded,
    Loaded(Option<FactMapping>),
}

/// Baseline persisted as a JSON document.
///
/// The file is read on first use and cached. Writes go to a temporary file
/// next to the target which is then renamed over it, so a crash mid-write
/// leaves the old baseline intact. A missing or unparsable file means there
/// is no baseline.
#[derive(Debug)]
pub struct FileBaselineStore {
    path: PathBuf,
    cached: RwLock<Cached>,
}

impl FileBaselineStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: RwLock::new(Cached::NotLoaded),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> BaselineError {
        BaselineError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_from_disk(&self) -> Result<Option<FactMapping>, BaselineError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        match serde_json::from_slice(&raw) {
            Ok(facts) => Ok(Some(facts)),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Ignoring unparsable baseline file"
                );
                Ok(None)
            }
        }
    }

    fn with_baseline<T>(&self, f: impl FnOnce(Option<&FactMapping>) -> T) -> Result<T, BaselineError> {
        if let Cached::Loaded(baseline) = &*self.cached.read() {
            return Ok(f(baseline.as_ref()));
        }

        let mut cached = self.cached.write();
        if matches!(*cached, Cached::NotLoaded) {
            *cached = Cached::Loaded(self.read_from_disk()?);
        }
        match &*cached {
            Cached::Loaded(baseline) => Ok(f(baseline.as_ref())),
            Cached::NotLoaded => Ok(f(None)),
        }
    }

    fn write_atomically(&self, facts: &FactMapping) -> Result<(), BaselineError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        serde_json::to_writer_pretty(&mut tmp, facts)?;
        tmp.write_all(b"\n").map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }
}

impl BaselineStore for FileBaselineStore {
    fn has_changed(&self, current: &FactMapping) -> Result<bool, BaselineError> {
        self.with_baseline(|baseline| baseline != Some(current))
    }

    fn save(&self, current: &FactMapping) -> Result<(), BaselineError> {
        self.write_atomically(current)?;
        *self.cached.write() = Cached::Loaded(Some(current.clone()));
        tracing::debug!(path = %self.path.display(), facts = current.len(), "Baseline saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<FactMapping>, BaselineError> {
        self.with_baseline(|baseline| baseline.cloned())
    }
}
