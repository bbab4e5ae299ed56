use std::fmt;
use std::path::PathBuf;

/// The prediction log exists but could not be read, parsed, or rewritten.
#[derive(Debug, Clone)]
pub struct StorageUnavailable {
    pub path: PathBuf,
    pub stage: &'static str,
    pub detail: String,
}

impl fmt::Display for StorageUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "history storage unavailable (path={}, stage={}): {}",
            self.path.display(),
            self.stage,
            self.detail
        )
    }
}

impl std::error::Error for StorageUnavailable {}
