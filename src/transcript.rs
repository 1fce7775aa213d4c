//! Run transcript: mirrors every log event to stdout and a `log.txt` file.
//!
//! Opening a [`Transcript`] installs a thread-scoped tracing subscriber;
//! dropping it restores whatever subscriber was active before.

use crate::error::Result;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Transcript file name inside the run folder
pub const LOG_FILE_NAME: &str = "log.txt";

/// Whether log lines carry the module target. Shared with the console
/// subscriber so output looks the same before and after a transcript opens.
pub const SHOW_TARGET: bool = false;

/// Guard for a transcript scope
pub struct Transcript {
    path: PathBuf,
    _guard: DefaultGuard,
}

impl Transcript {
    /// Start mirroring log output into `{dir}/log.txt` (appending).
    pub fn open(dir: &Path, filter: EnvFilter) -> Result<Self> {
        let path = dir.join(LOG_FILE_NAME);
        let file: File = OpenOptions::new().create(true).append(true).open(&path)?;

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(SHOW_TARGET)
            .with_ansi(false)
            .with_writer(std::io::stdout.and(Arc::new(file)))
            .finish();

        let guard = tracing::subscriber::set_default(subscriber);
        Ok(Self { path, _guard: guard })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::info;

    #[test]
    fn test_transcript_scope() -> Result<()> {
        let dir = tempfile::tempdir()?;
        {
            let transcript = Transcript::open(dir.path(), EnvFilter::new("info"))?;
            assert_eq!(transcript.path(), dir.path().join(LOG_FILE_NAME));
            info!("inside transcript");
        }
        info!("outside transcript");

        let log = std::fs::read_to_string(dir.path().join(LOG_FILE_NAME))?;
        assert!(log.contains("inside transcript"));
        assert!(!log.contains("outside transcript"));
        assert!(!log.contains("rustpwc::transcript"));
        Ok(())
    }
}
