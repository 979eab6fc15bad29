//! Record log loading and reset detection (spec §4.5 "Log-reset
//! detection"). The analyzer never holds the file open across a
//! computation (spec §5); each refresh re-reads the file from scratch.

use lattice_core::error::{Error, Result};
use lattice_core::types::BurstRecord;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Read every line of a JSONL record log, skipping lines that fail to
/// parse (a partially-written final line from a concurrent writer is
/// tolerated rather than failing the whole read).
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<BurstRecord>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|_| Error::LogMissing(path.display().to_string()))?;
    let records = contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<BurstRecord>(line).ok())
        .collect();
    Ok(records)
}

/// Identity of a log file's on-disk content, used to notice rotation
/// (inode change) or truncation (size decrease) between refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LogIdentity {
    #[cfg(unix)]
    inode: u64,
    len: u64,
}

impl LogIdentity {
    fn read(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Ok(Self {
                inode: meta.ino(),
                len: meta.len(),
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self { len: meta.len() })
        }
    }
}

/// Watches a single log file's inode/size across refreshes and reports a
/// reset exactly once per rotation/truncation event.
pub struct LogWatcher {
    path: PathBuf,
    last: Option<LogIdentity>,
}

impl LogWatcher {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            last: None,
        }
    }

    /// Check the file's current identity against the last observed one.
    /// Returns `Some(reason)` the first time a reset is observed; the
    /// new identity becomes the baseline for the next call regardless of
    /// outcome, so a reset is reported exactly once.
    pub fn check(&mut self) -> Option<(lattice_core::error::ResetReason, SystemTime)> {
        use lattice_core::error::ResetReason;

        let current = LogIdentity::read(&self.path).ok()?;
        let result = match self.last {
            None => None,
            Some(prev) => {
                #[cfg(unix)]
                let rotated = prev.inode != current.inode;
                #[cfg(not(unix))]
                let rotated = false;
                if rotated {
                    Some(ResetReason::Rotated)
                } else if current.len < prev.len {
                    Some(ResetReason::Truncated)
                } else {
                    None
                }
            }
        };
        self.last = Some(current);
        result.map(|reason| (reason, SystemTime::now()))
    }
}
