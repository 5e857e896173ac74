use std::{
    fs::File,
    path::Path,
    time::{Duration, Instant},
};

use fs4::fs_std::FileExt;
use log::debug;
use thiserror::Error;

const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Exclusive advisory lock on a file, released on drop.
pub struct FileLock {
    _file: File,
}

#[derive(Error, Debug)]
#[error("{path}: {source}")]
pub struct Error {
    path: String,
    #[source]
    source: std::io::Error,
}

impl FileLock {
    /// Takes the lock, retrying while another process holds it for at most `timeout`.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, Error> {
        let with_path = |source| Error {
            path: path.display().to_string(),
            source,
        };
        let file = File::create(path).map_err(with_path)?;
        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(_) => return Ok(Self { _file: file }),
                Err(error)
                    if error.raw_os_error() == fs4::lock_contended_error().raw_os_error()
                        && start.elapsed() < timeout =>
                {
                    debug!("{} is locked by another process, retrying", path.display());
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(error) => return Err(with_path(error)),
            }
        }
    }
}
