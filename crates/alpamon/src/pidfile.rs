//! Single-instance enforcement, grounded in the original agent's use of
//! the `pid` package's `PidFile`.
//!
//! An `flock(2)` on `/var/run/alpamon.pid` rather than a bare "does the file
//! exist" check: a stale PID file left behind by a killed process must not
//! block the next start.

use nix::fcntl::{flock, FlockArg};
use std::fs::OpenOptions;
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

const PID_PATH: &str = "/var/run/alpamon.pid";

pub struct PidFile {
    path: PathBuf,
    file: std::fs::File,
}

impl PidFile {
    /// Acquires the lock and writes this process's PID, failing if another
    /// instance already holds it.
    pub fn acquire() -> Result<Self, io::Error> {
        Self::acquire_at(Path::new(PID_PATH))
    }

    pub fn acquire_at(path: &Path) -> Result<Self, io::Error> {
        let file = OpenOptions::new().create(true).write(true).truncate(false).open(path)?;

        flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock)
            .map_err(|_| io::Error::new(io::ErrorKind::AddrInUse, format!("{} is locked by another instance", path.display())))?;

        use std::io::{Seek, SeekFrom, Write};
        let mut file = file;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        write!(file, "{}", std::process::id())?;
        file.flush()?;

        Ok(Self { path: path.to_path_buf(), file })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = flock(self.file.as_raw_fd(), FlockArg::Unlock);
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_on_same_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alpamon.pid");
        let first = PidFile::acquire_at(&path).unwrap();
        assert!(PidFile::acquire_at(&path).is_err());
        drop(first);
        assert!(PidFile::acquire_at(&path).is_ok());
    }
}
