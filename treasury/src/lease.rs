//! Exclusive lease on a mint's harvest cycle.
//!
//! Two overlapping cycles on one mint can burn unrelated vault deposits, so
//! the CLI holds `<lock_dir>/<mint>.lock` for the whole run. The file is
//! created with `create_new` and removed when the lease is dropped. A lease
//! left behind by a crashed run has to be removed by hand.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

use cinder_supply::address::Address;

#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("harvest cycle for this mint is already running ({holder}); lease file {}", path.display())]
    Held { path: PathBuf, holder: String },

    #[error("failed to take lease {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Held while a harvest cycle runs.
#[derive(Debug)]
pub struct CycleLease {
    path: PathBuf,
}

impl CycleLease {
    /// Take the lease for `mint`, failing if another run holds it.
    pub fn acquire(lock_dir: &Path, mint: &Address) -> Result<Self, LeaseError> {
        let path = lock_dir.join(format!("{}.lock", mint));
        fs::create_dir_all(lock_dir).map_err(|source| LeaseError::Io {
            path: path.clone(),
            source,
        })?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default();
                return Err(LeaseError::Held { path, holder });
            }
            Err(source) => return Err(LeaseError::Io { path, source }),
        };

        let stamp = format!(
            "pid {} since {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );
        if let Err(source) = writeln!(file, "{}", stamp) {
            let _ = fs::remove_file(&path);
            return Err(LeaseError::Io { path, source });
        }

        debug!("Took harvest lease {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CycleLease {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            debug!("Failed to remove lease {}: {}", self.path.display(), e);
        }
    }
}
