//! Runtime artefact locations derived from resolved daemon options.

use std::fs::{self, DirBuilder};

use camino::{Utf8Path, Utf8PathBuf};
use nix::unistd::{Gid, Uid, chown};
use treadle_config::{DaemonOptions, RunAs};

use crate::service::ServiceError;

/// Files owned by a running daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServicePaths {
    runtime_dir: Utf8PathBuf,
    pid_path: Utf8PathBuf,
    lock_path: Utf8PathBuf,
    health_path: Utf8PathBuf,
    log_path: Utf8PathBuf,
}

impl ServicePaths {
    /// Derives lock and health files alongside the PID file and creates the
    /// directories that hold them.
    pub(crate) fn prepare(options: &DaemonOptions) -> Result<Self, ServiceError> {
        let pid_path = options.pid_location.clone();
        let runtime_dir = pid_path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .map(Utf8Path::to_path_buf)
            .ok_or_else(|| ServiceError::MissingPidParent {
                path: pid_path.clone(),
            })?;
        create_private_dir(&runtime_dir)?;
        if let Some(log_dir) = options.log_location.parent()
            && !log_dir.as_str().is_empty()
        {
            create_private_dir(log_dir)?;
        }
        Ok(Self {
            lock_path: pid_path.with_extension("lock"),
            health_path: pid_path.with_extension("health"),
            log_path: options.log_location.clone(),
            runtime_dir,
            pid_path,
        })
    }

    /// Directory holding the PID, lock, and health files.
    pub(crate) fn runtime_dir(&self) -> &Utf8Path {
        &self.runtime_dir
    }

    /// PID file recording the owning process.
    pub(crate) fn pid_path(&self) -> &Utf8Path {
        &self.pid_path
    }

    /// Lock file guarding singleton startup.
    pub(crate) fn lock_path(&self) -> &Utf8Path {
        &self.lock_path
    }

    /// JSON health snapshot.
    pub(crate) fn health_path(&self) -> &Utf8Path {
        &self.health_path
    }

    /// Log file receiving daemon output once detached.
    pub(crate) fn log_path(&self) -> &Utf8Path {
        &self.log_path
    }

    /// Gives the runtime directory to the identity the daemon drops to, so
    /// the detached process can write its PID and health files and remove
    /// the lock created before the drop.
    pub(crate) fn hand_over(&self, run_as: RunAs) -> Result<(), ServiceError> {
        chown(
            self.runtime_dir.as_std_path(),
            run_as.uid.map(Uid::from_raw),
            run_as.gid.map(Gid::from_raw),
        )
        .map_err(|source| ServiceError::RuntimeOwnership {
            path: self.runtime_dir.clone(),
            source,
        })
    }
}

/// Creates `path` with mode 0700; missing ancestors get the default mode so a
/// daemon running under another identity can still reach the leaf.
fn create_private_dir(path: &Utf8Path) -> Result<(), ServiceError> {
    let failed = |source| ServiceError::RuntimeDirectory {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(failed)?;
    }
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path).map_err(failed)
}
