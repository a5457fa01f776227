//! Detaches the current process into the background with `daemonize-me`.

use std::ffi::OsStr;
use std::fs::{File, OpenOptions};

use camino::Utf8Path;
use daemonize_me::{Daemon, Group, User};
use tracing::info;
use treadle_config::DaemonOptions;

use super::SERVICE_TARGET;
use crate::service::DaemonizeError;

/// Abstraction over daemonisation strategies.
pub trait Daemonizer {
    /// Detaches the process into the background.
    ///
    /// Returns in the detached child; the parent process exits.
    ///
    /// # Errors
    ///
    /// Returns an error when the log file cannot be opened or the fork fails.
    fn daemonize(
        &self,
        options: &DaemonOptions,
        log_path: &Utf8Path,
    ) -> Result<(), DaemonizeError>;
}

/// Daemoniser that delegates to `daemonize-me`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDaemonizer;

impl SystemDaemonizer {
    /// Builds a new system daemoniser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Daemonizer for SystemDaemonizer {
    fn daemonize(
        &self,
        options: &DaemonOptions,
        log_path: &Utf8Path,
    ) -> Result<(), DaemonizeError> {
        info!(
            target: SERVICE_TARGET,
            daemon = %options.process_name,
            work_dir = %options.working_dir,
            log = %log_path,
            "daemonising into background"
        );
        let stdout = open_log(log_path)?;
        let stderr = stdout.try_clone().map_err(|source| DaemonizeError::LogFile {
            path: log_path.to_path_buf(),
            source,
        })?;
        let mut daemon = Daemon::new()
            .name(OsStr::new(&options.process_name))
            .work_dir(options.working_dir.as_std_path())
            .umask(0o027)
            .stdout(stdout)
            .stderr(stderr);
        if let Some(run_as) = options.run_as {
            if let Some(uid) = run_as.uid {
                daemon = daemon.user(User::try_from(uid)?);
            }
            if let Some(gid) = run_as.gid {
                daemon = daemon.group(Group::try_from(gid)?);
            }
        }
        daemon.start()?;
        info!(
            target: SERVICE_TARGET,
            "daemon process detached; continuing in child"
        );
        Ok(())
    }
}

fn open_log(path: &Utf8Path) -> Result<File, DaemonizeError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| DaemonizeError::LogFile {
            path: path.to_path_buf(),
            source,
        })
}
