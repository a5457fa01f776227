use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use dirs::{config_dir, runtime_dir};
#[cfg(unix)]
use nix::unistd::geteuid;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

const CATALOGUE_FILE: &str = "daemons.toml";
const SYSTEM_CATALOGUE: &str = "/etc/treadle/daemons.toml";

/// Default log filter expression used by the binaries.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Computes the default location of the daemon catalogue.
///
/// Prefers `$XDG_CONFIG_HOME/treadle/daemons.toml` and falls back to the
/// system-wide `/etc/treadle/daemons.toml`.
#[must_use]
pub fn default_daemons_path() -> Utf8PathBuf {
    #[cfg(unix)]
    {
        if let Some(mut dir) = config_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok()) {
            dir.push("treadle");
            dir.push(CATALOGUE_FILE);
            return dir;
        }
    }
    Utf8PathBuf::from(SYSTEM_CATALOGUE)
}

/// Directory used for runtime artefacts when a daemon does not configure one.
///
/// Uses `$XDG_RUNTIME_DIR/treadle` when available; otherwise a per-user
/// directory beneath the system temporary directory.
#[must_use]
pub fn default_runtime_directory() -> Utf8PathBuf {
    #[cfg(unix)]
    {
        if let Some(mut dir) = runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        {
            dir.push("treadle");
            return dir;
        }
        let mut dir = fallback_base_directory();
        dir.push("treadle");
        dir.push(format!("uid-{}", geteuid().as_raw()));
        dir
    }

    #[cfg(not(unix))]
    {
        let mut dir = fallback_base_directory();
        dir.push("treadle");
        dir
    }
}

fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}
