//! Resolved per-daemon options handed to the process daemon service.

use std::fmt;
use std::fs::{self, DirBuilder};
use std::str::FromStr;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::catalogue::DaemonDefinition;
use crate::defaults::default_runtime_directory;
use crate::identity::IdentityLookup;

const OPTIONS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::options");

/// Returns the catalogue key for a daemon command name.
///
/// Keys are lower-case with `:` separators replaced by `_`.
///
/// ```
/// assert_eq!(treadle_config::options_key("Acme:Mailer"), "acme_mailer");
/// ```
#[must_use]
pub fn options_key(daemon: &str) -> String {
    daemon.to_lowercase().replace(':', "_")
}

/// Fully resolved options for one daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonOptions {
    /// Process name used for the log and PID files.
    pub process_name: String,
    /// Human-readable description.
    pub description: String,
    /// Working directory of the daemonised process.
    pub working_dir: Utf8PathBuf,
    /// Maintainer name and address, when configured.
    pub author: Option<String>,
    /// File receiving daemon output once detached.
    pub log_location: Utf8PathBuf,
    /// PID file recording the running daemon.
    pub pid_location: Utf8PathBuf,
    /// Identity adopted after daemonising.
    pub run_as: Option<RunAs>,
    /// Resource limits applied to the daemon process.
    pub limits: ResourceLimits,
}

/// Identity the daemon switches to after detaching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunAs {
    /// Target user id, if any.
    pub uid: Option<u32>,
    /// Target group id, if any.
    pub gid: Option<u32>,
}

/// Resource limits applied once the daemon is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceLimits {
    /// CPU time budget; `None` leaves the inherited limit untouched.
    pub max_execution_time: Option<Duration>,
    /// Address space ceiling.
    pub memory: MemoryLimit,
}

/// Address space ceiling parsed from strings such as `512M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryLimit {
    /// Leave the inherited limit untouched.
    #[default]
    Unlimited,
    /// Limit in bytes.
    Bytes(u64),
}

impl MemoryLimit {
    /// Returns the limit in bytes, if bounded.
    #[must_use]
    pub const fn bytes(self) -> Option<u64> {
        match self {
            Self::Unlimited => None,
            Self::Bytes(bytes) => Some(bytes),
        }
    }
}

impl FromStr for MemoryLimit {
    type Err = MemoryLimitParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(MemoryLimitParseError::Empty);
        }
        if trimmed == "0" || trimmed == "-1" {
            return Ok(Self::Unlimited);
        }
        let (digits, multiplier) = split_unit(trimmed);
        let value: u64 = digits
            .parse()
            .map_err(|_| MemoryLimitParseError::Invalid(input.to_owned()))?;
        value
            .checked_mul(multiplier)
            .map(Self::Bytes)
            .ok_or_else(|| MemoryLimitParseError::Overflow(input.to_owned()))
    }
}

impl fmt::Display for MemoryLimit {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => formatter.write_str("unlimited"),
            Self::Bytes(bytes) => write!(formatter, "{bytes} bytes"),
        }
    }
}

fn split_unit(text: &str) -> (&str, u64) {
    const KIB: u64 = 1024;
    let Some(last) = text.chars().last() else {
        return (text, 1);
    };
    let multiplier = match last.to_ascii_uppercase() {
        'K' => KIB,
        'M' => KIB * KIB,
        'G' => KIB * KIB * KIB,
        _ => return (text, 1),
    };
    let digits = text.strip_suffix(last).unwrap_or(text);
    (digits, multiplier)
}

/// Errors raised while parsing a [`MemoryLimit`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MemoryLimitParseError {
    /// The value was blank.
    #[error("memory limit must not be empty")]
    Empty,
    /// The value was not an integer with an optional K/M/G suffix.
    #[error("invalid memory limit '{0}'; expected an integer with optional K, M, or G suffix")]
    Invalid(String),
    /// The value does not fit in 64 bits once scaled.
    #[error("memory limit '{0}' is too large")]
    Overflow(String),
}

/// Errors raised while resolving daemon options.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The catalogue has no entry for the daemon.
    #[error("could not find a daemon configuration for '{daemon}' (expected key '{key}')")]
    MissingConfiguration {
        /// Daemon command name as requested.
        daemon: String,
        /// Catalogue key derived from the name.
        key: String,
    },
    /// The configured memory limit could not be parsed.
    #[error("daemon '{app_name}' has an invalid memory limit: {source}")]
    MemoryLimit {
        /// Process name of the offending definition.
        app_name: String,
        /// Underlying parse error.
        #[source]
        source: MemoryLimitParseError,
    },
}

impl DaemonOptions {
    /// Derives options from a catalogue definition.
    ///
    /// The PID directory is created eagerly; failure to do so is logged and
    /// left for the daemon service to report when it writes the PID file.
    ///
    /// # Errors
    ///
    /// Returns an error when `sys_memory_limit` is not a valid size.
    pub fn resolve(
        definition: &DaemonDefinition,
        identities: &dyn IdentityLookup,
    ) -> Result<Self, ResolveError> {
        let app_name = definition.app_name.as_str();
        let log_dir = definition
            .log_dir
            .clone()
            .unwrap_or_else(default_runtime_directory);
        let pid_dir = definition
            .app_pid_dir
            .clone()
            .unwrap_or_else(|| default_runtime_directory().join("daemons"))
            .join(app_name);
        create_pid_directory(&pid_dir);

        let memory = definition
            .sys_memory_limit
            .parse::<MemoryLimit>()
            .map_err(|source| ResolveError::MemoryLimit {
                app_name: app_name.to_owned(),
                source,
            })?;
        let max_execution_time = match definition.sys_max_execution_time {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        };

        Ok(Self {
            process_name: app_name.to_owned(),
            description: definition.app_description.clone(),
            working_dir: definition.app_dir.clone(),
            author: author(definition),
            log_location: log_dir.join(format!("{app_name}Daemon.log")),
            pid_location: pid_dir.join(format!("{app_name}.pid")),
            run_as: resolve_run_as(definition, identities),
            limits: ResourceLimits {
                max_execution_time,
                memory,
            },
        })
    }
}

fn author(definition: &DaemonDefinition) -> Option<String> {
    let name = definition.author_name.trim();
    let email = definition.author_email.trim();
    match (name.is_empty(), email.is_empty()) {
        (true, true) => None,
        (false, true) => Some(name.to_owned()),
        (true, false) => Some(format!("<{email}>")),
        (false, false) => Some(format!("{name} <{email}>")),
    }
}

fn resolve_run_as(definition: &DaemonDefinition, identities: &dyn IdentityLookup) -> Option<RunAs> {
    let named_user = definition.app_user.as_deref();
    let named_group = definition.app_group.as_deref();

    let user = named_user.and_then(|name| {
        let resolved = identities.user_by_name(name);
        if resolved.is_none() {
            warn!(target: OPTIONS_TARGET, user = name, "run-as user not found; using configured uid");
        }
        resolved
    });
    let uid = user.map(|(uid, _)| uid).or(definition.app_run_as_uid);

    let mut gid = named_group
        .and_then(|name| {
            let resolved = identities.group_by_name(name);
            if resolved.is_none() {
                warn!(target: OPTIONS_TARGET, group = name, "run-as group not found; using configured gid");
            }
            resolved
        })
        .or(definition.app_run_as_gid);

    if gid.is_none() && (named_user.is_some() || named_group.is_some()) {
        gid = user
            .map(|(_, primary)| primary)
            .or_else(|| uid.and_then(|uid| identities.primary_group(uid)));
    }

    match (uid, gid) {
        (None, None) => None,
        (uid, gid) => Some(RunAs { uid, gid }),
    }
}

/// Ancestors are created with the default mode so a daemon that later drops
/// to another identity can still traverse them; only the leaf is private.
fn create_pid_directory(path: &Utf8Path) {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    let outcome = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| builder.create(path.as_std_path()));
    if let Err(error) = outcome {
        warn!(
            target: OPTIONS_TARGET,
            directory = %path,
            %error,
            "failed to create pid directory"
        );
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    #[derive(Default)]
    struct StubIdentities {
        users: Vec<(&'static str, u32, u32)>,
        groups: Vec<(&'static str, u32)>,
    }

    impl IdentityLookup for StubIdentities {
        fn user_by_name(&self, name: &str) -> Option<(u32, u32)> {
            self.users
                .iter()
                .find(|(user, _, _)| *user == name)
                .map(|(_, uid, gid)| (*uid, *gid))
        }

        fn group_by_name(&self, name: &str) -> Option<u32> {
            self.groups
                .iter()
                .find(|(group, _)| *group == name)
                .map(|(_, gid)| *gid)
        }

        fn primary_group(&self, uid: u32) -> Option<u32> {
            self.users
                .iter()
                .find(|(_, candidate, _)| *candidate == uid)
                .map(|(_, _, gid)| *gid)
        }
    }

    fn definition_in(dir: &TempDir) -> DaemonDefinition {
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .expect("temp dir should be UTF-8");
        DaemonDefinition {
            app_name: "mailer".to_owned(),
            log_dir: Some(root.join("logs/")),
            app_pid_dir: Some(root.join("pids")),
            ..DaemonDefinition::default()
        }
    }

    #[rstest]
    fn warnings_are_scoped_to_this_crate() {
        assert_eq!(OPTIONS_TARGET, "treadle-config::options");
    }

    #[rstest]
    #[case("Acme:Mailer", "acme_mailer")]
    #[case("heartbeat", "heartbeat")]
    #[case("a:b:c", "a_b_c")]
    fn normalises_option_keys(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(options_key(name), expected);
    }

    #[rstest]
    #[case("1024M", MemoryLimit::Bytes(1024 * 1024 * 1024))]
    #[case("64k", MemoryLimit::Bytes(64 * 1024))]
    #[case("2G", MemoryLimit::Bytes(2 * 1024 * 1024 * 1024))]
    #[case("4096", MemoryLimit::Bytes(4096))]
    #[case("-1", MemoryLimit::Unlimited)]
    #[case("0", MemoryLimit::Unlimited)]
    fn parses_memory_limits(#[case] input: &str, #[case] expected: MemoryLimit) {
        assert_eq!(input.parse::<MemoryLimit>(), Ok(expected));
    }

    #[rstest]
    #[case("")]
    #[case("lots")]
    #[case("12T")]
    fn rejects_malformed_memory_limits(#[case] input: &str) {
        assert!(input.parse::<MemoryLimit>().is_err());
    }

    #[rstest]
    fn derives_log_and_pid_locations() {
        let dir = TempDir::new().expect("temp dir");
        let definition = definition_in(&dir);

        let options = DaemonOptions::resolve(&definition, &StubIdentities::default())
            .expect("options should resolve");

        assert!(options.log_location.ends_with("logs/mailerDaemon.log"));
        assert!(options.pid_location.ends_with("pids/mailer/mailer.pid"));
        assert!(
            options
                .pid_location
                .parent()
                .is_some_and(|parent| parent.as_std_path().is_dir()),
            "pid directory should be created during resolution"
        );
        assert_eq!(options.run_as, None);
        assert_eq!(options.limits.max_execution_time, None);
    }

    #[cfg(unix)]
    #[rstest]
    fn only_the_pid_leaf_directory_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().expect("temp dir");
        let definition = definition_in(&dir);

        let options = DaemonOptions::resolve(&definition, &StubIdentities::default())
            .expect("options should resolve");

        let leaf = options.pid_location.parent().expect("pid directory");
        let ancestor = leaf.parent().expect("pid root directory");
        let mode = |path: &Utf8Path| {
            fs::metadata(path)
                .expect("directory metadata")
                .permissions()
                .mode()
                & 0o777
        };
        assert_eq!(mode(leaf), 0o700);
        assert_ne!(mode(ancestor), 0o700, "ancestors keep the default mode");
    }

    #[rstest]
    fn resolves_named_user_and_falls_back_to_primary_group() {
        let dir = TempDir::new().expect("temp dir");
        let definition = DaemonDefinition {
            app_user: Some("mail".to_owned()),
            app_group: Some("missing".to_owned()),
            ..definition_in(&dir)
        };
        let identities = StubIdentities {
            users: vec![("mail", 8, 12)],
            groups: Vec::new(),
        };

        let options = DaemonOptions::resolve(&definition, &identities).expect("resolve");

        assert_eq!(
            options.run_as,
            Some(RunAs {
                uid: Some(8),
                gid: Some(12),
            })
        );
    }

    #[rstest]
    fn unresolvable_user_keeps_configured_ids() {
        let dir = TempDir::new().expect("temp dir");
        let definition = DaemonDefinition {
            app_user: Some("ghost".to_owned()),
            app_run_as_uid: Some(1000),
            app_run_as_gid: Some(1001),
            ..definition_in(&dir)
        };

        let options =
            DaemonOptions::resolve(&definition, &StubIdentities::default()).expect("resolve");

        assert_eq!(
            options.run_as,
            Some(RunAs {
                uid: Some(1000),
                gid: Some(1001),
            })
        );
    }

    #[rstest]
    fn named_group_overrides_configured_gid() {
        let dir = TempDir::new().expect("temp dir");
        let definition = DaemonDefinition {
            app_group: Some("daemon".to_owned()),
            app_run_as_gid: Some(1001),
            ..definition_in(&dir)
        };
        let identities = StubIdentities {
            users: Vec::new(),
            groups: vec![("daemon", 2)],
        };

        let options = DaemonOptions::resolve(&definition, &identities).expect("resolve");

        assert_eq!(
            options.run_as,
            Some(RunAs {
                uid: None,
                gid: Some(2),
            })
        );
    }

    #[rstest]
    fn rejects_invalid_memory_limit() {
        let dir = TempDir::new().expect("temp dir");
        let definition = DaemonDefinition {
            sys_memory_limit: "plenty".to_owned(),
            ..definition_in(&dir)
        };

        let error = DaemonOptions::resolve(&definition, &StubIdentities::default())
            .expect_err("invalid limit should fail");

        assert!(matches!(error, ResolveError::MemoryLimit { .. }));
    }

    #[rstest]
    fn formats_author_from_name_and_email() {
        let definition = DaemonDefinition {
            author_name: "Ada".to_owned(),
            author_email: "ada@example.com".to_owned(),
            ..DaemonDefinition::default()
        };
        assert_eq!(author(&definition).as_deref(), Some("Ada <ada@example.com>"));
    }
}
