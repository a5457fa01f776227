//! Resolves run-as user and group names against the system account database.

#[cfg(unix)]
use nix::unistd::{Group, Uid, User};
#[cfg(unix)]
use tracing::warn;

#[cfg(unix)]
const IDENTITY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::identity");

/// Account database queries needed to resolve run-as identities.
pub trait IdentityLookup {
    /// Returns `(uid, primary gid)` for the named user.
    fn user_by_name(&self, name: &str) -> Option<(u32, u32)>;

    /// Returns the gid of the named group.
    fn group_by_name(&self, name: &str) -> Option<u32>;

    /// Returns the primary gid of the user owning `uid`.
    fn primary_group(&self, uid: u32) -> Option<u32>;
}

/// Lookup backed by `getpwnam`/`getgrnam` through `nix`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemIdentityLookup;

#[cfg(unix)]
impl IdentityLookup for SystemIdentityLookup {
    fn user_by_name(&self, name: &str) -> Option<(u32, u32)> {
        match User::from_name(name) {
            Ok(user) => user.map(|user| (user.uid.as_raw(), user.gid.as_raw())),
            Err(errno) => {
                warn!(target: IDENTITY_TARGET, user = name, %errno, "user lookup failed");
                None
            }
        }
    }

    fn group_by_name(&self, name: &str) -> Option<u32> {
        match Group::from_name(name) {
            Ok(group) => group.map(|group| group.gid.as_raw()),
            Err(errno) => {
                warn!(target: IDENTITY_TARGET, group = name, %errno, "group lookup failed");
                None
            }
        }
    }

    fn primary_group(&self, uid: u32) -> Option<u32> {
        User::from_uid(Uid::from_raw(uid))
            .ok()
            .flatten()
            .map(|user| user.gid.as_raw())
    }
}

#[cfg(not(unix))]
impl IdentityLookup for SystemIdentityLookup {
    fn user_by_name(&self, _name: &str) -> Option<(u32, u32)> {
        None
    }

    fn group_by_name(&self, _name: &str) -> Option<u32> {
        None
    }

    fn primary_group(&self, _uid: u32) -> Option<u32> {
        None
    }
}
