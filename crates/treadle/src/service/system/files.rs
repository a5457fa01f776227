use std::io::{self, Write};

use camino::Utf8Path;
use tempfile::NamedTempFile;

/// Writes `contents` to a sibling temporary file and renames it over `path`.
///
/// The file is private to the owner on Unix.
pub(super) fn replace_file(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    let Some(directory) = path.parent() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{path}' has no parent directory"),
        ));
    };
    let mut staged = NamedTempFile::new_in(directory)?;
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        staged.as_file().set_permissions(Permissions::from_mode(0o600))?;
    }
    staged.write_all(contents)?;
    staged.as_file().sync_all()?;
    staged.persist(path)?;
    Ok(())
}
