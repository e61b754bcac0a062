//! Safe Writer
//!
//! Every store overwrite is preceded by a verified, timestamped backup of the
//! whole file, and the overwrite itself is a temp file in the same directory
//! persisted over the target. If anything goes wrong before the rename, the
//! store is untouched.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::checksum::Checksum;
use crate::error::{Result, TokenError};

/// Mode of a store file created from scratch
#[cfg(unix)]
const NEW_FILE_MODE: u32 = 0o644;

/// Timestamp component of a backup file name: ISO-8601 UTC with `:` and `.`
/// replaced by `-`.
pub fn backup_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// `<dir>/<file name>.bak.<timestamp>.json`, where `dir` defaults to the
/// store's own directory
pub fn backup_path(store: &Path, backup_dir: Option<&Path>, ts: DateTime<Utc>) -> PathBuf {
    let file_name = store
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tokens.json".to_string());
    let name = format!("{}.bak.{}.json", file_name, backup_timestamp(ts));
    match backup_dir {
        Some(dir) => dir.join(name),
        None => parent_dir(store).join(name),
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// What a write did
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub path: PathBuf,
    /// None when there was no prior file to back up
    pub backup: Option<PathBuf>,
    /// Checksum of the replaced contents
    pub previous: Option<Checksum>,
    /// Checksum of the new contents
    pub checksum: Checksum,
}

/// Backup-then-overwrite writer for the token store
#[derive(Debug, Clone, Default)]
pub struct SafeWriter {
    backup_dir: Option<PathBuf>,
}

impl SafeWriter {
    pub fn new(backup_dir: Option<PathBuf>) -> Self {
        Self { backup_dir }
    }

    /// Back up `path` (if it exists), then atomically replace it with `contents`
    pub fn write(&self, path: &Path, contents: &str, now: DateTime<Utc>) -> Result<WriteOutcome> {
        let (backup, previous) = if path.exists() {
            let (backup, checksum) = self.backup(path, now)?;
            (Some(backup), Some(checksum))
        } else {
            (None, None)
        };

        write_atomic(path, contents)?;
        let checksum = Checksum::of_text(contents);
        info!(path = %path.display(), checksum = checksum.short(), "store written");

        Ok(WriteOutcome {
            path: path.to_path_buf(),
            backup,
            previous,
            checksum,
        })
    }

    fn backup(&self, path: &Path, now: DateTime<Utc>) -> Result<(PathBuf, Checksum)> {
        let original = fs::read(path).map_err(|source| TokenError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let checksum = Checksum::from_bytes(&original);
        let target = backup_path(path, self.backup_dir.as_deref(), now);

        let backup_err = |source| TokenError::Backup {
            path: target.clone(),
            source,
        };
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).map_err(backup_err)?;
        }
        fs::write(&target, &original).map_err(backup_err)?;

        let copied = fs::read(&target).map_err(backup_err)?;
        if !checksum.verify(&copied) {
            return Err(TokenError::BackupMismatch { path: target });
        }
        debug!(backup = %target.display(), checksum = checksum.short(), "backup verified");
        Ok((target, checksum))
    }
}

/// Replace `path` with `contents` via a temp file in the same directory
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let write_err = |source| TokenError::Write {
        path: path.to_path_buf(),
        source,
    };
    let parent = parent_dir(path);
    fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(write_err)?;
    // temp files are created owner-only; keep the store's own mode
    match fs::metadata(path) {
        Ok(existing) => fs::set_permissions(tmp.path(), existing.permissions()).map_err(write_err)?,
        Err(_) => set_new_file_mode(tmp.path()).map_err(write_err)?,
    }
    tmp.write_all(contents.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(unix)]
fn set_new_file_mode(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(NEW_FILE_MODE))
}

#[cfg(not(unix))]
fn set_new_file_mode(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_backup_timestamp_is_pure() {
        assert_eq!(backup_timestamp(fixed_time()), "2024-03-09T14-05-07-000Z");
    }

    #[test]
    fn test_backup_path_defaults_to_store_dir() {
        let path = backup_path(Path::new("tokens/tokens.json"), None, fixed_time());
        assert_eq!(
            path,
            PathBuf::from("tokens/tokens.json.bak.2024-03-09T14-05-07-000Z.json")
        );
        let path = backup_path(Path::new("tokens.json"), Some(Path::new("backups")), fixed_time());
        assert_eq!(
            path,
            PathBuf::from("backups/tokens.json.bak.2024-03-09T14-05-07-000Z.json")
        );
    }

    #[test]
    fn test_write_backs_up_then_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("tokens.json");
        fs::write(&store, "{}\n").unwrap();

        let outcome = SafeWriter::default()
            .write(&store, "{\"a\": {\"value\": 1}}\n", fixed_time())
            .unwrap();

        let backup = outcome.backup.unwrap();
        assert_eq!(fs::read_to_string(&backup).unwrap(), "{}\n");
        assert_eq!(fs::read_to_string(&store).unwrap(), "{\"a\": {\"value\": 1}}\n");
        assert_eq!(outcome.previous, Some(Checksum::of_text("{}\n")));
    }

    #[test]
    fn test_missing_store_is_created_without_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("nested").join("tokens.json");
        let outcome = SafeWriter::default().write(&store, "{}\n", fixed_time()).unwrap();
        assert!(outcome.backup.is_none());
        assert_eq!(fs::read_to_string(&store).unwrap(), "{}\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_keeps_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("tokens.json");
        fs::write(&store, "{}\n").unwrap();
        fs::set_permissions(&store, fs::Permissions::from_mode(0o640)).unwrap();

        SafeWriter::default().write(&store, "{\"a\": {\"value\": 1}}\n", fixed_time()).unwrap();
        let mode = fs::metadata(&store).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);

        let fresh = dir.path().join("fresh.json");
        write_atomic(&fresh, "{}\n").unwrap();
        let mode = fs::metadata(&fresh).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_failed_backup_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("tokens.json");
        fs::write(&store, "{}\n").unwrap();
        // a regular file where the backup directory should be
        let blocker = dir.path().join("backups");
        fs::write(&blocker, "").unwrap();

        let err = SafeWriter::new(Some(blocker))
            .write(&store, "changed", fixed_time())
            .unwrap_err();
        assert!(matches!(err, TokenError::Backup { .. }));
        assert_eq!(fs::read_to_string(&store).unwrap(), "{}\n");
    }
}
