//! Editing managed blocks in the shares index.
//!
//! Every operation reads the whole file, computes the new content and
//! writes it back in one go. There is no locking; concurrent writers race.

use super::{BEGIN_MARKER, END_MARKER};
use crate::error::{Error, Result};
use regex::{NoExpand, Regex};
use std::fmt::Write;
use std::path::Path;

/// Render the canonical managed block for a share.
///
/// The block starts with a newline so it can be appended to any content.
pub fn render_block(name: &str, share_file: &Path, disabled: bool) -> String {
    let mut block = String::new();
    let _ = writeln!(block);
    let _ = writeln!(block, "{BEGIN_MARKER}{name}");
    let _ = writeln!(block, "[{name}]");
    let _ = writeln!(block, "   include = {}", share_file.display());
    if disabled {
        block.push_str("   available = no\n");
        block.push_str("   browseable = no\n");
    }
    let _ = writeln!(block, "{END_MARKER}{name}");
    block
}

/// Make sure the index references a share, appending an enabled block if not.
///
/// The share counts as referenced when the index mentions its snippet path
/// anywhere or contains a `[name]` section header, managed or not.
/// Returns whether the file was written.
pub fn ensure_referenced(index: &Path, name: &str, share_file: &Path) -> Result<bool> {
    create_parent(index)?;
    let existing = read_or_empty(index)?;

    let share_file_str = share_file.to_string_lossy();
    if existing.contains(share_file_str.as_ref()) || existing.contains(&format!("[{name}]")) {
        log::debug!("{name} already referenced in {}", index.display());
        return Ok(false);
    }

    let content = existing + &render_block(name, share_file, false);
    write(index, &content)?;
    log::info!("added {name} to {}", index.display());
    Ok(true)
}

/// Enable or disable a managed share.
///
/// An existing marker block is replaced wholesale, dropping any manual edits
/// inside it. Without a marker block a fresh one is appended and any
/// unmarked section of the same name is kept as is.
pub fn set_disabled(index: &Path, name: &str, share_file: &Path, disabled: bool) -> Result<()> {
    create_parent(index)?;
    let existing = read_or_empty(index)?;

    let block = render_block(name, share_file, disabled);
    let re = block_regex(name)?;

    let content = if re.is_match(&existing) {
        re.replace_all(&existing, NoExpand(&block)).into_owned()
    } else {
        log::debug!("no managed block for {name}, appending one");
        existing + &block
    };

    write(index, &content)?;
    log::info!(
        "{} share {name}",
        if disabled { "disabled" } else { "enabled" }
    );
    Ok(())
}

/// Remove a share's managed block from the index.
///
/// Fails with [`Error::NotManaged`] when no marker block exists; the file
/// is then left untouched.
pub fn remove(index: &Path, name: &str) -> Result<()> {
    let existing = std::fs::read_to_string(index).map_err(|e| Error::file(index, e))?;

    let re = block_regex(name)?;
    if !re.is_match(&existing) {
        return Err(Error::NotManaged {
            name: name.to_string(),
        });
    }

    let content = re.replace_all(&existing, "\n").into_owned();
    write(index, &content)?;
    log::info!("removed {name} from {}", index.display());
    Ok(())
}

/// Match a full marker block for `name`, including its leading newline.
fn block_regex(name: &str) -> Result<Regex> {
    let name = regex::escape(name);
    let pattern = format!(
        r"(?s)\n{}{name}\n.*?{}{name}\n",
        regex::escape(BEGIN_MARKER),
        regex::escape(END_MARKER),
    );
    Regex::new(&pattern).map_err(|e| Error::InvalidInput(e.to_string()))
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| Error::file(parent, e))
        }
        _ => Ok(()),
    }
}

fn read_or_empty(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(Error::file(path, e)),
    }
}

fn write(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| Error::file(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::parse_file;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("ui").join("shares.conf");
        let share_file = dir.path().join("ui").join("docs.conf");
        (dir, index, share_file)
    }

    #[test]
    fn test_render_block_enabled() {
        let block = render_block("docs", Path::new("/etc/samba/shares.d/ui/docs.conf"), false);
        assert_eq!(
            block,
            "\n; samba-admin-ui:begin docs\n[docs]\n   include = /etc/samba/shares.d/ui/docs.conf\n; samba-admin-ui:end docs\n"
        );
    }

    #[test]
    fn test_render_block_disabled() {
        let block = render_block("docs", Path::new("/x/docs.conf"), true);
        assert!(
            block.contains("   available = no\n   browseable = no\n; samba-admin-ui:end docs\n")
        );
    }

    #[test]
    fn test_ensure_referenced_appends_once() {
        let (_dir, index, share_file) = setup();

        assert!(ensure_referenced(&index, "docs", &share_file).unwrap());
        let first = std::fs::read_to_string(&index).unwrap();
        assert!(!ensure_referenced(&index, "docs", &share_file).unwrap());
        let second = std::fs::read_to_string(&index).unwrap();

        assert_eq!(first, second);
        assert!(!parse_file(&index).unwrap()["docs"].disabled);
    }

    #[test]
    fn test_ensure_referenced_respects_manual_section() {
        let (_dir, index, share_file) = setup();
        std::fs::create_dir_all(index.parent().unwrap()).unwrap();
        std::fs::write(&index, "[docs]\n   path = /srv/docs\n").unwrap();

        assert!(!ensure_referenced(&index, "docs", &share_file).unwrap());
        assert_eq!(
            std::fs::read_to_string(&index).unwrap(),
            "[docs]\n   path = /srv/docs\n"
        );
    }

    #[test]
    fn test_set_disabled_is_idempotent() {
        let (_dir, index, share_file) = setup();
        ensure_referenced(&index, "docs", &share_file).unwrap();

        set_disabled(&index, "docs", &share_file, true).unwrap();
        let first = std::fs::read_to_string(&index).unwrap();
        set_disabled(&index, "docs", &share_file, true).unwrap();
        let second = std::fs::read_to_string(&index).unwrap();

        assert_eq!(first, second);
        assert!(parse_file(&index).unwrap()["docs"].disabled);
    }

    #[test]
    fn test_set_disabled_toggles_back() {
        let (_dir, index, share_file) = setup();
        ensure_referenced(&index, "docs", &share_file).unwrap();
        let original = std::fs::read_to_string(&index).unwrap();

        set_disabled(&index, "docs", &share_file, true).unwrap();
        set_disabled(&index, "docs", &share_file, false).unwrap();

        assert_eq!(std::fs::read_to_string(&index).unwrap(), original);
    }

    #[test]
    fn test_set_disabled_appends_without_markers() {
        let (_dir, index, share_file) = setup();
        std::fs::create_dir_all(index.parent().unwrap()).unwrap();
        std::fs::write(&index, "[docs]\n   path = /srv/docs\n").unwrap();

        set_disabled(&index, "docs", &share_file, true).unwrap();

        let content = std::fs::read_to_string(&index).unwrap();
        assert!(content.starts_with("[docs]\n   path = /srv/docs\n"));
        assert!(content.ends_with("; samba-admin-ui:end docs\n"));
        assert!(parse_file(&index).unwrap()["docs"].disabled);
    }

    #[test]
    fn test_set_disabled_leaves_other_blocks_alone() {
        let (_dir, index, share_file) = setup();
        let photos = share_file.with_file_name("photos.conf");
        let music = share_file.with_file_name("music.conf");
        ensure_referenced(&index, "photos", &photos).unwrap();
        ensure_referenced(&index, "docs", &share_file).unwrap();
        ensure_referenced(&index, "music", &music).unwrap();

        set_disabled(&index, "docs", &share_file, true).unwrap();

        let shares = parse_file(&index).unwrap();
        assert!(!shares["photos"].disabled);
        assert!(shares["docs"].disabled);
        assert!(!shares["music"].disabled);
    }

    #[test]
    fn test_set_disabled_escapes_share_name() {
        let (_dir, index, share_file) = setup();
        let dotted = share_file.with_file_name("a.b.conf");
        let other = share_file.with_file_name("axb.conf");
        ensure_referenced(&index, "axb", &other).unwrap();
        ensure_referenced(&index, "a.b", &dotted).unwrap();

        set_disabled(&index, "a.b", &dotted, true).unwrap();

        let shares = parse_file(&index).unwrap();
        assert!(shares["a.b"].disabled);
        assert!(!shares["axb"].disabled);
    }

    #[test]
    fn test_remove_unmanaged_leaves_file_untouched() {
        let (_dir, index, _) = setup();
        std::fs::create_dir_all(index.parent().unwrap()).unwrap();
        let original = "[docs]\n   path = /srv/docs\n\n; samba-admin-ui:begin photos\n[photos]\n; samba-admin-ui:end photos\n";
        std::fs::write(&index, original).unwrap();

        let err = remove(&index, "docs").unwrap_err();

        assert!(err.is_not_managed());
        assert_eq!(std::fs::read(&index).unwrap(), original.as_bytes());
    }

    #[test]
    fn test_remove_managed_block() {
        let (_dir, index, share_file) = setup();
        std::fs::create_dir_all(index.parent().unwrap()).unwrap();
        std::fs::write(&index, "[manual]\n   path = /srv/manual\n").unwrap();
        ensure_referenced(&index, "docs", &share_file).unwrap();

        remove(&index, "docs").unwrap();

        let content = std::fs::read_to_string(&index).unwrap();
        assert_eq!(content, "[manual]\n   path = /srv/manual\n\n");
        assert!(parse_file(&index).unwrap().is_empty());
    }

    #[test]
    fn test_remove_missing_index_is_io_error() {
        let (_dir, index, _) = setup();
        let err = remove(&index, "docs").unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Io);
    }

    #[test]
    fn test_share_file_with_dollar_is_written_literally() {
        let (_dir, index, _) = setup();
        let odd = PathBuf::from("/srv/$1/docs.conf");
        set_disabled(&index, "docs", &odd, false).unwrap();
        set_disabled(&index, "docs", &odd, true).unwrap();

        let content = std::fs::read_to_string(&index).unwrap();
        assert!(content.contains("include = /srv/$1/docs.conf"));
    }
}
