//! Per-share configuration snippets and the smb.conf include check.

use crate::error::{Error, Result};
use crate::types::ShareOptions;
use std::fmt::Write;
use std::path::{Component, Path, PathBuf};

/// Path of the snippet file for a share: `<dir>/<name>.conf`.
pub fn share_file_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.conf"))
}

/// Check that a share name only uses letters, digits, `.`, `_` and `-`.
pub fn validate_share_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(
            "invalid share name (use letters, numbers, . _ -)".to_string(),
        ))
    }
}

/// Write the snippet file for a share and return its path.
pub fn create_share_snippet(dir: &Path, options: &ShareOptions) -> Result<PathBuf> {
    let name = options.name.trim();
    validate_share_name(name)?;

    let path = options.path.trim();
    if !path.starts_with('/') {
        return Err(Error::InvalidInput("path must be an absolute path".to_string()));
    }

    let file = share_file_path(dir, name);
    if !stays_inside(dir, &file) {
        return Err(Error::InvalidInput("invalid target path".to_string()));
    }

    std::fs::create_dir_all(dir).map_err(|e| Error::file(dir, e))?;
    std::fs::write(&file, render_snippet(name, path, options)).map_err(|e| Error::file(&file, e))?;

    log::info!("wrote share snippet {}", file.display());
    Ok(file)
}

fn render_snippet(name: &str, path: &str, options: &ShareOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[{name}]");
    let _ = writeln!(out, "path = {path}");
    let _ = writeln!(out, "read only = {}", yes_no(options.read_only));
    let _ = writeln!(out, "browseable = {}", yes_no(options.browseable));
    out.push_str("guest ok = no\n");

    let valid_users: Vec<&str> = options
        .valid_users
        .split(',')
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .collect();
    if !valid_users.is_empty() {
        let _ = writeln!(out, "valid users = {}", valid_users.join(", "));
    }

    out.push('\n');
    out
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// The file must be a direct child of `dir` with a regular name.
fn stays_inside(dir: &Path, file: &Path) -> bool {
    let mut components = file.strip_prefix(dir).map(Path::components).into_iter().flatten();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Verify that smb.conf includes the shares index.
pub fn check_smb_conf_includes(smb_conf: &Path, index: &Path) -> Result<()> {
    let content = std::fs::read_to_string(smb_conf).map_err(|e| Error::file(smb_conf, e))?;

    let index_str = index.to_string_lossy();
    if !content.to_lowercase().contains("include") || !content.contains(index_str.as_ref()) {
        return Err(Error::IncludeMissing {
            smb_conf: smb_conf.to_path_buf(),
            index: index.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_share_name() {
        assert!(validate_share_name("photos").is_ok());
        assert!(validate_share_name("Fotos_2024.old-1").is_ok());
        assert!(validate_share_name("").is_err());
        assert!(validate_share_name("my share").is_err());
        assert!(validate_share_name("../etc").is_err());
        assert!(validate_share_name("fotos/2024").is_err());
    }

    #[test]
    fn test_create_share_snippet_content() {
        let dir = tempfile::tempdir().unwrap();
        let snippets = dir.path().join("shares.d").join("ui");
        let options =
            ShareOptions::new("photos", "/shares/photos").valid_users("vater,, @eltern ,");

        let file = create_share_snippet(&snippets, &options).unwrap();

        assert_eq!(file, snippets.join("photos.conf"));
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "[photos]\npath = /shares/photos\nread only = no\nbrowseable = yes\nguest ok = no\nvalid users = vater, @eltern\n\n"
        );
    }

    #[test]
    fn test_create_share_snippet_read_only_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let options = ShareOptions::new(" archive ", " /shares/archive ")
            .read_only(true)
            .browseable(false);

        let file = create_share_snippet(dir.path(), &options).unwrap();

        let content = std::fs::read_to_string(&file).unwrap();
        assert!(content.starts_with("[archive]\npath = /shares/archive\n"));
        assert!(content.contains("read only = yes\n"));
        assert!(content.contains("browseable = no\n"));
        assert!(!content.contains("valid users"));
    }

    #[test]
    fn test_create_share_snippet_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();

        let err = create_share_snippet(dir.path(), &ShareOptions::new("a b", "/x")).unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::InvalidInput);

        let err =
            create_share_snippet(dir.path(), &ShareOptions::new("docs", "relative/x")).unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn test_stays_inside() {
        let dir = Path::new("/etc/samba/shares.d/ui");
        assert!(stays_inside(dir, &share_file_path(dir, "docs")));
        assert!(stays_inside(dir, &share_file_path(dir, "..")));
        assert!(!stays_inside(dir, Path::new("/etc/samba/shares.d/ui/../docs.conf")));
        assert!(!stays_inside(dir, Path::new("/etc/samba/docs.conf")));
    }

    #[test]
    fn test_check_smb_conf_includes() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("smb.conf");
        let index = Path::new("/etc/samba/shares.d/ui/shares.conf");

        std::fs::write(&conf, "[global]\n   workgroup = FAMILIE\n").unwrap();
        let err = check_smb_conf_includes(&conf, index).unwrap_err();
        assert!(matches!(err, Error::IncludeMissing { .. }));

        std::fs::write(&conf, "[global]\n   include = /etc/samba/other.conf\n").unwrap();
        assert!(check_smb_conf_includes(&conf, index).is_err());

        std::fs::write(
            &conf,
            "[global]\n   Include = /etc/samba/shares.d/ui/shares.conf\n",
        )
        .unwrap();
        assert!(check_smb_conf_includes(&conf, index).is_ok());
    }

    #[test]
    fn test_check_smb_conf_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            check_smb_conf_includes(&dir.path().join("smb.conf"), Path::new("/x")).unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Io);
    }
}
