//! Scanner for managed blocks in the shares index.

use super::{BEGIN_MARKER, END_MARKER};
use crate::error::{Error, Result};
use crate::types::ManagedShareState;
use std::collections::BTreeMap;
use std::path::Path;

/// Read the index and report the state of every managed share.
///
/// A missing index is treated as empty.
pub fn parse_file(path: &Path) -> Result<BTreeMap<String, ManagedShareState>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(parse_str(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(Error::file(path, e)),
    }
}

/// Scanner position.
enum State {
    Outside,
    InBlock { name: String, disabled: bool },
}

/// Parse index content into managed share states.
///
/// Blocks whose end marker names a different share, and blocks still open
/// at end of input, are dropped.
pub fn parse_str(content: &str) -> BTreeMap<String, ManagedShareState> {
    let mut shares = BTreeMap::new();
    let mut state = State::Outside;

    for line in content.lines().map(str::trim) {
        // A new begin marker always restarts, discarding an unterminated block
        if let Some(name) = strip_marker(line, BEGIN_MARKER) {
            state = State::InBlock {
                name: name.to_string(),
                disabled: false,
            };
            continue;
        }

        let State::InBlock { name, disabled } = &mut state else {
            continue;
        };

        if let Some(end_name) = strip_marker(line, END_MARKER) {
            if !name.is_empty() && end_name == name.as_str() {
                shares.insert(
                    name.clone(),
                    ManagedShareState {
                        name: name.clone(),
                        disabled: *disabled,
                    },
                );
            }
            state = State::Outside;
            continue;
        }

        if marks_unavailable(line) {
            *disabled = true;
        }
    }

    shares
}

/// Match a marker prefix case-insensitively and return the trimmed name.
fn strip_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let head = line.get(..marker.len())?;
    if !head.eq_ignore_ascii_case(marker) {
        return None;
    }
    Some(line[marker.len()..].trim())
}

fn marks_unavailable(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.starts_with("available") && lower.contains("= no")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(name: &str, disabled: bool) -> ManagedShareState {
        ManagedShareState {
            name: name.to_string(),
            disabled,
        }
    }

    #[test]
    fn test_parse_disabled_block() {
        let content = "; samba-admin-ui:begin photos\n[photos]\n   include=/x\n   available = no\n; samba-admin-ui:end photos\n";
        let shares = parse_str(content);

        assert_eq!(shares.len(), 1);
        assert_eq!(shares["photos"], state("photos", true));
    }

    #[test]
    fn test_parse_enabled_block() {
        let content = "\n; samba-admin-ui:begin docs\n[docs]\n   include = /etc/samba/shares.d/ui/docs.conf\n; samba-admin-ui:end docs\n";
        assert_eq!(parse_str(content)["docs"], state("docs", false));
    }

    #[test]
    fn test_mismatched_markers_are_ignored() {
        let content = "; samba-admin-ui:begin a\n[a]\n; samba-admin-ui:end b\n";
        assert!(parse_str(content).is_empty());
    }

    #[test]
    fn test_unterminated_block_is_dropped() {
        let content = "; samba-admin-ui:begin a\n[a]\n   available = no\n";
        assert!(parse_str(content).is_empty());
    }

    #[test]
    fn test_restarted_block_discards_previous() {
        let content = "\
; samba-admin-ui:begin a
   available = no
; samba-admin-ui:begin b
[b]
; samba-admin-ui:end b
; samba-admin-ui:end a
";
        let shares = parse_str(content);
        assert_eq!(shares.len(), 1);
        assert_eq!(shares["b"], state("b", false));
    }

    #[test]
    fn test_markers_are_case_insensitive() {
        let content = "  ; Samba-Admin-UI:BEGIN Music  \n[Music]\n   Available = No\n; SAMBA-ADMIN-UI:end Music\n";
        assert_eq!(parse_str(content)["Music"], state("Music", true));
    }

    #[test]
    fn test_unmanaged_sections_are_not_reported() {
        let content = "[manual]\n   path = /srv/manual\n   available = no\n";
        assert!(parse_str(content).is_empty());
    }

    #[test]
    fn test_available_outside_block_does_not_leak() {
        let content = "\
available = no
; samba-admin-ui:begin docs
[docs]
; samba-admin-ui:end docs
";
        assert_eq!(parse_str(content)["docs"], state("docs", false));
    }

    #[test]
    fn test_multiple_blocks() {
        let content = "\
; samba-admin-ui:begin docs
[docs]
; samba-admin-ui:end docs

[manual]
   path = /srv/manual

; samba-admin-ui:begin photos
[photos]
   available = no
   browseable = no
; samba-admin-ui:end photos
";
        let shares = parse_str(content);
        let names: Vec<_> = shares.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["docs", "photos"]);
        assert!(!shares["docs"].disabled);
        assert!(shares["photos"].disabled);
    }

    #[test]
    fn test_parse_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let shares = parse_file(&dir.path().join("shares.conf")).unwrap();
        assert!(shares.is_empty());
    }

    #[test]
    fn test_parse_file_reads_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shares.conf");
        std::fs::write(
            &path,
            "; samba-admin-ui:begin docs\n[docs]\n; samba-admin-ui:end docs\n",
        )
        .unwrap();

        assert!(parse_file(&path).unwrap().contains_key("docs"));
    }

    #[test]
    fn test_parse_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_file(dir.path()).unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Io);
    }
}
