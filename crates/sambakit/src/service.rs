//! Samba service health, effective configuration and reloads.

use crate::Host;
use crate::error::Result;
use crate::runner::{self, MUTATE_TIMEOUT, PROBE_TIMEOUT, SLOW_TIMEOUT};
use crate::types::{EffectiveConfig, HealthCheck};
use std::collections::BTreeMap;
use std::path::Path;

impl Host {
    /// Validate the Samba configuration with `testparm -s`.
    pub fn config_ok(&self, smb_conf: &Path) -> Result<HealthCheck> {
        let conf = smb_conf.to_string_lossy();
        let output = self
            .runner
            .run(MUTATE_TIMEOUT, "testparm", &["-s", &conf])?;

        if output.success() {
            return Ok(HealthCheck::passed());
        }
        if output.timed_out() {
            return Ok(HealthCheck::failed(format!(
                "timeout running testparm (after {MUTATE_TIMEOUT:?})"
            )));
        }
        Ok(HealthCheck::failed(output.stderr.trim()))
    }

    /// Dump and parse the effective configuration (`testparm -s`).
    pub fn read_effective_config(&self, smb_conf: &Path) -> Result<EffectiveConfig> {
        let conf = smb_conf.to_string_lossy();
        let stdout = self
            .runner
            .run_checked(SLOW_TIMEOUT, "testparm", &["-s", &conf])?;
        Ok(parse_effective_config(&stdout))
    }

    /// Check whether an `smbd` process is running.
    pub fn smbd_running(&self) -> Result<HealthCheck> {
        let output = self.runner.run(PROBE_TIMEOUT, "pidof", &["smbd"])?;
        if output.success() {
            return Ok(HealthCheck::passed());
        }

        let detail = output.stderr.trim();
        Ok(HealthCheck::failed(if detail.is_empty() {
            "smbd not running"
        } else {
            detail
        }))
    }

    /// Ask all running Samba daemons to reload their configuration.
    pub fn reload_config(&self) -> Result<()> {
        let output = self
            .runner
            .run(MUTATE_TIMEOUT, "smbcontrol", &["all", "reload-config"])?;
        runner::check("smbcontrol", MUTATE_TIMEOUT, output)?;
        log::info!("reloaded samba configuration");
        Ok(())
    }
}

/// Flatten `testparm -s` output into sections of key/value pairs.
///
/// Comments and blank lines are skipped, keys are lowercased, and lines
/// outside a section or without `=` are ignored.
pub fn parse_effective_config(output: &str) -> EffectiveConfig {
    let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in output.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }

        let Some(section) = current.as_ref() else {
            continue;
        };
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        sections
            .entry(section.clone())
            .or_default()
            .insert(key.trim().to_lowercase(), value.trim().to_string());
    }

    EffectiveConfig {
        sections,
        raw: output.to_string(),
    }
}

/// Describe owner and mode of a share directory, e.g.
/// `uid=0 gid=1001 mode=drwxrwx---`.
pub fn path_permissions(path: &Path) -> std::result::Result<String, String> {
    if path.as_os_str().is_empty() {
        return Err("(no path)".to_string());
    }

    let meta = std::fs::metadata(path).map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(describe_metadata(&meta))
}

#[cfg(unix)]
fn describe_metadata(meta: &std::fs::Metadata) -> String {
    use std::os::unix::fs::MetadataExt;

    format!(
        "uid={} gid={} mode={}",
        meta.uid(),
        meta.gid(),
        mode_string(meta.is_dir(), meta.mode())
    )
}

#[cfg(not(unix))]
fn describe_metadata(meta: &std::fs::Metadata) -> String {
    let mode = if meta.permissions().readonly() {
        0o555
    } else {
        0o755
    };
    format!("uid=? gid=? mode={}", mode_string(meta.is_dir(), mode))
}

/// Render permission bits like `ls -l` does.
fn mode_string(is_dir: bool, mode: u32) -> String {
    const FLAGS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];

    let mut out = String::with_capacity(10);
    out.push(if is_dir { 'd' } else { '-' });
    for (bit, ch) in FLAGS {
        out.push(if mode & bit != 0 { ch } else { '-' });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CommandOutput;
    use crate::testing::ScriptedRunner;

    const TESTPARM: &str = "\
# Global parameters
[global]
\tserver role = standalone server
\tWorkgroup = FAMILIE

[photos]
\tpath = /shares/photos
\tread only = No
\tvalid users = @eltern

; stray comment
[ docs ]
\treadonly = yes
\tno equals sign here
";

    #[test]
    fn test_parse_effective_config_sections() {
        let config = parse_effective_config(TESTPARM);

        let global = config.section("global").unwrap();
        assert_eq!(global.get("workgroup").unwrap(), "FAMILIE");
        assert_eq!(global.get("server role").unwrap(), "standalone server");

        assert_eq!(config.read_only("photos"), Some("No"));
        assert_eq!(config.read_only("docs"), Some("yes"));
        assert_eq!(config.section("docs").unwrap().len(), 1);

        let shares: Vec<_> = config.shares().map(|(name, _)| name.as_str()).collect();
        assert_eq!(shares, vec!["docs", "photos"]);
    }

    #[test]
    fn test_parse_effective_config_ignores_preamble() {
        let config = parse_effective_config("Load smb config files from x\nkey = value\n");
        assert!(config.sections.is_empty());
    }

    #[test]
    fn test_config_ok_reports_stderr() {
        let runner = ScriptedRunner::new().respond(
            "testparm -s /etc/samba/smb.conf",
            CommandOutput::failed(1, "Error loading services.\n"),
        );
        let host = Host::with_runner(Box::new(runner));

        let check = host.config_ok(Path::new("/etc/samba/smb.conf")).unwrap();
        assert!(!check.ok);
        assert_eq!(check.detail, "Error loading services.");
    }

    #[test]
    fn test_smbd_not_running_has_default_detail() {
        let runner = ScriptedRunner::new().respond("pidof smbd", CommandOutput::failed(1, ""));
        let host = Host::with_runner(Box::new(runner));

        let check = host.smbd_running().unwrap();
        assert_eq!(check, HealthCheck::failed("smbd not running"));
    }

    #[test]
    fn test_reload_config_failure() {
        let runner = ScriptedRunner::new().respond(
            "smbcontrol all reload-config",
            CommandOutput::failed(1, "Can't find pid for destination 'all'\n"),
        );
        let host = Host::with_runner(Box::new(runner));

        let err = host.reload_config().unwrap_err();
        assert!(err.to_string().starts_with("smbcontrol failed"));
    }

    #[test]
    fn test_mode_string() {
        assert_eq!(mode_string(true, 0o770), "drwxrwx---");
        assert_eq!(mode_string(false, 0o644), "-rw-r--r--");
    }

    #[cfg(unix)]
    #[test]
    fn test_path_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o750)).unwrap();

        let desc = path_permissions(dir.path()).unwrap();
        assert!(desc.starts_with("uid="));
        assert!(desc.ends_with("mode=drwxr-x---"));

        assert!(path_permissions(&dir.path().join("missing")).is_err());
        assert_eq!(path_permissions(Path::new("")).unwrap_err(), "(no path)");
    }
}
