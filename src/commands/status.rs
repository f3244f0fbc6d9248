use anyhow::{Context as _, Result};
use sambakit::{HealthCheck, Host};
use std::path::Path;

use crate::Context;
use crate::config::Settings;
use crate::ui;

/// Results of the Samba health probes shared by `status` and `doctor`.
pub struct SambaChecks {
    pub config: HealthCheck,
    pub smbd: HealthCheck,
    pub include: HealthCheck,
}

impl SambaChecks {
    pub fn collect(host: &Host, settings: &Settings) -> Self {
        let config = host
            .config_ok(&settings.smb_conf)
            .unwrap_or_else(|e| HealthCheck::failed(e.to_string()));
        let smbd = host
            .smbd_running()
            .unwrap_or_else(|e| HealthCheck::failed(e.to_string()));
        let include = match sambakit::snippet::check_smb_conf_includes(
            &settings.smb_conf,
            &settings.shares_index,
        ) {
            Ok(()) => HealthCheck::passed(),
            Err(e) => HealthCheck::failed(e.to_string()),
        };
        Self {
            config,
            smbd,
            include,
        }
    }

    pub fn print(&self) {
        ui::check("Samba configuration valid (testparm)", &self.config);
        ui::check("smbd running", &self.smbd);
        ui::check("smb.conf includes the shares index", &self.include);
    }
}

pub fn run(ctx: &Context) -> Result<()> {
    let settings = &ctx.settings;
    let host = Host::new();

    ui::header("Samba Status");

    ui::section("Paths");
    ui::kv("smb.conf", &settings.smb_conf.display().to_string());
    ui::kv("shares index", &settings.shares_index.display().to_string());
    ui::kv("snippets", &settings.shares_dir.display().to_string());
    ui::kv("store", &settings.database.display().to_string());
    ui::kv("share root", &settings.share_root.display().to_string());

    ui::section("Health");
    SambaChecks::collect(&host, settings).print();

    ui::section("Managed Shares");
    match sambakit::index::parse_file(&settings.shares_index) {
        Ok(states) => {
            let disabled = states.values().filter(|s| s.disabled).count();
            ui::kv(
                "shares",
                &format!("{} ({} disabled)", states.len(), disabled),
            );
        }
        Err(e) => ui::warn(&format!("Could not read shares index: {e}")),
    }

    ui::section("Share Root");
    match disk_space(&settings.share_root) {
        Ok(space) => {
            let used = space.total.saturating_sub(space.available);
            ui::kv("usage", &format_disk_usage(used, space.total));
            ui::kv("free", &ui::format_size(space.available));
        }
        Err(e) => ui::dim(&format!("{e:#}")),
    }

    Ok(())
}

/// Capacity of the filesystem holding a path, in bytes.
#[derive(Debug, Clone, Copy)]
pub struct DiskSpace {
    pub total: u64,
    pub available: u64,
}

/// Get disk space for the filesystem holding `path`
#[cfg(unix)]
pub fn disk_space(path: &Path) -> Result<DiskSpace> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).context("Invalid path")?;

    // SAFETY: statvfs only writes into the buffer we pass; the result is
    // read only after checking the return value.
    unsafe {
        let mut stat: MaybeUninit<libc::statvfs> = MaybeUninit::uninit();
        if libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) != 0 {
            anyhow::bail!("statvfs failed for {}", path.display());
        }
        let stat = stat.assume_init();

        Ok(DiskSpace {
            total: u64::from(stat.f_blocks) * u64::from(stat.f_frsize),
            available: u64::from(stat.f_bavail) * u64::from(stat.f_frsize),
        })
    }
}

#[cfg(not(unix))]
pub fn disk_space(_path: &Path) -> Result<DiskSpace> {
    anyhow::bail!("Disk space detection not supported on this platform")
}

/// Whole-number percentage, 0 when `total` is 0.
fn calc_percent(part: u64, total: u64) -> u32 {
    if total == 0 {
        0
    } else {
        (part as f64 / total as f64 * 100.0) as u32
    }
}

/// Format disk usage as "X / Y (Z%)"
fn format_disk_usage(used: u64, total: u64) -> String {
    format!(
        "{} / {} ({}%)",
        ui::format_size(used),
        ui::format_size(total),
        calc_percent(used, total)
    )
}
