//! Samba account management through `pdbedit` and `smbpasswd`.

use crate::Host;
use crate::error::Result;
use crate::runner::{self, MUTATE_TIMEOUT, SLOW_TIMEOUT};

impl Host {
    /// List accounts in the Samba password database.
    pub fn list_samba_users(&self) -> Result<Vec<String>> {
        let stdout = self.runner.run_checked(MUTATE_TIMEOUT, "pdbedit", &["-L"])?;
        Ok(parse_pdbedit_list(&stdout))
    }

    /// Add a Samba account for an existing Linux user.
    pub fn add_samba_user(&self, name: &str, password: &str) -> Result<()> {
        self.smbpasswd_with_password("smbpasswd -a", &["-a", "-s", name], password)?;
        log::info!("added samba account {name}");
        Ok(())
    }

    /// Change the Samba password of an account.
    pub fn set_samba_password(&self, name: &str, password: &str) -> Result<()> {
        self.smbpasswd_with_password("smbpasswd -s", &["-s", name], password)?;
        log::info!("changed samba password of {name}");
        Ok(())
    }

    /// Re-enable a disabled Samba account.
    pub fn enable_samba_user(&self, name: &str) -> Result<()> {
        self.smbpasswd_flag("-e", name)?;
        log::info!("enabled samba account {name}");
        Ok(())
    }

    /// Disable a Samba account without deleting it.
    pub fn disable_samba_user(&self, name: &str) -> Result<()> {
        self.smbpasswd_flag("-d", name)?;
        log::info!("disabled samba account {name}");
        Ok(())
    }

    /// Remove an account from the Samba password database.
    pub fn delete_samba_user(&self, name: &str) -> Result<()> {
        self.smbpasswd_flag("-x", name)?;
        log::info!("deleted samba account {name}");
        Ok(())
    }

    fn smbpasswd_flag(&self, flag: &str, name: &str) -> Result<()> {
        let output = self
            .runner
            .run(MUTATE_TIMEOUT, "smbpasswd", &[flag, name])?;
        runner::check(&format!("smbpasswd {flag}"), MUTATE_TIMEOUT, output)?;
        Ok(())
    }

    // smbpasswd -s reads the new password twice from stdin
    fn smbpasswd_with_password(&self, label: &str, args: &[&str], password: &str) -> Result<()> {
        let stdin = format!("{password}\n{password}\n");
        let output = self
            .runner
            .run_with_stdin(SLOW_TIMEOUT, &stdin, "smbpasswd", args)?;
        runner::check(label, SLOW_TIMEOUT, output)?;
        Ok(())
    }
}

/// Account names from `pdbedit -L` (`name:uid:full name` per line).
fn parse_pdbedit_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter_map(|line| line.split(':').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::runner::CommandOutput;
    use crate::testing::ScriptedRunner;

    #[test]
    fn test_parse_pdbedit_list() {
        let out = "vater:1000:Vater\n\nmutter:1001:\n  kind:1002:Kind  \n";
        assert_eq!(parse_pdbedit_list(out), vec!["vater", "mutter", "kind"]);
    }

    #[test]
    fn test_add_samba_user_feeds_password_twice() {
        let runner = ScriptedRunner::new().respond("smbpasswd -a -s vater", CommandOutput::ok(""));
        let host = Host::with_runner(Box::new(runner.clone()));

        host.add_samba_user("vater", "geheim").unwrap();

        let stdin = runner.stdin_for("smbpasswd -a -s vater").unwrap();
        assert_eq!(stdin, "geheim\ngeheim\n");
    }

    #[test]
    fn test_smbpasswd_failure_names_the_flag() {
        let runner = ScriptedRunner::new().respond(
            "smbpasswd -x ghost",
            CommandOutput::failed(1, "Failed to find entry for user ghost.\n"),
        );
        let host = Host::with_runner(Box::new(runner));

        let err = host.delete_samba_user("ghost").unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
        assert_eq!(
            err.to_string(),
            "smbpasswd -x failed: Failed to find entry for user ghost."
        );
    }

    #[test]
    fn test_password_timeout_is_reported() {
        let runner = ScriptedRunner::new().respond(
            "smbpasswd -s vater",
            CommandOutput::failed(runner::TIMEOUT_EXIT_CODE, ""),
        );
        let host = Host::with_runner(Box::new(runner));

        let err = host.set_samba_password("vater", "pw").unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }
}
