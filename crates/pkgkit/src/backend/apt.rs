//! Debian family backend using `dpkg-query`, `apt-cache` and `apt-get`.

use crate::backend::{Backend, find_program, run, run_checked};
use crate::error::Result;
use std::path::PathBuf;

const NONINTERACTIVE: &[(&str, &str)] = &[("DEBIAN_FRONTEND", "noninteractive")];

/// Backend that executes real apt commands.
#[derive(Debug)]
pub struct AptBackend {
    apt_get: PathBuf,
    apt_cache: PathBuf,
    dpkg_query: PathBuf,
}

impl AptBackend {
    /// Create a new AptBackend.
    ///
    /// Returns an error if apt is not installed.
    pub fn new() -> Result<Self> {
        Ok(Self {
            apt_get: find_program("apt-get")?,
            apt_cache: find_program("apt-cache")?,
            dpkg_query: find_program("dpkg-query")?,
        })
    }
}

impl Backend for AptBackend {
    fn name(&self) -> &'static str {
        "apt"
    }

    fn is_available(&self) -> bool {
        run(&self.apt_get, &["--version"], &[]).is_ok_and(|o| o.status.success())
    }

    fn installed_version(&self, name: &str) -> Result<Option<String>> {
        let output = run(
            &self.dpkg_query,
            &["-W", "-f=${Status}\t${Version}\n", name],
            &[],
        )?;

        // dpkg-query exits 1 for packages it has never heard of
        if !output.status.success() {
            return Ok(None);
        }

        Ok(parse_dpkg_query(&String::from_utf8_lossy(&output.stdout)))
    }

    fn candidate_version(&self, name: &str) -> Result<Option<String>> {
        let stdout = run_checked(&self.apt_cache, &["policy", name], &[], Some(name))?;
        Ok(parse_policy_candidate(&stdout))
    }

    fn install(&self, name: &str, version: Option<&str>) -> Result<()> {
        let spec = match version {
            Some(v) => format!("{name}={v}"),
            None => name.to_string(),
        };
        let mut args = vec!["install", "-y", "-q"];
        if version.is_some() {
            args.push("--allow-downgrades");
        }
        args.push(&spec);

        run_checked(&self.apt_get, &args, NONINTERACTIVE, Some(name))?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        run_checked(
            &self.apt_get,
            &["remove", "-y", "-q", name],
            NONINTERACTIVE,
            Some(name),
        )?;
        Ok(())
    }
}

/// Parse `dpkg-query -W -f='${Status}\t${Version}\n'` output.
///
/// Only fully installed packages count; removed packages that left their
/// configuration behind report `deinstall ok config-files`.
fn parse_dpkg_query(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let (status, version) = line.split_once('\t')?;
        (status.trim() == "install ok installed" && !version.trim().is_empty())
            .then(|| version.trim().to_string())
    })
}

/// Extract the `Candidate:` line from `apt-cache policy`.
fn parse_policy_candidate(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let candidate = line.trim().strip_prefix("Candidate:")?.trim();
        (!candidate.is_empty() && candidate != "(none)").then(|| candidate.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dpkg_query_installed() {
        assert_eq!(
            parse_dpkg_query("install ok installed\t1.14.2-4+b2\n"),
            Some("1.14.2-4+b2".to_string())
        );
    }

    #[test]
    fn test_parse_dpkg_query_not_installed() {
        assert_eq!(parse_dpkg_query("deinstall ok config-files\t1.14.2-4\n"), None);
        assert_eq!(parse_dpkg_query("unknown ok not-installed\t\n"), None);
        assert_eq!(parse_dpkg_query(""), None);
    }

    #[test]
    fn test_parse_policy_candidate() {
        let stdout = "subversion:\n  Installed: (none)\n  Candidate: 1.14.2-4+b2\n  Version table:\n     1.14.2-4+b2 500\n";
        assert_eq!(parse_policy_candidate(stdout), Some("1.14.2-4+b2".to_string()));

        let stdout = "svnx:\n  Installed: (none)\n  Candidate: (none)\n";
        assert_eq!(parse_policy_candidate(stdout), None);
        assert_eq!(parse_policy_candidate(""), None);
    }
}
