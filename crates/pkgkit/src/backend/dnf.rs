//! Red Hat family backend using `rpm` and `dnf`.

use crate::backend::{Backend, find_program, run, run_checked};
use crate::error::Result;
use std::path::PathBuf;

/// Backend that executes real dnf commands.
#[derive(Debug)]
pub struct DnfBackend {
    dnf: PathBuf,
    rpm: PathBuf,
}

impl DnfBackend {
    /// Create a new DnfBackend.
    ///
    /// Returns an error if dnf is not installed.
    pub fn new() -> Result<Self> {
        Ok(Self {
            dnf: find_program("dnf")?,
            rpm: find_program("rpm")?,
        })
    }
}

impl Backend for DnfBackend {
    fn name(&self) -> &'static str {
        "dnf"
    }

    fn is_available(&self) -> bool {
        run(&self.dnf, &["--version"], &[]).is_ok_and(|o| o.status.success())
    }

    fn installed_version(&self, name: &str) -> Result<Option<String>> {
        let output = run(
            &self.rpm,
            &["-q", "--qf", "%{EPOCH}:%{VERSION}-%{RELEASE}\\n", name],
            &[],
        )?;

        // rpm exits 1 and prints "package X is not installed"
        if !output.status.success() {
            return Ok(None);
        }

        Ok(parse_rpm_query(&String::from_utf8_lossy(&output.stdout)))
    }

    fn candidate_version(&self, name: &str) -> Result<Option<String>> {
        let stdout = run_checked(
            &self.dnf,
            &[
                "repoquery",
                "-q",
                "--latest-limit",
                "1",
                "--qf",
                "%{epoch}:%{version}-%{release}\\n",
                name,
            ],
            &[],
            Some(name),
        )?;
        Ok(parse_rpm_query(&stdout))
    }

    fn install(&self, name: &str, version: Option<&str>) -> Result<()> {
        let spec = match version {
            Some(v) => format!("{name}-{v}"),
            None => name.to_string(),
        };
        run_checked(&self.dnf, &["install", "-y", "-q", &spec], &[], Some(name))?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        run_checked(&self.dnf, &["remove", "-y", "-q", name], &[], Some(name))?;
        Ok(())
    }
}

/// First version line of an rpm query, with a zero or missing epoch dropped.
fn parse_rpm_query(stdout: &str) -> Option<String> {
    let line = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    let version = match line.split_once(':') {
        Some(("0" | "(none)", rest)) => rest,
        _ => line,
    };
    Some(version.to_string())
}
