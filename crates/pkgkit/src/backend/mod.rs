//! Backend abstraction for system package managers.
//!
//! The [`Backend`] trait defines the interface for querying and changing
//! installed packages, allowing for different implementations (apt, dnf,
//! fakes for testing).

pub mod apt;
pub mod dnf;

use crate::error::{Error, Result};
use crate::types::BackendKind;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Backend trait for package manager operations.
pub trait Backend: Send + Sync + fmt::Debug {
    /// Short name of the package manager ("apt", "dnf")
    fn name(&self) -> &'static str;

    /// Check if the package manager is usable on this host.
    fn is_available(&self) -> bool;

    /// Installed version of a package, `None` when not installed.
    fn installed_version(&self, name: &str) -> Result<Option<String>>;

    /// Newest version the repositories offer, `None` when unknown.
    fn candidate_version(&self, name: &str) -> Result<Option<String>>;

    /// Install a package, pinned to `version` when given.
    fn install(&self, name: &str, version: Option<&str>) -> Result<()>;

    /// Remove a package.
    fn remove(&self, name: &str) -> Result<()>;
}

/// Pick a backend for this host.
///
/// `Auto` prefers apt and falls back to dnf.
pub fn detect(kind: BackendKind) -> Result<Box<dyn Backend>> {
    match kind {
        BackendKind::Apt => Ok(Box::new(apt::AptBackend::new()?)),
        BackendKind::Dnf => Ok(Box::new(dnf::DnfBackend::new()?)),
        BackendKind::Auto => {
            if let Ok(backend) = apt::AptBackend::new() {
                log::debug!("Using apt backend");
                return Ok(Box::new(backend));
            }
            if let Ok(backend) = dnf::DnfBackend::new() {
                log::debug!("Using dnf backend");
                return Ok(Box::new(backend));
            }
            Err(Error::BackendNotFound {
                program: "apt-get or dnf".to_string(),
            })
        }
    }
}

/// Whether an installed version satisfies a requested one.
///
/// A request without an epoch or revision matches any epoch or revision:
/// `1.14.1` is satisfied by `1.14.1-5` and `1:1.14.1-5.el9`.
pub fn version_matches(installed: &str, wanted: &str) -> bool {
    if installed == wanted {
        return true;
    }

    let installed = if wanted.contains(':') {
        installed
    } else {
        installed.split_once(':').map_or(installed, |(_, rest)| rest)
    };

    installed == wanted
        || installed
            .strip_prefix(wanted)
            .is_some_and(|rest| rest.starts_with('-'))
}

/// Locate a program in the usual system directories or on `PATH`.
pub(crate) fn find_program(name: &str) -> Result<PathBuf> {
    let system_dirs = ["/usr/bin", "/bin", "/usr/sbin", "/sbin"];
    let path_dirs = std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect::<Vec<_>>())
        .unwrap_or_default();

    system_dirs
        .iter()
        .map(PathBuf::from)
        .chain(path_dirs)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| Error::BackendNotFound {
            program: name.to_string(),
        })
}

/// Run a package manager command with a stable locale.
pub(crate) fn run(program: &Path, args: &[&str], envs: &[(&str, &str)]) -> Result<Output> {
    log::debug!("Running {} {}", program.display(), args.join(" "));
    Command::new(program)
        .args(args)
        .envs(envs.iter().copied())
        .env("LC_ALL", "C")
        .output()
        .map_err(|e| Error::CommandFailed {
            message: format!("failed to execute {}: {e}", program.display()),
            stderr: String::new(),
        })
}

/// Run a command and turn a non-zero exit into a categorized error.
pub(crate) fn run_checked(
    program: &Path,
    args: &[&str],
    envs: &[(&str, &str)],
    package_name: Option<&str>,
) -> Result<String> {
    let output = run(program, args, envs)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let name = program
            .file_name()
            .map_or_else(|| program.display().to_string(), |n| n.to_string_lossy().into_owned());
        return Err(Error::from_output(&name, &stderr, package_name));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
