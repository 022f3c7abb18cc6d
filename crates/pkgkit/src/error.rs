//! Error types for package manager operations.
//!
//! Errors are categorized to enable smart retry logic and appropriate
//! user feedback.

use thiserror::Error;

/// Categories of package manager errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors (transient, retryable)
    Network,
    /// Package not found in any repository
    NotFound,
    /// Version or dependency conflict
    Conflict,
    /// Permission denied (needs root)
    Permission,
    /// Package database locked by another process (transient, retryable)
    Locked,
    /// No supported package manager on this host
    BackendNotFound,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Locked)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::NotFound => "Package not found",
            Self::Conflict => "Package conflict",
            Self::Permission => "Permission denied",
            Self::Locked => "Package database locked",
            Self::BackendNotFound => "No package manager found",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your internet connection and repository mirrors",
            Self::NotFound => "Verify the package name and that its repository is enabled",
            Self::Conflict => "Resolve the conflict by removing conflicting packages",
            Self::Permission => "Run as root",
            Self::Locked => "Wait for the other package manager process to finish",
            Self::BackendNotFound => "Install apt or dnf, or select a backend explicitly",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur during package manager operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network-related error (connection, timeout, DNS, etc.)
    #[error("network error: {message}")]
    Network {
        /// Detailed error message
        message: String,
    },

    /// Package not found in any configured repository
    #[error("package not found: {name}")]
    NotFound {
        /// Name of the package that could not be found
        name: String,
    },

    /// Version or dependency conflict
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflict
        message: String,
    },

    /// Permission denied
    #[error("permission denied: {message}")]
    Permission {
        /// Details about what permission was denied
        message: String,
    },

    /// Package database is locked
    #[error("package database locked: {message}")]
    Locked {
        /// Lock holder details
        message: String,
    },

    /// The package manager program is not installed
    #[error("{program} not found in PATH")]
    BackendNotFound {
        /// Program that was looked up
        program: String,
    },

    /// Command execution failed
    #[error("command failed: {message}")]
    CommandFailed {
        /// Description of what command failed
        message: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Network { .. } => ErrorCategory::Network,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Conflict { .. } => ErrorCategory::Conflict,
            Error::Permission { .. } => ErrorCategory::Permission,
            Error::Locked { .. } => ErrorCategory::Locked,
            Error::BackendNotFound { .. } => ErrorCategory::BackendNotFound,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Create an error from package manager output.
    ///
    /// Analyzes stderr of apt-get, dpkg, dnf or rpm to categorize the error.
    pub fn from_output(program: &str, stderr: &str, package_name: Option<&str>) -> Self {
        let stderr_lower = stderr.to_lowercase();
        let message = stderr.trim().to_string();

        // Lock contention comes first: apt reports it as a permission-ish failure
        if stderr_lower.contains("could not get lock")
            || stderr_lower.contains("unable to acquire the dpkg frontend lock")
            || stderr_lower.contains("waiting for process with pid")
        {
            return Error::Locked { message };
        }

        if stderr_lower.contains("permission denied")
            || stderr_lower.contains("are you root")
            || stderr_lower.contains("operation not permitted")
            || stderr_lower.contains("this command has to be run with superuser privileges")
        {
            return Error::Permission { message };
        }

        if stderr_lower.contains("temporary failure resolving")
            || stderr_lower.contains("could not resolve")
            || stderr_lower.contains("failed to fetch")
            || stderr_lower.contains("connection refused")
            || stderr_lower.contains("connection timed out")
            || stderr_lower.contains("timed out")
            || stderr_lower.contains("curl error")
            || stderr_lower.contains("cannot download")
            || stderr_lower.contains("failed to download metadata")
        {
            return Error::Network { message };
        }

        if stderr_lower.contains("unable to locate package")
            || stderr_lower.contains("has no installation candidate")
            || stderr_lower.contains("no match for argument")
            || stderr_lower.contains("unable to find a match")
            || stderr_lower.contains("is not installed")
            || (stderr_lower.contains("version") && stderr_lower.contains("was not found"))
        {
            return Error::NotFound {
                name: package_name.unwrap_or("unknown").to_string(),
            };
        }

        if stderr_lower.contains("conflict")
            || stderr_lower.contains("unmet dependencies")
            || stderr_lower.contains("broken packages")
            || stderr_lower.contains("problem with installed package")
        {
            return Error::Conflict { message };
        }

        Error::CommandFailed {
            message: format!(
                "{program} failed{}",
                package_name
                    .map(|n| format!(" for {n}"))
                    .unwrap_or_default()
            ),
            stderr: message,
        }
    }
}

/// Result type for package manager operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Locked.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::Permission.is_retryable());
    }

    #[test]
    fn test_from_output_network() {
        let err = Error::from_output(
            "apt-get",
            "E: Failed to fetch http://deb.debian.org/pool/main/s/subversion.deb  Temporary failure resolving 'deb.debian.org'",
            Some("subversion"),
        );
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_output_not_found() {
        let err = Error::from_output("apt-get", "E: Unable to locate package svnx", Some("svnx"));
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert_eq!(err.to_string(), "package not found: svnx");

        let err = Error::from_output(
            "apt-get",
            "E: Version '9.9' for 'subversion' was not found",
            Some("subversion"),
        );
        assert_eq!(err.category(), ErrorCategory::NotFound);

        let err = Error::from_output("dnf", "No match for argument: svnx", Some("svnx"));
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_from_output_permission() {
        let err = Error::from_output(
            "apt-get",
            "E: Could not open lock file /var/lib/dpkg/lock-frontend - open (13: Permission denied)\nE: are you root?",
            Some("subversion"),
        );
        assert_eq!(err.category(), ErrorCategory::Permission);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_output_locked() {
        let err = Error::from_output(
            "apt-get",
            "E: Could not get lock /var/lib/dpkg/lock-frontend. It is held by process 4242 (apt-get)",
            Some("subversion"),
        );
        assert_eq!(err.category(), ErrorCategory::Locked);
    }

    #[test]
    fn test_from_output_conflict() {
        let err = Error::from_output(
            "apt-get",
            "The following packages have unmet dependencies:",
            Some("subversion"),
        );
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }

    #[test]
    fn test_from_output_fallback() {
        let err = Error::from_output("dnf", "something odd\n", Some("subversion"));
        match err {
            Error::CommandFailed { message, stderr } => {
                assert_eq!(message, "dnf failed for subversion");
                assert_eq!(stderr, "something odd");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
