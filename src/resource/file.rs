//! Configuration file resource

use anyhow::{Context, Result, bail};
use modkit::TargetState;
use std::fs;
use std::path::{Path, PathBuf};

use super::source;
use super::{ApplyContext, ApplyResult, Resource, ResourceState};

/// Where the bytes of a managed file come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// Rendered at plan time
    Inline(String),
    /// Copied from a locator, resolved against `base_dir`
    Source { locator: String, base_dir: PathBuf },
    /// Content is not managed
    None,
}

/// A file with managed content and permissions
#[derive(Debug, Clone)]
pub struct FileResource {
    pub title: String,
    pub path: PathBuf,
    pub target: TargetState,
    pub content: FileContent,
    pub mode: Option<u32>,
    pub noop: bool,
}

impl FileResource {
    pub fn new(title: &str, path: impl Into<PathBuf>, target: TargetState) -> Self {
        Self {
            title: title.to_string(),
            path: path.into(),
            target,
            content: FileContent::None,
            mode: None,
            noop: false,
        }
    }

    pub fn with_content(mut self, content: FileContent) -> Self {
        self.content = content;
        self
    }

    pub fn with_mode(mut self, mode: Option<u32>) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_noop(mut self, noop: bool) -> Self {
        self.noop = noop;
        self
    }

    /// Bytes the file should hold, `None` when content is unmanaged
    pub fn desired_bytes(&self) -> Result<Option<Vec<u8>>> {
        match &self.content {
            FileContent::Inline(text) => Ok(Some(text.clone().into_bytes())),
            FileContent::Source { locator, base_dir } => {
                let path = source::resolve(locator, base_dir)?;
                let bytes = fs::read(&path)
                    .with_context(|| format!("Failed to read source {}", path.display()))?;
                Ok(Some(bytes))
            }
            FileContent::None => Ok(None),
        }
    }

    /// Current and desired text, for showing a content diff
    pub fn text_change(&self) -> Result<Option<(String, String)>> {
        if self.target.is_absent() {
            return Ok(None);
        }
        let Some(desired) = self.desired_bytes()? else {
            return Ok(None);
        };
        let current = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };
        if current == desired {
            return Ok(None);
        }
        Ok(Some((
            String::from_utf8_lossy(&current).into_owned(),
            String::from_utf8_lossy(&desired).into_owned(),
        )))
    }

    /// `hash mode` summary of some content
    fn fingerprint(&self, bytes: &[u8], mode: Option<u32>) -> String {
        let hash = blake3::hash(bytes).to_hex();
        let short = &hash.as_str()[..12];
        match (self.mode, mode) {
            (Some(_), Some(mode)) => format!("{short} {mode:04o}"),
            _ => short.to_string(),
        }
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.path, bytes)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    fn converge_present(&self, ctx: &ApplyContext) -> Result<ApplyResult> {
        if self.path.is_dir() {
            bail!("{} is a directory", self.path.display());
        }

        let desired = self.desired_bytes()?;
        let exists = self.path.exists();
        let current = if exists {
            let bytes = fs::read(&self.path)
                .with_context(|| format!("Failed to read {}", self.path.display()))?;
            Some(bytes)
        } else {
            None
        };

        let content_changed = match (&desired, &current) {
            (Some(desired), Some(current)) => desired != current,
            (_, None) => true,
            (None, Some(_)) => false,
        };
        let mode_changed = self
            .mode
            .is_some_and(|mode| exists && file_mode(&self.path).is_some_and(|m| m != mode));

        if !content_changed && !mode_changed {
            return Ok(ApplyResult::NoChange);
        }

        if ctx.dry_run {
            let change = match (exists, content_changed) {
                (false, _) => format!("create {}", self.path.display()),
                (true, true) => format!("update {}", self.path.display()),
                (true, false) => format!("change mode of {}", self.path.display()),
            };
            return Ok(ApplyResult::would(change));
        }

        if content_changed {
            self.write(desired.as_deref().unwrap_or_default())?;
        }
        if let Some(mode) = self.mode {
            set_mode(&self.path, mode)?;
        }

        if ctx.verbose {
            log::info!("Wrote {}", self.path.display());
        }
        Ok(if exists {
            ApplyResult::Modified
        } else {
            ApplyResult::Created
        })
    }

    fn converge_absent(&self, ctx: &ApplyContext) -> Result<ApplyResult> {
        if self.path.is_dir() {
            bail!("{} is a directory, refusing to remove", self.path.display());
        }
        if !self.path.exists() && !self.path.is_symlink() {
            return Ok(ApplyResult::NoChange);
        }
        if ctx.dry_run {
            return Ok(ApplyResult::would(format!("remove {}", self.path.display())));
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        Ok(ApplyResult::Removed)
    }
}

impl Resource for FileResource {
    fn id(&self) -> String {
        self.title.clone()
    }

    fn description(&self) -> String {
        if self.target.is_absent() {
            format!("Remove {}", self.path.display())
        } else {
            format!("Manage {}", self.path.display())
        }
    }

    fn resource_type(&self) -> &'static str {
        "file"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.path.is_dir() {
            return Ok(ResourceState::Modified {
                from: "directory".into(),
                to: "file".into(),
            });
        }
        if !self.path.exists() {
            return Ok(ResourceState::Absent);
        }
        if self.content == FileContent::None && self.mode.is_none() {
            return Ok(ResourceState::Present { details: None });
        }

        let bytes =
            fs::read(&self.path).with_context(|| format!("Failed to read {}", self.path.display()))?;
        Ok(ResourceState::present(
            self.fingerprint(&bytes, file_mode(&self.path)),
        ))
    }

    fn desired_state(&self) -> ResourceState {
        if self.target.is_absent() {
            return ResourceState::Absent;
        }
        match self.desired_bytes() {
            Ok(Some(bytes)) => ResourceState::present(self.fingerprint(&bytes, self.mode)),
            Ok(None) => ResourceState::Present { details: None },
            Err(e) => {
                log::warn!("{}: {e:#}", self.title);
                ResourceState::Unknown
            }
        }
    }

    fn is_converged(&self, current: &ResourceState) -> bool {
        match self.desired_state() {
            ResourceState::Present { details: None } => current.is_present(),
            ResourceState::Unknown => false,
            desired => *current == desired,
        }
    }

    fn noop(&self) -> bool {
        self.noop
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if self.target.is_absent() {
            self.converge_absent(ctx)
        } else {
            self.converge_present(ctx)
        }
    }
}

#[cfg(unix)]
fn file_mode(path: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .ok()
        .map(|meta| meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> Option<u32> {
    None
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("Failed to set mode {mode:04o} on {}", path.display()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
