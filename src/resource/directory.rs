//! Configuration directory resource
//!
//! Keeps a directory tree in sync with a source tree. Files that are
//! missing or whose blake3 hash differs are copied. With `purge`, entries
//! the source does not have are removed. With `force`, an entry of the
//! wrong kind (a file where the source has a directory or the reverse) is
//! replaced; without it such conflicts fail the resource. Paths other
//! resources manage are never purged.

use anyhow::{Context, Result, bail};
use modkit::TargetState;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::source;
use super::{ApplyContext, ApplyResult, Resource, ResourceState};

/// One step needed to bring the tree in sync
#[derive(Debug, Clone, PartialEq, Eq)]
enum Change {
    CreateDir(PathBuf),
    Copy { from: PathBuf, to: PathBuf },
    /// Wrong kind of entry, replaced by a directory or a copy of `from`
    Replace { from: PathBuf, to: PathBuf },
    /// Wrong kind of entry and `force` is off
    Conflict(PathBuf),
    Remove(PathBuf),
}

/// A directory, optionally mirrored from a source tree
#[derive(Debug, Clone)]
pub struct DirectoryResource {
    pub title: String,
    pub path: PathBuf,
    pub target: TargetState,
    /// Locator of the source tree
    pub source: Option<String>,
    pub base_dir: PathBuf,
    pub purge: bool,
    pub force: bool,
    pub noop: bool,
    /// Paths managed elsewhere, exempt from purge
    pub keep: Vec<PathBuf>,
}

impl DirectoryResource {
    pub fn new(title: &str, path: impl Into<PathBuf>, target: TargetState) -> Self {
        Self {
            title: title.to_string(),
            path: path.into(),
            target,
            source: None,
            base_dir: PathBuf::from("."),
            purge: false,
            force: false,
            noop: false,
            keep: Vec::new(),
        }
    }

    pub fn with_source(mut self, locator: Option<String>, base_dir: &Path) -> Self {
        self.source = locator;
        self.base_dir = base_dir.to_path_buf();
        self
    }

    pub fn with_purge(mut self, purge: bool, force: bool) -> Self {
        self.purge = purge;
        self.force = force;
        self
    }

    pub fn with_noop(mut self, noop: bool) -> Self {
        self.noop = noop;
        self
    }

    pub fn with_kept(mut self, keep: Vec<PathBuf>) -> Self {
        self.keep = keep;
        self
    }

    fn source_root(&self) -> Result<Option<PathBuf>> {
        let Some(locator) = &self.source else {
            return Ok(None);
        };
        let root = source::resolve(locator, &self.base_dir)?;
        if !root.is_dir() {
            bail!("Source directory {} not found", root.display());
        }
        Ok(Some(root))
    }

    /// Everything that differs between the tree and its source
    fn changes(&self) -> Result<Vec<Change>> {
        let source = self.source_root()?;
        let mut changes = Vec::new();

        if !self.path.is_dir() {
            if self.path.exists() || self.path.is_symlink() {
                let change = self.conflict(None, &self.path);
                let fatal = matches!(change, Change::Conflict(_));
                changes.push(change);
                if fatal {
                    return Ok(changes);
                }
            } else {
                changes.push(Change::CreateDir(self.path.clone()));
            }
        }

        let Some(source) = source else {
            return Ok(changes);
        };

        let mut walker = WalkDir::new(&source)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = entry.context("Failed to read source tree")?;
            let relative = entry.path().strip_prefix(&source).unwrap_or(entry.path());
            let dest = self.path.join(relative);

            // Managed by another resource, the source copy never wins
            if self.is_kept(&dest) {
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }

            if entry.file_type().is_dir() {
                if dest.is_dir() {
                    continue;
                }
                if dest.exists() || dest.is_symlink() {
                    changes.push(self.conflict(None, &dest));
                } else {
                    changes.push(Change::CreateDir(dest));
                }
            } else if dest.is_dir() {
                changes.push(self.conflict(Some(entry.path()), &dest));
            } else if !dest.exists() || !same_content(entry.path(), &dest)? {
                changes.push(Change::Copy {
                    from: entry.path().to_path_buf(),
                    to: dest,
                });
            }
        }

        if self.purge && self.path.is_dir() {
            self.collect_extras(&source, &mut changes)?;
        }

        Ok(changes)
    }

    fn is_kept(&self, path: &Path) -> bool {
        self.keep.iter().any(|kept| kept == path)
    }

    fn conflict(&self, from: Option<&Path>, to: &Path) -> Change {
        if self.force {
            Change::Replace {
                from: from.map_or_else(PathBuf::new, Path::to_path_buf),
                to: to.to_path_buf(),
            }
        } else {
            Change::Conflict(to.to_path_buf())
        }
    }

    /// Entries under the managed path that the source does not have
    fn collect_extras(&self, source: &Path, changes: &mut Vec<Change>) -> Result<()> {
        let mut walker = WalkDir::new(&self.path)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = entry.context("Failed to read managed tree")?;
            let relative = entry.path().strip_prefix(&self.path).unwrap_or(entry.path());
            let counterpart = source.join(relative);

            let is_dir = entry.file_type().is_dir();
            if self.is_kept(entry.path()) {
                if is_dir {
                    walker.skip_current_dir();
                }
            } else if counterpart.symlink_metadata().is_err() {
                changes.push(Change::Remove(entry.path().to_path_buf()));
                if is_dir {
                    walker.skip_current_dir();
                }
            } else if is_dir && !counterpart.is_dir() {
                // Already handled as a conflict
                walker.skip_current_dir();
            }
        }
        Ok(())
    }

    fn apply_change(change: &Change) -> Result<()> {
        match change {
            Change::CreateDir(path) => {
                fs::create_dir_all(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
            }
            Change::Copy { from, to } => {
                fs::copy(from, to).with_context(|| {
                    format!("Failed to copy {} to {}", from.display(), to.display())
                })?;
            }
            Change::Replace { from, to } => {
                remove_entry(to)?;
                if from.as_os_str().is_empty() {
                    fs::create_dir_all(to)
                        .with_context(|| format!("Failed to create {}", to.display()))?;
                } else {
                    fs::copy(from, to).with_context(|| {
                        format!("Failed to copy {} to {}", from.display(), to.display())
                    })?;
                }
            }
            Change::Remove(path) => remove_entry(path)?,
            Change::Conflict(path) => {
                bail!(
                    "{} has the wrong type; enable force to replace it",
                    path.display()
                );
            }
        }
        Ok(())
    }

    fn converge_present(&self, ctx: &ApplyContext) -> Result<ApplyResult> {
        let changes = self.changes()?;
        if changes.is_empty() {
            return Ok(ApplyResult::NoChange);
        }

        let conflicts: Vec<_> = changes
            .iter()
            .filter_map(|c| match c {
                Change::Conflict(path) => Some(path.display().to_string()),
                _ => None,
            })
            .collect();
        if !conflicts.is_empty() {
            bail!(
                "Conflicting entries in {}: {} (enable force to replace)",
                self.path.display(),
                conflicts.join(", ")
            );
        }

        if ctx.dry_run {
            return Ok(ApplyResult::would(format!(
                "{} in {}",
                summarize(&changes),
                self.path.display()
            )));
        }

        let created = changes.first() == Some(&Change::CreateDir(self.path.clone()));
        for change in &changes {
            if ctx.verbose {
                log::info!("{}: {change:?}", self.title);
            }
            Self::apply_change(change)?;
        }

        Ok(if created {
            ApplyResult::Created
        } else {
            ApplyResult::Modified
        })
    }

    fn converge_absent(&self, ctx: &ApplyContext) -> Result<ApplyResult> {
        if !self.path.exists() && !self.path.is_symlink() {
            return Ok(ApplyResult::NoChange);
        }

        if self.path.is_dir() && !self.force && !is_empty_dir(&self.path)? {
            log::warn!(
                "Not removing non-empty directory {} without force",
                self.path.display()
            );
            return Ok(ApplyResult::Skipped {
                reason: "directory not empty; enable force to remove".into(),
            });
        }

        if ctx.dry_run {
            return Ok(ApplyResult::would(format!("remove {}", self.path.display())));
        }
        remove_entry(&self.path)?;
        Ok(ApplyResult::Removed)
    }
}

impl Resource for DirectoryResource {
    fn id(&self) -> String {
        self.title.clone()
    }

    fn description(&self) -> String {
        match (&self.target, &self.source) {
            (TargetState::Absent, _) => format!("Remove {}", self.path.display()),
            (_, Some(source)) => format!("Sync {} from {source}", self.path.display()),
            (_, None) => format!("Ensure directory {}", self.path.display()),
        }
    }

    fn resource_type(&self) -> &'static str {
        "directory"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if !self.path.exists() && !self.path.is_symlink() {
            return Ok(ResourceState::Absent);
        }
        if self.target.is_absent() {
            return Ok(ResourceState::Present { details: None });
        }
        if !self.path.is_dir() {
            return Ok(ResourceState::Modified {
                from: "file".into(),
                to: "directory".into(),
            });
        }

        let changes = self.changes()?;
        if changes.is_empty() {
            Ok(self.desired_state())
        } else {
            Ok(ResourceState::Modified {
                from: summarize(&changes),
                to: "in sync".into(),
            })
        }
    }

    fn desired_state(&self) -> ResourceState {
        match (&self.target, &self.source) {
            (TargetState::Absent, _) => ResourceState::Absent,
            (_, Some(source)) => ResourceState::present(format!("in sync with {source}")),
            (_, None) => ResourceState::Present { details: None },
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

/// `create 2, update 1, remove 3` style summary
fn summarize(changes: &[Change]) -> String {
    let mut create = 0;
    let mut update = 0;
    let mut replace = 0;
    let mut remove = 0;
    let mut conflict = 0;
    for change in changes {
        match change {
            Change::CreateDir(_) => create += 1,
            Change::Copy { to, .. } if to.exists() => update += 1,
            Change::Copy { .. } => create += 1,
            Change::Replace { .. } => replace += 1,
            Change::Remove(_) => remove += 1,
            Change::Conflict(_) => conflict += 1,
        }
    }

    [
        ("create", create),
        ("update", update),
        ("replace", replace),
        ("remove", remove),
        ("conflict", conflict),
    ]
    .iter()
    .filter(|(_, n)| *n > 0)
    .map(|(label, n)| format!("{label} {n}"))
    .collect::<Vec<_>>()
    .join(", ")
}

fn same_content(a: &Path, b: &Path) -> Result<bool> {
    let hash = |path: &Path| -> Result<blake3::Hash> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(blake3::hash(&bytes))
    };
    Ok(hash(a)? == hash(b)?)
}

fn is_empty_dir(path: &Path) -> Result<bool> {
    let mut entries =
        fs::read_dir(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(entries.next().is_none())
}

fn remove_entry(path: &Path) -> Result<()> {
    let result = if path.is_dir() && !path.is_symlink() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        base: PathBuf,
        dest: PathBuf,
    }

    /// Source tree `loc/` with two files and a subdirectory
    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().to_path_buf();
        fs::create_dir_all(base.join("loc/hooks")).unwrap();
        fs::write(base.join("loc/servers"), "[global]\n").unwrap();
        fs::write(base.join("loc/hooks/pre-commit"), "#!/bin/sh\n").unwrap();
        let dest = base.join("etc/subversion");
        Fixture {
            _tmp: tmp,
            base,
            dest,
        }
    }

    fn synced(fx: &Fixture, purge: bool) -> DirectoryResource {
        DirectoryResource::new("svn.dir", &fx.dest, TargetState::Present)
            .with_source(Some("loc".into()), &fx.base)
            .with_purge(purge, purge)
    }

    fn apply(resource: &DirectoryResource, dry_run: bool) -> ApplyResult {
        resource
            .apply(&mut ApplyContext::new(dry_run, false))
            .unwrap()
    }

    #[test]
    fn copies_tree_then_converges() {
        let fx = fixture();
        let dir = synced(&fx, false);

        assert_eq!(dir.current_state().unwrap(), ResourceState::Absent);
        assert_eq!(apply(&dir, false), ApplyResult::Created);
        assert_eq!(
            fs::read_to_string(fx.dest.join("hooks/pre-commit")).unwrap(),
            "#!/bin/sh\n"
        );

        assert_eq!(dir.current_state().unwrap(), dir.desired_state());
        assert_eq!(apply(&dir, false), ApplyResult::NoChange);
    }

    #[test]
    fn updates_changed_files() {
        let fx = fixture();
        let dir = synced(&fx, false);
        apply(&dir, false);

        fs::write(fx.dest.join("servers"), "edited\n").unwrap();
        assert!(dir.needs_apply().unwrap());
        assert_eq!(
            apply(&dir, true),
            ApplyResult::would(format!("update 1 in {}", fx.dest.display()))
        );
        assert_eq!(apply(&dir, false), ApplyResult::Modified);
        assert_eq!(fs::read_to_string(fx.dest.join("servers")).unwrap(), "[global]\n");
    }

    #[test]
    fn extra_files_survive_without_purge() {
        let fx = fixture();
        fs::create_dir_all(&fx.dest).unwrap();
        fs::write(fx.dest.join("local"), "mine").unwrap();

        let dir = synced(&fx, false);
        apply(&dir, false);
        assert!(fx.dest.join("local").exists());
        assert_eq!(apply(&dir, false), ApplyResult::NoChange);
    }

    #[test]
    fn purge_removes_extra_entries() {
        let fx = fixture();
        fs::create_dir_all(fx.dest.join("stale/deep")).unwrap();
        fs::write(fx.dest.join("stale/deep/file"), "x").unwrap();
        fs::write(fx.dest.join("local"), "mine").unwrap();

        let dir = synced(&fx, true);
        assert_eq!(apply(&dir, false), ApplyResult::Modified);
        assert!(!fx.dest.join("local").exists());
        assert!(!fx.dest.join("stale").exists());
        assert!(fx.dest.join("servers").exists());
        assert_eq!(apply(&dir, false), ApplyResult::NoChange);
    }

    #[test]
    fn purge_spares_kept_paths() {
        let fx = fixture();
        fs::create_dir_all(&fx.dest).unwrap();
        fs::write(fx.dest.join("svn.conf"), "managed elsewhere").unwrap();
        fs::write(fx.dest.join("stray"), "x").unwrap();

        let dir = synced(&fx, true).with_kept(vec![fx.dest.join("svn.conf")]);
        apply(&dir, false);
        assert!(fx.dest.join("svn.conf").exists());
        assert!(!fx.dest.join("stray").exists());
        assert_eq!(apply(&dir, false), ApplyResult::NoChange);
    }

    #[test]
    fn source_never_overwrites_kept_paths() {
        let fx = fixture();
        fs::write(fx.base.join("loc/svn.conf"), "from source_dir\n").unwrap();
        fs::create_dir_all(fx.base.join("loc/svn.conf.d")).unwrap();
        fs::write(fx.base.join("loc/svn.conf.d/extra"), "x").unwrap();
        fs::create_dir_all(&fx.dest).unwrap();
        fs::write(fx.dest.join("svn.conf"), "rendered\n").unwrap();

        let dir = synced(&fx, true).with_kept(vec![
            fx.dest.join("svn.conf"),
            fx.dest.join("svn.conf.d"),
        ]);
        assert_eq!(apply(&dir, false), ApplyResult::Modified);
        assert_eq!(
            fs::read_to_string(fx.dest.join("svn.conf")).unwrap(),
            "rendered\n"
        );
        assert!(!fx.dest.join("svn.conf.d").exists());
        assert!(fx.dest.join("servers").is_file());
        assert_eq!(apply(&dir, false), ApplyResult::NoChange);
    }

    #[test]
    fn conflicts_need_force() {
        let fx = fixture();
        fs::create_dir_all(&fx.dest).unwrap();
        fs::write(fx.dest.join("hooks"), "not a directory").unwrap();

        let strict = synced(&fx, false);
        let err = strict
            .apply(&mut ApplyContext::new(false, false))
            .unwrap_err();
        assert!(err.to_string().contains("force"));

        let forced = synced(&fx, true);
        assert_eq!(apply(&forced, false), ApplyResult::Modified);
        assert!(fx.dest.join("hooks/pre-commit").is_file());
        assert_eq!(apply(&forced, false), ApplyResult::NoChange);
    }

    #[test]
    fn dry_run_leaves_tree_unchanged() {
        let fx = fixture();
        let dir = synced(&fx, true).with_noop(true);

        assert!(matches!(apply(&dir, true), ApplyResult::Skipped { .. }));
        assert!(!fx.dest.exists());
    }

    #[test]
    fn missing_source_fails() {
        let fx = fixture();
        let dir = DirectoryResource::new("svn.dir", &fx.dest, TargetState::Present)
            .with_source(Some("nowhere".into()), &fx.base);
        assert!(dir.apply(&mut ApplyContext::new(false, false)).is_err());
        assert!(!fx.dest.exists());
    }

    #[test]
    fn absent_needs_force_for_non_empty() {
        let fx = fixture();
        fs::create_dir_all(&fx.dest).unwrap();
        fs::write(fx.dest.join("servers"), "x").unwrap();

        let gentle = DirectoryResource::new("svn.dir", &fx.dest, TargetState::Absent);
        assert!(matches!(apply(&gentle, false), ApplyResult::Skipped { .. }));
        assert!(fx.dest.exists());

        let forced = gentle.clone().with_purge(true, true);
        assert_eq!(apply(&forced, false), ApplyResult::Removed);
        assert!(!fx.dest.exists());
        assert_eq!(apply(&forced, false), ApplyResult::NoChange);
    }

    #[test]
    fn absent_removes_empty_directory() {
        let fx = fixture();
        fs::create_dir_all(&fx.dest).unwrap();

        let dir = DirectoryResource::new("svn.dir", &fx.dest, TargetState::Absent);
        assert_eq!(dir.current_state().unwrap(), ResourceState::Present { details: None });
        assert_eq!(apply(&dir, false), ApplyResult::Removed);
        assert_eq!(dir.current_state().unwrap(), ResourceState::Absent);
    }

    #[test]
    fn summary_counts_by_kind() {
        let changes = vec![
            Change::CreateDir("/a".into()),
            Change::Remove("/b".into()),
            Change::Remove("/c".into()),
        ];
        assert_eq!(summarize(&changes), "create 1, remove 2");
    }
}
