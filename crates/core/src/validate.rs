use crate::planner::RenamePlan;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("リネーム先のファイル名が不正です: {name:?} ({reason})")]
    InvalidTargetName { name: String, reason: &'static str },
    #[error("同名のファイル名が発生します: {}", .names.join(", "))]
    DuplicateTargetName { names: Vec<String> },
    #[error("ファイルがすでに存在します: {}", .path.display())]
    TargetAlreadyExists { index: usize, path: PathBuf },
}

pub trait ExistenceProbe {
    fn exists(&self, path: &Path) -> bool;

    fn is_same_file(&self, a: &Path, b: &Path) -> bool {
        a == b
    }
}

impl<F> ExistenceProbe for F
where
    F: Fn(&Path) -> bool,
{
    fn exists(&self, path: &Path) -> bool {
        self(path)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl ExistenceProbe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        // symlink_metadata so a dangling link still counts as occupied
        fs::symlink_metadata(path).is_ok()
    }

    fn is_same_file(&self, a: &Path, b: &Path) -> bool {
        if a == b {
            return true;
        }
        same_file_on_disk(a, b).unwrap_or(false)
    }
}

#[cfg(unix)]
fn same_file_on_disk(a: &Path, b: &Path) -> Option<bool> {
    use std::os::unix::fs::MetadataExt;
    let a = fs::symlink_metadata(a).ok()?;
    let b = fs::symlink_metadata(b).ok()?;
    Some(a.dev() == b.dev() && a.ino() == b.ino())
}

#[cfg(not(unix))]
fn same_file_on_disk(a: &Path, b: &Path) -> Option<bool> {
    let a = fs::canonicalize(a).ok()?;
    let b = fs::canonicalize(b).ok()?;
    Some(a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase())
}

pub fn validate_plan(plan: &RenamePlan, probe: &dyn ExistenceProbe) -> Result<(), ValidationError> {
    let result = check_target_names(plan)
        .and_then(|()| check_duplicates(plan))
        .and_then(|()| check_existing(plan, probe));
    if let Err(err) = &result {
        warn!(error = %err, "リネーム計画の検証に失敗しました");
    }
    result
}

fn check_target_names(plan: &RenamePlan) -> Result<(), ValidationError> {
    for name in plan.target_names() {
        if let Some(reason) = invalid_name_reason(name) {
            return Err(ValidationError::InvalidTargetName {
                name: name.to_string(),
                reason,
            });
        }
    }
    Ok(())
}

// Anything that would move the file out of its directory.
fn invalid_name_reason(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        return Some("空のファイル名");
    }
    if name == "." || name == ".." {
        return Some("予約されたディレクトリ名");
    }
    if name.contains(['/', '\\']) {
        return Some("パス区切り文字を含む");
    }
    if name.contains('\0') {
        return Some("NUL文字を含む");
    }
    None
}

fn check_duplicates(plan: &RenamePlan) -> Result<(), ValidationError> {
    let mut seen = HashSet::<&str>::new();
    let mut duplicates = BTreeSet::<&str>::new();
    for name in plan.target_names() {
        if !seen.insert(name) {
            duplicates.insert(name);
        }
    }

    if duplicates.is_empty() {
        return Ok(());
    }
    Err(ValidationError::DuplicateTargetName {
        names: duplicates.into_iter().map(str::to_string).collect(),
    })
}

fn check_existing(plan: &RenamePlan, probe: &dyn ExistenceProbe) -> Result<(), ValidationError> {
    for (index, rename) in plan.iter().enumerate() {
        let target = rename.target_path();
        if !probe.exists(&target) {
            continue;
        }
        if probe.is_same_file(&target, rename.source.path()) {
            continue;
        }

        // Sources moved earlier in the run have been vacated by the time
        // this pair is applied.
        let vacated = plan.renames[..index].iter().any(|earlier| {
            earlier.changed() && probe.is_same_file(&target, earlier.source.path())
        });
        if vacated {
            continue;
        }

        return Err(ValidationError::TargetAlreadyExists {
            index,
            path: target,
        });
    }
    Ok(())
}
