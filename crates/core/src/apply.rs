use crate::planner::RenamePlan;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ApplyResult {
    pub applied: usize,
    pub unchanged: usize,
}

#[derive(Debug, Error)]
pub enum RenameError {
    #[error(
        "ファイルのリネーム中にエラーが発生しました ({index}番目, 完了 {completed}件): {} -> {}: {source}",
        .from.display(),
        .to.display()
    )]
    RenameFailed {
        index: usize,
        from: PathBuf,
        to: PathBuf,
        completed: usize,
        #[source]
        source: io::Error,
    },
}

impl RenameError {
    pub fn index(&self) -> usize {
        match self {
            Self::RenameFailed { index, .. } => *index,
        }
    }

    pub fn completed(&self) -> usize {
        match self {
            Self::RenameFailed { completed, .. } => *completed,
        }
    }
}

pub trait Renamer {
    fn rename(&mut self, from: &Path, to: &Path) -> io::Result<()>;
}

impl<F> Renamer for F
where
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    fn rename(&mut self, from: &Path, to: &Path) -> io::Result<()> {
        self(from, to)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsRenamer;

impl Renamer for FsRenamer {
    fn rename(&mut self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}

// Stops at the first failure; renames before it stay in place.
pub fn apply_plan(plan: &RenamePlan, renamer: &mut dyn Renamer) -> Result<ApplyResult, RenameError> {
    let mut result = ApplyResult::default();

    for (index, rename) in plan.iter().enumerate() {
        let from = rename.source.path();
        let to = rename.target_path();
        if to == from {
            result.unchanged += 1;
            continue;
        }

        if let Err(source) = renamer.rename(from, &to) {
            warn!(
                index,
                completed = result.applied,
                from = %from.display(),
                to = %to.display(),
                error = %source,
                "リネームに失敗したため処理を中断しました"
            );
            return Err(RenameError::RenameFailed {
                index,
                from: from.to_path_buf(),
                to,
                completed: result.applied,
                source,
            });
        }
        debug!(from = %from.display(), to = %to.display(), "リネームしました");
        result.applied += 1;
    }

    info!(
        applied = result.applied,
        unchanged = result.unchanged,
        "リネームを適用しました"
    );
    Ok(result)
}
