
use crate::apply::{apply_plan, ApplyResult, RenameError, Renamer};
use crate::entry::FileEntry;
use crate::natural::natural_cmp;
use crate::planner::{generate_plan, NamingPolicy, PlanError, RenamePlan};
use crate::validate::{validate_plan, ExistenceProbe, ValidationError};
use chrono::{DateTime, Local};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tga", ".tif", ".tiff", ".psd", ".mp4", ".mov",
    ".avi", ".mkv", ".webm", ".wmv", ".flv", ".f4v", ".m4v", ".ogg", ".mp3", ".wav", ".webp",
    ".svg",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortColumn {
    Original,
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn flipped(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("リネーム対象のファイルがありません")]
    Empty,
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Rename(#[from] RenameError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub plan: RenamePlan,
    pub result: ApplyResult,
}

#[derive(Debug, Clone)]
pub struct RenameSession {
    entries: Vec<FileEntry>,
    policy: NamingPolicy,
    start_number: i64,
    extensions: HashSet<String>,
    next_order: [SortOrder; 2],
    // dropped on every mutation
    preview: Option<(DateTime<Local>, RenamePlan)>,
}

impl Default for RenameSession {
    fn default() -> Self {
        Self::new(NamingPolicy::default(), 1)
    }
}

impl RenameSession {
    pub fn new(policy: NamingPolicy, start_number: i64) -> Self {
        Self {
            entries: Vec::new(),
            policy,
            start_number,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            next_order: [SortOrder::Ascending; 2],
            preview: None,
        }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .collect();
        self
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn policy(&self) -> &NamingPolicy {
        &self.policy
    }

    pub fn start_number(&self) -> i64 {
        self.start_number
    }

    pub fn set_policy(&mut self, policy: NamingPolicy) {
        self.policy = policy;
        self.invalidate();
    }

    pub fn set_start_number(&mut self, start_number: i64) {
        self.start_number = start_number;
        self.invalidate();
    }

    pub fn accepts(&self, entry: &FileEntry) -> bool {
        self.extensions.contains(&entry.extension_lowercase())
    }

    pub fn add_paths<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let before = self.entries.len();
        for path in paths {
            let entry = FileEntry::new(path);
            if self.accepts(&entry) {
                self.entries.push(entry);
            }
        }
        let added = self.entries.len() - before;
        if added > 0 {
            self.sort_by_original(SortOrder::Ascending);
            self.next_order[column_slot(SortColumn::Original)] = SortOrder::Descending;
        }
        added
    }

    pub fn insert(&mut self, index: usize, entry: FileEntry) {
        let index = index.min(self.entries.len());
        self.entries.insert(index, entry);
        self.invalidate();
    }

    // Out-of-range indices are ignored.
    pub fn remove(&mut self, indices: &[usize]) -> usize {
        let doomed: BTreeSet<usize> = indices
            .iter()
            .copied()
            .filter(|i| *i < self.entries.len())
            .collect();
        for index in doomed.iter().rev() {
            self.entries.remove(*index);
        }
        if !doomed.is_empty() {
            self.invalidate();
        }
        doomed.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.invalidate();
    }

    pub fn sort_by_original(&mut self, order: SortOrder) {
        self.entries
            .sort_by(|a, b| directed(natural_cmp(&a.file_name(), &b.file_name()), order));
        self.invalidate();
    }

    pub fn sort_by_target(
        &mut self,
        order: SortOrder,
        timestamp: &DateTime<Local>,
    ) -> Result<(), PlanError> {
        let plan = generate_plan(&self.entries, &self.policy, self.start_number, timestamp)?;
        let mut pairs: Vec<(FileEntry, String)> = plan
            .renames
            .into_iter()
            .map(|r| (r.source, r.target_name))
            .collect();
        pairs.sort_by(|a, b| directed(natural_cmp(&a.1, &b.1), order));
        self.entries = pairs.into_iter().map(|(entry, _)| entry).collect();
        self.invalidate();
        Ok(())
    }

    pub fn toggle_sort(
        &mut self,
        column: SortColumn,
        timestamp: &DateTime<Local>,
    ) -> Result<SortOrder, PlanError> {
        if self.entries.is_empty() {
            return Ok(self.next_order[column_slot(column)]);
        }
        let order = self.next_order[column_slot(column)];
        match column {
            SortColumn::Original => self.sort_by_original(order),
            SortColumn::Target => self.sort_by_target(order, timestamp)?,
        }
        self.next_order[column_slot(column)] = order.flipped();
        Ok(order)
    }

    pub fn preview(&mut self, timestamp: &DateTime<Local>) -> Result<&RenamePlan, PlanError> {
        let plan = match self.preview.take() {
            Some((at, plan)) if at == *timestamp => plan,
            _ => generate_plan(&self.entries, &self.policy, self.start_number, timestamp)?,
        };
        Ok(&self.preview.insert((*timestamp, plan)).1)
    }

    // On a partial failure the entries before the failing one are dropped.
    pub fn apply(
        &mut self,
        timestamp: &DateTime<Local>,
        probe: &dyn ExistenceProbe,
        renamer: &mut dyn Renamer,
    ) -> Result<BatchOutcome, BatchError> {
        if self.entries.is_empty() {
            return Err(BatchError::Empty);
        }

        let plan = self.preview(timestamp)?.clone();
        validate_plan(&plan, probe)?;

        match apply_plan(&plan, renamer) {
            Ok(result) => {
                self.clear();
                Ok(BatchOutcome { plan, result })
            }
            Err(err) => {
                self.entries.drain(..err.index());
                self.invalidate();
                Err(err.into())
            }
        }
    }

    fn invalidate(&mut self) {
        self.preview = None;
    }
}

fn column_slot(column: SortColumn) -> usize {
    match column {
        SortColumn::Original => 0,
        SortColumn::Target => 1,
    }
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Ascending => ordering,
        SortOrder::Descending => ordering.reverse(),
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}
