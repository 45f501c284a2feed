use crate::entry::FileEntry;
use crate::template::{render_template, TemplateError, DEFAULT_TEMPLATE};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NamingMode {
    #[default]
    SerialOnly,
    SerialPrefix,
    SerialSuffix,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", content = "template", rename_all = "snake_case")]
pub enum NamingPolicy {
    SerialOnly,
    SerialPrefix,
    SerialSuffix,
    Custom(String),
}

impl NamingPolicy {
    pub fn from_mode(mode: NamingMode, template: &str) -> Self {
        match mode {
            NamingMode::SerialOnly => Self::SerialOnly,
            NamingMode::SerialPrefix => Self::SerialPrefix,
            NamingMode::SerialSuffix => Self::SerialSuffix,
            NamingMode::Custom => Self::Custom(template.to_string()),
        }
    }

    pub fn mode(&self) -> NamingMode {
        match self {
            Self::SerialOnly => NamingMode::SerialOnly,
            Self::SerialPrefix => NamingMode::SerialPrefix,
            Self::SerialSuffix => NamingMode::SerialSuffix,
            Self::Custom(_) => NamingMode::Custom,
        }
    }
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self::from_mode(NamingMode::default(), DEFAULT_TEMPLATE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedRename {
    pub source: FileEntry,
    pub sequence: i64,
    pub target_name: String,
}

impl PlannedRename {
    pub fn target_path(&self) -> PathBuf {
        self.source.directory().join(&self.target_name)
    }

    pub fn changed(&self) -> bool {
        self.target_path() != self.source.path()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RenamePlan {
    pub renames: Vec<PlannedRename>,
}

impl RenamePlan {
    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlannedRename> {
        self.renames.iter()
    }

    pub fn target_names(&self) -> impl Iterator<Item = &str> {
        self.renames.iter().map(|r| r.target_name.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("{index}番目のファイル名を生成できませんでした: {source}")]
    Template {
        index: usize,
        #[source]
        source: TemplateError,
    },
    #[error("{index}番目の連番が範囲外です (開始番号 {start_number})")]
    SequenceOverflow { index: usize, start_number: i64 },
}

impl PlanError {
    pub fn index(&self) -> usize {
        match self {
            Self::Template { index, .. } | Self::SequenceOverflow { index, .. } => *index,
        }
    }
}

pub fn generate_plan(
    entries: &[FileEntry],
    policy: &NamingPolicy,
    start_number: i64,
    timestamp: &DateTime<Local>,
) -> Result<RenamePlan, PlanError> {
    let mut renames = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let sequence = i64::try_from(index)
            .ok()
            .and_then(|offset| start_number.checked_add(offset))
            .ok_or(PlanError::SequenceOverflow {
                index,
                start_number,
            })?;
        let target_name = target_name_for(entry, policy, sequence, timestamp)
            .map_err(|source| PlanError::Template { index, source })?;
        renames.push(PlannedRename {
            source: entry.clone(),
            sequence,
            target_name,
        });
    }

    debug!(
        entries = renames.len(),
        mode = ?policy.mode(),
        start_number,
        "リネーム計画を生成しました"
    );
    Ok(RenamePlan { renames })
}

fn target_name_for(
    entry: &FileEntry,
    policy: &NamingPolicy,
    sequence: i64,
    timestamp: &DateTime<Local>,
) -> Result<String, TemplateError> {
    let root = entry.base_name();
    let ext = entry.extension();

    let name = match policy {
        NamingPolicy::SerialOnly => format!("{sequence}{ext}"),
        NamingPolicy::SerialPrefix => format!("{sequence}_{root}{ext}"),
        NamingPolicy::SerialSuffix => format!("{root}_{sequence}{ext}"),
        NamingPolicy::Custom(template) => {
            let rendered = render_template(template, &root, sequence, timestamp)?;
            format!("{rendered}{ext}")
        }
    };
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn timestamp() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 12, 31, 9, 30, 0)
            .single()
            .expect("unambiguous local time")
    }

    fn entries(paths: &[&str]) -> Vec<FileEntry> {
        paths.iter().map(|p| FileEntry::from(*p)).collect()
    }

    fn names(plan: &RenamePlan) -> Vec<&str> {
        plan.target_names().collect()
    }

    #[test]
    fn serial_only_keeps_extension() {
        let plan = generate_plan(
            &entries(&["dir/b.JPG", "dir/a.png"]),
            &NamingPolicy::SerialOnly,
            1,
            &timestamp(),
        )
        .expect("must plan");
        assert_eq!(names(&plan), vec!["1.JPG", "2.png"]);
    }

    #[test]
    fn serial_prefix_and_suffix() {
        let input = entries(&["x/photo.jpg", "x/clip.mp4"]);
        let prefix = generate_plan(&input, &NamingPolicy::SerialPrefix, 10, &timestamp())
            .expect("must plan");
        assert_eq!(names(&prefix), vec!["10_photo.jpg", "11_clip.mp4"]);

        let suffix = generate_plan(&input, &NamingPolicy::SerialSuffix, 10, &timestamp())
            .expect("must plan");
        assert_eq!(names(&suffix), vec!["photo_10.jpg", "clip_11.mp4"]);
    }

    #[test]
    fn sequence_follows_entry_order_not_natural_order() {
        let input = entries(&["img10.jpg", "img2.jpg", "img1.jpg"]);
        let plan =
            generate_plan(&input, &NamingPolicy::SerialPrefix, -1, &timestamp()).expect("plan");
        let seqs: Vec<i64> = plan.iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![-1, 0, 1]);
        assert_eq!(
            names(&plan),
            vec!["-1_img10.jpg", "0_img2.jpg", "1_img1.jpg"]
        );
    }

    #[test]
    fn plan_length_matches_input_and_preserves_extensions() {
        let input = entries(&["a.tar.gz", "noext", "UPPER.WEBP"]);
        for policy in [
            NamingPolicy::SerialOnly,
            NamingPolicy::SerialPrefix,
            NamingPolicy::SerialSuffix,
        ] {
            let plan = generate_plan(&input, &policy, 0, &timestamp()).expect("plan");
            assert_eq!(plan.len(), input.len());
            for rename in plan.iter() {
                let target = FileEntry::new(rename.target_path());
                assert_eq!(target.extension(), rename.source.extension());
            }
        }
    }

    #[test]
    fn custom_template_appends_extension_after_rendering() {
        let policy = NamingPolicy::Custom("{filename}_{num:03d}_{date:%Y-%m-%d}".to_string());
        let plan = generate_plan(&entries(&["pics/photo.jpg"]), &policy, 7, &timestamp())
            .expect("plan");
        assert_eq!(names(&plan), vec!["photo_007_2024-12-31.jpg"]);
        assert_eq!(
            plan.renames[0].target_path(),
            PathBuf::from("pics/photo_007_2024-12-31.jpg")
        );
    }

    #[test]
    fn literal_template_renders_itself_plus_extension() {
        let policy = NamingPolicy::Custom("cover".to_string());
        let plan = generate_plan(&entries(&["a.png"]), &policy, 1, &timestamp()).expect("plan");
        assert_eq!(names(&plan), vec!["cover.png"]);
    }

    #[test]
    fn template_error_fails_whole_plan_with_index() {
        let policy = NamingPolicy::Custom("{num:zz}".to_string());
        let err = generate_plan(&entries(&["a.png", "b.png"]), &policy, 1, &timestamp())
            .expect_err("must fail");
        assert_eq!(err.index(), 0);
        assert_eq!(
            err,
            PlanError::Template {
                index: 0,
                source: TemplateError::InvalidNumberFormat("zz".to_string()),
            }
        );
    }

    #[test]
    fn sequence_past_i64_max_is_an_error() {
        let input = entries(&["a.jpg", "b.jpg"]);
        let err = generate_plan(&input, &NamingPolicy::SerialOnly, i64::MAX, &timestamp())
            .expect_err("must fail");
        assert_eq!(
            err,
            PlanError::SequenceOverflow {
                index: 1,
                start_number: i64::MAX,
            }
        );

        let plan = generate_plan(&input[..1], &NamingPolicy::SerialOnly, i64::MAX, &timestamp())
            .expect("last representable number still plans");
        assert_eq!(names(&plan), vec![format!("{}.jpg", i64::MAX)]);
    }

    #[test]
    fn empty_batch_yields_empty_plan() {
        let plan = generate_plan(&[], &NamingPolicy::SerialOnly, 1, &timestamp()).expect("plan");
        assert!(plan.is_empty());
    }

    #[test]
    fn unchanged_target_is_detected() {
        let plan = generate_plan(
            &entries(&["dir/1.jpg", "dir/x.jpg"]),
            &NamingPolicy::SerialOnly,
            1,
            &timestamp(),
        )
        .expect("plan");
        assert!(!plan.renames[0].changed());
        assert!(plan.renames[1].changed());
    }

    #[test]
    fn policy_round_trips_from_mode() {
        let policy = NamingPolicy::from_mode(NamingMode::Custom, "{num}");
        assert_eq!(policy, NamingPolicy::Custom("{num}".to_string()));
        assert_eq!(policy.mode(), NamingMode::Custom);
        assert_eq!(NamingPolicy::default(), NamingPolicy::SerialOnly);
    }

    #[test]
    fn plan_serializes_for_preview_output() {
        let plan = generate_plan(&entries(&["d/a.jpg"]), &NamingPolicy::SerialOnly, 1, &timestamp())
            .expect("plan");
        let json = serde_json::to_value(&plan).expect("serialize");
        assert_eq!(json["renames"][0]["source"], "d/a.jpg");
        assert_eq!(json["renames"][0]["target_name"], "1.jpg");
    }
}
