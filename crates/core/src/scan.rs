use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub scanned_files: usize,
    pub matched_files: usize,
    pub skipped_unsupported: usize,
    pub skipped_hidden: usize,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub recursive: bool,
    pub include_hidden: bool,
    pub extensions: Vec<String>,
}

// Results come back in directory-walk order; callers sort them.
pub fn collect_files(root: &Path, options: &ScanOptions) -> Result<(Vec<PathBuf>, ScanStats)> {
    if !root.is_dir() {
        anyhow::bail!("フォルダが存在しません: {}", root.display());
    }

    let extensions: HashSet<String> = options
        .extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect();
    let mut stats = ScanStats::default();
    let mut out = Vec::new();

    let mut visit = |path: &Path, stats: &mut ScanStats| {
        stats.scanned_files += 1;
        if is_hidden(path) && !options.include_hidden {
            stats.skipped_hidden += 1;
            return;
        }
        if has_extension(path, &extensions) {
            stats.matched_files += 1;
            out.push(path.to_path_buf());
        } else {
            stats.skipped_unsupported += 1;
        }
    };

    if options.recursive {
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || options.include_hidden || !is_hidden(e.path()));
        for entry in walker {
            let entry =
                entry.with_context(|| format!("フォルダ走査に失敗しました: {}", root.display()))?;
            if entry.file_type().is_dir() {
                continue;
            }
            visit(entry.path(), &mut stats);
        }
    } else {
        let mut paths = Vec::new();
        for entry in fs::read_dir(root)
            .with_context(|| format!("フォルダを読めませんでした: {}", root.display()))?
        {
            let entry =
                entry.with_context(|| format!("エントリ読み取り失敗: {}", root.display()))?;
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            paths.push(path);
        }
        paths.sort();
        for path in &paths {
            visit(path, &mut stats);
        }
    }

    Ok((out, stats))
}

fn has_extension(path: &Path, extensions: &HashSet<String>) -> bool {
    path.extension()
        .map(|ext| extensions.contains(&ext.to_string_lossy().to_lowercase()))
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn options(recursive: bool, include_hidden: bool) -> ScanOptions {
        ScanOptions {
            recursive,
            include_hidden,
            extensions: vec![".jpg".to_string(), "PNG".to_string()],
        }
    }

    #[test]
    fn flat_scan_filters_extensions_and_hidden_files() {
        let temp = tempdir().expect("tempdir");
        for name in ["b.JPG", "a.png", "notes.txt", ".secret.jpg"] {
            fs::write(temp.path().join(name), b"x").expect("write");
        }
        fs::create_dir_all(temp.path().join("nested")).expect("mkdir");
        fs::write(temp.path().join("nested").join("c.jpg"), b"x").expect("write nested");

        let (files, stats) = collect_files(temp.path(), &options(false, false)).expect("scan");
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["a.png", "b.JPG"]);
        assert_eq!(
            stats,
            ScanStats {
                scanned_files: 4,
                matched_files: 2,
                skipped_unsupported: 1,
                skipped_hidden: 1,
            }
        );
    }

    #[test]
    fn recursive_scan_descends_into_subfolders() {
        let temp = tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("nested")).expect("mkdir");
        fs::create_dir_all(temp.path().join(".cache")).expect("mkdir hidden");
        fs::write(temp.path().join("a.jpg"), b"x").expect("write");
        fs::write(temp.path().join("nested").join("c.jpg"), b"x").expect("write nested");
        fs::write(temp.path().join(".cache").join("d.jpg"), b"x").expect("write hidden");

        let (files, _) = collect_files(temp.path(), &options(true, false)).expect("scan");
        assert_eq!(
            files,
            vec![temp.path().join("a.jpg"), temp.path().join("nested").join("c.jpg")]
        );

        let (files, _) = collect_files(temp.path(), &options(true, true)).expect("scan");
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn missing_root_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let err = collect_files(&temp.path().join("nope"), &options(false, false))
            .expect_err("must fail");
        assert!(err.to_string().contains("フォルダが存在しません"));
    }
}
