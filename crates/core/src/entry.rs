use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileEntry {
    path: PathBuf,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    // `.profile` has no extension, so the whole name is the base name.
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|v| format!(".{}", v.to_string_lossy()))
            .unwrap_or_default()
    }

    pub fn extension_lowercase(&self) -> String {
        self.extension().to_lowercase()
    }

    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

impl From<PathBuf> for FileEntry {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for FileEntry {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<&str> for FileEntry {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

#[cfg(test)]
mod tests {
    use super::FileEntry;
    use std::path::Path;

    #[test]
    fn splits_base_name_and_extension() {
        let entry = FileEntry::new("/photos/IMG_0001.JPG");
        assert_eq!(entry.base_name(), "IMG_0001");
        assert_eq!(entry.extension(), ".JPG");
        assert_eq!(entry.extension_lowercase(), ".jpg");
        assert_eq!(entry.directory(), Path::new("/photos"));
    }

    #[test]
    fn only_last_extension_is_split_off() {
        let entry = FileEntry::new("archive.tar.gz");
        assert_eq!(entry.base_name(), "archive.tar");
        assert_eq!(entry.extension(), ".gz");
        assert_eq!(entry.directory(), Path::new(""));
    }

    #[test]
    fn dotfile_has_no_extension() {
        let entry = FileEntry::new("dir/.profile");
        assert_eq!(entry.base_name(), ".profile");
        assert_eq!(entry.extension(), "");
    }
}
