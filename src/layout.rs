//! On-disk dataset layout
//!
//! Saved images live at `<root>/images/<split>/<subject_dir>/<prefix>_<NNN>.jpg`
//! and their labels at `<root>/labels/<split>/<subject_dir>/<prefix>_<NNN>.txt`.
//! Indices are never reused: [`DatasetLayout::next_index`] scans what is already
//! on disk so re-runs append instead of overwriting.

use crate::error::{DatasetError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Extension used for every saved dataset image
pub const IMAGE_EXTENSION: &str = "jpg";

/// A car model/trim/year being collected, e.g. "Tesla Cybertruck 2023"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(String);

impl Subject {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Directory name for this subject, case preserved ("Tesla_Cybertruck_2023")
    #[must_use]
    pub fn dir_name(&self) -> String {
        slugify(&self.0)
    }

    /// Filename prefix for this subject, lower-cased ("tesla_cybertruck_2023")
    #[must_use]
    pub fn file_prefix(&self) -> String {
        self.dir_name().to_lowercase()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Subject {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Replace anything that is not safe in a path component with `_`
///
/// Leading dots become `_` too, so `.` and `..` never name a parent or the
/// directory itself and no subject ends up hidden.
fn slugify(name: &str) -> String {
    let mut leading = true;
    let slug: String = name
        .trim()
        .chars()
        .map(|c| {
            let keep = c.is_ascii_alphanumeric() || matches!(c, '-' | '_') || (c == '.' && !leading);
            leading &= c == '.';
            if keep {
                c
            } else {
                '_'
            }
        })
        .collect();
    if slug.is_empty() {
        "_".to_string()
    } else {
        slug
    }
}

/// Dataset split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub const ALL: [Split; 2] = [Split::Train, Split::Val];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Split {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "train" => Ok(Split::Train),
            "val" | "valid" | "validation" => Ok(Split::Val),
            other => Err(DatasetError::invalid_config(format!(
                "Unknown split '{other}'. Expected 'train' or 'val'"
            ))),
        }
    }
}

/// The pair of split directories belonging to one subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitDirs {
    pub train: PathBuf,
    pub val: PathBuf,
}

impl SplitDirs {
    #[must_use]
    pub fn get(&self, split: Split) -> &Path {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
        }
    }
}

/// Manages the class × split partitioning of a dataset root
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    #[must_use]
    pub fn labels_dir(&self) -> PathBuf {
        self.root.join("labels")
    }

    /// `<root>/images/<split>/<subject_dir>`
    #[must_use]
    pub fn image_dir(&self, subject: &Subject, split: Split) -> PathBuf {
        self.images_dir()
            .join(split.as_str())
            .join(subject.dir_name())
    }

    /// `<root>/labels/<split>/<subject_dir>`
    #[must_use]
    pub fn label_dir(&self, subject: &Subject, split: Split) -> PathBuf {
        self.labels_dir()
            .join(split.as_str())
            .join(subject.dir_name())
    }

    /// Create both split directories for a subject. Idempotent.
    pub fn ensure_dirs(&self, subject: &Subject) -> Result<SplitDirs> {
        let train = self.image_dir(subject, Split::Train);
        let val = self.image_dir(subject, Split::Val);
        for dir in [&train, &val] {
            std::fs::create_dir_all(dir)
                .map_err(|e| DatasetError::file_io_error("create split directory", dir, &e))?;
        }
        Ok(SplitDirs { train, val })
    }

    /// Next free index for `prefix_<digits>.jpg` files in `dir`.
    ///
    /// Returns `max(existing) + 1`, or 1 when there are none. Files that do not
    /// match the pattern are ignored; a missing directory counts as empty.
    pub fn next_index(dir: &Path, prefix: &str) -> Result<u32> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(1),
            Err(e) => return Err(DatasetError::file_io_error("scan directory", dir, &e)),
        };

        let mut max_index = 0;
        for entry in entries {
            let entry = entry.map_err(|e| DatasetError::file_io_error("scan directory", dir, &e))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some(index) = parse_index(name, prefix) {
                max_index = max_index.max(index);
            }
        }
        max_index.checked_add(1).ok_or_else(|| DatasetError::IndexExhausted {
            dir: dir.to_path_buf(),
        })
    }

    /// File name for an index, zero-padded to three digits
    #[must_use]
    pub fn entry_file_name(prefix: &str, index: u32) -> String {
        format!("{prefix}_{index:03}.{IMAGE_EXTENSION}")
    }
}

fn parse_index(file_name: &str, prefix: &str) -> Option<u32> {
    let digits = file_name
        .strip_prefix(prefix)?
        .strip_prefix('_')?
        .strip_suffix(IMAGE_EXTENSION)?
        .strip_suffix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_subject_naming() {
        let subject = Subject::new("Tesla Cybertruck 2023");
        assert_eq!(subject.dir_name(), "Tesla_Cybertruck_2023");
        assert_eq!(subject.file_prefix(), "tesla_cybertruck_2023");

        let subject = Subject::new("  Mercedes-AMG GT/S 2015 ");
        assert_eq!(subject.dir_name(), "Mercedes-AMG_GT_S_2015");
    }

    #[test]
    fn test_dot_subjects_stay_inside_split_dir() {
        assert_eq!(Subject::new(".").dir_name(), "_");
        assert_eq!(Subject::new("..").dir_name(), "__");
        assert_eq!(Subject::new(".hidden").dir_name(), "_hidden");
        assert_eq!(Subject::new("Model S P100D 2.0").dir_name(), "Model_S_P100D_2.0");

        let temp = TempDir::new().unwrap();
        let layout = DatasetLayout::new(temp.path());
        for name in [".", ".."] {
            let dirs = layout.ensure_dirs(&Subject::new(name)).unwrap();
            assert_ne!(dirs.train, dirs.val);
            assert_eq!(dirs.train.parent(), Some(layout.images_dir().join("train").as_path()));
            assert_eq!(dirs.val.parent(), Some(layout.images_dir().join("val").as_path()));
        }
    }

    #[test]
    fn test_split_parsing() {
        assert_eq!("train".parse::<Split>().unwrap(), Split::Train);
        assert_eq!("VAL".parse::<Split>().unwrap(), Split::Val);
        assert_eq!("validation".parse::<Split>().unwrap(), Split::Val);
        assert!("test".parse::<Split>().is_err());
    }

    #[test]
    fn test_ensure_dirs_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let layout = DatasetLayout::new(temp.path());
        let subject = Subject::new("Audi R8 2014");

        let first = layout.ensure_dirs(&subject).unwrap();
        let second = layout.ensure_dirs(&subject).unwrap();

        assert_eq!(first, second);
        assert!(first.train.ends_with("images/train/Audi_R8_2014"));
        assert!(first.val.ends_with("images/val/Audi_R8_2014"));
        assert!(first.train.is_dir());
        assert!(first.val.is_dir());
    }

    #[test]
    fn test_next_index_empty_and_missing() {
        let temp = TempDir::new().unwrap();
        assert_eq!(DatasetLayout::next_index(temp.path(), "audi_r8_2014").unwrap(), 1);
        assert_eq!(
            DatasetLayout::next_index(&temp.path().join("missing"), "audi_r8_2014").unwrap(),
            1
        );
    }

    #[test]
    fn test_next_index_ignores_foreign_files() {
        let temp = TempDir::new().unwrap();
        for name in [
            "audi_r8_2014_001.jpg",
            "audi_r8_2014_007.jpg",
            "audi_r8_2014_010.png",
            "audi_r8_2014_abc.jpg",
            "audi_r8_2014_.jpg",
            "bmw_x5_2015_099.jpg",
            "notes.txt",
        ] {
            std::fs::write(temp.path().join(name), b"x").unwrap();
        }

        assert_eq!(DatasetLayout::next_index(temp.path(), "audi_r8_2014").unwrap(), 8);
    }

    #[test]
    fn test_next_index_is_pure() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("f40_003.jpg"), b"x").unwrap();

        let first = DatasetLayout::next_index(temp.path(), "f40").unwrap();
        let second = DatasetLayout::next_index(temp.path(), "f40").unwrap();
        assert_eq!(first, 4);
        assert_eq!(first, second);
    }

    #[test]
    fn test_next_index_exhausted() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(format!("f40_{}.jpg", u32::MAX)), b"x").unwrap();

        let error = DatasetLayout::next_index(temp.path(), "f40").unwrap_err();
        assert!(matches!(error, DatasetError::IndexExhausted { .. }));
    }

    #[test]
    fn test_entry_file_name_padding() {
        assert_eq!(DatasetLayout::entry_file_name("f40", 1), "f40_001.jpg");
        assert_eq!(DatasetLayout::entry_file_name("f40", 42), "f40_042.jpg");
        assert_eq!(DatasetLayout::entry_file_name("f40", 1234), "f40_1234.jpg");
    }
}
