//! Label tree utilities: flattening and class distribution

use crate::error::{DatasetError, Result};
use crate::layout::Split;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Counts from a flatten run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlattenSummary {
    pub copied: usize,
    /// Copies that replaced a file of the same name from another class
    pub overwritten: usize,
}

/// Copy `labels_root/<split>/<class>/*` into `output_root/<split>/`.
///
/// Splits without an input directory are skipped. Files sitting directly in a
/// split directory (not inside a class directory) are ignored.
pub fn flatten_labels(labels_root: &Path, output_root: &Path) -> Result<FlattenSummary> {
    let mut summary = FlattenSummary::default();

    for split in Split::ALL {
        let split_output = output_root.join(split.as_str());
        std::fs::create_dir_all(&split_output)
            .map_err(|e| DatasetError::file_io_error("create output directory", &split_output, &e))?;

        let split_input = labels_root.join(split.as_str());
        if !split_input.is_dir() {
            warn!(dir = %split_input.display(), "Split directory missing, skipping");
            continue;
        }

        let mut class_dirs: Vec<_> = std::fs::read_dir(&split_input)
            .map_err(|e| DatasetError::file_io_error("list split directory", &split_input, &e))?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        class_dirs.sort();

        let mut seen = std::collections::HashSet::new();
        for class_dir in class_dirs {
            let mut files: Vec<_> = std::fs::read_dir(&class_dir)
                .map_err(|e| DatasetError::file_io_error("list class directory", &class_dir, &e))?
                .filter_map(std::result::Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.is_file())
                .collect();
            files.sort();

            for src in files {
                let Some(file_name) = src.file_name() else {
                    continue;
                };
                let dst = split_output.join(file_name);
                if !seen.insert(file_name.to_os_string()) {
                    warn!(file = %dst.display(), "Label name collision, overwriting");
                    summary.overwritten += 1;
                }
                std::fs::copy(&src, &dst)
                    .map_err(|e| DatasetError::file_io_error("copy label file", &src, &e))?;
                summary.copied += 1;
            }
        }
    }

    info!(copied = summary.copied, "✅ Labels successfully flattened");
    Ok(summary)
}

/// Count label lines per class id across every `.txt` file under `dir`
///
/// # Errors
/// - A label line whose first token is not a class id
pub fn class_distribution(dir: &Path) -> Result<BTreeMap<u32, usize>> {
    let mut counts = BTreeMap::new();
    if !dir.exists() {
        return Ok(counts);
    }

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk failed"));
            DatasetError::file_io_error("walk label directory", path, &io)
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| DatasetError::file_io_error("read label file", path, &e))?;
        for (line_idx, line) in content.lines().enumerate() {
            let Some(token) = line.split_whitespace().next() else {
                continue;
            };
            let class_id: u32 = token.parse().map_err(|_| DatasetError::LabelParse {
                path: path.to_path_buf(),
                line: line_idx + 1,
                message: format!("invalid class id '{token}'"),
            })?;
            *counts.entry(class_id).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_flatten_labels() {
        let temp = TempDir::new().unwrap();
        let labels = temp.path().join("labels");
        let output = temp.path().join("labels_flat");
        write(&labels.join("train/Audi_R8_2014/audi_r8_2014_001.txt"), "0 0.5 0.5 0.1 0.1\n");
        write(&labels.join("train/F40/f40_001.txt"), "1 0.5 0.5 0.1 0.1\n");
        write(&labels.join("val/F40/f40_002.txt"), "");
        write(&labels.join("train/stray.txt"), "ignored");

        let summary = flatten_labels(&labels, &output).unwrap();

        assert_eq!(summary.copied, 3);
        assert_eq!(summary.overwritten, 0);
        assert!(output.join("train/audi_r8_2014_001.txt").exists());
        assert!(output.join("train/f40_001.txt").exists());
        assert!(output.join("val/f40_002.txt").exists());
        assert!(!output.join("train/stray.txt").exists());
    }

    #[test]
    fn test_flatten_collision_and_missing_split() {
        let temp = TempDir::new().unwrap();
        let labels = temp.path().join("labels");
        let output = temp.path().join("flat");
        write(&labels.join("train/A/same.txt"), "0 0 0 0 0\n");
        write(&labels.join("train/B/same.txt"), "1 0 0 0 0\n");

        let summary = flatten_labels(&labels, &output).unwrap();

        assert_eq!(summary.copied, 2);
        assert_eq!(summary.overwritten, 1);
        assert_eq!(
            std::fs::read_to_string(output.join("train/same.txt")).unwrap(),
            "1 0 0 0 0\n"
        );
        assert!(output.join("val").is_dir());
    }

    #[test]
    fn test_class_distribution() {
        let temp = TempDir::new().unwrap();
        let train = temp.path().join("train");
        write(&train.join("A/a_001.txt"), "0 0.1 0.1 0.1 0.1\n0 0.2 0.2 0.1 0.1\n\n");
        write(&train.join("B/b_001.txt"), "3 0.1 0.1 0.1 0.1\n   \n");
        write(&train.join("B/notes.md"), "9 not counted\n");

        let counts = class_distribution(&train).unwrap();

        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&0], 2);
        assert_eq!(counts[&3], 1);
    }

    #[test]
    fn test_class_distribution_rejects_bad_class() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("bad.txt"), "0 0.1 0.1 0.1 0.1\ncar 0.1 0.1 0.1 0.1\n");

        let error = class_distribution(temp.path()).unwrap_err();

        match error {
            DatasetError::LabelParse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_class_distribution_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert!(class_distribution(&temp.path().join("missing")).unwrap().is_empty());
    }
}
