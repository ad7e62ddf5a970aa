//! Generated-file promotion.
//!
//! Each execution gets a private scratch directory (exposed to the
//! script as `GENERATED_FILES`). On success or warn the scratch tree is
//! copied wholesale into the runbook's output directory; on failure the
//! scratch directory is simply dropped.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A promoted file, reported to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedFile {
    /// Path relative to the output directory, forward slashes.
    pub path: String,
    pub size: u64,
}

/// Copies every file under `scratch_dir` into `output_dir`, preserving
/// relative layout and permissions. Returns the promoted files; empty
/// when the script wrote nothing.
pub fn promote_generated_files(
    scratch_dir: &Path,
    output_dir: &Path,
) -> io::Result<Vec<CapturedFile>> {
    let mut entries = std::fs::read_dir(scratch_dir)?;
    if entries.next().is_none() {
        return Ok(Vec::new());
    }

    std::fs::create_dir_all(output_dir)?;
    let mut captured = Vec::new();
    copy_tree(scratch_dir, output_dir, Path::new(""), &mut captured)?;
    Ok(captured)
}

fn copy_tree(
    src_root: &Path,
    dst_root: &Path,
    rel: &Path,
    captured: &mut Vec<CapturedFile>,
) -> io::Result<()> {
    for entry in std::fs::read_dir(src_root.join(rel))? {
        let entry = entry?;
        let entry_rel = rel.join(entry.file_name());
        let meta = entry.metadata()?;

        if meta.is_dir() {
            let dst = dst_root.join(&entry_rel);
            std::fs::create_dir_all(&dst)?;
            std::fs::set_permissions(&dst, meta.permissions())?;
            copy_tree(src_root, dst_root, &entry_rel, captured)?;
        } else {
            let dst = dst_root.join(&entry_rel);
            if let Some(parent) = dst.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &dst)?;
            captured.push(CapturedFile {
                path: entry_rel.to_string_lossy().replace('\\', "/"),
                size: meta.len(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scratch_promotes_nothing() {
        let scratch = tempfile::tempdir().expect("scratch");
        let output = tempfile::tempdir().expect("output");
        let files =
            promote_generated_files(scratch.path(), output.path()).expect("promote");
        assert!(files.is_empty());
    }

    #[test]
    fn promotes_nested_tree_with_relative_paths() {
        let scratch = tempfile::tempdir().expect("scratch");
        let output = tempfile::tempdir().expect("output");

        std::fs::write(scratch.path().join("top.txt"), "hello").expect("write");
        std::fs::create_dir(scratch.path().join("sub")).expect("mkdir");
        std::fs::write(scratch.path().join("sub/inner.txt"), "world!").expect("write");

        let mut files =
            promote_generated_files(scratch.path(), output.path()).expect("promote");
        files.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(
            files,
            vec![
                CapturedFile {
                    path: "sub/inner.txt".to_string(),
                    size: 6
                },
                CapturedFile {
                    path: "top.txt".to_string(),
                    size: 5
                },
            ]
        );
        assert_eq!(
            std::fs::read_to_string(output.path().join("sub/inner.txt")).expect("read"),
            "world!"
        );
    }

    #[test]
    fn creates_missing_output_directory() {
        let scratch = tempfile::tempdir().expect("scratch");
        let base = tempfile::tempdir().expect("base");
        let output = base.path().join("not/yet/here");

        std::fs::write(scratch.path().join("f"), "x").expect("write");
        let files = promote_generated_files(scratch.path(), &output).expect("promote");
        assert_eq!(files.len(), 1);
        assert!(output.join("f").exists());
    }
}
