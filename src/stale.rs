//! Timestamp-based change detection.
//!
//! An output is stale when at least one of its candidate inputs was
//! modified after it. Missing inputs never force a rebuild; a missing
//! output always does. Nothing is cached, every call reads the filesystem.

use crate::util::is_ignored;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// The modification time of `path`, or the Unix epoch when it can't be
/// read.
fn modified(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Reports whether `output` is older than the newest of `candidates`.
/// Equal timestamps are not stale. With no candidates, only a missing
/// output is stale.
pub fn is_stale<P: AsRef<Path>>(output: &Path, candidates: &[P]) -> bool {
    if !output.exists() {
        return true;
    }
    let output_time = modified(output);
    candidates
        .iter()
        .map(|c| modified(c.as_ref()))
        .max()
        .is_some_and(|newest| newest > output_time)
}

/// Lists the files under `dir` whose extension is one of `extensions`,
/// in file-name order. Dotfiles and editor artefacts are skipped; a
/// missing directory has no files.
pub fn files_with_extensions(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_ignored(entry.path()))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext))
        })
        .map(|entry| entry.into_path())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use std::io::Result;
    use tempfile::TempDir;

    fn touch(path: &Path, seconds: i64) -> Result<()> {
        fs::write(path, "")?;
        set_file_mtime(path, FileTime::from_unix_time(seconds, 0))
    }

    #[test]
    fn test_no_candidates() -> Result<()> {
        let dir = TempDir::new()?;
        let output = dir.path().join("out.css");
        let none: &[PathBuf] = &[];
        assert!(is_stale(&output, none));

        touch(&output, 1_000)?;
        assert!(!is_stale(&output, none));
        Ok(())
    }

    #[test]
    fn test_candidate_times() -> Result<()> {
        let dir = TempDir::new()?;
        let output = dir.path().join("out.css");
        let input = dir.path().join("in.scss");
        touch(&output, 1_000)?;

        touch(&input, 999)?;
        assert!(!is_stale(&output, &[&input]));

        touch(&input, 1_000)?;
        assert!(!is_stale(&output, &[&input]), "ties are not stale");

        touch(&input, 1_001)?;
        assert!(is_stale(&output, &[&input]));
        Ok(())
    }

    #[test]
    fn test_newest_candidate_decides() -> Result<()> {
        let dir = TempDir::new()?;
        let output = dir.path().join("out.css");
        let old = dir.path().join("old.scss");
        let new = dir.path().join("new.scss");
        touch(&output, 1_000)?;
        touch(&old, 10)?;
        touch(&new, 2_000)?;
        assert!(is_stale(&output, &[&old, &new]));
        Ok(())
    }

    #[test]
    fn test_missing_candidate_never_forces_rebuild() -> Result<()> {
        let dir = TempDir::new()?;
        let output = dir.path().join("out.css");
        touch(&output, 1_000)?;
        assert!(!is_stale(&output, &[dir.path().join("gone.scss")]));
        Ok(())
    }

    #[test]
    fn test_files_with_extensions() -> Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir(dir.path().join("partials"))?;
        fs::write(dir.path().join("main.scss"), "")?;
        fs::write(dir.path().join("partials/_a.scss"), "")?;
        fs::write(dir.path().join("notes.txt"), "")?;
        fs::write(dir.path().join(".main.scss.swp"), "")?;

        let files = files_with_extensions(dir.path(), &["scss", "sass", "css"]);
        assert_eq!(
            vec![
                dir.path().join("main.scss"),
                dir.path().join("partials/_a.scss")
            ],
            files
        );
        assert!(files_with_extensions(&dir.path().join("missing"), &["scss"]).is_empty());
        Ok(())
    }
}
