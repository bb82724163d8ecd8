//! The batch writer: writes every [`BuildOutput`] of a build to disk.
//!
//! Writes are independent, so they're issued in parallel. Any failure fails
//! the whole batch; a partially written site is never reported as success.

use crate::output::{BuildOutput, WritePolicy};
use filetime::set_file_mtime;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// What a call to [`write_all`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// There was nothing to write.
    Empty,

    /// Every output was either written or already up to date on disk.
    Wrote { written: usize, unchanged: usize },
}

/// Writes `outputs`, creating parent directories as needed. Outputs with
/// [`WritePolicy::IfChanged`] are skipped when the file already holds the
/// same bytes.
pub fn write_all(outputs: &[BuildOutput]) -> Result<WriteOutcome> {
    if outputs.is_empty() {
        info!("nothing to update");
        return Ok(WriteOutcome::Empty);
    }

    let mut seen_dirs: HashSet<&Path> = HashSet::new();
    for output in outputs {
        if let Some(dir) = output.path.parent() {
            if seen_dirs.insert(dir) {
                fs::create_dir_all(dir).map_err(|err| Error::CreateDir {
                    path: dir.to_owned(),
                    err,
                })?;
            }
        }
    }

    let written: Vec<bool> = outputs
        .par_iter()
        .map(write_one)
        .collect::<Result<Vec<bool>>>()?;
    let written = written.into_iter().filter(|w| *w).count();
    let unchanged = outputs.len() - written;

    info!("wrote {} files ({} unchanged)", written, unchanged);
    Ok(WriteOutcome::Wrote { written, unchanged })
}

/// Writes a single output. Returns false if the write was skipped.
fn write_one(output: &BuildOutput) -> Result<bool> {
    if output.policy == WritePolicy::IfChanged {
        if let Ok(existing) = fs::read(&output.path) {
            if existing == output.contents.as_bytes() {
                return Ok(false);
            }
        }
    }
    fs::write(&output.path, &output.contents).map_err(|err| Error::Write {
        path: output.path.clone(),
        err,
    })?;
    if let Some(time) = output.modified {
        set_file_mtime(&output.path, time).map_err(|err| Error::Write {
            path: output.path.clone(),
            err,
        })?;
    }
    Ok(true)
}

/// The result of a fallible write operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error writing the output files.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when an output directory can't be created.
    #[error("creating directory `{}`: {err}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Returned when an output file can't be written.
    #[error("writing `{}`: {err}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        err: io::Error,
    },
}
