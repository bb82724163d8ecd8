//! Defines [`BuildOutput`], a file the build intends to write.

use filetime::FileTime;
use std::path::PathBuf;

/// Decides whether the batch writer may skip an output whose file already
/// holds the same bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WritePolicy {
    /// Skip the write when the file on disk is byte-identical.
    IfChanged,

    /// Always write. Used for outputs whose freshness is judged by
    /// timestamp.
    Always,
}

/// A pairing of an output path and the exact text to write there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildOutput {
    pub path: PathBuf,
    pub contents: String,
    pub policy: WritePolicy,

    /// The modification time to stamp on the file after writing it. When
    /// unset the file keeps the time of the write.
    pub modified: Option<FileTime>,
}

impl BuildOutput {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> BuildOutput {
        BuildOutput {
            path: path.into(),
            contents: contents.into(),
            policy: WritePolicy::IfChanged,
            modified: None,
        }
    }

    /// Marks the output to be written even when unchanged.
    pub fn always(mut self) -> BuildOutput {
        self.policy = WritePolicy::Always;
        self
    }

    /// Stamps the written file with `time` instead of the time of the write.
    pub fn modified_at(mut self, time: FileTime) -> BuildOutput {
        self.modified = Some(time);
        self
    }
}
