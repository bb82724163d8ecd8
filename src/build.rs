//! Exports [`Site`], which stitches together the high-level steps of a
//! build: compiling the stylesheet ([`crate::style`]) and parsing the posts
//! ([`crate::parser`]) side by side, rendering pages, feeds and the sitemap
//! ([`crate::page`], [`crate::feed`], [`crate::sitemap`]), writing
//! everything in one batch ([`crate::write`]) and finally copying the public
//! assets.
//!
//! At most one build runs at a time. A [`Site::build`] call that finds
//! another build in flight returns [`BuildOutcome::Skipped`] straight away.

use crate::category;
use crate::config::{Config, Mode};
use crate::feed;
use crate::output::BuildOutput;
use crate::page::{Generator, Templates};
use crate::parser::{self, Parser};
use crate::sitemap;
use crate::stale::is_stale;
use crate::style::{self, Grass, StyleCompiler, StyleOutcome};
use crate::template;
use crate::util::is_ignored;
use crate::write::{self, WriteOutcome};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const IDLE: u8 = 0;
const BUILDING: u8 = 1;

/// The in-flight flag. Moves from idle to building with a compare-and-swap,
/// so two callers can never both start a build.
#[derive(Debug, Default)]
pub struct BuildState(AtomicU8);

impl BuildState {
    /// Enters the building state, or returns `None` if a build is already
    /// running. The state returns to idle when the guard is dropped, whether
    /// the build succeeded or not.
    pub fn try_begin(&self) -> Option<BuildGuard<'_>> {
        self.0
            .compare_exchange(IDLE, BUILDING, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BuildGuard(self))
    }

    pub fn is_building(&self) -> bool {
        self.0.load(Ordering::Acquire) == BUILDING
    }
}

/// Holds the building state; see [`BuildState::try_begin`].
#[derive(Debug)]
pub struct BuildGuard<'a>(&'a BuildState);

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.0 .0.store(IDLE, Ordering::Release);
    }
}

/// What the style step did during a build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StyleStatus {
    Compiled,
    Fresh,
    NoSource,
    Failed,
}

/// A summary of one completed build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildReport {
    /// The number of valid posts.
    pub posts: usize,
    pub style: StyleStatus,
    pub writes: WriteOutcome,

    /// The number of public files copied because they were new or changed.
    pub copied: usize,
    pub elapsed: Duration,
}

/// What a call to [`Site::build`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildOutcome {
    Completed(BuildReport),

    /// Another build was already in flight; nothing was done.
    Skipped,
}

/// A site and everything needed to build it.
pub struct Site {
    config: Config,
    mode: Mode,
    compiler: Box<dyn StyleCompiler>,
    state: BuildState,
}

impl Site {
    /// Creates a site that compiles its stylesheet with [`Grass`].
    pub fn new(config: Config, mode: Mode) -> Site {
        Site::with_compiler(config, mode, Box::new(Grass))
    }

    pub fn with_compiler(config: Config, mode: Mode, compiler: Box<dyn StyleCompiler>) -> Site {
        Site {
            config,
            mode,
            compiler,
            state: BuildState::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    /// Runs one full build, unless one is already in flight. Structural
    /// problems (missing templates, unwritable output) fail the build;
    /// problems with individual posts or the stylesheet are only logged.
    pub fn build(&self) -> Result<BuildOutcome> {
        let _guard = match self.state.try_begin() {
            Some(guard) => guard,
            None => {
                debug!("a build is already running; dropping request");
                return Ok(BuildOutcome::Skipped);
            }
        };
        self.run().map(BuildOutcome::Completed)
    }

    fn run(&self) -> Result<BuildReport> {
        let start = Instant::now();
        let config = &self.config;
        info!("building site into `{}`", config.output_directory.display());

        // The stylesheet doesn't depend on the posts, so both steps run
        // side by side.
        let (style, posts) = rayon::join(
            || style::compile_if_needed(config, self.mode, self.compiler.as_ref()),
            || Parser::new(config).parse_posts(&config.posts_directory),
        );
        let posts = posts?;

        let templates = Templates::load(config)?;
        let groups = category::group(&posts);
        let mut outputs = Generator::new(config, &templates).generate(&posts, &groups)?;

        let (feeds, sitemap) = rayon::join(
            || -> feed::Result<(String, String)> {
                Ok((feed::rss(config, &posts)?, feed::atom(config, &posts)?))
            },
            || sitemap::sitemap(config, &posts, &groups),
        );
        let (rss, atom) = feeds?;
        outputs.push(BuildOutput::new(config.rss_output(), rss));
        outputs.push(BuildOutput::new(config.atom_output(), atom));
        outputs.push(BuildOutput::new(config.sitemap_output(), sitemap?));

        let style = match style {
            StyleOutcome::Compiled(style_outputs) => {
                outputs.extend(style_outputs);
                StyleStatus::Compiled
            }
            StyleOutcome::Fresh => StyleStatus::Fresh,
            StyleOutcome::NoSource => StyleStatus::NoSource,
            StyleOutcome::Failed => StyleStatus::Failed,
        };

        let writes = write::write_all(&outputs)?;
        if style == StyleStatus::Compiled && self.mode == Mode::Production {
            match style::remove_source_map(config) {
                Ok(true) => info!("removed development source map"),
                Ok(false) => {}
                Err(e) => warn!("removing development source map: {}", e),
            }
        }
        let copied = copy_public(&config.public_directory, &config.output_directory)?;

        let elapsed = start.elapsed();
        info!(
            "built {} posts in {:.2}s",
            posts.len(),
            elapsed.as_secs_f64()
        );
        Ok(BuildReport {
            posts: posts.len(),
            style,
            writes,
            copied,
            elapsed,
        })
    }
}

/// Copies every file under `src` into `dst`, preserving relative paths. A
/// file is copied only when its destination is missing or older than it. A
/// missing `src` copies nothing.
fn copy_public(src: &Path, dst: &Path) -> Result<usize> {
    if !src.is_dir() {
        return Ok(0);
    }

    let mut copied = 0;
    let walker = WalkDir::new(src)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_ignored(entry.path()));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);
        if !is_stale(&target, &[entry.path()]) {
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::Copy {
                path: parent.to_owned(),
                err,
            })?;
        }
        fs::copy(entry.path(), &target).map_err(|err| Error::Copy {
            path: target.clone(),
            err,
        })?;
        copied += 1;
    }

    if copied > 0 {
        info!("copied {} public files", copied);
    }
    Ok(copied)
}

/// The result of a fallible build.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Every variant aborts the build.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when the posts directory can't be walked.
    #[error("loading posts: {0}")]
    Parse(#[from] parser::Error),

    /// Returned when a template is missing, malformed or fails to execute.
    #[error(transparent)]
    Template(#[from] template::Error),

    /// Returned for errors rendering the feeds.
    #[error(transparent)]
    Feed(#[from] feed::Error),

    /// Returned for errors rendering the sitemap.
    #[error("writing sitemap: {0}")]
    Sitemap(#[from] quick_xml::Error),

    /// Returned for errors writing the output files.
    #[error(transparent)]
    Write(#[from] write::Error),

    /// Returned when a public file can't be copied.
    #[error("copying `{}`: {err}", .path.display())]
    Copy {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Returned when the public directory can't be walked.
    #[error("walking public directory: {0}")]
    WalkDir(#[from] walkdir::Error),
}
