//! Defines the [`Parser`] type, which loads every post source from the
//! posts directory into a sorted list of validated [`Post`]s.
//!
//! Problems with individual sources never fail the build. A source that
//! can't be read or doesn't pass validation is logged and left out; every
//! other source still becomes a post.

use crate::category::Category;
use crate::config::Config;
use crate::frontmatter::{self, FenceError, RawFrontmatter, DEFAULT_CATEGORY};
use crate::markdown;
use crate::post::Post;
use crate::util::is_ignored;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;
use walkdir::WalkDir;

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Parses [`Post`] objects from source files.
pub struct Parser<'a> {
    /// `site_root` is the base URL for post and category URLs. A post's URL
    /// is `{site_root}/posts/{slug}/`.
    site_root: &'a Url,

    /// `posts_directory` is the directory in which post pages will be
    /// rendered, one `{slug}/index.html` per post.
    posts_directory: PathBuf,
}

impl<'a> Parser<'a> {
    pub fn new(config: &'a Config) -> Parser<'a> {
        Parser {
            site_root: &config.site_root,
            posts_directory: config.output_directory.join("posts"),
        }
    }

    /// Searches `source_directory` recursively for post files (extension
    /// `.md` or `.markdown`, dotfiles excluded) and returns the valid ones
    /// sorted by date, most recent first. Posts with the same date keep
    /// the order of their file paths. Each post file must be structured
    /// as follows:
    ///
    /// 1. Initial frontmatter fence (`---`)
    /// 2. YAML frontmatter with fields `title`, `date` and optionally
    ///    `description`, `slug` and `categories`
    /// 3. Terminal frontmatter fence (`---`)
    /// 4. Post body
    ///
    /// For example:
    ///
    /// ```md
    /// ---
    /// title: Hello, world!
    /// date: 2021-04-16
    /// categories: [greetings]
    /// ---
    /// # Hello
    ///
    /// World
    /// ```
    ///
    /// A missing `source_directory` yields no posts. Failing to walk an
    /// existing directory is an error.
    pub fn parse_posts(&self, source_directory: &Path) -> Result<Vec<Post>> {
        if !source_directory.is_dir() {
            warn!(
                "posts directory `{}` does not exist; building an empty blog",
                source_directory.display()
            );
            return Ok(Vec::new());
        }

        let sources = Self::sources(source_directory)?;
        debug!("found {} post sources", sources.len());

        let parsed: Vec<(PathBuf, Result<Post>)> = sources
            .into_par_iter()
            .map(|path| {
                let result = self.parse_post(&path);
                (path, result)
            })
            .collect();

        let mut posts: Vec<Post> = Vec::with_capacity(parsed.len());
        for (path, result) in parsed {
            match result {
                Ok(post) => posts.push(post),
                Err(e) => error!("skipping `{}`: {}", path.display(), e),
            }
        }

        // `sort_by` is stable, so equal dates keep discovery order.
        posts.sort_by(|a, b| b.date.cmp(&a.date));

        let mut slugs: HashSet<String> = HashSet::new();
        posts.retain(|post| {
            let fresh = slugs.insert(post.slug.clone());
            if !fresh {
                error!(
                    "skipping `{}`: slug `{}` is already used by a newer post",
                    post.source.display(),
                    post.slug
                );
            }
            fresh
        });

        Ok(posts)
    }

    /// Lists the post sources under `dir` in file-name order.
    fn sources(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut sources = Vec::new();
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_ignored(entry.path()));
        for result in walker {
            let entry = result?;
            let is_markdown = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| MARKDOWN_EXTENSIONS.contains(&ext));
            if entry.file_type().is_file() && is_markdown {
                sources.push(entry.into_path());
            }
        }
        Ok(sources)
    }

    /// Parses and validates a single source file. Validation warnings are
    /// logged here; validation errors are returned as
    /// [`Error::Invalid`].
    fn parse_post(&self, source: &Path) -> Result<Post> {
        let contents = fs::read_to_string(source).map_err(|err| Error::Read {
            path: source.to_owned(),
            err,
        })?;

        let (yaml, body) = frontmatter::split(&contents)?;
        let raw = RawFrontmatter::parse(yaml)?;
        let validated = frontmatter::validate(raw).map_err(Error::Invalid)?;
        for warning in &validated.warnings {
            warn!("`{}`: {}", source.display(), warning);
        }

        let metadata = validated.metadata;
        let mut categories: Vec<Category> = Vec::with_capacity(metadata.categories.len());
        for label in &metadata.categories {
            match Category::new(label, self.site_root) {
                Some(category) if !categories.contains(&category) => categories.push(category),
                Some(_) => {}
                None => warn!(
                    "`{}`: category `{}` has no URL-safe form; ignoring it",
                    source.display(),
                    label
                ),
            }
        }
        if categories.is_empty() {
            warn!(
                "`{}`: no usable categories; using `{}`",
                source.display(),
                DEFAULT_CATEGORY
            );
            categories.extend(Category::new(DEFAULT_CATEGORY, self.site_root));
        }

        Ok(Post {
            source: source.to_owned(),
            url: self.site_root.join(&format!("posts/{}/", metadata.slug))?,
            file_path: self
                .posts_directory
                .join(&metadata.slug)
                .join("index.html"),
            rendered_content: markdown::to_html(body),
            content: body.to_owned(),
            title: metadata.title,
            date: metadata.date,
            description: metadata.description,
            slug: metadata.slug,
            categories,
        })
    }
}

/// Represents the result of a [`Post`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a [`Post`] object.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when a source file can't be read.
    #[error("reading `{}`: {err}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Returned when a source file has no frontmatter block.
    #[error(transparent)]
    Fence(#[from] FenceError),

    /// Returned when there was an error parsing the frontmatter as YAML.
    #[error("parsing frontmatter: {0}")]
    DeserializeYaml(#[from] serde_yaml::Error),

    /// Returned when the frontmatter fails validation.
    #[error("{}", .0.join("; "))]
    Invalid(Vec<String>),

    /// Returned when there is a problem building post URLs.
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),

    /// Returned for I/O errors while walking the posts directory.
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
}
