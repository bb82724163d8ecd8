//! Loads the project configuration from `quire.yaml` and resolves every
//! source and output location the build needs.

use crate::util::open;
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file searched for by [`Config::from_directory`].
pub const PROJECT_FILE: &str = "quire.yaml";

/// Selects how stylesheets are compiled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Minified CSS, no source map.
    Production,

    /// Expanded CSS with a source map sibling file.
    #[default]
    Development,
}

#[derive(Deserialize)]
struct PageSize(usize);
impl Default for PageSize {
    fn default() -> Self {
        PageSize(10)
    }
}

#[derive(Deserialize)]
struct Language(String);
impl Default for Language {
    fn default() -> Self {
        Language(String::from("en"))
    }
}

#[derive(Deserialize)]
struct RelPath(PathBuf);

macro_rules! default_path {
    ($name:ident, $value:expr) => {
        fn $name() -> RelPath {
            RelPath(PathBuf::from($value))
        }
    };
}

default_path!(default_posts, "posts");
default_path!(default_templates, "templates");
default_path!(default_styles, "styles");
default_path!(default_public, "public");
default_path!(default_style_entry, "main.scss");

#[derive(Deserialize, Default)]
struct Theme {
    #[serde(default)]
    post: Option<Vec<PathBuf>>,
    #[serde(default)]
    index: Option<Vec<PathBuf>>,
    #[serde(default)]
    category: Option<Vec<PathBuf>>,
}

#[derive(Deserialize)]
struct Project {
    title: String,
    #[serde(default)]
    description: String,
    site_root: String,
    #[serde(default)]
    language: Language,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    page_size: PageSize,

    #[serde(default = "default_posts")]
    posts: RelPath,
    #[serde(default = "default_templates")]
    templates: RelPath,
    #[serde(default = "default_styles")]
    styles: RelPath,
    #[serde(default = "default_public")]
    public: RelPath,
    #[serde(default = "default_style_entry")]
    style_entry: RelPath,

    #[serde(default)]
    theme: Theme,
}

/// The resolved configuration for a single site. All paths are joined onto
/// the project root (sources) or the output directory (outputs).
#[derive(Clone, Debug)]
pub struct Config {
    pub title: String,
    pub description: String,
    pub language: String,
    pub author: Option<String>,

    /// The public base URL of the site. Always ends in `/` so that
    /// [`Url::join`] treats it as a directory.
    pub site_root: Url,

    /// The number of posts per index page.
    pub page_size: usize,

    pub posts_directory: PathBuf,
    pub templates_directory: PathBuf,
    pub styles_directory: PathBuf,
    pub public_directory: PathBuf,

    /// The stylesheet compiled into `styles/main.css`.
    pub style_entry: PathBuf,

    pub post_template: Vec<PathBuf>,
    pub index_template: Vec<PathBuf>,
    pub category_template: Vec<PathBuf>,

    pub output_directory: PathBuf,
}

impl Config {
    /// Looks for [`PROJECT_FILE`] in `dir` and then in each of its ancestors.
    pub fn from_directory(dir: &Path, output_directory: Option<&Path>) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            Config::from_project_file(&path, output_directory)
                .with_context(|| format!("Loading configuration `{}`", path.display()))
        } else {
            match dir.parent() {
                Some(parent) => Config::from_directory(parent, output_directory),
                None => Err(anyhow!(
                    "Could not find `{}` in any parent directory",
                    PROJECT_FILE
                )),
            }
        }
    }

    /// Loads the project file at `path`. When `output_directory` is `None`
    /// the site is written to `_site` beside the project file.
    pub fn from_project_file(path: &Path, output_directory: Option<&Path>) -> Result<Config> {
        let project: Project = serde_yaml::from_reader(open(path, "project")?)?;
        let project_root = path.parent().ok_or_else(|| {
            anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )
        })?;

        if project.page_size.0 == 0 {
            bail!("`page_size` must be greater than zero");
        }

        let mut site_root = project.site_root;
        if !site_root.ends_with('/') {
            site_root.push('/');
        }
        let site_root = Url::parse(&site_root)
            .with_context(|| format!("Parsing `site_root` `{}`", site_root))?;

        let templates_directory = project_root.join(project.templates.0);
        let styles_directory = project_root.join(project.styles.0);
        let theme = |files: Option<Vec<PathBuf>>, default: &str| -> Vec<PathBuf> {
            files
                .unwrap_or_else(|| vec![PathBuf::from(default)])
                .iter()
                .map(|relpath| templates_directory.join(relpath))
                .collect()
        };

        let post_template = theme(project.theme.post, "post.html");
        let index_template = theme(project.theme.index, "index.html");
        let category_template = match project.theme.category {
            Some(files) => theme(Some(files), "index.html"),
            None => index_template.clone(),
        };

        Ok(Config {
            title: project.title,
            description: project.description,
            language: project.language.0,
            author: project.author,
            site_root,
            page_size: project.page_size.0,
            posts_directory: project_root.join(project.posts.0),
            style_entry: styles_directory.join(project.style_entry.0),
            public_directory: project_root.join(project.public.0),
            output_directory: match output_directory {
                Some(dir) => dir.to_owned(),
                None => project_root.join("_site"),
            },
            templates_directory,
            styles_directory,
            post_template,
            index_template,
            category_template,
        })
    }

    /// The compiled stylesheet.
    pub fn style_output(&self) -> PathBuf {
        self.output_directory.join("styles").join("main.css")
    }

    /// The source map written next to the compiled stylesheet in
    /// development mode.
    pub fn style_map_output(&self) -> PathBuf {
        self.output_directory.join("styles").join("main.css.map")
    }

    /// The public URL of the compiled stylesheet.
    pub fn style_url(&self) -> Url {
        self.url("styles/main.css")
    }

    pub fn rss_output(&self) -> PathBuf {
        self.output_directory.join("feed.xml")
    }

    pub fn atom_output(&self) -> PathBuf {
        self.output_directory.join("atom.xml")
    }

    pub fn rss_url(&self) -> Url {
        self.url("feed.xml")
    }

    pub fn atom_url(&self) -> Url {
        self.url("atom.xml")
    }

    pub fn sitemap_output(&self) -> PathBuf {
        self.output_directory.join("sitemap.xml")
    }

    /// Joins a site-relative path onto [`Config::site_root`]. Every caller
    /// passes a relative path without a scheme, which always joins.
    pub fn url(&self, relative: &str) -> Url {
        self.site_root
            .join(relative)
            .unwrap_or_else(|_| self.site_root.clone())
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Writes a minimal project file into `dir` and loads it. The site is
    /// rooted at `https://example.com/` and written to `dir/_site`.
    pub(crate) fn config(dir: &Path) -> Config {
        fs::write(
            dir.join(PROJECT_FILE),
            "title: Test Blog\ndescription: Notes & things\nsite_root: https://example.com/\n",
        )
        .unwrap();
        Config::from_directory(dir, None).unwrap()
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            "title: Hello\nsite_root: https://example.org/blog\n",
        )?;
        let config = Config::from_directory(dir.path(), None)?;

        assert_eq!("https://example.org/blog/", config.site_root.as_str());
        assert_eq!(10, config.page_size);
        assert_eq!("en", config.language);
        assert_eq!(dir.path().join("posts"), config.posts_directory);
        assert_eq!(dir.path().join("styles/main.scss"), config.style_entry);
        assert_eq!(
            vec![dir.path().join("templates/index.html")],
            config.category_template
        );
        assert_eq!(dir.path().join("_site/styles/main.css"), config.style_output());
        assert_eq!(
            "https://example.org/blog/styles/main.css",
            config.style_url().as_str()
        );
        Ok(())
    }

    #[test]
    fn test_search_parent_directories() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            "title: Hello\nsite_root: https://example.org/\npage_size: 3\ntheme:\n  post: [base.html, post.html]\n",
        )?;
        let nested = dir.path().join("posts").join("drafts");
        fs::create_dir_all(&nested)?;

        let config = Config::from_directory(&nested, Some(Path::new("/tmp/out")))?;
        assert_eq!(3, config.page_size);
        assert_eq!(PathBuf::from("/tmp/out"), config.output_directory);
        assert_eq!(
            vec![
                dir.path().join("templates/base.html"),
                dir.path().join("templates/post.html")
            ],
            config.post_template
        );
        Ok(())
    }

    #[test]
    fn test_zero_page_size_rejected() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            "title: Hello\nsite_root: https://example.org/\npage_size: 0\n",
        )?;
        assert!(Config::from_directory(dir.path(), None).is_err());
        Ok(())
    }
}
