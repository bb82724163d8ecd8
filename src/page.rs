//! Generates the HTML pages of the site: one page per post, the paginated
//! main index and one paginated index per category.
//!
//! Generation is pure. Pages are returned as [`BuildOutput`]s and written
//! later by [`crate::write::write_all`].

use crate::category::CategoryGroup;
use crate::config::Config;
use crate::output::BuildOutput;
use crate::pagination::{paginate, Page};
use crate::post::Post;
use crate::template::{self, escape, markup, text, Template};
use crate::value::url_value;
use gtmpl::Value;
use std::collections::HashMap;
use std::fmt::Write as _;

/// The parsed templates for every page kind.
pub struct Templates {
    pub post: Template,
    pub index: Template,
    pub category: Template,
}

impl Templates {
    /// Loads the templates named in `config`. Missing or malformed templates
    /// are fatal.
    pub fn load(config: &Config) -> template::Result<Templates> {
        Ok(Templates {
            post: Template::load(&config.post_template)?,
            index: Template::load(&config.index_template)?,
            category: Template::load(&config.category_template)?,
        })
    }
}

/// Renders pages from posts and templates.
pub struct Generator<'a> {
    config: &'a Config,
    templates: &'a Templates,

    /// The `site` object shared by every page.
    site: Value,
}

impl<'a> Generator<'a> {
    pub fn new(config: &'a Config, templates: &'a Templates) -> Generator<'a> {
        Generator {
            config,
            templates,
            site: site_value(config),
        }
    }

    /// Renders every page: posts, the main index and the category indices.
    /// `posts` must be sorted newest first and `groups` derived from them.
    pub fn generate(
        &self,
        posts: &[Post],
        groups: &[CategoryGroup],
    ) -> template::Result<Vec<BuildOutput>> {
        let mut outputs = self.post_pages(posts)?;
        outputs.extend(self.index_pages(posts, groups)?);
        outputs.extend(self.category_pages(groups)?);
        Ok(outputs)
    }

    /// Renders one page per post. `prev` links to the newer neighbour and
    /// `next` to the older one.
    pub fn post_pages(&self, posts: &[Post]) -> template::Result<Vec<BuildOutput>> {
        let option_to_value = |post: Option<&Post>| match post {
            Some(post) => url_value(&post.url),
            None => Value::Nil,
        };

        posts
            .iter()
            .enumerate()
            .map(|(i, post)| {
                let mut m: HashMap<String, Value> = HashMap::new();
                m.insert("site".to_owned(), self.site.clone());
                m.insert("post".to_owned(), post.to_value());
                m.insert("seo".to_owned(), markup(&seo(self.config, post)));
                m.insert(
                    "prev".to_owned(),
                    option_to_value(i.checked_sub(1).and_then(|j| posts.get(j))),
                );
                m.insert("next".to_owned(), option_to_value(posts.get(i + 1)));

                let html = self.templates.post.render(Value::Object(m))?;
                Ok(BuildOutput::new(post.file_path.clone(), html))
            })
            .collect()
    }

    /// Renders the main index. Page 1 is the site root; an empty blog still
    /// gets one index page.
    pub fn index_pages(
        &self,
        posts: &[Post],
        groups: &[CategoryGroup],
    ) -> template::Result<Vec<BuildOutput>> {
        let pages = paginate(
            posts,
            self.config.page_size,
            &self.config.site_root,
            &self.config.output_directory,
        );
        pages
            .iter()
            .map(|page| {
                let summaries = page.items.iter().map(Post::summarize).collect();
                self.index_page(&self.templates.index, page, summaries, None, groups)
            })
            .collect()
    }

    /// Renders the paginated index of every category, rooted at
    /// `categories/{slug}/`.
    pub fn category_pages(&self, groups: &[CategoryGroup]) -> template::Result<Vec<BuildOutput>> {
        let mut outputs = Vec::new();
        for group in groups {
            let directory = self
                .config
                .output_directory
                .join("categories")
                .join(&group.category.slug);
            let pages = paginate(
                &group.posts,
                self.config.page_size,
                &group.category.url,
                &directory,
            );
            for page in &pages {
                let summaries = page.items.iter().map(|p| p.summarize()).collect();
                outputs.push(self.index_page(
                    &self.templates.category,
                    page,
                    summaries,
                    Some(group),
                    groups,
                )?);
            }
        }
        Ok(outputs)
    }

    fn index_page<T>(
        &self,
        template: &Template,
        page: &Page<T>,
        summaries: Vec<Value>,
        category: Option<&CategoryGroup>,
        groups: &[CategoryGroup],
    ) -> template::Result<BuildOutput> {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("site".to_owned(), self.site.clone());
        m.insert("posts".to_owned(), Value::Array(summaries));
        m.insert("pagination".to_owned(), (&page.pagination).into());
        m.insert(
            "category".to_owned(),
            match category {
                Some(group) => group.into(),
                None => Value::Nil,
            },
        );
        m.insert(
            "categories".to_owned(),
            Value::Array(groups.iter().map(Value::from).collect()),
        );

        let html = template.render(Value::Object(m))?;
        Ok(BuildOutput::new(page.file_path.clone(), html))
    }
}

/// The `site` object: title, description, root, language, author and the
/// URLs of the stylesheet and feeds.
fn site_value(config: &Config) -> Value {
    let mut m: HashMap<String, Value> = HashMap::new();
    m.insert("title".to_owned(), text(&config.title));
    m.insert("description".to_owned(), text(&config.description));
    m.insert("root".to_owned(), url_value(&config.site_root));
    m.insert("language".to_owned(), text(&config.language));
    m.insert(
        "author".to_owned(),
        match &config.author {
            Some(author) => text(author),
            None => Value::Nil,
        },
    );
    m.insert("styles".to_owned(), url_value(&config.style_url()));
    m.insert("rss".to_owned(), url_value(&config.rss_url()));
    m.insert("atom".to_owned(), url_value(&config.atom_url()));
    Value::Object(m)
}

/// Builds the `<meta>` block for a post page: description, canonical link,
/// Open Graph and Twitter card tags, and the publication time.
fn seo(config: &Config, post: &Post) -> String {
    let mut out = String::new();
    let mut meta = |attr: &str, key: &str, value: &str| {
        let _ = writeln!(
            out,
            "<meta {}=\"{}\" content=\"{}\">",
            attr,
            key,
            escape(value)
        );
    };

    meta("name", "description", &post.description);
    meta("property", "og:type", "article");
    meta("property", "og:title", &post.title);
    meta("property", "og:description", &post.description);
    meta("property", "og:url", post.url.as_str());
    meta("property", "og:site_name", &config.title);
    meta("property", "og:locale", &config.language);
    meta(
        "property",
        "article:published_time",
        &post.published().to_rfc3339(),
    );
    for category in &post.categories {
        meta("property", "article:tag", &category.name);
    }
    if let Some(author) = &config.author {
        meta("name", "author", author);
    }
    meta("name", "twitter:card", "summary");
    meta("name", "twitter:title", &post.title);
    meta("name", "twitter:description", &post.description);

    let _ = writeln!(
        out,
        "<link rel=\"canonical\" href=\"{}\">",
        escape(post.url.as_str())
    );
    out
}
