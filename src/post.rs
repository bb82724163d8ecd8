//! Defines the [`Post`] type and its conversions into template values. See
//! [`crate::parser`] for how posts are loaded from disk.

use crate::category::Category;
use crate::template::{markup, text};
use crate::value::url_value;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use gtmpl::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use url::Url;

/// A validated post. Posts are built once per build from a single source
/// file and never change afterwards.
#[derive(Clone, Debug)]
pub struct Post {
    /// The source file the post was parsed from.
    pub source: PathBuf,

    pub title: String,
    pub date: NaiveDate,
    pub description: String,

    /// The URL-safe identifier. The post page lives at
    /// `{site_root}/posts/{slug}/`.
    pub slug: String,

    pub categories: Vec<Category>,

    /// The raw Markdown body.
    pub content: String,

    /// The body rendered to HTML.
    pub rendered_content: String,

    /// The canonical URL of the post page.
    pub url: Url,

    /// The output file for the post page.
    pub file_path: PathBuf,
}

impl Post {
    /// The post date at midnight UTC, for feeds.
    pub fn published(&self) -> DateTime<Utc> {
        midnight(self.date)
    }

    /// Converts the post into a template [`Value`] holding the full rendered
    /// body. Every text field is escaped; `body` is inserted verbatim.
    pub fn to_value(&self) -> Value {
        let mut m = self.fields();
        m.insert("body".to_owned(), markup(&self.rendered_content));
        Value::Object(m)
    }

    /// Converts the post into a template [`Value`] for index pages. Same as
    /// [`Post::to_value`] but without the body.
    pub fn summarize(&self) -> Value {
        Value::Object(self.fields())
    }

    fn fields(&self) -> HashMap<String, Value> {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), text(&self.title));
        m.insert("date".to_owned(), text(&self.date.format("%Y-%m-%d").to_string()));
        m.insert(
            "display_date".to_owned(),
            text(&self.date.format("%B %-d, %Y").to_string()),
        );
        m.insert("description".to_owned(), text(&self.description));
        m.insert("slug".to_owned(), text(&self.slug));
        m.insert("url".to_owned(), url_value(&self.url));
        m.insert(
            "categories".to_owned(),
            Value::Array(self.categories.iter().map(Value::from).collect()),
        );
        m
    }
}

/// Returns `date` at midnight UTC.
pub fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc()
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// Builds a post with the given slug, date and category labels, rooted
    /// at `https://example.org/`.
    pub(crate) fn post(slug: &str, date: &str, categories: &[&str]) -> Post {
        let root = Url::parse("https://example.org/").unwrap();
        Post {
            source: PathBuf::from(format!("posts/{}.md", slug)),
            title: format!("Title {}", slug),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            description: format!("About {}", slug),
            slug: slug.to_owned(),
            categories: categories
                .iter()
                .filter_map(|c| Category::new(c, &root))
                .collect(),
            content: String::from("Body"),
            rendered_content: String::from("<p>Body</p>\n"),
            url: root.join(&format!("posts/{}/", slug)).unwrap(),
            file_path: PathBuf::from(format!("out/posts/{}/index.html", slug)),
        }
    }

    fn field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
        match value {
            Value::Object(m) => match m.get(key) {
                Some(Value::String(s)) => Some(s.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    #[test]
    fn test_to_value_escapes_text_but_not_body() {
        let mut p = post("a", "2025-01-02", &["Rust"]);
        p.title = String::from("Fish & <Chips>");
        p.rendered_content = String::from("<p>raw</p>");

        let value = p.to_value();
        assert_eq!(Some("Fish &amp; &lt;Chips&gt;"), field(&value, "title"));
        assert_eq!(Some("<p>raw</p>"), field(&value, "body"));
        assert_eq!(Some("January 2, 2025"), field(&value, "display_date"));
        assert_eq!(Some("https://example.org/posts/a/"), field(&value, "url"));
    }

    #[test]
    fn test_summarize_has_no_body() {
        let value = post("a", "2025-01-02", &[]).summarize();
        assert_eq!(None, field(&value, "body"));
        assert_eq!(Some("Title a"), field(&value, "title"));
    }

    #[test]
    fn test_published() {
        let p = post("a", "2025-01-02", &[]);
        assert_eq!("Thu, 2 Jan 2025 00:00:00 +0000", p.published().to_rfc2822());
    }
}
