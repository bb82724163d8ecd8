//! Support for creating RSS 2.0 and Atom 1.0 feeds from a list of posts.
//!
//! Both feeds carry the [`FEED_SIZE`] most recent posts. Feed-level
//! timestamps come from the newest post rather than the clock, so that
//! rebuilding unchanged sources yields identical feeds.

use crate::config::Config;
use crate::post::{midnight, Post};
use atom_syndication::{
    Category as AtomCategory, Content, Entry, Error as AtomError, Feed, FixedDateTime, Generator,
    Link, Person, Text,
};
use chrono::{DateTime, Utc};
use rss::extension::atom::AtomExtension;
use rss::validation::Validate;
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder};
use std::string::FromUtf8Error;
use thiserror::Error;

/// The number of posts included in each feed.
pub const FEED_SIZE: usize = 10;

/// The name advertised as the feed generator.
const GENERATOR: &str = "quire";

/// Minutes a reader may cache the RSS feed.
const TTL_MINUTES: &str = "60";

/// The timestamp feeds report as their last update: the newest post's date,
/// or the Unix epoch for an empty blog. `posts` must be sorted newest first.
pub fn updated(posts: &[Post]) -> DateTime<Utc> {
    posts
        .first()
        .map(Post::published)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn recent(posts: &[Post]) -> &[Post] {
    &posts[..posts.len().min(FEED_SIZE)]
}

/// Formats `time` as an HTTP-date, e.g. `Thu, 02 Jan 2025 00:00:00 GMT`.
fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Renders the RSS 2.0 document for `posts`.
pub fn rss(config: &Config, posts: &[Post]) -> Result<String> {
    let items: Vec<rss::Item> = recent(posts)
        .iter()
        .map(|post| {
            ItemBuilder::default()
                .title(post.title.clone())
                .link(post.url.to_string())
                .description(post.description.clone())
                .guid(
                    GuidBuilder::default()
                        .permalink(true)
                        .value(post.url.to_string())
                        .build(),
                )
                .pub_date(http_date(post.published()))
                .categories(
                    post.categories
                        .iter()
                        .map(|c| rss::Category {
                            name: c.name.clone(),
                            domain: None,
                        })
                        .collect::<Vec<_>>(),
                )
                .build()
        })
        .collect();

    let self_link = Link {
        href: config.rss_url().to_string(),
        rel: String::from("self"),
        mime_type: Some(String::from("application/rss+xml")),
        ..Default::default()
    };

    let channel = ChannelBuilder::default()
        .title(config.title.clone())
        .link(config.site_root.to_string())
        .description(config.description.clone())
        .language(config.language.clone())
        .generator(GENERATOR.to_string())
        .last_build_date(http_date(updated(posts)))
        .ttl(TTL_MINUTES.to_string())
        .atom_ext(AtomExtension {
            links: vec![self_link],
        })
        .items(items)
        .build();

    channel
        .validate()
        .map_err(|e| Error::Validation(e.to_string()))?;

    Ok(String::from_utf8(channel.write_to(Vec::new())?)?)
}

/// Renders the Atom 1.0 document for `posts`. Unlike the RSS items, Atom
/// entries embed the full rendered body.
pub fn atom(config: &Config, posts: &[Post]) -> Result<String> {
    let authors = author_to_people(config.author.as_deref());
    let feed = Feed {
        title: Text::plain(config.title.clone()),
        id: config.site_root.to_string(),
        updated: updated(posts).fixed_offset(),
        authors: authors.clone(),
        generator: Some(Generator {
            value: GENERATOR.to_owned(),
            uri: None,
            version: Some(env!("CARGO_PKG_VERSION").to_owned()),
        }),
        subtitle: match config.description.is_empty() {
            true => None,
            false => Some(Text::plain(config.description.clone())),
        },
        lang: Some(config.language.clone()),
        links: vec![
            Link {
                href: config.atom_url().to_string(),
                rel: String::from("self"),
                mime_type: Some(String::from("application/atom+xml")),
                ..Default::default()
            },
            Link {
                href: config.site_root.to_string(),
                rel: String::from("alternate"),
                mime_type: Some(String::from("text/html")),
                ..Default::default()
            },
        ],
        entries: recent(posts)
            .iter()
            .map(|post| entry(post, &authors))
            .collect(),
        ..Default::default()
    };

    Ok(String::from_utf8(feed.write_to(Vec::new())?)?)
}

fn entry(post: &Post, authors: &[Person]) -> Entry {
    let date: FixedDateTime = midnight(post.date).fixed_offset();
    Entry {
        id: post.url.to_string(),
        title: Text::plain(post.title.clone()),
        updated: date,
        published: Some(date),
        authors: authors.to_vec(),
        links: vec![Link {
            href: post.url.to_string(),
            rel: String::from("alternate"),
            ..Default::default()
        }],
        summary: Some(Text::plain(post.description.clone())),
        content: Some(Content {
            value: Some(post.rendered_content.clone()),
            content_type: Some(String::from("html")),
            ..Default::default()
        }),
        categories: post
            .categories
            .iter()
            .map(|c| AtomCategory {
                term: c.slug.clone(),
                label: Some(c.name.clone()),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn author_to_people(author: Option<&str>) -> Vec<Person> {
    match author {
        Some(name) => vec![Person {
            name: name.to_owned(),
            email: None,
            uri: None,
        }],
        None => Vec::new(),
    }
}

/// The result of a fallible feed operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when the Atom document can't be serialized.
    #[error("writing atom feed: {0}")]
    Atom(#[from] AtomError),

    /// Returned when the RSS document can't be serialized.
    #[error("writing rss feed: {0}")]
    Rss(#[from] rss::Error),

    /// Returned when the RSS channel fails validation, e.g. because the
    /// site root isn't a valid link.
    #[error("rss validation failed: {0}")]
    Validation(String),

    /// Returned when a serializer produces invalid UTF-8.
    #[error(transparent)]
    Utf8(#[from] FromUtf8Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::test::config;
    use crate::post::test::post;
    use tempfile::TempDir;

    fn posts(n: usize) -> Vec<Post> {
        // Newest first, one per day from January 1st.
        (0..n)
            .rev()
            .map(|i| {
                let date = chrono::NaiveDate::from_ymd_opt(2025, 1, 1)
                    .unwrap()
                    .checked_add_days(chrono::Days::new(i as u64))
                    .unwrap();
                post(&format!("p{}", i), &date.to_string(), &["Rust"])
            })
            .collect()
    }

    #[test]
    fn test_feeds_are_capped() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let posts = posts(15);

        let rss = rss(&config, &posts)?;
        assert_eq!(10, rss.matches("<item>").count());
        assert!(rss.contains("/posts/p14/"));
        assert!(rss.contains("/posts/p5/"));
        assert!(!rss.contains("/posts/p4/"));

        let atom = atom(&config, &posts)?;
        assert_eq!(10, atom.matches("<entry>").count());
        assert!(atom.contains("/posts/p14/"));
        assert!(!atom.contains("/posts/p4/"));
        Ok(())
    }

    #[test]
    fn test_empty_feeds_are_well_formed() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());

        let rss = rss(&config, &[])?;
        assert!(rss.contains("<channel>"));
        assert!(rss.contains("<title>Test Blog</title>"));
        assert!(rss.contains("https://example.com/feed.xml"));
        assert!(rss.contains("Thu, 01 Jan 1970 00:00:00 GMT"));
        assert_eq!(0, rss.matches("<item>").count());

        let atom = atom(&config, &[])?;
        assert!(atom.contains("<feed"));
        assert!(atom.contains("https://example.com/atom.xml"));
        assert!(atom.contains("1970-01-01T00:00:00+00:00"));
        assert_eq!(0, atom.matches("<entry>").count());
        Ok(())
    }

    #[test]
    fn test_dates_follow_newest_post() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let posts = vec![post("new", "2025-03-04", &[]), post("old", "2024-01-01", &[])];

        let rss = rss(&config, &posts)?;
        assert!(rss.contains("<lastBuildDate>Tue, 04 Mar 2025 00:00:00 GMT</lastBuildDate>"));
        assert!(rss.contains("<pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>"));

        let atom = atom(&config, &posts)?;
        assert!(atom.contains("<updated>2025-03-04T00:00:00+00:00</updated>"));
        Ok(())
    }

    #[test]
    fn test_text_is_escaped() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let escaped = |xml: &str| {
            xml.contains("Notes &amp; things") || xml.contains("<![CDATA[Notes & things]]>")
        };

        let rss = rss(&config, &[])?;
        assert!(escaped(&rss));
        assert!(!rss.contains("Notes & things<"));

        let atom = atom(&config, &[])?;
        assert!(escaped(&atom));
        assert!(!atom.contains("Notes & things<"));
        Ok(())
    }

    #[test]
    fn test_atom_embeds_body() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let atom = atom(&config, &[post("a", "2025-01-01", &[])])?;
        assert!(atom.contains("&lt;p&gt;Body&lt;/p&gt;") || atom.contains("<![CDATA[<p>Body</p>"));
        assert!(atom.contains("About a</summary>"));
        Ok(())
    }
}
