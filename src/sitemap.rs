//! Renders the Sitemap 0.9 document.
//!
//! Every page kind gets a fixed change frequency and priority:
//!
//! | page                   | changefreq | priority |
//! |------------------------|------------|----------|
//! | site root              | daily      | 1.0      |
//! | post                   | monthly    | 0.8      |
//! | index page 2 and later | weekly     | 0.6      |
//! | category root          | weekly     | 0.5      |

use crate::category::CategoryGroup;
use crate::config::Config;
use crate::pagination::{page_url, total_pages};
use crate::post::Post;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use url::Url;

const NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// One `<url>` entry.
struct Entry<'a> {
    loc: Url,
    lastmod: Option<String>,
    changefreq: &'a str,
    priority: &'a str,
}

/// Renders the sitemap for `posts`, which must be sorted newest first. An
/// empty blog has exactly one entry, the site root, with no `lastmod`.
pub fn sitemap(
    config: &Config,
    posts: &[Post],
    groups: &[CategoryGroup],
) -> quick_xml::Result<String> {
    let mut entries: Vec<Entry> = Vec::new();
    entries.push(Entry {
        loc: config.site_root.clone(),
        lastmod: posts.first().map(|p| p.date.to_string()),
        changefreq: "daily",
        priority: "1.0",
    });

    for post in posts {
        entries.push(Entry {
            loc: post.url.clone(),
            lastmod: Some(post.date.to_string()),
            changefreq: "monthly",
            priority: "0.8",
        });
    }

    for page in 2..=total_pages(posts.len(), config.page_size) {
        entries.push(Entry {
            loc: page_url(&config.site_root, page),
            lastmod: None,
            changefreq: "weekly",
            priority: "0.6",
        });
    }

    for group in groups {
        entries.push(Entry {
            loc: group.category.url.clone(),
            lastmod: group.posts.first().map(|p| p.date.to_string()),
            changefreq: "weekly",
            priority: "0.5",
        });
    }

    render(&entries)
}

fn render(entries: &[Entry]) -> quick_xml::Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    // <?xml version="1.0" encoding="UTF-8"?>
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    // <urlset xmlns="...">
    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", NAMESPACE));
    writer.write_event(Event::Start(urlset))?;

    for entry in entries {
        writer.write_event(Event::Start(BytesStart::new("url")))?;
        push_text(&mut writer, "loc", entry.loc.as_str())?;
        if let Some(lastmod) = &entry.lastmod {
            push_text(&mut writer, "lastmod", lastmod)?;
        }
        push_text(&mut writer, "changefreq", entry.changefreq)?;
        push_text(&mut writer, "priority", entry.priority)?;
        writer.write_event(Event::End(BytesEnd::new("url")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("urlset")))?;

    let mut xml = String::from_utf8_lossy(&writer.into_inner()).into_owned();
    xml.push('\n');
    Ok(xml)
}

fn push_text(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}
