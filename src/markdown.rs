//! Converts post bodies from Markdown to HTML.

use pulldown_cmark::{html, Event, HeadingLevel, Options, Parser, Tag};

/// Renders `markdown` to HTML.
///
/// Headings in the post body are demoted one level so that they are
/// subordinate to the post title, which templates render as `h1`. So `#`
/// becomes `h2`; `######` stays `h6`.
pub fn to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let events = Parser::new_ext(markdown, options).map(|ev| match ev {
        Event::Start(Tag::Heading(level, id, classes)) => {
            Event::Start(Tag::Heading(demote(level), id, classes))
        }
        Event::End(Tag::Heading(level, id, classes)) => {
            Event::End(Tag::Heading(demote(level), id, classes))
        }
        _ => ev,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

fn demote(level: HeadingLevel) -> HeadingLevel {
    match level {
        HeadingLevel::H1 => HeadingLevel::H2,
        HeadingLevel::H2 => HeadingLevel::H3,
        HeadingLevel::H3 => HeadingLevel::H4,
        HeadingLevel::H4 => HeadingLevel::H5,
        HeadingLevel::H5 | HeadingLevel::H6 => HeadingLevel::H6,
    }
}
