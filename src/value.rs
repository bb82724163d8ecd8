//! Conversions from domain types into template [`Value`]s. Text is escaped
//! on the way in; see [`crate::template`].

use crate::category::{Category, CategoryGroup};
use crate::pagination::Pagination;
use crate::template::text;
use gtmpl::Value;
use std::collections::HashMap;
use url::Url;

impl From<&Category> for Value {
    /// Converts [`Category`]s into [`Value`]s for templating.
    fn from(c: &Category) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("name".to_owned(), text(&c.name));
        m.insert("slug".to_owned(), text(&c.slug));
        m.insert("url".to_owned(), url_value(&c.url));
        Value::Object(m)
    }
}

impl From<&CategoryGroup<'_>> for Value {
    /// Converts a [`CategoryGroup`] into its category's fields plus the
    /// number of posts in the group.
    fn from(g: &CategoryGroup<'_>) -> Value {
        let mut value = Value::from(g.category);
        if let Value::Object(m) = &mut value {
            m.insert("count".to_owned(), text(&g.posts.len().to_string()));
        }
        value
    }
}

/// Converts a [`Url`] into escaped template text.
pub(crate) fn url_value(u: &Url) -> Value {
    text(u.as_str())
}

impl From<&Pagination> for Value {
    /// Converts [`Pagination`] into an object with `current`, `total`,
    /// `has_prev`, `has_next`, `prev_url` and `next_url`. The URLs are nil
    /// when there is no such page.
    fn from(p: &Pagination) -> Value {
        let option_to_value = |opt: &Option<Url>| match opt {
            Some(u) => url_value(u),
            None => Value::Nil,
        };

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("current".to_owned(), text(&p.current_page.to_string()));
        m.insert("total".to_owned(), text(&p.total_pages.to_string()));
        m.insert("has_prev".to_owned(), Value::Bool(p.has_prev()));
        m.insert("has_next".to_owned(), Value::Bool(p.has_next()));
        m.insert("prev_url".to_owned(), option_to_value(&p.prev_url));
        m.insert("next_url".to_owned(), option_to_value(&p.next_url));
        Value::Object(m)
    }
}
