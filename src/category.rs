//! Defines the [`Category`] type and groups posts by category.

use crate::post::Post;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use url::Url;

/// Represents a [`Post`] category. Two categories are the same category when
/// their labels normalize to the same slug, so `macOS` and `MacOS` share
/// one set of index pages.
#[derive(Clone, Debug)]
pub struct Category {
    /// The label as written in the post's frontmatter.
    pub name: String,

    /// The normalized label, used in URLs and output paths.
    pub slug: String,

    /// The URL of the category's first index page,
    /// `{site_root}/categories/{slug}/`.
    pub url: Url,
}

impl Category {
    pub fn new(name: &str, site_root: &Url) -> Option<Category> {
        let slug = slug::slugify(name);
        if slug.is_empty() {
            return None;
        }
        let url = site_root.join(&format!("categories/{}/", slug)).ok()?;
        Some(Category {
            name: name.to_owned(),
            slug,
            url,
        })
    }
}

impl Hash for Category {
    /// Implements [`Hash`] for [`Category`] by delegating directly to the
    /// `slug` field.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.slug.hash(state)
    }
}

impl PartialEq for Category {
    /// Implements [`PartialEq`] and [`Eq`] for [`Category`] by delegating
    /// directly to the `slug` field.
    fn eq(&self, other: &Self) -> bool {
        self.slug == other.slug
    }
}
impl Eq for Category {}

/// The posts filed under one category slug, in collection order.
pub struct CategoryGroup<'a> {
    /// The category as labelled by the first post in the group.
    pub category: &'a Category,
    pub posts: Vec<&'a Post>,
}

/// Groups `posts` by category slug. Groups are returned in order of first
/// appearance, and each group's display name comes from the first post
/// that carries it. `posts` is expected to be sorted, so groups stay sorted
/// too.
pub fn group(posts: &[Post]) -> Vec<CategoryGroup<'_>> {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for post in posts {
        for category in &post.categories {
            match index.get(category.slug.as_str()) {
                Some(&i) => groups[i].posts.push(post),
                None => {
                    index.insert(&category.slug, groups.len());
                    groups.push(CategoryGroup {
                        category,
                        posts: vec![post],
                    });
                }
            }
        }
    }

    groups
}
