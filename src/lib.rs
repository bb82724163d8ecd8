//! The library code for the `quire` static blog generator. A build can be
//! broken down into a handful of steps:
//!
//! 1. Compiling the stylesheet, if any of its inputs changed
//!    ([`crate::style`], [`crate::stale`])
//! 2. Parsing posts from source files on disk ([`crate::parser`])
//! 3. Rendering post pages, paginated index pages and per-category index
//!    pages ([`crate::page`]), plus the RSS and Atom feeds
//!    ([`crate::feed`]) and the sitemap ([`crate::sitemap`])
//! 4. Writing everything to disk in one batch ([`crate::write`])
//!
//! Steps 1 and 2 are independent and run side by side. Every page of step 3
//! depends on the full, sorted post collection, which is why rendering only
//! starts once parsing is done. [`crate::build::Site`] drives a single build
//! and makes sure only one runs at a time; [`crate::watch`] rebuilds the site
//! whenever its sources change.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod category;
pub mod config;
pub mod feed;
pub mod frontmatter;
pub mod markdown;
pub mod output;
pub mod page;
pub mod pagination;
pub mod parser;
pub mod post;
pub mod sitemap;
pub mod stale;
pub mod style;
pub mod template;
mod util;
mod value;
pub mod watch;
pub mod write;
