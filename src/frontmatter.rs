//! Splits a post source into its YAML frontmatter and body, and validates
//! the frontmatter fields. Validation never fails the build: it either
//! yields [`Metadata`] plus a list of warnings, or a list of errors that
//! explain why the source must be excluded.

use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use serde_yaml::Value;
use std::sync::LazyLock;
use thiserror::Error;

/// The category assigned to posts that declare none.
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

const FENCE: &str = "---";

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Returned by [`split`] when a source has no well-formed frontmatter block.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FenceError {
    #[error("post must begin with `---`")]
    MissingStartFence,

    #[error("missing closing `---`")]
    MissingEndFence,
}

/// Splits `input` into `(frontmatter, body)`. The frontmatter is the text
/// between an opening `---` at the very start of the input and the next
/// `---`. The line break after the closing fence is not part of the body.
pub fn split(input: &str) -> Result<(&str, &str), FenceError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    if !input.starts_with(FENCE) {
        return Err(FenceError::MissingStartFence);
    }
    match input[FENCE.len()..].find(FENCE) {
        None => Err(FenceError::MissingEndFence),
        Some(offset) => {
            let yaml_stop = FENCE.len() + offset;
            let body = &input[yaml_stop + FENCE.len()..];
            let body = body
                .strip_prefix("\r\n")
                .or_else(|| body.strip_prefix('\n'))
                .unwrap_or(body);
            Ok((&input[FENCE.len()..yaml_stop], body))
        }
    }
}

/// The raw, unvalidated fields. Scalars are kept as [`Value`] so that e.g.
/// a numeric title is reported as a validation problem rather than a YAML
/// error.
#[derive(Deserialize, Default, Debug)]
pub struct RawFrontmatter {
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub date: Option<Value>,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub slug: Option<Value>,
    #[serde(default)]
    pub categories: Option<Value>,
}

impl RawFrontmatter {
    pub fn parse(yaml: &str) -> Result<RawFrontmatter, serde_yaml::Error> {
        // An empty document deserializes to unit, not a mapping.
        if yaml.trim().is_empty() {
            return Ok(RawFrontmatter::default());
        }
        serde_yaml::from_str(yaml)
    }
}

/// Frontmatter that passed validation, with defaults applied.
#[derive(Clone, Debug, PartialEq)]
pub struct Metadata {
    pub title: String,
    pub date: NaiveDate,
    pub description: String,
    pub slug: String,
    pub categories: Vec<String>,
}

/// The outcome of [`validate`] for a valid source.
#[derive(Debug)]
pub struct Validated {
    pub metadata: Metadata,
    pub warnings: Vec<String>,
}

/// Validates `raw`. `title` and `date` are required; a present but
/// malformed date is rejected rather than carried through as text.
pub fn validate(raw: RawFrontmatter) -> Result<Validated, Vec<String>> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let title = scalar(raw.title.as_ref()).filter(|t| !t.is_empty());
    if title.is_none() {
        errors.push(String::from("missing or empty required field `title`"));
    }

    let date = match scalar(raw.date.as_ref()).filter(|d| !d.is_empty()) {
        None => {
            errors.push(String::from("missing or empty required field `date`"));
            None
        }
        Some(text) => match parse_date(&text) {
            Ok(date) => Some(date),
            Err(e) => {
                errors.push(e);
                None
            }
        },
    };

    let (title, date) = match (title, date) {
        (Some(title), Some(date)) if errors.is_empty() => (title, date),
        _ => return Err(errors),
    };

    let description = match scalar(raw.description.as_ref()).filter(|d| !d.is_empty()) {
        Some(description) => description,
        None => title.clone(),
    };

    let slug = match scalar(raw.slug.as_ref()).filter(|s| !s.is_empty()) {
        Some(given) => {
            let slug = slug::slugify(&given);
            if slug != given {
                warnings.push(format!("slug `{}` normalized to `{}`", given, slug));
            }
            slug
        }
        None => slug::slugify(&title),
    };
    if slug.is_empty() {
        return Err(vec![format!(
            "cannot derive a slug from title `{}`; set `slug` explicitly",
            title
        )]);
    }

    let categories = categories(raw.categories.as_ref(), &mut warnings);

    Ok(Validated {
        metadata: Metadata {
            title,
            date,
            description,
            slug,
            categories,
        },
        warnings,
    })
}

fn parse_date(text: &str) -> Result<NaiveDate, String> {
    if !DATE_PATTERN.is_match(text) {
        return Err(format!("date `{}` is not in YYYY-MM-DD form", text));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| format!("date `{}` is not a calendar date: {}", text, e))
}

fn categories(value: Option<&Value>, warnings: &mut Vec<String>) -> Vec<String> {
    let mut categories: Vec<String> = Vec::new();
    match value {
        Some(Value::Sequence(items)) => {
            for item in items {
                match scalar(Some(item)) {
                    Some(label) if !label.is_empty() => {
                        if !categories.contains(&label) {
                            categories.push(label);
                        }
                    }
                    _ => warnings.push(format!("ignoring category entry `{:?}`", item)),
                }
            }
        }
        Some(Value::Null) | None => {}
        Some(other) => match scalar(Some(other)) {
            Some(label) if !label.is_empty() => categories.push(label),
            _ => warnings.push(format!("ignoring `categories` value `{:?}`", other)),
        },
    }

    if categories.is_empty() {
        warnings.push(format!(
            "no categories given; using `{}`",
            DEFAULT_CATEGORY
        ));
        categories.push(String::from(DEFAULT_CATEGORY));
    }
    categories
}

/// Renders a YAML scalar as trimmed text. Mappings, sequences and nulls
/// have no text form.
fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
