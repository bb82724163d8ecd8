//! Loads and renders page templates.
//!
//! Templates are Go-style text templates (`{{.post.title}}`,
//! `{{range .posts}}`). The engine inserts values as-is, so escaping is
//! decided when a value enters the template context, by one of two
//! rendering modes:
//!
//! * [`text`] HTML-escapes the value. Use it for anything taken from
//!   frontmatter or configuration.
//! * [`markup`] inserts the value verbatim. Use it only for HTML the build
//!   produced itself, such as rendered post bodies.

use gtmpl::Value;
use pulldown_cmark::escape::escape_html;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A parsed template, built from one or more template files concatenated in
/// order. Later files may `{{template}}` blocks `{{define}}`d by earlier
/// ones.
pub struct Template {
    name: String,
    inner: gtmpl::Template,
}

impl Template {
    /// Loads the template files, appends them and parses the result. A
    /// missing file is an error: no page can be built without its
    /// template.
    pub fn load<P: AsRef<Path>>(files: &[P]) -> Result<Template> {
        let mut contents = String::new();
        let mut names = Vec::with_capacity(files.len());
        for file in files {
            let file = file.as_ref();
            let text = fs::read_to_string(file).map_err(|err| Error::OpenTemplateFile {
                path: file.to_owned(),
                err,
            })?;
            contents.push_str(&text);
            contents.push(' ');
            names.push(
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
        }
        Template::parse(&names.join("+"), contents)
    }

    /// Parses `contents` as a template called `name`.
    pub fn parse(name: &str, contents: String) -> Result<Template> {
        let mut inner = gtmpl::Template::default();
        inner.parse(contents).map_err(|e| Error::Parse {
            name: name.to_owned(),
            message: e.to_string(),
        })?;
        Ok(Template {
            name: name.to_owned(),
            inner,
        })
    }

    /// Executes the template against `value`, which is usually a
    /// [`Value::Object`].
    pub fn render(&self, value: Value) -> Result<String> {
        let execute = |message: String| Error::Execute {
            name: self.name.clone(),
            message,
        };
        let context = gtmpl::Context::from(value).map_err(|e| execute(e.to_string()))?;
        let mut out: Vec<u8> = Vec::new();
        self.inner
            .execute(&mut out, &context)
            .map_err(|e| execute(e.to_string()))?;
        String::from_utf8(out).map_err(|e| execute(e.to_string()))
    }
}

/// Escaped rendering mode: `s` is HTML-escaped before it reaches the
/// template.
pub fn text(s: &str) -> Value {
    Value::String(escape(s))
}

/// Raw rendering mode: `s` is trusted markup and is inserted verbatim.
pub fn markup(s: &str) -> Value {
    Value::String(s.to_owned())
}

/// HTML-escapes `s`.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    // Writing into a `String` cannot fail.
    let _ = escape_html(&mut out, s);
    out
}

/// The result of a fallible template operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading or executing a template. All variants are
/// fatal to the build.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when a template file is missing or unreadable.
    #[error("opening template file `{}`: {err}", .path.display())]
    OpenTemplateFile {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Returned when template text fails to parse.
    #[error("parsing template `{name}`: {message}")]
    Parse { name: String, message: String },

    /// Returned when executing a template fails, e.g. on a call to an
    /// undefined template.
    #[error("executing template `{name}`: {message}")]
    Execute { name: String, message: String },
}
