//! Compiles the site stylesheet, but only when it is out of date.
//!
//! The compiled stylesheet is stale when any stylesheet source or any
//! template is newer than it. Compile failures are logged and never fail the
//! build; whatever stylesheet is already on disk stays in place.
//!
//! Compiled outputs are stamped with the time compilation started, not the
//! time they were written. A source saved while a build is running is then
//! newer than the stylesheet and the next build picks it up.
//!
//! A source map next to the stylesheet means it was last built in
//! development mode, so a production build recompiles and
//! [`remove_source_map`] deletes the map once the new stylesheet is written.

use crate::config::{Config, Mode};
use crate::output::BuildOutput;
use crate::stale::{files_with_extensions, is_stale};
use filetime::FileTime;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Extensions of stylesheet sources.
pub const STYLE_EXTENSIONS: &[&str] = &["scss", "sass", "css"];

/// Extensions of template files, which also make the stylesheet stale.
pub const TEMPLATE_EXTENSIONS: &[&str] = &["html", "htm", "tmpl", "xml"];

/// The output of a stylesheet compiler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledStyle {
    pub css: String,
    pub source_map: Option<String>,
}

/// Compiles a stylesheet entry point into CSS. Production mode asks for
/// minified output without a source map; development mode asks for readable
/// output with one.
pub trait StyleCompiler: Send + Sync {
    fn compile(&self, entry: &Path, load_path: &Path, mode: Mode) -> Result<CompiledStyle>;
}

/// Compiles SCSS with [`grass`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Grass;

impl StyleCompiler for Grass {
    fn compile(&self, entry: &Path, load_path: &Path, mode: Mode) -> Result<CompiledStyle> {
        let style = match mode {
            Mode::Production => grass::OutputStyle::Compressed,
            Mode::Development => grass::OutputStyle::Expanded,
        };
        let options = grass::Options::default().style(style).load_path(load_path);
        let css = grass::from_path(entry, &options).map_err(|e| Error::Compile {
            path: entry.to_owned(),
            message: e.to_string(),
        })?;

        let source_map = match mode {
            Mode::Production => None,
            Mode::Development => Some(source_map(entry, load_path)?),
        };
        Ok(CompiledStyle { css, source_map })
    }
}

/// A version 3 source map. `grass` doesn't produce mappings, so the map
/// only lists the sources that went into the stylesheet.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceMap {
    version: u8,
    file: String,
    source_root: String,
    sources: Vec<String>,
    names: Vec<String>,
    mappings: String,
}

fn source_map(entry: &Path, load_path: &Path) -> Result<String> {
    let mut sources: Vec<String> = vec![relative(entry, load_path)];
    for file in files_with_extensions(load_path, STYLE_EXTENSIONS) {
        let file = relative(&file, load_path);
        if !sources.contains(&file) {
            sources.push(file);
        }
    }

    let map = SourceMap {
        version: 3,
        file: String::from("main.css"),
        source_root: String::new(),
        sources,
        names: Vec::new(),
        mappings: String::new(),
    };
    Ok(serde_json::to_string(&map)?)
}

fn relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// What [`compile_if_needed`] did.
#[derive(Debug)]
pub enum StyleOutcome {
    /// The stylesheet was recompiled. The outputs still need writing.
    Compiled(Vec<BuildOutput>),

    /// The compiled stylesheet is newer than every input.
    Fresh,

    /// There is no stylesheet entry point.
    NoSource,

    /// Compilation failed; the existing output was left alone.
    Failed,
}

/// The inputs whose changes make the compiled stylesheet stale: every
/// stylesheet source and every template.
pub fn candidates(config: &Config) -> Vec<PathBuf> {
    let mut candidates = files_with_extensions(&config.styles_directory, STYLE_EXTENSIONS);
    candidates.extend(files_with_extensions(
        &config.templates_directory,
        TEMPLATE_EXTENSIONS,
    ));
    for template in config
        .post_template
        .iter()
        .chain(&config.index_template)
        .chain(&config.category_template)
    {
        if !candidates.contains(template) {
            candidates.push(template.clone());
        }
    }
    candidates
}

/// Recompiles the stylesheet when it is stale. Safe to call on every build:
/// an up-to-date stylesheet is left untouched.
pub fn compile_if_needed(
    config: &Config,
    mode: Mode,
    compiler: &dyn StyleCompiler,
) -> StyleOutcome {
    let entry = &config.style_entry;
    if !entry.is_file() {
        debug!("no stylesheet at `{}`; skipping styles", entry.display());
        return StyleOutcome::NoSource;
    }

    let output = config.style_output();
    let map_exists = config.style_map_output().exists();
    let wrong_mode = match mode {
        Mode::Development => !map_exists,
        Mode::Production => map_exists,
    };
    if !wrong_mode && !is_stale(&output, &candidates(config)) {
        info!("styles are up to date; skipping compilation");
        return StyleOutcome::Fresh;
    }

    let started = FileTime::now();
    let compiled = match compiler.compile(entry, &config.styles_directory, mode) {
        Ok(compiled) => compiled,
        Err(e) => {
            warn!("style compilation failed, keeping existing stylesheet: {}", e);
            return StyleOutcome::Failed;
        }
    };

    let mut css = compiled.css;
    let mut outputs = Vec::with_capacity(2);
    if let Some(map) = compiled.source_map {
        if !css.ends_with('\n') {
            css.push('\n');
        }
        css.push_str("/*# sourceMappingURL=main.css.map */\n");
        outputs.push(
            BuildOutput::new(config.style_map_output(), map)
                .always()
                .modified_at(started),
        );
    }

    match mode {
        Mode::Production => {
            let source_size = fs::metadata(entry).map(|m| m.len()).unwrap_or(0);
            let compiled_size = css.len() as u64;
            let saved = source_size.saturating_sub(compiled_size);
            let percent = match source_size {
                0 => 0.0,
                n => saved as f64 * 100.0 / n as f64,
            };
            info!(
                "compiled styles: {} -> {} bytes ({:.1}% smaller)",
                source_size, compiled_size, percent
            );
        }
        Mode::Development => info!("compiled styles with source map"),
    }

    outputs.insert(0, BuildOutput::new(output, css).always().modified_at(started));
    StyleOutcome::Compiled(outputs)
}

/// Deletes a development source map left next to the stylesheet. Returns
/// whether there was one.
pub fn remove_source_map(config: &Config) -> io::Result<bool> {
    match fs::remove_file(config.style_map_output()) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// The result of a fallible compile operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem compiling the stylesheet.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when the compiler rejects the stylesheet.
    #[error("compiling `{}`: {message}", .path.display())]
    Compile { path: PathBuf, message: String },

    /// Returned when the source map can't be serialized.
    #[error("writing source map: {0}")]
    SourceMap(#[from] serde_json::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::test::config;
    use filetime::{set_file_mtime, FileTime};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Counts compilations and returns fixed CSS.
    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StyleCompiler for Counting {
        fn compile(&self, entry: &Path, _: &Path, mode: Mode) -> Result<CompiledStyle> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Compile {
                    path: entry.to_owned(),
                    message: String::from("boom"),
                });
            }
            Ok(CompiledStyle {
                css: String::from("body{}"),
                source_map: match mode {
                    Mode::Production => None,
                    Mode::Development => Some(String::from("{}")),
                },
            })
        }
    }

    fn write_outputs(outcome: StyleOutcome) -> Vec<BuildOutput> {
        match outcome {
            StyleOutcome::Compiled(outputs) => {
                for output in &outputs {
                    fs::create_dir_all(output.path.parent().unwrap()).unwrap();
                    fs::write(&output.path, &output.contents).unwrap();
                }
                outputs
            }
            other => panic!("expected Compiled, got {:?}", other),
        }
    }

    fn set_mtime(path: &Path, seconds: i64) {
        set_file_mtime(path, FileTime::from_unix_time(seconds, 0)).unwrap();
    }

    #[test]
    fn test_compiles_only_when_stale() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        fs::create_dir_all(&config.styles_directory).unwrap();
        fs::create_dir_all(&config.templates_directory).unwrap();
        fs::write(&config.style_entry, "body { color: red; }").unwrap();
        fs::write(config.templates_directory.join("post.html"), "").unwrap();
        let compiler = Counting::default();

        let outputs = write_outputs(compile_if_needed(&config, Mode::Production, &compiler));
        assert_eq!(1, outputs.len());
        assert_eq!(config.style_output(), outputs[0].path);

        set_mtime(&config.style_entry, 1_000);
        set_mtime(&config.templates_directory.join("post.html"), 1_000);
        set_mtime(&config.style_output(), 2_000);
        assert!(matches!(
            compile_if_needed(&config, Mode::Production, &compiler),
            StyleOutcome::Fresh
        ));
        assert_eq!(1, compiler.calls.load(Ordering::SeqCst));

        // A template change also invalidates the stylesheet.
        set_mtime(&config.templates_directory.join("post.html"), 3_000);
        write_outputs(compile_if_needed(&config, Mode::Production, &compiler));
        assert_eq!(2, compiler.calls.load(Ordering::SeqCst));
    }

    #[test]
    fn test_development_writes_source_map() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        fs::create_dir_all(&config.styles_directory).unwrap();
        fs::write(&config.style_entry, "body { color: red; }").unwrap();

        let outputs = write_outputs(compile_if_needed(
            &config,
            Mode::Development,
            &Counting::default(),
        ));
        assert_eq!(2, outputs.len());
        assert_eq!(
            "body{}\n/*# sourceMappingURL=main.css.map */\n",
            outputs[0].contents
        );
        assert_eq!(config.style_map_output(), outputs[1].path);
    }

    #[test]
    fn test_outputs_carry_compile_start_time() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        fs::create_dir_all(&config.styles_directory).unwrap();
        fs::write(&config.style_entry, "body { color: red; }").unwrap();

        let before = FileTime::now();
        let outputs = write_outputs(compile_if_needed(
            &config,
            Mode::Development,
            &Counting::default(),
        ));
        for output in &outputs {
            let modified = output.modified.unwrap();
            assert!(modified >= before && modified <= FileTime::now());
        }
    }

    #[test]
    fn test_production_replaces_development_output() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        fs::create_dir_all(&config.styles_directory).unwrap();
        fs::write(&config.style_entry, "body { color: red; }").unwrap();
        let compiler = Counting::default();

        write_outputs(compile_if_needed(&config, Mode::Development, &compiler));
        set_mtime(&config.style_entry, 1_000);
        set_mtime(&config.style_output(), 2_000);
        assert!(matches!(
            compile_if_needed(&config, Mode::Development, &compiler),
            StyleOutcome::Fresh
        ));

        // Same sources, but the stylesheet on disk is a development build.
        let outputs = write_outputs(compile_if_needed(&config, Mode::Production, &compiler));
        assert_eq!(1, outputs.len());
        assert_eq!("body{}", outputs[0].contents);
        assert!(remove_source_map(&config).unwrap());
        assert!(!config.style_map_output().exists());
        assert!(!remove_source_map(&config).unwrap());

        assert!(matches!(
            compile_if_needed(&config, Mode::Production, &compiler),
            StyleOutcome::Fresh
        ));
        assert_eq!(2, compiler.calls.load(Ordering::SeqCst));
    }

    #[test]
    fn test_failure_keeps_existing_output() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        fs::create_dir_all(&config.styles_directory).unwrap();
        fs::write(&config.style_entry, "body {").unwrap();
        let compiler = Counting {
            fail: true,
            ..Default::default()
        };

        assert!(matches!(
            compile_if_needed(&config, Mode::Production, &compiler),
            StyleOutcome::Failed
        ));
        assert!(!config.style_output().exists());
    }

    #[test]
    fn test_no_source() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        assert!(matches!(
            compile_if_needed(&config, Mode::Production, &Grass),
            StyleOutcome::NoSource
        ));
    }

    #[test]
    fn test_grass() -> Result<()> {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("_colors.scss"), "$red: red;").unwrap();
        let entry = dir.path().join("main.scss");
        fs::write(&entry, "@import 'colors';\nbody {\n  a { color: $red; }\n}\n").unwrap();

        let compressed = Grass.compile(&entry, dir.path(), Mode::Production)?;
        assert_eq!("body a{color:red}", compressed.css.trim());
        assert_eq!(None, compressed.source_map);

        let expanded = Grass.compile(&entry, dir.path(), Mode::Development)?;
        assert!(expanded.css.contains("body a {\n  color: red;\n}"));
        let map: serde_json::Value =
            serde_json::from_str(&expanded.source_map.unwrap()).unwrap();
        assert_eq!(3, map["version"]);
        assert_eq!("main.scss", map["sources"][0]);
        assert_eq!("", map["mappings"]);
        Ok(())
    }

    #[test]
    fn test_grass_error() {
        let dir = TempDir::new().unwrap();
        let entry = dir.path().join("main.scss");
        fs::write(&entry, "body { color: ").unwrap();
        assert!(Grass.compile(&entry, dir.path(), Mode::Production).is_err());
    }
}
