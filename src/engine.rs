//! The render entry point.
//!
//! An [`Engine`] owns a parsed document, the mode registry and the loader
//! used for linked and imported stylesheets. [`Engine::render`] compiles
//! every rule of every document stylesheet and runs them once.
//!
//! # Example
//!
//! ```
//! use csspipe::Engine;
//!
//! let mut engine = Engine::new(
//!     r#"<style>nav { --data: json([1, 2]); --body: (${data.map(n => `<b>${n}</b>`).join("")}) }</style>
//!        <nav></nav>"#,
//! );
//! let report = engine.render().unwrap();
//!
//! assert_eq!(report.executions, 1);
//! assert!(engine.html().contains("<nav><b>1</b><b>2</b></nav>"));
//! ```

use std::fs;
use std::path::Path;

use crate::compile::CompiledRule;
use crate::config::RenderOptions;
use crate::css::{FsLoader, NoLoader, StyleSheet, StylesheetLoader, document_stylesheets};
use crate::dom::{Dom, parse_document, serialize_document};
use crate::error::Result;
use crate::registry::{ModeRegistry, Renderer};
use crate::report::{Diagnostics, RenderReport};
use crate::runner;
use crate::stage::Stage;
use crate::util::{decode_text, sniff_charset};
use crate::walker::Walker;

pub struct Engine {
    dom: Dom,
    registry: ModeRegistry,
    options: RenderOptions,
    loader: Box<dyn StylesheetLoader>,
    base: Option<String>,
    rules: Vec<CompiledRule>,
    compiled: bool,
    diagnostics: Diagnostics,
}

impl Engine {
    /// Parse `html` with default options and no external stylesheets.
    pub fn new(html: &str) -> Self {
        Self::with_options(html, RenderOptions::default())
    }

    pub fn with_options(html: &str, options: RenderOptions) -> Self {
        let registry = if options.builtin_modes() {
            ModeRegistry::with_builtin_modes()
        } else {
            ModeRegistry::new()
        };
        Self {
            dom: parse_document(html),
            registry,
            options,
            loader: Box::new(NoLoader),
            base: None,
            rules: Vec::new(),
            compiled: false,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Use `loader` for `<link>` and `@import` hrefs.
    pub fn with_loader(mut self, loader: impl StylesheetLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Set the document's own href, against which relative links resolve.
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Read an HTML file. Linked stylesheets are loaded relative to its
    /// directory.
    pub fn open(path: impl AsRef<Path>, options: RenderOptions) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let charset = sniff_charset(&bytes);
        let html = decode_text(&bytes, charset.as_deref());

        let root = path.parent().unwrap_or_else(|| Path::new("."));
        let base = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        log::debug!("opened {} ({} bytes)", path.display(), bytes.len());
        Ok(Self::with_options(&html, options)
            .with_loader(FsLoader::new(root))
            .with_base(base))
    }

    /// Register a mode compiler. See [`ModeRegistry::register`].
    ///
    /// Rules compiled before the call keep their compilers until the next
    /// [`render`](Self::render).
    pub fn register_mode<F>(&mut self, mode: &str, compiler: F, stages: &[Stage]) -> &mut Self
    where
        F: Fn(&str) -> Result<Renderer> + 'static,
    {
        self.registry.register(mode, compiler, stages);
        self
    }

    pub fn registry(&self) -> &ModeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModeRegistry {
        &mut self.registry
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut Dom {
        &mut self.dom
    }

    /// The document's stylesheets, freshly loaded.
    pub fn stylesheets(&self) -> Vec<StyleSheet> {
        document_stylesheets(&self.dom, self.base.as_deref(), self.loader.as_ref())
    }

    /// Rules from the last compilation, in priority order.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Serialize the current document.
    pub fn html(&self) -> String {
        serialize_document(&self.dom)
    }

    /// Compile every rule of every document stylesheet, replacing earlier
    /// rules and their processed-target sets. Returns the rule count.
    pub fn compile(&mut self) -> Result<usize> {
        let sheets = self.stylesheets();
        let walker = Walker::new(&self.registry, &self.options, &self.diagnostics);
        self.rules = walker.walk_all(&sheets)?;
        self.compiled = true;
        log::debug!(
            "compiled {} rules from {} stylesheets",
            self.rules.len(),
            sheets.len()
        );
        Ok(self.rules.len())
    }

    /// One full pass: compile, then run every rule against the document.
    pub fn render(&mut self) -> Result<RenderReport> {
        self.diagnostics.take();
        self.compile()?;
        self.run()
    }

    /// Run the current rules again without recompiling.
    ///
    /// Targets already processed are skipped, so this only renders elements
    /// that appeared since the last pass.
    pub fn refresh(&mut self) -> Result<RenderReport> {
        self.diagnostics.take();
        if !self.compiled {
            self.compile()?;
        }
        self.run()
    }

    fn run(&mut self) -> Result<RenderReport> {
        let stats = runner::run(&self.rules, &mut self.dom)?;
        let report = RenderReport {
            rules: self.rules.len(),
            executions: stats.executions,
            stage_runs: stats.stage_runs,
            diagnostics: self.diagnostics.take(),
        };
        if report.has_errors() {
            log::warn!(
                "render finished with {} failed snippets",
                report.diagnostics.len()
            );
        } else {
            log::info!(
                "rendered {} rules ({} executions)",
                report.rules,
                report.executions
            );
        }
        Ok(report)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .field("base", &self.base)
            .field("rules", &self.rules.len())
            .finish()
    }
}

/// Render a document in one call and return the resulting markup.
pub fn render_html(html: &str, loader: impl StylesheetLoader + 'static) -> Result<String> {
    let mut engine = Engine::new(html).with_loader(loader);
    engine.render()?;
    Ok(engine.html())
}
