//! # csspipe
//!
//! Stylesheet-driven rendering: custom CSS properties hold small programs
//! that run against the elements their selectors match.
//!
//! ## Stages
//!
//! A style rule may carry up to four stage properties. They always run in
//! this order, each receiving the `data` value left by the one before:
//!
//! | property    | default mode | legacy name |
//! |-------------|--------------|-------------|
//! | `--data`    | `json`       |             |
//! | `--prepare` | `script`     |             |
//! | `--body`    | `template`   | `--html`    |
//! | `--script`  | `script`     | `--js`      |
//!
//! A value is either a bare body, `(body)`, or `mode(body)`. When the
//! `body` stage replaces an element's children, earlier rules are applied
//! to the new markup straight away.
//!
//! ## Quick Start
//!
//! ```
//! use csspipe::{NoLoader, render_html};
//!
//! let html = render_html(
//!     r#"<style>
//!         nav { --data: json({"n": 1}); --body: (<b>${data.n}</b>) }
//!     </style>
//!     <nav></nav>"#,
//!     NoLoader,
//! )
//! .unwrap();
//!
//! assert!(html.contains("<nav><b>1</b></nav>"));
//! ```
//!
//! ## Custom modes
//!
//! ```
//! use csspipe::{Engine, Stage, renderer};
//! use serde_json::json;
//!
//! let mut engine = Engine::new("<style>p { --data: count(a b c) }</style><p></p>");
//! engine.register_mode(
//!     "count",
//!     |body: &str| {
//!         let words = body.split_whitespace().count();
//!         Ok(renderer(move |_, _| Ok(Some(json!(words)))))
//!     },
//!     &[Stage::Data],
//! );
//! engine.render().unwrap();
//! ```

pub mod compile;
pub mod config;
pub mod css;
pub mod dom;
pub mod engine;
pub mod error;
pub mod expr;
pub mod modes;
pub mod property;
pub mod registry;
pub mod report;
pub mod runner;
pub mod stage;
pub mod target;
pub(crate) mod util;
pub mod walker;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use config::RenderOptions;
pub use css::{FsLoader, LoadError, MemoryLoader, NoLoader, StylesheetLoader};
pub use dom::{BodyValue, set_body};
pub use engine::{Engine, render_html};
pub use error::{Error, Result, UserCodeError};
pub use registry::{Compiler, ModeRegistry, Renderer, renderer};
pub use report::{Diagnostic, Phase, RenderReport};
pub use stage::Stage;
pub use target::Target;
