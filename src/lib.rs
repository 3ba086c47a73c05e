//! confplate: a small, side-effect-free engine for `[% ... %]` configuration
//! templates.
//!
//! Templates are the config files written by installers and provisioning
//! steps (database credentials, cache settings, site constants) with
//! directives where values from a context get substituted.
//!
//! Supported directives:
//! - `[% a.b.c %]` emits a dotted path; a missing path emits nothing.
//! - `[% a || b %]` and `[% a ? a : b %]` emit `a` if truthy, else `b`.
//! - `[% cond ? 'x' : 'y' %]` picks between two expressions.
//! - `[% IF cond %] ... [% END %]` includes its body when `cond` is truthy.
//!   Conditions may combine `AND`/`&&`, `OR`/`||`, `NOT`/`!`, `==` and `!=`.
//! - `[% list.join(", ") %]` joins a sequence of scalars.
//! - `[%-` and `-%]` trim whitespace and one newline on that side of a tag.
//!
//! Not supported: loops, includes, assignments, or any directive with side
//! effects.
//!
//! Falsy values are the empty string, `false`, zero, an empty sequence and
//! missing values. Missing paths never fail; type mismatches (such as
//! `join` on a string) and emitting a sequence directly do.
//!
//! ```
//! use confplate::{render, Context};
//!
//! let tpl = "define('DB_HOST', '[% database.host %][% IF database.port %]:[% database.port %][% END %]');";
//! let ctx = Context::from_json_str(r#"{"database": {"host": "localhost", "port": 3306}}"#).unwrap();
//! assert_eq!(render(tpl, &ctx).unwrap(), "define('DB_HOST', 'localhost:3306');");
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::{Expr, Node, Template};
pub use config::{Config, Engine};
pub use error::{ContextError, Error, ParseError, Position, RenderError};
pub use value::{Context, Value};

/// Parse `source` with the default [`Config`].
pub fn parse(source: &str) -> Result<Template, ParseError> {
    Engine::default().parse(source)
}

/// Parse and render `source` against `context` with the default [`Config`].
pub fn render(source: &str, context: &Context) -> Result<String, Error> {
    Engine::default().render_str(source, context)
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        parse(source)
    }

    /// Render against `context`. The template is not modified, so one parsed
    /// template can be rendered concurrently against different contexts.
    pub fn render(&self, context: &Context) -> Result<String, RenderError> {
        Engine::default().render(self, context)
    }
}
