//! Engine options and the configured entry point.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::Template;
use crate::error::{Error, ParseError, RenderError};
use crate::eval::Evaluator;
use crate::parser::Parser;
use crate::value::Context;

/// Options controlling how templates are parsed.
///
/// Every field has a default, so a partial JSON object such as
/// `{"trim_blocks": false}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `IF` and `END` tags swallow the single newline that directly follows
    /// their closing `%]`. Output tags are unaffected.
    pub trim_blocks: bool,
    /// Maximum `IF` nesting depth.
    pub max_depth: usize,
    /// Maximum nesting of operators, parentheses and method calls inside a
    /// single expression.
    pub max_expr_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trim_blocks: true,
            max_depth: 64,
            max_expr_depth: 128,
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Parses and renders templates with a fixed [`Config`].
///
/// An `Engine` holds no per-render state and can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: Config,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn parse(&self, source: &str) -> Result<Template, ParseError> {
        let result = Parser::new(source, &self.config).parse();
        match &result {
            Ok(template) => debug!(
                bytes = source.len(),
                nodes = template.len(),
                "parsed template"
            ),
            Err(err) => debug!(%err, "template failed to parse"),
        }
        result
    }

    pub fn render(&self, template: &Template, context: &Context) -> Result<String, RenderError> {
        let result = Evaluator::new(context).render(template);
        match &result {
            Ok(output) => debug!(bytes = output.len(), "rendered template"),
            Err(err) => debug!(%err, "template failed to render"),
        }
        result
    }

    /// Parse `source` and render it in one step.
    pub fn render_str(&self, source: &str, context: &Context) -> Result<String, Error> {
        let template = self.parse(source)?;
        Ok(self.render(&template, context)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.trim_blocks);
        assert_eq!(config.max_depth, 64);
        assert_eq!(config.max_expr_depth, 128);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = Config::from_json_str(r#"{"trim_blocks": false}"#).unwrap();
        assert_eq!(
            config,
            Config {
                trim_blocks: false,
                max_depth: 64,
                max_expr_depth: 128,
            }
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Config::from_json_str(r#"{"trim_block": false}"#).is_err());
    }

    #[test]
    fn trim_blocks_off_keeps_newlines_after_block_tags() {
        let engine = Engine::new(Config {
            trim_blocks: false,
            ..Config::default()
        });
        let out = engine
            .render_str("[% IF x %]\nA\n[% END %]\n", &Context::new().with("x", true))
            .unwrap();
        assert_eq!(out, "\nA\n\n");
    }

    #[test]
    fn render_str_surfaces_both_error_families() {
        let engine = Engine::default();
        assert!(matches!(
            engine.render_str("[% END %]", &Context::new()),
            Err(Error::Parse(ParseError::UnmatchedEnd { .. }))
        ));
        assert!(matches!(
            engine.render_str("[% l %]", &Context::new().with("l", vec!["a"])),
            Err(Error::Render(RenderError::UnrenderableSequence { .. }))
        ));
    }
}
