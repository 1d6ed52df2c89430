use regex::Regex;

use crate::config::RuleParams;
use crate::error::{Error, Result};
use crate::tree::NodeId;

use super::{walk, Check, CheckContext, Visitor};

/// Reports comments whose text matches a regular expression.
#[derive(Debug, Clone)]
pub struct CommentPatternCheck {
    pattern: Regex,
    message: String,
}

impl CommentPatternCheck {
    /// Rule key.
    pub const KEY: &'static str = "CommentPatternCheck";

    /// Pattern used when the `pattern` parameter is absent.
    pub const DEFAULT_PATTERN: &'static str = "TODO|FIXME";

    /// Message used when the `message` parameter is absent.
    pub const DEFAULT_MESSAGE: &'static str = "Take the required action to fix the issue indicated by this comment.";

    /// Compiles `pattern`. An invalid pattern is a configuration error.
    pub fn new(pattern: &str, message: impl Into<String>) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|err| Error::Configuration {
            rule: Self::KEY.to_string(),
            message: err.to_string(),
        })?;
        Ok(Self {
            pattern,
            message: message.into(),
        })
    }

    /// Reads `pattern` and `message`.
    pub fn from_params(params: &RuleParams) -> Result<Self> {
        Self::new(
            &params.get_str("pattern", Self::DEFAULT_PATTERN),
            params.get_str("message", Self::DEFAULT_MESSAGE),
        )
    }
}

impl Check for CommentPatternCheck {
    fn rule_key(&self) -> &'static str {
        Self::KEY
    }

    fn scan_file(&mut self, context: &mut CheckContext<'_>) -> Result<()> {
        walk(self, context)
    }
}

impl Visitor for CommentPatternCheck {
    fn visit_comment(&mut self, context: &mut CheckContext<'_>, node: NodeId, text: &str) -> Result<()> {
        if self.pattern.is_match(text) {
            if let Some(range) = context.document().node_range(node) {
                context.report(range, self.message.as_str());
            }
        }
        Ok(())
    }
}
