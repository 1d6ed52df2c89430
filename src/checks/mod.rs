//! Checks and the context they run in.
//!
//! A [`Check`] inspects one parsed file at a time and reports [`Issue`]s
//! through its [`CheckContext`]. Checks come in three flavours:
//!
//! - tree visitors ([`Visitor`] + [`walk`]), e.g. [`CommentPatternCheck`]
//! - line scanners working on [`SourceDocument::lines`], e.g. [`TabCharacterCheck`]
//! - path queries, see [`XPathCheck`]
//!
//! [`build_checks`] turns an [`AnalyzerConfig`] into the ordered list of
//! checks to run.

mod char_before_prolog;
mod comment_pattern;
mod indentation;
mod newline;
mod newline_at_end_of_file;
mod tab_character;
mod visitor;
mod xpath;

pub use char_before_prolog::CharBeforePrologCheck;
pub use comment_pattern::CommentPatternCheck;
pub use indentation::IndentationCheck;
pub use newline::NewlineCheck;
pub use newline_at_end_of_file::NewlineAtEndOfFileCheck;
pub use tab_character::TabCharacterCheck;
pub use visitor::{walk, Visitor};
pub use xpath::XPathCheck;

use tracing::debug;

use crate::config::{AnalyzerConfig, RuleParams, Settings};
use crate::error::{Error, Result};
use crate::file::XmlFile;
use crate::issue::Issue;
use crate::range::TextRange;
use crate::source::SourceDocument;
use crate::tree::{Document, NodeId, NodeKind};

/// Rule key of the synthesized issue for files that fail to parse.
pub const PARSING_ERROR_RULE: &str = "ParsingError";

/// Rule key of the configurable query check.
pub const XPATH_RULE: &str = "XPathCheck";

/// Every rule key this crate knows, in execution order.
pub const BUILTIN_RULES: &[&str] = &[
    PARSING_ERROR_RULE,
    CharBeforePrologCheck::KEY,
    IndentationCheck::KEY,
    NewlineCheck::KEY,
    TabCharacterCheck::KEY,
    NewlineAtEndOfFileCheck::KEY,
    CommentPatternCheck::KEY,
    XPATH_RULE,
];

/// A rule implementation.
pub trait Check: Send {
    /// Key of the rule this check implements.
    fn rule_key(&self) -> &'static str;

    /// Called before a file is scanned. Per-file state must be reset here.
    fn start_file(&mut self) {}

    /// Scans one parsed file.
    fn scan_file(&mut self, context: &mut CheckContext<'_>) -> Result<()>;

    /// Called after a file is scanned, even when scanning failed.
    fn end_file(&mut self) {}
}

/// What a check sees while scanning a file, plus its issue buffer.
pub struct CheckContext<'a> {
    file: &'a XmlFile,
    settings: &'a Settings,
    rule_key: &'static str,
    issues: Vec<Issue>,
}

impl<'a> CheckContext<'a> {
    /// Context for running the check with `rule_key` on `file`.
    pub fn new(file: &'a XmlFile, settings: &'a Settings, rule_key: &'static str) -> Self {
        Self {
            file,
            settings,
            rule_key,
            issues: Vec::new(),
        }
    }

    /// The file under analysis.
    pub fn file(&self) -> &'a XmlFile {
        self.file
    }

    /// The namespace-aware tree.
    pub fn document(&self) -> &'a Document {
        self.file.document()
    }

    /// The decoded source.
    pub fn source(&self) -> &'a SourceDocument {
        self.file.source()
    }

    /// Global settings.
    pub fn settings(&self) -> &'a Settings {
        self.settings
    }

    /// Reports an issue at `range`.
    pub fn report(&mut self, range: TextRange, message: impl Into<String>) {
        self.issues.push(Issue::new(self.rule_key, range, message));
    }

    /// Reports an issue about the whole file.
    pub fn report_file(&mut self, message: impl Into<String>) {
        self.issues.push(Issue::file_level(self.rule_key, message));
    }

    /// Reports a fully built issue.
    pub fn report_issue(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Issues reported so far.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Consumes the context, returning its issues.
    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}

/// Builds the enabled checks in execution order.
///
/// Checks that cannot be configured are left out; the matching errors are
/// returned alongside so the host can report them once.
pub fn build_checks(config: &AnalyzerConfig) -> (Vec<Box<dyn Check>>, Vec<Error>) {
    let mut checks: Vec<Box<dyn Check>> = Vec::new();
    let mut errors = Vec::new();

    for &rule in BUILTIN_RULES {
        let Some(params) = config.rules.get(rule) else {
            continue;
        };
        match create_check(rule, params) {
            Ok(Some(check)) => checks.push(check),
            Ok(None) => {}
            Err(err) => {
                debug!(rule, error = %err, "check disabled at setup");
                errors.push(err);
            }
        }
    }

    for rule in config.rules.keys() {
        if !BUILTIN_RULES.contains(&rule.as_str()) {
            errors.push(Error::Configuration {
                rule: rule.clone(),
                message: "unknown rule".to_string(),
            });
        }
    }

    (checks, errors)
}

fn create_check(rule: &str, params: &RuleParams) -> Result<Option<Box<dyn Check>>> {
    let check: Box<dyn Check> = match rule {
        CharBeforePrologCheck::KEY => Box::new(CharBeforePrologCheck),
        IndentationCheck::KEY => Box::new(IndentationCheck::from_params(params)?),
        NewlineCheck::KEY => Box::new(NewlineCheck::new()),
        TabCharacterCheck::KEY => Box::new(TabCharacterCheck),
        NewlineAtEndOfFileCheck::KEY => Box::new(NewlineAtEndOfFileCheck),
        CommentPatternCheck::KEY => Box::new(CommentPatternCheck::from_params(params)?),
        XPATH_RULE => Box::new(XPathCheck::from_params(params)?),
        // handled by the engine
        _ => return Ok(None),
    };
    Ok(Some(check))
}

/// Whether an element directly holds non-whitespace character data.
pub(crate) fn has_text_content(document: &Document, id: NodeId) -> bool {
    document.children(id).iter().any(|&child| match document.kind(child) {
        NodeKind::Text(text) | NodeKind::CData(text) => !text.trim().is_empty(),
        _ => false,
    })
}

/// Whether a node or any of its ancestors mixes elements with text.
pub(crate) fn in_mixed_content(document: &Document, id: NodeId) -> bool {
    std::iter::once(id)
        .chain(document.ancestors(id))
        .any(|node| document.is_element(node) && has_text_content(document, node))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_checks_in_rule_order() {
        let config = AnalyzerConfig::default()
            .enable(TabCharacterCheck::KEY, RuleParams::new())
            .enable(IndentationCheck::KEY, RuleParams::new())
            .enable(PARSING_ERROR_RULE, RuleParams::new());
        let (checks, errors) = build_checks(&config);
        assert!(errors.is_empty());
        let keys: Vec<_> = checks.iter().map(|c| c.rule_key()).collect();
        assert_eq!(keys, vec![IndentationCheck::KEY, TabCharacterCheck::KEY]);
    }

    #[test]
    fn test_setup_errors_disable_checks() {
        let config = AnalyzerConfig::default()
            .enable(XPATH_RULE, RuleParams::new().with("expression", "//a["))
            .enable(CommentPatternCheck::KEY, RuleParams::new().with("pattern", "(unclosed"))
            .enable(IndentationCheck::KEY, RuleParams::new().with("indentSize", "two"))
            .enable("NoSuchRule", RuleParams::new())
            .enable(NewlineCheck::KEY, RuleParams::new());
        let (checks, errors) = build_checks(&config);
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].rule_key(), NewlineCheck::KEY);
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| matches!(e, Error::Query { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, Error::Configuration { rule, .. } if rule == "NoSuchRule")));
    }

    #[test]
    fn test_mixed_content() {
        let file = XmlFile::from_text("m.xml", "<r><p>text <b>bold</b></p><q>\n  <c/>\n</q></r>").unwrap();
        let doc = file.document();
        let r = doc.root_element().unwrap();
        let p = doc.children(r)[0];
        let b = doc.children(p)[1];
        let q = doc.children(r)[1];
        assert!(has_text_content(doc, p));
        assert!(in_mixed_content(doc, b));
        assert!(!in_mixed_content(doc, q));
        assert!(!has_text_content(doc, q));
    }
}
