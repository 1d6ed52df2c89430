use std::collections::HashSet;

use crate::config::RuleParams;
use crate::error::Result;
use crate::range::{RangeKind, TextRange};
use crate::source::SourceDocument;
use crate::tree::{Document, NodeId, NodeKind};

use super::{has_text_content, Check, CheckContext};

/// Checks that elements are indented by their depth times a fixed unit.
///
/// Only elements starting a line are checked. A mis-indented element gets
/// one issue and its subtree is skipped. Closing tags are checked when the
/// element has child elements and the tag starts its own line. Nothing
/// inside mixed content is checked.
#[derive(Debug, Clone)]
pub struct IndentationCheck {
    indent_size: usize,
    tab_size: usize,
}

enum Visit {
    Open(NodeId, usize),
    Close(NodeId, usize),
}

impl IndentationCheck {
    /// Rule key.
    pub const KEY: &'static str = "IndentationCheck";

    /// Default indentation unit.
    pub const DEFAULT_INDENT_SIZE: usize = 2;

    /// Default width of a tab character.
    pub const DEFAULT_TAB_SIZE: usize = 2;

    /// Check with explicit sizes.
    pub fn new(indent_size: usize, tab_size: usize) -> Self {
        Self {
            indent_size,
            tab_size,
        }
    }

    /// Reads `indentSize` and `tabSize`.
    pub fn from_params(params: &RuleParams) -> Result<Self> {
        Ok(Self::new(
            params.get_usize(Self::KEY, "indentSize", Self::DEFAULT_INDENT_SIZE)?,
            params.get_usize(Self::KEY, "tabSize", Self::DEFAULT_TAB_SIZE)?,
        ))
    }

    fn width(&self, whitespace: &str) -> usize {
        whitespace
            .chars()
            .map(|c| if c == '\t' { self.tab_size } else { 1 })
            .sum()
    }

    fn message(&self, expected: usize, actual: usize) -> String {
        format!(
            "Make this line start after {} spaces instead of {} in order to indent the code consistently. (Indentation level is at {}.)",
            expected, actual, self.indent_size
        )
    }

    /// Indentation of an element that starts a line, `None` otherwise.
    fn leading_indent(&self, document: &Document, source: &SourceDocument, element: NodeId) -> Option<usize> {
        let Some(previous) = document.previous_sibling(element) else {
            let start = document.range(element, RangeKind::Start)?;
            return starts_line(source, &start).then_some(0);
        };
        let NodeKind::Text(text) = document.kind(previous) else {
            return None;
        };
        if !text.chars().all(char::is_whitespace) {
            return None;
        }
        match text.rfind(|c: char| c == '\n' || c == '\r') {
            Some(newline) => Some(self.width(&text[newline + 1..])),
            None => {
                let range = document.node_range(previous)?;
                let first = document.previous_sibling(previous).is_none();
                (first && starts_line(source, &range)).then(|| self.width(text))
            }
        }
    }

    /// Indentation of an element's closing tag when it starts a line.
    fn closing_indent(&self, document: &Document, element: NodeId) -> Option<usize> {
        let last = *document.children(element).last()?;
        let NodeKind::Text(text) = document.kind(last) else {
            return None;
        };
        if !text.chars().all(char::is_whitespace) {
            return None;
        }
        let newline = text.rfind(|c: char| c == '\n' || c == '\r')?;
        Some(self.width(&text[newline + 1..]))
    }
}

fn starts_line(source: &SourceDocument, range: &TextRange) -> bool {
    range.start_column == source.first_column(range.start_line)
}

impl Check for IndentationCheck {
    fn rule_key(&self) -> &'static str {
        Self::KEY
    }

    fn scan_file(&mut self, context: &mut CheckContext<'_>) -> Result<()> {
        let document = context.document();
        let source = context.source();
        let Some(root) = document.root_element() else {
            return Ok(());
        };

        let mut reported_lines = HashSet::new();
        let mut stack = vec![Visit::Open(root, 0)];
        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Open(element, level) => {
                    let expected = level * self.indent_size;
                    if let Some(actual) = self.leading_indent(document, source, element) {
                        if actual != expected {
                            if let Some(start) = document.range(element, RangeKind::Start) {
                                context.report(start, self.message(expected, actual));
                                reported_lines.insert(start.start_line);
                            }
                            continue;
                        }
                    }
                    if has_text_content(document, element) {
                        continue;
                    }
                    stack.push(Visit::Close(element, level));
                    for &child in document.children(element).iter().rev() {
                        if document.is_element(child) {
                            stack.push(Visit::Open(child, level + 1));
                        }
                    }
                }
                Visit::Close(element, level) => {
                    let has_child_elements = document
                        .children(element)
                        .iter()
                        .any(|&child| document.is_element(child));
                    if !has_child_elements {
                        continue;
                    }
                    let Some(end) = document.range(element, RangeKind::End) else {
                        continue;
                    };
                    // one issue per line
                    if reported_lines.contains(&end.start_line) {
                        continue;
                    }
                    let expected = level * self.indent_size;
                    match self.closing_indent(document, element) {
                        Some(actual) if actual != expected => {
                            context.report(end, self.message(expected, actual));
                            reported_lines.insert(end.start_line);
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::file::XmlFile;
    use crate::issue::Issue;

    fn scan(check: &mut IndentationCheck, text: &str) -> Vec<Issue> {
        let file = XmlFile::from_text("indent.xml", text).unwrap();
        let settings = Settings::default();
        let mut context = CheckContext::new(&file, &settings, IndentationCheck::KEY);
        check.scan_file(&mut context).unwrap();
        context.into_issues()
    }

    #[test]
    fn test_one_issue_per_block() {
        let mut check = IndentationCheck::new(2, 2);
        let issues = scan(
            &mut check,
            "<root>\n<tag>\n<nested>value</nested>\n</tag>\n</root>",
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].range(), Some(TextRange::new(2, 0, 2, 5).unwrap()));
        assert!(issues[0].message.contains("after 2 spaces instead of 0"));
    }

    #[test]
    fn test_well_indented() {
        let mut check = IndentationCheck::new(2, 2);
        let text = "<?xml version=\"1.0\"?>\n<root>\n  <a>\n    <b/>\n  </a>\n  <c>x</c>\n</root>\n";
        assert!(scan(&mut check, text).is_empty());
    }

    #[test]
    fn test_closing_tag() {
        let mut check = IndentationCheck::new(2, 2);
        let issues = scan(&mut check, "<root>\n  <a>\n    <b/>\n    </a>\n</root>");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].range(), Some(TextRange::new(4, 4, 4, 8).unwrap()));
    }

    #[test]
    fn test_tabs_use_tab_size() {
        let mut check = IndentationCheck::new(4, 4);
        assert!(scan(&mut check, "<root>\n\t<a/>\n</root>").is_empty());

        let mut check = IndentationCheck::new(4, 2);
        assert_eq!(scan(&mut check, "<root>\n\t<a/>\n</root>").len(), 1);
    }

    #[test]
    fn test_mixed_content_is_ignored() {
        let mut check = IndentationCheck::new(2, 2);
        let text = "<root>\n  <p>Some text\n<b>bold</b>\n      <i>x</i>\n  </p>\n</root>";
        assert!(scan(&mut check, text).is_empty());
    }

    #[test]
    fn test_elements_not_starting_a_line() {
        let mut check = IndentationCheck::new(2, 2);
        assert!(scan(&mut check, "<root><a/> <b/>\n</root>").is_empty());
    }

    #[test]
    fn test_params() {
        let params = RuleParams::new().with("indentSize", "4");
        let check = IndentationCheck::from_params(&params).unwrap();
        assert_eq!(check.indent_size, 4);
        assert_eq!(check.tab_size, IndentationCheck::DEFAULT_TAB_SIZE);
    }
}
