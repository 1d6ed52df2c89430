use std::collections::HashSet;

use crate::error::Result;
use crate::range::{RangeKind, TextRange};
use crate::tree::NodeId;

use super::{in_mixed_content, walk, Check, CheckContext, Visitor};

/// Checks that child elements and closing tags sit on their own lines.
///
/// Works from the line numbers of recorded ranges only. At most one issue
/// is raised per line.
#[derive(Debug, Default)]
pub struct NewlineCheck {
    reported_lines: HashSet<usize>,
}

impl NewlineCheck {
    /// Rule key.
    pub const KEY: &'static str = "NewlineCheck";

    const ELEMENT_MESSAGE: &'static str = "Put this element on a separate line.";
    const CLOSING_TAG_MESSAGE: &'static str = "Put this closing tag on a separate line.";

    /// A new check.
    pub fn new() -> Self {
        Self::default()
    }

    fn report(&mut self, context: &mut CheckContext<'_>, range: TextRange, message: &str) {
        if self.reported_lines.insert(range.start_line) {
            context.report(range, message);
        }
    }
}

impl Check for NewlineCheck {
    fn rule_key(&self) -> &'static str {
        Self::KEY
    }

    fn start_file(&mut self) {
        self.reported_lines.clear();
    }

    fn scan_file(&mut self, context: &mut CheckContext<'_>) -> Result<()> {
        walk(self, context)
    }

    fn end_file(&mut self) {
        self.reported_lines.clear();
    }
}

impl Visitor for NewlineCheck {
    fn visit_element(&mut self, context: &mut CheckContext<'_>, element: NodeId) -> Result<()> {
        let document = context.document();
        if in_mixed_content(document, element) {
            return Ok(());
        }
        let children: Vec<NodeId> = document
            .children(element)
            .iter()
            .copied()
            .filter(|&child| document.is_element(child))
            .collect();
        let (Some(&first), Some(&last)) = (children.first(), children.last()) else {
            return Ok(());
        };
        let (Some(start), Some(end)) = (
            document.range(element, RangeKind::Start),
            document.range(element, RangeKind::End),
        ) else {
            return Ok(());
        };

        if let Some(first_start) = document.range(first, RangeKind::Start) {
            if first_start.start_line == start.end_line {
                self.report(context, first_start, Self::ELEMENT_MESSAGE);
            }
        }

        for pair in children.windows(2) {
            let (Some(previous), Some(next)) = (
                document.node_range(pair[0]),
                document.range(pair[1], RangeKind::Start),
            ) else {
                continue;
            };
            if next.start_line == previous.end_line {
                self.report(context, next, Self::ELEMENT_MESSAGE);
            }
        }

        if let Some(last_range) = document.node_range(last) {
            if end.start_line == last_range.end_line {
                self.report(context, end, Self::CLOSING_TAG_MESSAGE);
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

    fn scan(check: &mut NewlineCheck, text: &str) -> Vec<Issue> {
        let file = XmlFile::from_text("newline.xml", text).unwrap();
        let settings = Settings::default();
        let mut context = CheckContext::new(&file, &settings, NewlineCheck::KEY);
        check.start_file();
        check.scan_file(&mut context).unwrap();
        check.end_file();
        context.into_issues()
    }

    #[test]
    fn test_siblings_on_one_line() {
        let mut check = NewlineCheck::new();
        let issues = scan(&mut check, "<r>\n  <a/><b/>\n  <c/>\n</r>");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].range(), Some(TextRange::new(2, 6, 2, 10).unwrap()));
        assert_eq!(issues[0].message, NewlineCheck::ELEMENT_MESSAGE);
    }

    #[test]
    fn test_closing_tag_after_child() {
        let mut check = NewlineCheck::new();
        let issues = scan(&mut check, "<r>\n  <a/></r>");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, NewlineCheck::CLOSING_TAG_MESSAGE);
    }

    #[test]
    fn test_one_issue_per_line() {
        let mut check = NewlineCheck::new();
        let issues = scan(&mut check, "<r><a/><b/></r>");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].range().unwrap().start_line, 1);
    }

    #[test]
    fn test_state_is_per_file() {
        let mut check = NewlineCheck::new();
        assert_eq!(scan(&mut check, "<r><a/></r>").len(), 1);
        assert_eq!(scan(&mut check, "<r><a/></r>").len(), 1);
    }

    #[test]
    fn test_clean_and_mixed_documents() {
        let mut check = NewlineCheck::new();
        assert!(scan(&mut check, "<r>\n  <a>x</a>\n  <b/>\n</r>\n").is_empty());
        assert!(scan(&mut check, "<p>Some <b>bold</b> and <i>italic</i> text</p>").is_empty());
    }
}
