use crate::error::Result;
use crate::issue::Issue;

use super::{Check, CheckContext};

/// Reports tab characters, once per file.
///
/// The first tab run is the primary location; the following runs become
/// secondary locations up to [`MAX_LOCATIONS`](Self::MAX_LOCATIONS) in
/// total. Any further runs are only counted in the message.
#[derive(Debug, Default)]
pub struct TabCharacterCheck;

impl TabCharacterCheck {
    /// Rule key.
    pub const KEY: &'static str = "TabCharacterCheck";

    /// Maximum number of located tab runs in one issue.
    pub const MAX_LOCATIONS: usize = 21;

    const MESSAGE: &'static str = "Replace all tab characters in this file by sequences of white-spaces.";
}

/// (line, start column, end column) of every run of tabs.
fn tab_runs(lines: &[&str]) -> Vec<(usize, usize, usize)> {
    let mut runs = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        let mut run_start = None;
        let mut column = 0;
        for c in line.chars() {
            if c == '\t' {
                run_start.get_or_insert(column);
            } else if let Some(start) = run_start.take() {
                runs.push((index + 1, start, column));
            }
            column += 1;
        }
        if let Some(start) = run_start {
            runs.push((index + 1, start, column));
        }
    }
    runs
}

impl Check for TabCharacterCheck {
    fn rule_key(&self) -> &'static str {
        Self::KEY
    }

    fn scan_file(&mut self, context: &mut CheckContext<'_>) -> Result<()> {
        let source = context.source();
        let runs = tab_runs(&source.lines());
        let Some(&(line, start, end)) = runs.first() else {
            return Ok(());
        };

        let remaining = runs.len().saturating_sub(Self::MAX_LOCATIONS);
        let message = if remaining > 0 {
            format!("{} ({} more)", Self::MESSAGE, remaining)
        } else {
            Self::MESSAGE.to_string()
        };

        let mut issue = Issue::new(Self::KEY, source.line_range(line, start, end)?, message);
        for &(line, start, end) in runs.iter().skip(1).take(Self::MAX_LOCATIONS - 1) {
            issue = issue.with_secondary(source.line_range(line, start, end)?, None);
        }
        context.report_issue(issue);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::file::XmlFile;
    use crate::range::TextRange;

    fn scan(text: &str) -> Vec<Issue> {
        let file = XmlFile::from_text("tabs.xml", text).unwrap();
        let settings = Settings::default();
        let mut context = CheckContext::new(&file, &settings, TabCharacterCheck::KEY);
        TabCharacterCheck.scan_file(&mut context).unwrap();
        context.into_issues()
    }

    #[test]
    fn test_tab_runs() {
        assert_eq!(tab_runs(&["a\t\tb\t", "", "\tc"]), vec![(1, 1, 3), (1, 4, 5), (3, 0, 1)]);
    }

    #[test]
    fn test_no_tabs() {
        assert!(scan("<r>\n  <a/>\n</r>").is_empty());
    }

    #[test]
    fn test_single_issue_with_secondaries() {
        let issues = scan("<r>\n\t<a/>\n\t\t<b/>\n</r>");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].range(), Some(TextRange::new(2, 0, 2, 1).unwrap()));
        assert_eq!(issues[0].secondary.len(), 1);
        assert_eq!(issues[0].secondary[0].range, TextRange::new(3, 0, 3, 2).unwrap());
        assert_eq!(issues[0].message, TabCharacterCheck::MESSAGE);
    }

    #[test]
    fn test_bounded_output() {
        let mut text = String::from("<r>\n");
        for _ in 0..30 {
            text.push_str("\t<a/>\n");
        }
        text.push_str("</r>");
        let issues = scan(&text);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].secondary.len() + 1, TabCharacterCheck::MAX_LOCATIONS);
        assert!(issues[0].message.ends_with("(9 more)"));
    }
}
