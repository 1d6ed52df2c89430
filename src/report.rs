//! XML issue report writer.
//!
//! Serializes the issues and analysis errors of a batch of files.
//!
//! # Example
//!
//! ```rust
//! use xmlcheck::issue::Issue;
//! use xmlcheck::range::TextRange;
//! use xmlcheck::report::{FileReport, ReportWriter};
//!
//! let mut file = FileReport::new("pom.xml");
//! let range = TextRange::new(3, 0, 3, 1).unwrap();
//! file.issues.push(Issue::new("TabCharacterCheck", range, "Replace tabs"));
//!
//! let xml = ReportWriter::new().write_to_string(&[file]).unwrap();
//! assert!(xml.contains("<issue rule=\"TabCharacterCheck\""));
//! ```

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::engine::CollectingSink;
use crate::error::{Error, Result};
use crate::issue::Issue;
use crate::range::TextRange;

/// Indentation of the report, one unit per nesting level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indent {
    /// Byte repeated for each level, a space or a tab
    pub byte: u8,
    /// Repetitions per level
    pub width: usize,
}

impl Indent {
    /// `width` spaces per level.
    pub fn spaces(width: usize) -> Self {
        Self { byte: b' ', width }
    }

    /// One tab per level.
    pub fn tabs() -> Self {
        Self { byte: b'\t', width: 1 }
    }
}

/// Layout and content options of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportConfig {
    /// Indentation, or `None` for single-line output
    pub indent: Option<Indent>,
    /// Whether files without issues or errors get an empty `<file/>` entry
    pub include_clean_files: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            indent: Some(Indent::spaces(2)),
            include_clean_files: true,
        }
    }
}

impl ReportConfig {
    /// Single-line output.
    pub fn compact() -> Self {
        Self {
            indent: None,
            ..Self::default()
        }
    }

    /// Sets the indentation.
    pub fn with_indent(mut self, indent: Option<Indent>) -> Self {
        self.indent = indent;
        self
    }

    /// Leaves files without findings out of the report.
    pub fn failures_only(mut self) -> Self {
        self.include_clean_files = false;
        self
    }
}

/// Results for one analysed file.
#[derive(Debug, Clone, Default)]
pub struct FileReport {
    /// Identity of the file
    pub uri: String,
    /// Issues in reporting order
    pub issues: Vec<Issue>,
    /// Analysis errors (unreadable or malformed file)
    pub errors: Vec<String>,
}

impl FileReport {
    /// Empty report for `uri`.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Report holding everything a sink collected for a single file.
    pub fn from_sink(uri: impl Into<String>, sink: CollectingSink) -> Self {
        Self {
            uri: uri.into(),
            issues: sink.issues.into_iter().map(|(_, issue)| issue).collect(),
            errors: sink.analysis_errors.into_iter().map(|(_, message)| message).collect(),
        }
    }

    /// No issues and no errors.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.errors.is_empty()
    }
}

/// Issue report writer.
pub struct ReportWriter {
    config: ReportConfig,
}

impl ReportWriter {
    /// Writer with default configuration.
    pub fn new() -> Self {
        Self {
            config: ReportConfig::default(),
        }
    }

    /// Writer with the specified configuration.
    pub fn with_config(config: ReportConfig) -> Self {
        Self { config }
    }

    /// Writes a report to a string.
    pub fn write_to_string(&self, files: &[FileReport]) -> Result<String> {
        let mut buffer = Vec::new();
        self.write(files, &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| Error::Utf8(err.utf8_error()))
    }

    /// Writes a report to any Write implementation.
    pub fn write<W: Write>(&self, files: &[FileReport], writer: W) -> Result<()> {
        let mut xml_writer = match self.config.indent {
            Some(indent) => Writer::new_with_indent(writer, indent.byte, indent.width),
            None => Writer::new(writer),
        };

        xml_writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        if self.config.indent.is_some() {
            xml_writer.get_mut().write_all(b"\n")?;
        }

        let mut root = BytesStart::new("xmlcheck");
        root.push_attribute(("version", crate::VERSION));
        xml_writer.write_event(Event::Start(root))?;

        for file in files {
            if self.config.include_clean_files || !file.is_clean() {
                self.write_file(&mut xml_writer, file)?;
            }
        }

        xml_writer.write_event(Event::End(BytesEnd::new("xmlcheck")))?;
        Ok(())
    }

    fn write_file<W: Write>(&self, writer: &mut Writer<W>, file: &FileReport) -> Result<()> {
        let mut elem = BytesStart::new("file");
        elem.push_attribute(("uri", file.uri.as_str()));
        if file.is_clean() {
            writer.write_event(Event::Empty(elem))?;
            return Ok(());
        }
        writer.write_event(Event::Start(elem))?;

        for error in &file.errors {
            self.write_simple_element(writer, "error", error)?;
        }
        for issue in &file.issues {
            self.write_issue(writer, issue)?;
        }

        writer.write_event(Event::End(BytesEnd::new("file")))?;
        Ok(())
    }

    fn write_issue<W: Write>(&self, writer: &mut Writer<W>, issue: &Issue) -> Result<()> {
        let mut elem = BytesStart::new("issue");
        elem.push_attribute(("rule", issue.rule_key.as_str()));
        if let Some(range) = issue.range() {
            push_range(&mut elem, &range);
        }
        writer.write_event(Event::Start(elem))?;

        self.write_simple_element(writer, "message", &issue.message)?;
        for secondary in &issue.secondary {
            let mut location = BytesStart::new("location");
            push_range(&mut location, &secondary.range);
            match &secondary.label {
                Some(label) => {
                    writer.write_event(Event::Start(location))?;
                    writer.write_event(Event::Text(BytesText::new(label)))?;
                    writer.write_event(Event::End(BytesEnd::new("location")))?;
                }
                None => writer.write_event(Event::Empty(location))?,
            }
        }

        writer.write_event(Event::End(BytesEnd::new("issue")))?;
        Ok(())
    }

    /// Writes a simple text element.
    fn write_simple_element<W: Write>(
        &self,
        writer: &mut Writer<W>,
        name: &str,
        value: &str,
    ) -> Result<()> {
        writer.write_event(Event::Start(BytesStart::new(name)))?;
        writer.write_event(Event::Text(BytesText::new(value)))?;
        writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }
}

fn push_range(elem: &mut BytesStart<'_>, range: &TextRange) {
    elem.push_attribute(("line", range.start_line.to_string().as_str()));
    elem.push_attribute(("column", range.start_column.to_string().as_str()));
    elem.push_attribute(("endLine", range.end_line.to_string().as_str()));
    elem.push_attribute(("endColumn", range.end_column.to_string().as_str()));
}

impl Default for ReportWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to write a report to a string.
pub fn to_string(files: &[FileReport]) -> Result<String> {
    ReportWriter::new().write_to_string(files)
}

/// Convenience function to write a report to a string without indentation.
pub fn to_string_compact(files: &[FileReport]) -> Result<String> {
    ReportWriter::with_config(ReportConfig::compact()).write_to_string(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Issue;

    fn range(l1: usize, c1: usize, l2: usize, c2: usize) -> TextRange {
        TextRange::new(l1, c1, l2, c2).unwrap()
    }

    #[test]
    fn test_write_issues() {
        let mut file = FileReport::new("a.xml");
        file.issues.push(
            Issue::new("TabCharacterCheck", range(2, 0, 2, 1), "Replace tabs")
                .with_secondary(range(3, 0, 3, 2), Some("here".to_string())),
        );
        file.issues.push(Issue::file_level("XPathCheck", "Too <many> beans"));

        let xml = to_string_compact(&[file]).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(
            "<issue rule=\"TabCharacterCheck\" line=\"2\" column=\"0\" endLine=\"2\" endColumn=\"1\">"
        ));
        assert!(xml.contains(
            "<location line=\"3\" column=\"0\" endLine=\"3\" endColumn=\"2\">here</location>"
        ));
        assert!(xml.contains("<issue rule=\"XPathCheck\"><message>Too &lt;many&gt; beans</message></issue>"));
        assert!(xml.ends_with("</file></xmlcheck>"));
    }

    #[test]
    fn test_write_errors_and_clean_files() {
        let mut bad = FileReport::new("bad.xml");
        bad.errors.push("Malformed XML at line 1: unclosed".to_string());
        let clean = FileReport::new("clean.xml");

        let xml = to_string(&[bad, clean]).unwrap();
        assert!(xml.contains("<error>Malformed XML at line 1: unclosed</error>"));
        assert!(xml.contains("<file uri=\"clean.xml\"/>"));
        assert!(xml.contains("\n  <file"));
    }

    #[test]
    fn test_layout_options() {
        let mut bad = FileReport::new("bad.xml");
        bad.issues.push(Issue::new("TabCharacterCheck", range(1, 0, 1, 1), "tab"));
        let files = [bad, FileReport::new("clean.xml")];

        let tabbed = ReportWriter::with_config(ReportConfig::default().with_indent(Some(Indent::tabs())))
            .write_to_string(&files)
            .unwrap();
        assert!(tabbed.contains("\n\t<file uri=\"bad.xml\">"));
        assert!(tabbed.contains("\n\t\t<issue "));

        let wide = ReportWriter::with_config(ReportConfig::default().with_indent(Some(Indent::spaces(4))))
            .write_to_string(&files)
            .unwrap();
        assert!(wide.contains("\n        <issue "));

        let failures = ReportWriter::with_config(ReportConfig::compact().failures_only())
            .write_to_string(&files)
            .unwrap();
        assert!(failures.contains("bad.xml"));
        assert!(!failures.contains("clean.xml"));
        assert!(!failures.contains('\n'));
    }

    #[test]
    fn test_from_sink() {
        let mut sink = CollectingSink::default();
        sink.issues.push(("x.xml".to_string(), Issue::file_level("R", "m")));
        sink.analysis_errors.push(("x.xml".to_string(), "e".to_string()));
        let report = FileReport::from_sink("x.xml", sink);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.errors, vec!["e".to_string()]);
        assert!(!report.is_clean());
        assert!(FileReport::new("y.xml").is_clean());
    }
}
