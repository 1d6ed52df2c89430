//! End-to-end analysis through the engine.

use std::fs;

use xmlcheck::checks::{
    CharBeforePrologCheck, Check, CheckContext, IndentationCheck, TabCharacterCheck, XPathCheck,
};
use xmlcheck::config::{AnalyzerConfig, HostCapabilities, RuleParams, Settings};
use xmlcheck::engine::{AnalysisState, Analyzer, CollectingSink};
use xmlcheck::issue::{Issue, IssueLocation};
use xmlcheck::range::TextRange;
use xmlcheck::file::XmlFile;
use xmlcheck::report::{self, FileReport};
use xmlcheck::source::{Charset, MemoryInputFile, PathInputFile};
use xmlcheck::{Error, Result};

fn analyze(config: &AnalyzerConfig, input: &MemoryInputFile) -> Vec<Issue> {
    let mut analyzer = Analyzer::new(config, HostCapabilities::default());
    let mut sink = CollectingSink::default();
    analyzer.analyze(input, &mut sink);
    sink.issues.into_iter().map(|(_, issue)| issue).collect()
}

fn only(rule: &str) -> AnalyzerConfig {
    AnalyzerConfig::default().enable(rule, RuleParams::new())
}

#[test]
fn test_indentation_example() {
    let input = MemoryInputFile::new(
        "indent.xml",
        "<root>\n<tag>\n<nested>value</nested>\n</tag>\n</root>",
    );
    let config = AnalyzerConfig::default().enable(
        IndentationCheck::KEY,
        RuleParams::new().with("indentSize", 2i64),
    );
    let issues = analyze(&config, &input);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].range(), Some(TextRange::new(2, 0, 2, 5).unwrap()));
}

#[test]
fn test_bounded_tab_output() {
    let mut text = String::from("<r>\n");
    for _ in 0..30 {
        text.push_str("\t<a/>\n");
    }
    text.push_str("</r>\n");

    let issues = analyze(&only(TabCharacterCheck::KEY), &MemoryInputFile::new("tabs.xml", text));
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].secondary.len(), TabCharacterCheck::MAX_LOCATIONS - 1);
    assert!(issues[0].message.ends_with("(9 more)"));

    let clean = MemoryInputFile::new("clean.xml", "<r>\n  <a/>\n</r>\n");
    assert!(analyze(&only(TabCharacterCheck::KEY), &clean).is_empty());
}

struct AlwaysFails;

impl Check for AlwaysFails {
    fn rule_key(&self) -> &'static str {
        "AlwaysFails"
    }

    fn scan_file(&mut self, context: &mut CheckContext<'_>) -> Result<()> {
        context.report_file("never reported");
        Err(Error::Check {
            rule: "AlwaysFails".to_string(),
            message: "internal failure".to_string(),
        })
    }
}

#[test]
fn test_failing_check_is_isolated() {
    let checks: Vec<Box<dyn Check>> = vec![
        Box::new(AlwaysFails),
        Box::new(TabCharacterCheck),
        Box::new(IndentationCheck::new(2, 2)),
    ];
    let mut analyzer = Analyzer::with_checks(checks, Settings::default(), HostCapabilities::default());
    let mut sink = CollectingSink::default();

    let input = MemoryInputFile::new("x.xml", "<r>\n\t<a/>\n<b/>\n</r>\n");
    let outcome = analyzer.analyze(&input, &mut sink);

    assert_eq!(outcome.state, AnalysisState::Done);
    assert_eq!(outcome.failed_checks, vec!["AlwaysFails"]);
    let rules: Vec<&str> = sink.issues.iter().map(|(_, issue)| issue.rule_key.as_str()).collect();
    assert!(!rules.contains(&"AlwaysFails"));
    assert!(rules.contains(&TabCharacterCheck::KEY));
    assert!(rules.contains(&IndentationCheck::KEY));
}

#[test]
fn test_files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.xml");
    let bad = dir.path().join("bad.xml");
    let latin = dir.path().join("latin.xml");
    fs::write(&good, "<?xml version=\"1.0\"?>\n<project>\n  <name>demo</name>\n</project>\n").unwrap();
    fs::write(&bad, "<project>\n  <name>\n</project>\n").unwrap();
    fs::write(
        &latin,
        b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<r>caf\xe9</r>\n".to_vec(),
    )
    .unwrap();

    let mut analyzer = Analyzer::new(&AnalyzerConfig::all_rules(), HostCapabilities::default());
    let mut reports = Vec::new();
    for path in [&good, &bad, &latin] {
        let mut sink = CollectingSink::default();
        analyzer.analyze(&PathInputFile::new(path), &mut sink);
        reports.push(FileReport::from_sink(path.display().to_string(), sink));
    }

    assert!(reports[0].issues.is_empty());
    assert!(reports[0].errors.is_empty());

    assert_eq!(reports[1].errors.len(), 1);
    assert_eq!(reports[1].issues.len(), 1);
    assert_eq!(reports[1].issues[0].rule_key, "ParsingError");

    assert!(reports[2].errors.is_empty());
    assert!(reports[2].issues.is_empty());

    let xml = report::to_string(&reports).unwrap();
    assert!(xml.contains("rule=\"ParsingError\""));
    assert_eq!(xml.matches("<file ").count(), 3);
}

#[test]
fn test_declared_charset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("utf16.xml");
    let mut bytes = Vec::new();
    for unit in "<r>\n\t<a/>\n</r>\n".encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    fs::write(&path, bytes).unwrap();

    let input = PathInputFile::new(&path).with_charset(Charset::utf16le());
    let mut analyzer = Analyzer::new(&only(TabCharacterCheck::KEY), HostCapabilities::default());
    let mut sink = CollectingSink::default();
    analyzer.analyze(&input, &mut sink);
    assert_eq!(sink.issues.len(), 1);
    assert_eq!(
        sink.issues[0].1.location,
        IssueLocation::Range(TextRange::new(2, 0, 2, 1).unwrap())
    );
}

#[test]
fn test_missing_file_is_an_analysis_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut analyzer = Analyzer::new(&AnalyzerConfig::all_rules(), HostCapabilities::default());
    let mut sink = CollectingSink::default();
    let outcome = analyzer.analyze(&PathInputFile::new(dir.path().join("nope.xml")), &mut sink);
    assert_eq!(outcome.state, AnalysisState::ParseFailed);
    assert_eq!(sink.analysis_errors.len(), 1);
    assert!(sink.issues.is_empty());
}

#[test]
fn test_legacy_encodings_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cp1252.xml");
    fs::write(
        &path,
        b"<?xml version=\"1.0\" encoding=\"windows-1252\"?>\n<r>caf\xe9 \x80</r>\n".to_vec(),
    )
    .unwrap();

    let file = XmlFile::read(&PathInputFile::new(&path)).unwrap();
    assert_eq!(file.source().charset().name(), "windows-1252");
    let root = file.document().root_element().unwrap();
    assert_eq!(file.document().text_content(root), "caf\u{e9} \u{20ac}");

    let mut analyzer = Analyzer::new(&AnalyzerConfig::all_rules(), HostCapabilities::default());
    let mut sink = CollectingSink::default();
    let outcome = analyzer.analyze(&PathInputFile::new(&path), &mut sink);
    assert_eq!(outcome.state, AnalysisState::Done);
    assert!(sink.analysis_errors.is_empty());
    assert!(sink.issues.is_empty());
}

fn prolog_and_element_ranges(path: &std::path::Path) -> Vec<(String, TextRange)> {
    let checks: Vec<Box<dyn Check>> = vec![
        Box::new(CharBeforePrologCheck),
        Box::new(XPathCheck::new("//a", "a").unwrap()),
    ];
    let mut analyzer = Analyzer::with_checks(checks, Settings::default(), HostCapabilities::default());
    let mut sink = CollectingSink::default();
    analyzer.analyze(&PathInputFile::new(path), &mut sink);
    sink.issues
        .into_iter()
        .map(|(_, issue)| (issue.rule_key.clone(), issue.range().unwrap()))
        .collect()
}

#[test]
fn test_bom_with_preamble_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bom.xml");
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(b"junk\nmore junk\n<?xml version=\"1.0\"?>\n<r>\n  <a/>\n</r>\n");
    fs::write(&path, bytes).unwrap();

    let found = prolog_and_element_ranges(&path);
    assert_eq!(
        found,
        vec![
            (CharBeforePrologCheck::KEY.to_string(), TextRange::new(3, 0, 3, 21).unwrap()),
            ("XPathCheck".to_string(), TextRange::new(5, 2, 5, 6).unwrap()),
        ]
    );
}

#[test]
fn test_bom_with_preamble_on_declaration_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bom.xml");
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(b"xx<?xml version=\"1.0\"?><r><a/></r>\n");
    fs::write(&path, bytes).unwrap();

    // one column for the BOM, two for the preamble
    let found = prolog_and_element_ranges(&path);
    assert_eq!(
        found,
        vec![
            (CharBeforePrologCheck::KEY.to_string(), TextRange::new(1, 3, 1, 24).unwrap()),
            ("XPathCheck".to_string(), TextRange::new(1, 27, 1, 31).unwrap()),
        ]
    );
}
