//! Runs the configured checks over input files.
//!
//! One [`Analyzer`] owns an ordered set of checks and analyses files one at a
//! time. Each file moves through
//! `Idle → Parsing → (ParseFailed | Parsed) → Checking → Done`; a file that
//! fails to parse never reaches `Checking`. The states a file went through
//! are kept in its [`FileOutcome`]. A panic while reading or parsing ends in
//! `ParseFailed` with an internal error.
//!
//! A failing check, whether it returns an error or panics, is logged and
//! skipped. Its partial issues are dropped and the remaining checks run as
//! usual.
//!
//! # Example
//!
//! ```
//! use xmlcheck::config::{AnalyzerConfig, HostCapabilities};
//! use xmlcheck::engine::{Analyzer, CollectingSink};
//! use xmlcheck::source::MemoryInputFile;
//!
//! let mut analyzer = Analyzer::new(&AnalyzerConfig::all_rules(), HostCapabilities::default());
//! let mut sink = CollectingSink::default();
//! let input = MemoryInputFile::new("pom.xml", "<project>\n\t<a/>\n</project>\n");
//!
//! analyzer.analyze(&input, &mut sink);
//! assert!(sink.issues.iter().any(|(_, issue)| issue.rule_key == "TabCharacterCheck"));
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, warn};

use crate::checks::{build_checks, Check, CheckContext, PARSING_ERROR_RULE};
use crate::config::{AnalyzerConfig, HostCapabilities, Settings};
use crate::error::Error;
use crate::file::XmlFile;
use crate::issue::Issue;
use crate::source::{InputFile, SourceDocument};
use crate::tree::{Document, NamespaceMode};

/// Receives the results of an analysis.
pub trait ReportSink {
    /// An issue found in `uri`.
    fn report_issue(&mut self, uri: &str, issue: Issue);

    /// A file that could not be read or parsed.
    fn report_analysis_error(&mut self, uri: &str, error: &Error);
}

/// Sink keeping everything in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    /// Issues with the URI of their file
    pub issues: Vec<(String, Issue)>,
    /// Analysis errors as (URI, message)
    pub analysis_errors: Vec<(String, String)>,
}

impl ReportSink for CollectingSink {
    fn report_issue(&mut self, uri: &str, issue: Issue) {
        self.issues.push((uri.to_string(), issue));
    }

    fn report_analysis_error(&mut self, uri: &str, error: &Error) {
        self.analysis_errors.push((uri.to_string(), error.to_string()));
    }
}

/// Where the analysis of a file stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    /// No file in progress
    Idle,
    /// Reading and building the tree
    Parsing,
    /// The file could not be read or is not well-formed
    ParseFailed,
    /// Tree built, checks not started
    Parsed,
    /// Running checks
    Checking,
    /// All checks ran
    Done,
}

/// Summary of one file's analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    /// Final state, `Done` or `ParseFailed`
    pub state: AnalysisState,
    /// Number of issues sent to the sink
    pub issues: usize,
    /// Rule keys of checks that failed on this file
    pub failed_checks: Vec<&'static str>,
    /// States entered, in order, from `Parsing` to the final state
    pub states: Vec<AnalysisState>,
}

/// Runs an ordered set of checks over files, one file at a time.
pub struct Analyzer {
    checks: Vec<Box<dyn Check>>,
    setup_errors: Vec<Error>,
    settings: Settings,
    capabilities: HostCapabilities,
    report_parse_errors: bool,
    state: AnalysisState,
    visited: Vec<AnalysisState>,
}

impl Analyzer {
    /// Builds the checks enabled in `config`.
    ///
    /// Checks that cannot be configured are dropped; see
    /// [`setup_errors`](Self::setup_errors).
    pub fn new(config: &AnalyzerConfig, capabilities: HostCapabilities) -> Self {
        let (checks, setup_errors) = build_checks(config);
        Self {
            checks,
            setup_errors,
            settings: config.settings.clone(),
            capabilities,
            report_parse_errors: config.is_enabled(PARSING_ERROR_RULE),
            state: AnalysisState::Idle,
            visited: Vec::new(),
        }
    }

    /// Builds an analyzer from ready-made checks.
    pub fn with_checks(
        checks: Vec<Box<dyn Check>>,
        settings: Settings,
        capabilities: HostCapabilities,
    ) -> Self {
        Self {
            checks,
            setup_errors: Vec::new(),
            settings,
            capabilities,
            report_parse_errors: false,
            state: AnalysisState::Idle,
            visited: Vec::new(),
        }
    }

    /// Enables the synthesized issue for files that fail to parse.
    pub fn with_parse_error_issues(mut self, enabled: bool) -> Self {
        self.report_parse_errors = enabled;
        self
    }

    /// Configuration errors of checks that were left out.
    pub fn setup_errors(&self) -> &[Error] {
        &self.setup_errors
    }

    /// Rule keys of the checks that will run, in order.
    pub fn rule_keys(&self) -> Vec<&'static str> {
        self.checks.iter().map(|check| check.rule_key()).collect()
    }

    /// Current state.
    pub fn state(&self) -> AnalysisState {
        self.state
    }

    /// Analyses one file, sending issues and analysis errors to `sink`.
    pub fn analyze(&mut self, input: &dyn InputFile, sink: &mut dyn ReportSink) -> FileOutcome {
        let uri = input.uri().to_string();
        self.enter(AnalysisState::Parsing);

        let source = match catch_panics(|| SourceDocument::read(input)) {
            Ok(source) => source,
            Err(err) => {
                warn!(uri = %uri, error = %err, "unable to read file");
                self.report_analysis_error(sink, &uri, &err);
                return self.finish(AnalysisState::ParseFailed, 0, Vec::new());
            }
        };

        let document = match catch_panics(|| Document::parse(&source, NamespaceMode::Aware)) {
            Ok(document) => document,
            Err(err) => {
                warn!(uri = %uri, error = %err, "unable to parse file");
                self.report_analysis_error(sink, &uri, &err);
                let mut issues = 0;
                if self.report_parse_errors {
                    sink.report_issue(&uri, parse_error_issue(&source, &err));
                    issues = 1;
                }
                return self.finish(AnalysisState::ParseFailed, issues, Vec::new());
            }
        };
        let file = XmlFile::from_parts(source, document);
        self.enter(AnalysisState::Parsed);

        self.enter(AnalysisState::Checking);
        let mut issues = 0;
        let mut failed_checks = Vec::new();
        for check in self.checks.iter_mut() {
            let rule = check.rule_key();
            match run_check(check.as_mut(), &file, &self.settings) {
                Ok(found) => {
                    for mut issue in found {
                        if !self.capabilities.secondary_locations {
                            issue.secondary.clear();
                        }
                        sink.report_issue(&uri, issue);
                        issues += 1;
                    }
                }
                Err(message) => {
                    error!(rule, uri = %uri, error = %message, "check failed");
                    failed_checks.push(rule);
                }
            }
        }
        self.finish(AnalysisState::Done, issues, failed_checks)
    }

    fn report_analysis_error(&self, sink: &mut dyn ReportSink, uri: &str, err: &Error) {
        if self.capabilities.analysis_errors {
            sink.report_analysis_error(uri, err);
        } else {
            debug!(uri, "host does not accept analysis errors");
        }
    }

    fn enter(&mut self, state: AnalysisState) {
        debug!(from = ?self.state, to = ?state, "analysis state");
        self.state = state;
        self.visited.push(state);
    }

    fn finish(&mut self, state: AnalysisState, issues: usize, failed_checks: Vec<&'static str>) -> FileOutcome {
        self.enter(state);
        self.state = AnalysisState::Idle;
        FileOutcome {
            state,
            issues,
            failed_checks,
            states: std::mem::take(&mut self.visited),
        }
    }
}

/// Runs one check, turning errors and panics into a message.
fn run_check(check: &mut dyn Check, file: &XmlFile, settings: &Settings) -> Result<Vec<Issue>, String> {
    let rule = check.rule_key();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        check.start_file();
        let mut context = CheckContext::new(file, settings, rule);
        let result = check.scan_file(&mut context);
        check.end_file();
        result.map(|()| context.into_issues())
    }));
    match outcome {
        Ok(Ok(issues)) => Ok(issues),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

/// Runs one phase of the parse, turning a panic into an internal error.
fn catch_panics<T>(phase: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
    panic::catch_unwind(AssertUnwindSafe(phase))
        .unwrap_or_else(|payload| Err(Error::internal(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

/// The synthesized issue for a file that is not well-formed.
fn parse_error_issue(source: &SourceDocument, err: &Error) -> Issue {
    let message = format!("Parse error: {}", err);
    if let Error::Malformed { line, .. } = err {
        let length = source
            .lines()
            .get(line.saturating_sub(1))
            .map(|text| text.chars().count())
            .unwrap_or(0);
        if let Ok(range) = source.line_range(*line, 0, length) {
            return Issue::new(PARSING_ERROR_RULE, range, message);
        }
    }
    Issue::file_level(PARSING_ERROR_RULE, message)
}
