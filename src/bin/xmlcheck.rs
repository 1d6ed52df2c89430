//! xmlcheck - Run XML source checks over files and directories.
//!
//! Walks the given paths, analyses every XML file with the configured rules
//! and prints the issues found, either as text or as an XML report.
//!
//! # Usage
//!
//! ```bash
//! xmlcheck [OPTIONS] [PATH]...
//! ```
//!
//! # Examples
//!
//! ```bash
//! # Check the current directory with every built-in rule
//! xmlcheck
//!
//! # Use a rule configuration and 4 threads
//! xmlcheck -c xmlcheck.toml -j 4 src/main/resources
//!
//! # Also pick up Maven POMs and XSD files, write an XML report
//! xmlcheck --ext pom --ext xsd --format xml . > report.xml
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [settings]
//! min_platform_version = 8
//!
//! [rules.IndentationCheck]
//! indentSize = 4
//!
//! [rules.XPathCheck]
//! expression = "//bean[@scope='prototype']"
//! message = "Avoid prototype beans."
//! untilPlatformVersion = 11
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use clap::{Parser, ValueEnum};
use rayon::prelude::*;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use xmlcheck::config::{AnalyzerConfig, HostCapabilities};
use xmlcheck::engine::{Analyzer, CollectingSink};
use xmlcheck::report::{FileReport, ReportConfig, ReportWriter};
use xmlcheck::source::PathInputFile;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// One `path:line:column: [rule] message` line per issue
    Text,
    /// XML issue report
    Xml,
}

/// Run XML source checks over files and directories.
#[derive(Parser, Debug)]
#[command(name = "xmlcheck")]
#[command(version = VERSION)]
#[command(about = "Run XML source checks over files and directories")]
#[command(long_about = "Recursively walks the given paths, parses every XML file with \
    precise source positions and reports style and structural issues.")]
struct Args {
    /// Files or directories to check (defaults to current directory)
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,

    /// TOML file listing the enabled rules and their parameters
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Additional file extension to analyse (can be specified multiple times)
    #[arg(long = "ext", value_name = "EXT")]
    extensions: Vec<String>,

    /// Number of file-processing threads to run
    #[arg(short, long, default_value = "1")]
    jobs: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: Format,

    /// Output compact XML (no indentation)
    #[arg(long)]
    compact: bool,

    /// Leave files without findings out of the XML report
    #[arg(long)]
    failures_only: bool,

    /// Stop analysing further files once this many issues were found
    #[arg(long, value_name = "N")]
    max_issues: Option<usize>,

    /// Follow symbolic links when walking directories
    #[arg(long)]
    follow_links: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AnalyzerConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            Ok(toml::from_str(&text)?)
        }
        None => Ok(AnalyzerConfig::all_rules()),
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn collect_files(args: &Args, extensions: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in &args.paths {
        let walker = WalkDir::new(root)
            .follow_links(args.follow_links)
            .sort_by_file_name();

        for entry in walker {
            match entry {
                Ok(e) => {
                    // explicitly named files are analysed whatever their extension
                    if e.file_type().is_file() && (e.depth() == 0 || has_extension(e.path(), extensions)) {
                        files.push(e.path().to_path_buf());
                    }
                }
                Err(e) => warn!(error = %e, "error walking directory"),
            }
        }
    }
    files
}

fn print_text(reports: &[FileReport]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for report in reports {
        for error in &report.errors {
            writeln!(out, "{}: error: {}", report.uri, error)?;
        }
        for issue in &report.issues {
            match issue.range() {
                Some(_) => writeln!(out, "{}:{}", report.uri, issue)?,
                None => writeln!(out, "{}: {}", report.uri, issue)?,
            }
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    // Validate jobs count
    if args.jobs == 0 {
        eprintln!("Error: jobs must be at least 1");
        std::process::exit(2);
    }

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: unable to load configuration: {}", e);
            std::process::exit(2);
        }
    };

    // Setup errors are reported once, not per worker
    let setup = Analyzer::new(&config, HostCapabilities::default());
    for error in setup.setup_errors() {
        warn!(error = %error, "rule disabled");
    }
    debug!(rules = ?setup.rule_keys(), "enabled rules");

    let mut extensions = vec!["xml".to_string()];
    extensions.extend(args.extensions.iter().map(|ext| ext.trim_start_matches('.').to_string()));

    let files = collect_files(&args, &extensions);
    debug!(count = files.len(), jobs = args.jobs, "found files");

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs)
        .build_global()
        .ok();

    let cancelled = AtomicBool::new(false);
    let found = AtomicUsize::new(0);

    let reports: Vec<FileReport> = files
        .par_iter()
        .map_init(
            || Analyzer::new(&config, HostCapabilities::default()),
            |analyzer, path| {
                if cancelled.load(Ordering::Relaxed) {
                    return None;
                }
                let input = PathInputFile::new(path);
                let mut sink = CollectingSink::default();
                let outcome = analyzer.analyze(&input, &mut sink);
                debug!(path = %path.display(), state = ?outcome.state, issues = outcome.issues, "analysed");

                let total = found.fetch_add(outcome.issues, Ordering::Relaxed) + outcome.issues;
                if args.max_issues.map_or(false, |max| total >= max) {
                    cancelled.store(true, Ordering::Relaxed);
                }
                Some(FileReport::from_sink(path.display().to_string(), sink))
            },
        )
        .flatten()
        .collect();

    if cancelled.load(Ordering::Relaxed) {
        warn!(analysed = reports.len(), total = files.len(), "issue limit reached, analysis stopped");
    }

    match args.format {
        Format::Text => print_text(&reports)?,
        Format::Xml => {
            let mut config = if args.compact {
                ReportConfig::compact()
            } else {
                ReportConfig::default()
            };
            if args.failures_only {
                config = config.failures_only();
            }
            let stdout = io::stdout();
            let mut out = stdout.lock();
            ReportWriter::with_config(config).write(&reports, &mut out)?;
            writeln!(out)?;
        }
    }

    let issues: usize = reports.iter().map(|report| report.issues.len()).sum();
    if issues > 0 {
        std::process::exit(1);
    }
    Ok(())
}
