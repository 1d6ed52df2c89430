//! Position-tracking XML parser and rule-check engine for Rust.
//!
//! This crate parses XML source files into an immutable tree in which every
//! element, attribute, text run, comment and CDATA section knows exactly
//! where it sits in the original file, then runs a configurable set of
//! checks over that tree and reports issues with precise text ranges.
//!
//! # Features
//!
//! - **Positions**: Every node carries node, start, end and name ranges;
//!   attributes carry name and value ranges. Coordinates always refer to the
//!   original bytes, byte-order mark and stray preamble included.
//! - **Two Trees**: A namespace-aware tree is built for every file, a
//!   namespace-oblivious one only when a query asks for literal names.
//! - **Queries**: A path-query subset (axes, predicates, functions) usable
//!   from code or through the configurable `XPathCheck` rule.
//! - **Checks**: Built-in rules for indentation, tab characters, newlines,
//!   characters before the prolog and comment patterns.
//! - **Serde Support**: Optional serialization with the `serde` feature.
//!
//! # Quick Start
//!
//! ```rust
//! use xmlcheck::file::XmlFile;
//! use xmlcheck::range::RangeKind;
//!
//! let file = XmlFile::from_text("pom.xml", "<project>\n  <name>demo</name>\n</project>\n").unwrap();
//! let document = file.document();
//!
//! let project = document.root_element().unwrap();
//! let name = document.children(project)[1];
//! let start = document.range(name, RangeKind::Start).unwrap();
//! assert_eq!((start.start_line, start.start_column), (2, 2));
//! ```
//!
//! # Running Checks
//!
//! ```rust
//! use xmlcheck::config::{AnalyzerConfig, HostCapabilities};
//! use xmlcheck::engine::{Analyzer, CollectingSink};
//! use xmlcheck::source::MemoryInputFile;
//!
//! let mut analyzer = Analyzer::new(&AnalyzerConfig::all_rules(), HostCapabilities::default());
//! let mut sink = CollectingSink::default();
//! analyzer.analyze(&MemoryInputFile::new("a.xml", "<a>\n <b/>\n</a>"), &mut sink);
//!
//! for (uri, issue) in &sink.issues {
//!     println!("{}:{}", uri, issue);
//! }
//! ```
//!
//! # Module Structure
//!
//! - [`source`] - Input files, charset decoding and preamble handling
//! - [`range`] - Text ranges and offset-to-position mapping
//! - [`tree`] - The positioned document tree
//! - [`file`] - A parsed file with its lazily built trees
//! - [`query`] - Path queries over the tree
//! - [`checks`] - Check contract and built-in rules
//! - [`engine`] - Runs checks over files
//! - [`report`] - XML issue reports
//! - [`error`] - Error types
//!
//! # Optional Features
//!
//! - `serde` - Enable serde serialization/deserialization support
//! - `cli` - Build the `xmlcheck` command-line tool

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod checks;
pub mod config;
pub mod engine;
pub mod error;
pub mod file;
pub mod issue;
pub mod query;
pub mod range;
pub mod report;
pub mod source;
pub mod tree;

// Re-export commonly used types at the crate root
pub use config::{AnalyzerConfig, HostCapabilities, RuleParams, Settings};
pub use engine::{Analyzer, CollectingSink, ReportSink};
pub use error::{Error, Result};
pub use file::XmlFile;
pub use issue::{Issue, IssueLocation};
pub use query::{Query, QueryValue};
pub use range::{RangeKind, TextRange};
pub use source::{InputFile, MemoryInputFile, PathInputFile, SourceDocument};
pub use tree::{Document, NamespaceMode, NodeId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
