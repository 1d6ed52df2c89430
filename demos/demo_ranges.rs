//! demo_ranges - Print the tree of an XML file with the range of every node.
//!
//! This demo parses an XML file and prints one line per node, indented by
//! depth, with its node range and, for elements, the start-tag range and the
//! ranges of each attribute. With a second argument, it instead prints the
//! nodes selected by that query.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example demo_ranges <filename.xml> [query]
//! ```

use std::env;

use xmlcheck::file::XmlFile;
use xmlcheck::query::{Query, QueryNode, QueryValue};
use xmlcheck::range::{RangeKind, TextRange};
use xmlcheck::source::PathInputFile;
use xmlcheck::tree::{Document, NodeId, NodeKind};

fn show(range: Option<TextRange>) -> String {
    range.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Short description of a node, without its children.
fn describe(document: &Document, id: NodeId) -> String {
    match document.kind(id) {
        NodeKind::Document => "#document".to_string(),
        NodeKind::Element(element) => format!("<{}>", element.name.qualified()),
        NodeKind::Text(text) => format!("#text {:?}", truncate(text)),
        NodeKind::CData(text) => format!("#cdata {:?}", truncate(text)),
        NodeKind::Comment(text) => format!("#comment {:?}", truncate(text)),
        NodeKind::DocType(doctype) => format!("<!DOCTYPE {}>", doctype.name),
    }
}

fn truncate(text: &str) -> String {
    const MAX: usize = 24;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX).collect();
        format!("{}...", head)
    }
}

fn print_tree(document: &Document) {
    let root = document.root();
    for id in std::iter::once(root).chain(document.descendants(root)) {
        let indent = "  ".repeat(document.depth(id));
        println!("{}{}  {}", indent, describe(document, id), show(document.node_range(id)));

        if document.is_element(id) {
            println!("{}  start {}", indent, show(document.range(id, RangeKind::Start)));
            for &attr in document.attributes(id) {
                let attribute = document.attribute(attr);
                println!(
                    "{}  @{}={:?}  name {}  value {}",
                    indent,
                    attribute.name.qualified(),
                    attribute.value,
                    show(document.attribute_range(attr, RangeKind::Name)),
                    show(document.attribute_range(attr, RangeKind::Value)),
                );
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <filename.xml> [query]", args[0]);
        std::process::exit(1);
    }

    let file = XmlFile::read(&PathInputFile::new(&args[1]))?;
    let document = file.document();

    if let Some(prolog) = file.prolog() {
        println!("prolog {}", prolog.range());
    }

    match args.get(2) {
        None => print_tree(document),
        Some(expression) => {
            let query = Query::compile(expression)?;
            match query.evaluate(document, document.root())? {
                QueryValue::Nodes(nodes) => {
                    for node in nodes {
                        match node {
                            QueryNode::Node(id) => {
                                println!("{}  {}", describe(document, id), show(document.node_range(id)))
                            }
                            QueryNode::Attribute(attr) => println!(
                                "@{}  {}",
                                document.attribute(attr).name.qualified(),
                                show(document.attribute_range(attr, RangeKind::Node))
                            ),
                        }
                    }
                }
                value => println!("{:?}", value),
            }
        }
    }

    Ok(())
}
