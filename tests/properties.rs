//! End-to-end properties of the positioned tree.

use xmlcheck::range::{Position, RangeKind, TextRange};
use xmlcheck::source::SourceDocument;
use xmlcheck::tree::{Document, NamespaceMode, NodeKind};

fn parse(text: &str) -> Document {
    let source = SourceDocument::from_text("test.xml", text);
    Document::parse(&source, NamespaceMode::Aware).unwrap()
}

/// Prolog plus top-level node ranges, sorted by start.
fn top_level_ranges(doc: &Document) -> Vec<TextRange> {
    let mut ranges: Vec<TextRange> = doc
        .children(doc.root())
        .iter()
        .filter_map(|&id| doc.node_range(id))
        .collect();
    if let Some(prolog) = doc.prolog() {
        ranges.push(prolog.range());
    }
    ranges.sort();
    ranges
}

fn assert_tiles(text: &str) {
    let doc = parse(text);
    let ranges = top_level_ranges(&doc);
    assert!(!ranges.is_empty());
    for pair in ranges.windows(2) {
        assert_eq!(pair[0].end(), pair[1].start(), "gap or overlap in {:?}", text);
    }
    let document = doc.node_range(doc.root()).unwrap();
    assert_eq!(document.start(), ranges[0].start());
    assert_eq!(document.end(), ranges[ranges.len() - 1].end());
}

#[test]
fn test_top_level_content_tiles_the_document() {
    assert_tiles("<a/>");
    assert_tiles("<?xml version=\"1.0\"?>\n<!-- c -->\n<a>\n  <b/>\n</a>\n");
    assert_tiles("<!DOCTYPE a>\n<a>x</a>\n<!-- after -->");
    assert_tiles("<?xml version=\"1.0\"?><a/>");
}

#[test]
fn test_tiling_starts_after_preamble() {
    let text = "junk\n<?xml version=\"1.0\"?>\n<a>\n  <b/>\n</a>\n";
    assert_tiles(text);
    let doc = parse(text);
    assert_eq!(top_level_ranges(&doc)[0].start(), Position::new(2, 0));
}

#[test]
fn test_self_closing_identity() {
    let doc = parse("<root>\n  <a/>\n  <b x='1'\n     y='2' />\n</root>");
    for id in doc.descendants(doc.root()) {
        if !doc.is_element(id) || !doc.children(id).is_empty() {
            continue;
        }
        let start = doc.range(id, RangeKind::Start).unwrap();
        let end = doc.range(id, RangeKind::End).unwrap();
        let node = doc.node_range(id).unwrap();
        assert_eq!(start.end(), end.end());
        assert_eq!(end.end(), node.end());
        assert_eq!(start.start(), node.start());
    }
}

#[test]
fn test_preamble_delta_law() {
    let rest = "<?xml version=\"1.0\"?>\n<project>\n  <!-- note -->\n  <a href=\"x\">t</a>\n  <![CDATA[c]]>\n</project>\n";
    let alone = parse(rest);
    let preamble = "garbage\n%%%\n???\n";
    let shifted = parse(&format!("{}{}", preamble, rest));

    assert_eq!(alone.len(), shifted.len());
    for id in alone.descendants(alone.root()) {
        let a = alone.node_range(id).unwrap();
        let b = shifted.node_range(id).unwrap();
        assert_eq!(b.start_line, a.start_line + 3);
        assert_eq!(b.end_line, a.end_line + 3);
        assert_eq!(b.start_column, a.start_column);
        assert_eq!(b.end_column, a.end_column);
    }
}

#[test]
fn test_cdata_boundary() {
    let doc = parse("<a><![CDATA[aa]>bb]]></a>");
    let a = doc.root_element().unwrap();
    let cdata: Vec<_> = doc
        .children(a)
        .iter()
        .copied()
        .filter(|&id| matches!(doc.kind(id), NodeKind::CData(_)))
        .collect();
    assert_eq!(cdata.len(), 1);
    let end = doc.range(cdata[0], RangeKind::End).unwrap();
    assert_eq!(end.start(), Position::new(1, 18));
}

#[test]
fn test_processing_instruction_in_internal_subset() {
    let text = "<!DOCTYPE r [ <?pi it's fine ?> <!ELEMENT r ANY> ]>\n<r/>";
    assert_tiles(text);
    let doc = parse(text);
    let r = doc.root_element().unwrap();
    assert_eq!(doc.node_range(r), Some(TextRange::new(2, 0, 2, 4).unwrap()));
    let doctype = doc.children(doc.root())[0];
    assert!(matches!(doc.kind(doctype), NodeKind::DocType(_)));
    assert_eq!(doc.node_range(doctype), Some(TextRange::new(1, 0, 1, 51).unwrap()));
}

#[test]
fn test_large_cdata_payload() {
    let payload = "]>".repeat(100_000);
    let doc = parse(&format!("<a><![CDATA[{}]]></a>", payload));
    let a = doc.root_element().unwrap();
    assert!(matches!(doc.kind(doc.children(a)[0]), NodeKind::CData(text) if text.len() == payload.len()));
}

#[test]
fn test_attribute_order_preserved() {
    let doc = parse("<input type='checkbox' data-x='1' />");
    let input = doc.root_element().unwrap();
    let attributes = doc.attributes(input);
    let names: Vec<String> = attributes
        .iter()
        .map(|&id| doc.attribute(id).name.qualified())
        .collect();
    assert_eq!(names, vec!["type", "data-x"]);
    let first = doc.attribute_range(attributes[0], RangeKind::Name).unwrap();
    let second = doc.attribute_range(attributes[1], RangeKind::Name).unwrap();
    assert!(first.end() <= second.start());
}

#[test]
fn test_deep_nesting() {
    let depth = 5_000;
    let text = format!("{}{}", "<d>".repeat(depth), "</d>".repeat(depth));
    let doc = parse(&text);
    let deepest = doc.descendants(doc.root()).last().unwrap();
    assert_eq!(doc.depth(deepest), depth - 1);
}
