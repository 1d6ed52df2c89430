//! Prefix resolution for name tests.

use crate::tree::{Document, NodeId, XML_NAMESPACE};

/// Resolves `prefix` as seen from `context`.
///
/// Walks from the node through its ancestors, looking at each element's
/// own prefix binding and its `xmlns:*` declarations. The `xml` prefix is
/// always bound. Returns `None` when the prefix is not declared.
pub fn resolve_prefix(document: &Document, context: NodeId, prefix: &str) -> Option<String> {
    if prefix == "xml" {
        return Some(XML_NAMESPACE.to_string());
    }

    for node in std::iter::once(context).chain(document.ancestors(context)) {
        let Some(element) = document.element(node) else {
            continue;
        };
        if element.name.prefix.as_deref() == Some(prefix) {
            if let Some(namespace) = &element.name.namespace {
                return Some(namespace.clone());
            }
        }
        for &attr in document.attributes(node) {
            let attribute = document.attribute(attr);
            if attribute.name.prefix.as_deref() == Some("xmlns") && attribute.name.local == prefix {
                return Some(attribute.value.clone());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceDocument;
    use crate::tree::NamespaceMode;

    #[test]
    fn test_resolve_prefix() {
        let source = SourceDocument::from_text(
            "ns.xml",
            r#"<r xmlns:a="urn:a"><a:x><y xmlns:b="urn:b"/></a:x></r>"#,
        );
        let doc = Document::parse(&source, NamespaceMode::Aware).unwrap();
        let root = doc.root_element().unwrap();
        let x = doc.children(root)[0];
        let y = doc.children(x)[0];

        assert_eq!(resolve_prefix(&doc, y, "a").as_deref(), Some("urn:a"));
        assert_eq!(resolve_prefix(&doc, y, "b").as_deref(), Some("urn:b"));
        assert_eq!(resolve_prefix(&doc, x, "b"), None);
        assert_eq!(resolve_prefix(&doc, root, "xml").as_deref(), Some(XML_NAMESPACE));
    }
}
