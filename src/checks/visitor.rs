use crate::error::Result;
use crate::tree::{NodeId, NodeKind};

use super::CheckContext;

/// Callbacks for a document-order walk of the tree.
///
/// Every method defaults to doing nothing.
pub trait Visitor {
    /// An element, before its children.
    fn visit_element(&mut self, _context: &mut CheckContext<'_>, _element: NodeId) -> Result<()> {
        Ok(())
    }

    /// An element, after its children.
    fn leave_element(&mut self, _context: &mut CheckContext<'_>, _element: NodeId) -> Result<()> {
        Ok(())
    }

    /// A text node.
    fn visit_text(&mut self, _context: &mut CheckContext<'_>, _node: NodeId, _text: &str) -> Result<()> {
        Ok(())
    }

    /// A CDATA section.
    fn visit_cdata(&mut self, _context: &mut CheckContext<'_>, _node: NodeId, _text: &str) -> Result<()> {
        Ok(())
    }

    /// A comment.
    fn visit_comment(&mut self, _context: &mut CheckContext<'_>, _node: NodeId, _text: &str) -> Result<()> {
        Ok(())
    }
}

enum Step {
    Enter(NodeId),
    Leave(NodeId),
}

/// Walks the namespace-aware tree of the context's file.
///
/// Uses an explicit stack, so nesting depth is bounded by memory only.
pub fn walk<V: Visitor + ?Sized>(visitor: &mut V, context: &mut CheckContext<'_>) -> Result<()> {
    let document = context.document();
    let mut stack = vec![Step::Enter(document.root())];

    while let Some(step) = stack.pop() {
        let id = match step {
            Step::Leave(id) => {
                visitor.leave_element(context, id)?;
                continue;
            }
            Step::Enter(id) => id,
        };
        match document.kind(id) {
            NodeKind::Element(_) => {
                visitor.visit_element(context, id)?;
                stack.push(Step::Leave(id));
            }
            NodeKind::Text(text) => visitor.visit_text(context, id, text)?,
            NodeKind::CData(text) => visitor.visit_cdata(context, id, text)?,
            NodeKind::Comment(text) => visitor.visit_comment(context, id, text)?,
            NodeKind::Document | NodeKind::DocType(_) => {}
        }
        stack.extend(document.children(id).iter().rev().map(|&child| Step::Enter(child)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::file::XmlFile;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Visitor for Recorder {
        fn visit_element(&mut self, context: &mut CheckContext<'_>, element: NodeId) -> Result<()> {
            let name = context.document().name(element).map(|n| n.qualified()).unwrap_or_default();
            self.events.push(format!("<{}>", name));
            Ok(())
        }

        fn leave_element(&mut self, context: &mut CheckContext<'_>, element: NodeId) -> Result<()> {
            let name = context.document().name(element).map(|n| n.qualified()).unwrap_or_default();
            self.events.push(format!("</{}>", name));
            Ok(())
        }

        fn visit_text(&mut self, _context: &mut CheckContext<'_>, _node: NodeId, text: &str) -> Result<()> {
            self.events.push(format!("'{}'", text));
            Ok(())
        }

        fn visit_comment(&mut self, _context: &mut CheckContext<'_>, _node: NodeId, text: &str) -> Result<()> {
            self.events.push(format!("#{}", text));
            Ok(())
        }
    }

    #[test]
    fn test_walk_order() {
        let file = XmlFile::from_text("w.xml", "<a><b>x</b><!--c--><d/></a>").unwrap();
        let settings = Settings::default();
        let mut context = CheckContext::new(&file, &settings, "Test");
        let mut recorder = Recorder::default();
        walk(&mut recorder, &mut context).unwrap();
        assert_eq!(
            recorder.events,
            vec!["<a>", "<b>", "'x'", "</b>", "#c", "<d>", "</d>", "</a>"]
        );
    }
}
