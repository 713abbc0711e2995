//! Depth-first, pre-order traversal of an `RcDom` tree.

use markup5ever_rcdom::Handle;

/// Visit `node`, then every descendant in document order.
///
/// Uses an explicit stack, so nesting depth is bounded only by memory.
/// Template contents are not children and are not visited.
pub fn traverse<F>(node: &Handle, mut visitor: F)
where
    F: FnMut(&Handle),
{
    let mut stack = vec![node.clone()];

    while let Some(current) = stack.pop() {
        visitor(&current);
        // Reverse push keeps the first child on top of the stack
        stack.extend(current.children.borrow().iter().rev().cloned());
    }
}

/// [`traverse`] for an optional root; absent root is a no-op.
#[inline]
pub fn traverse_opt<F>(node: Option<&Handle>, visitor: F)
where
    F: FnMut(&Handle),
{
    if let Some(node) = node {
        traverse(node, visitor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{element_name, parse};
    use markup5ever_rcdom::NodeData;

    fn element_names(html: &str) -> Vec<String> {
        let dom = parse(html);
        let mut names = Vec::new();
        traverse(&dom.document, |node| {
            if let Some(name) = element_name(node) {
                names.push(name.to_string());
            }
        });
        names
    }

    #[test]
    fn test_traverse_pre_order() {
        let names = element_names("<div><p><b></b></p><span></span></div><i></i>");
        assert_eq!(
            names,
            vec!["html", "head", "body", "div", "p", "b", "span", "i"]
        );
    }

    #[test]
    fn test_traverse_visits_root_first() {
        let dom = parse("<p>text</p>");
        let mut first = None;
        traverse(&dom.document, |node| {
            if first.is_none() {
                first = Some(matches!(node.data, NodeData::Document));
            }
        });
        assert_eq!(first, Some(true));
    }

    #[test]
    fn test_traverse_visits_text_and_comments() {
        let dom = parse("<p>a<!-- c -->b</p>");
        let mut texts = 0;
        let mut comments = 0;
        traverse(&dom.document, |node| match node.data {
            NodeData::Text { .. } => texts += 1,
            NodeData::Comment { .. } => comments += 1,
            _ => {}
        });
        assert_eq!(texts, 2);
        assert_eq!(comments, 1);
    }

    #[test]
    fn test_traverse_opt_none_is_noop() {
        let mut calls = 0;
        traverse_opt(None, |_| calls += 1);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_traverse_deep_tree_terminates() {
        let depth = 5_000;
        let html = format!("{}{}", "<span>".repeat(depth), "</span>".repeat(depth));
        let dom = parse(&html);
        let mut count = 0usize;
        traverse(&dom.document, |_| count += 1);
        assert!(count > 3);
    }
}
