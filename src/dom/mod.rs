//! HTML document helpers over `markup5ever_rcdom`.
//!
//! - `parse()` / `serialize()` - html5ever round-trip
//! - `element_name()` / `has_text_child()` - node classification
//! - `find_attr()` / `AttrRef` - stable attribute addressing across passes

mod walk;

pub use walk::{traverse, traverse_opt};

use html5ever::serialize::{SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::{ParseOpts, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use std::io;

// =============================================================================
// Parse / Serialize
// =============================================================================

/// Parse a full HTML document.
///
/// html5ever recovers from every syntax error, so this cannot fail.
pub fn parse(html: &str) -> RcDom {
    parse_document(RcDom::default(), ParseOpts::default()).one(html)
}

/// Serialize the children of the document node back to HTML bytes.
pub fn serialize(dom: &RcDom) -> io::Result<Vec<u8>> {
    let mut output = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };
    let document: SerializableHandle = dom.document.clone().into();
    html5ever::serialize(&mut output, &document, opts)?;
    Ok(output)
}

// =============================================================================
// Node Classification
// =============================================================================

/// Local name of an element node, `None` for every other node kind.
pub fn element_name(node: &Handle) -> Option<&str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(&*name.local),
        _ => None,
    }
}

/// Whether `node` is an element with the given local name.
#[inline]
pub fn is_element(node: &Handle, tag: &str) -> bool {
    element_name(node) == Some(tag)
}

/// Whether any direct child of `node` is a text node.
pub fn has_text_child(node: &Handle) -> bool {
    node.children
        .borrow()
        .iter()
        .any(|child| matches!(child.data, NodeData::Text { .. }))
}

// =============================================================================
// Attributes
// =============================================================================

/// Index of the first attribute named `name` accepted by `accept`.
pub fn find_attr<P>(node: &Handle, name: &str, accept: P) -> Option<usize>
where
    P: Fn(&str) -> bool,
{
    let NodeData::Element { attrs, .. } = &node.data else {
        return None;
    };
    attrs
        .borrow()
        .iter()
        .position(|attr| &*attr.name.local == name && accept(&*attr.value))
}

/// Stable handle to one attribute of one element.
///
/// Attribute vectors are never resized between discovery and mutation, so the
/// index stays valid for the lifetime of the document.
#[derive(Debug, Clone)]
pub struct AttrRef {
    node: Handle,
    index: usize,
}

impl AttrRef {
    /// Locate the first non-empty attribute `name` on `node`.
    pub fn non_empty(node: &Handle, name: &str) -> Option<Self> {
        find_attr(node, name, |value| !value.is_empty()).map(|index| Self {
            node: node.clone(),
            index,
        })
    }

    /// Current attribute value.
    pub fn value(&self) -> String {
        match &self.node.data {
            NodeData::Element { attrs, .. } => attrs
                .borrow()
                .get(self.index)
                .map(|attr| attr.value.to_string())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }

    /// Overwrite the attribute value in place.
    pub fn set(&self, value: &str) {
        if let NodeData::Element { attrs, .. } = &self.node.data {
            if let Some(attr) = attrs.borrow_mut().get_mut(self.index) {
                attr.value = value.into();
            }
        }
    }

    /// Element owning the attribute.
    #[inline]
    pub fn node(&self) -> &Handle {
        &self.node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element(dom: &RcDom, tag: &str) -> Handle {
        let mut found = None;
        traverse(&dom.document, |node| {
            if found.is_none() && is_element(node, tag) {
                found = Some(node.clone());
            }
        });
        found.unwrap()
    }

    fn to_string(dom: &RcDom) -> String {
        String::from_utf8(serialize(dom).unwrap()).unwrap()
    }

    #[test]
    fn test_parse_serialize_roundtrip_shape() {
        let dom = parse("<!DOCTYPE html><html><head></head><body><p>hi</p></body></html>");
        assert_eq!(
            to_string(&dom),
            "<!DOCTYPE html><html><head></head><body><p>hi</p></body></html>"
        );
    }

    #[test]
    fn test_parse_fills_missing_structure() {
        let dom = parse("<p>hi");
        assert_eq!(
            to_string(&dom),
            "<html><head></head><body><p>hi</p></body></html>"
        );
    }

    #[test]
    fn test_has_text_child() {
        let dom = parse("<script>var a;</script><script src=\"a.js\"></script>");
        let mut flags = Vec::new();
        traverse(&dom.document, |node| {
            if is_element(node, "script") {
                flags.push(has_text_child(node));
            }
        });
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn test_find_attr_skips_empty_value() {
        let dom = parse("<script src=\"\"></script>");
        let script = first_element(&dom, "script");
        assert_eq!(find_attr(&script, "src", |_| true), Some(0));
        assert!(AttrRef::non_empty(&script, "src").is_none());
    }

    #[test]
    fn test_attr_ref_set() {
        let dom = parse("<link rel=\"preload\" href=\"a.js\">");
        let link = first_element(&dom, "link");
        let href = AttrRef::non_empty(&link, "href").unwrap();
        assert_eq!(href.value(), "a.js");

        href.set("a.js?_t=1");
        assert_eq!(href.value(), "a.js?_t=1");
        assert!(to_string(&dom).contains("href=\"a.js?_t=1\""));
    }

    #[test]
    fn test_element_name_non_element() {
        let dom = parse("");
        assert_eq!(element_name(&dom.document), None);
    }
}
