use std::collections::HashSet;

use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Html, Node, Selector};

use crate::types::HarvestError;

/// Receipt sections that carry no purchase data and only inflate the prompt.
const STRUCTURAL_CLASSES: [&str; 5] = [
    "header",
    "purchase_summary",
    "purchase_tender_information",
    "footer",
    "return_code",
];

/// Drops the structural boilerplate sections from a raw receipt document and
/// returns the serialized remainder of `<body>`. Retained regions keep their
/// markup intact so the model still sees the `purchase_list_line_N` spans and
/// their `data-art-id` attributes.
pub fn strip_boilerplate(html: &str) -> Result<String, HarvestError> {
    let doc = Html::parse_document(html);

    let mut excluded = HashSet::new();
    for class in STRUCTURAL_CLASSES {
        let selector = create_selector(&format!(".{}", class))?;
        for element in doc.select(&selector) {
            excluded.insert(element.id());
        }
    }

    let body_selector = create_selector("body")?;
    let mut fragment = String::new();
    if let Some(body) = doc.select(&body_selector).next() {
        for child in body.children() {
            render_node(child, &excluded, &mut fragment);
        }
    }

    Ok(fragment)
}

/// Re-serializes a subtree, skipping excluded nodes at any depth. Subtrees
/// without excluded descendants are emitted through the scraper serializer
/// verbatim.
fn render_node(node: NodeRef<Node>, excluded: &HashSet<NodeId>, out: &mut String) {
    if excluded.contains(&node.id()) {
        return;
    }
    match node.value() {
        Node::Text(text) => push_escaped_text(&text, out),
        Node::Element(element) => {
            let has_excluded_descendant = node
                .descendants()
                .skip(1)
                .any(|descendant| excluded.contains(&descendant.id()));
            if !has_excluded_descendant {
                if let Some(element) = ElementRef::wrap(node) {
                    out.push_str(&element.html());
                }
                return;
            }
            out.push('<');
            out.push_str(element.name());
            for (name, value) in element.attrs() {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                push_escaped_attr(value, out);
                out.push('"');
            }
            out.push('>');
            for child in node.children() {
                render_node(child, excluded, out);
            }
            out.push_str("</");
            out.push_str(element.name());
            out.push('>');
        }
        _ => {}
    }
}

// Parsed values are unescaped, so re-emitting them raw would produce
// malformed markup for receipts containing `&` or `"`.
fn push_escaped_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

fn push_escaped_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector, HarvestError> {
    Selector::parse(sel_str).map_err(|_| HarvestError::BadSelector(sel_str.into()))
}
