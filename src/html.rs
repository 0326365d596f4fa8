use crate::document::{Document, NodeId, NodeKind};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref TAG_REGEX: Regex = Regex::new(
        r#"(?s)<!--(.*?)-->|<![^>]*>|<(/?)([a-zA-Z][a-zA-Z0-9:-]*)((?:\s+[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'<>`]+))?)*)\s*(/?)>"#
    )
    .unwrap();
    static ref ATTR_REGEX: Regex = Regex::new(
        r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'<>`]+)))?"#
    )
    .unwrap();
    static ref ENTITY_REGEX: Regex =
        Regex::new(r"&(?:#(\d+)|#[xX]([0-9A-Fa-f]+)|([a-zA-Z][a-zA-Z0-9]*));").unwrap();
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea"];

/// Parse a whole page. Loading is not a mutation, so the queue starts empty.
pub fn parse_document(html: &str) -> Document {
    let mut doc = Document::new();
    let root = doc.root();
    build_into(&mut doc, root, html);
    doc.take_mutations();
    doc
}

/// Parse `html` into detached top-level nodes owned by `doc`, ready for the
/// host to insert.
pub fn parse_fragment(doc: &mut Document, html: &str) -> Vec<NodeId> {
    let holder = doc.create_element("template");
    build_into(doc, holder, html);
    let nodes = doc.children(holder).to_vec();
    for node in &nodes {
        doc.remove(*node);
    }
    // Nothing here is attached yet; do not leak records about the holder.
    doc.take_mutations();
    nodes
}

/// Lenient tree builder. Implied end tags are not inferred (`<p>a<p>b`
/// nests the second `p`), and doctype and other declarations are dropped,
/// so `to_html` does not reproduce them.
fn build_into(doc: &mut Document, container: NodeId, html: &str) {
    let mut stack: Vec<NodeId> = vec![container];
    let mut pos = 0;

    while pos < html.len() {
        let Some(caps) = TAG_REGEX.captures_at(html, pos) else {
            break;
        };
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((pos, pos));
        push_text(doc, &stack, &html[pos..whole.0]);
        pos = whole.1;

        if let Some(comment) = caps.get(1) {
            let node = doc.create_comment(comment.as_str());
            attach(doc, &stack, node);
            continue;
        }
        let Some(name) = caps.get(3) else {
            // doctype and other declarations
            continue;
        };
        let tag = name.as_str().to_ascii_lowercase();
        let closing = caps.get(2).is_some_and(|m| !m.as_str().is_empty());

        if closing {
            if let Some(index) = stack
                .iter()
                .rposition(|id| *id != container && doc.tag(*id) == Some(tag.as_str()))
            {
                stack.truncate(index);
            }
            continue;
        }

        let element = doc.create_element(&tag);
        for (key, value) in parse_attributes(&caps) {
            doc.set_attribute(element, &key, &value);
        }
        attach(doc, &stack, element);

        let self_closing = caps.get(5).is_some_and(|m| !m.as_str().is_empty());
        if VOID_ELEMENTS.contains(&tag.as_str()) || self_closing {
            continue;
        }

        if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
            let close = format!("</{tag}");
            let rest = &html[pos..];
            let end = find_ascii_case_insensitive(rest, &close).unwrap_or(rest.len());
            let raw = &rest[..end];
            if !raw.is_empty() {
                let text = if tag == "textarea" {
                    decode_entities(raw)
                } else {
                    raw.to_string()
                };
                let node = doc.create_text(&text);
                doc.append_child(element, node);
            }
            pos += end;
            if let Some(gt) = html[pos..].find('>') {
                pos += gt + 1;
            } else {
                pos = html.len();
            }
            continue;
        }

        stack.push(element);
    }

    if pos < html.len() {
        push_text(doc, &stack, &html[pos..]);
    }
}

fn attach(doc: &mut Document, stack: &[NodeId], node: NodeId) {
    if let Some(parent) = stack.last() {
        doc.append_child(*parent, node);
    }
}

fn push_text(doc: &mut Document, stack: &[NodeId], raw: &str) {
    if raw.is_empty() {
        return;
    }
    let node = doc.create_text(&decode_entities(raw));
    attach(doc, stack, node);
}

fn parse_attributes(caps: &Captures) -> Vec<(String, String)> {
    let Some(raw) = caps.get(4) else {
        return Vec::new();
    };
    ATTR_REGEX
        .captures_iter(raw.as_str())
        .filter_map(|attr| {
            let key = attr.get(1)?.as_str().to_ascii_lowercase();
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .or_else(|| attr.get(4))
                .map(|m| decode_entities(m.as_str()))
                .unwrap_or_default();
            Some((key, value))
        })
        .collect()
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// Decode named (`amp lt gt quot apos nbsp`) and numeric character references.
/// Unknown references are left as written.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY_REGEX
        .replace_all(text, |caps: &Captures| {
            let decoded = if let Some(dec) = caps.get(1) {
                dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16)
                    .ok()
                    .and_then(char::from_u32)
            } else {
                match caps.get(3).map(|m| m.as_str()) {
                    Some("amp") => Some('&'),
                    Some("lt") => Some('<'),
                    Some("gt") => Some('>'),
                    Some("quot") => Some('"'),
                    Some("apos") => Some('\''),
                    Some("nbsp") => Some('\u{a0}'),
                    _ => None,
                }
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

/// Serialize the whole document back to HTML.
pub fn to_html(doc: &Document) -> String {
    let mut out = String::new();
    for child in doc.children(doc.root()) {
        write_node(doc, *child, false, &mut out);
    }
    out
}

/// Serialize a single subtree.
pub fn node_to_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, false, &mut out);
    out
}

fn write_node(doc: &Document, id: NodeId, raw: bool, out: &mut String) {
    match doc.kind(id) {
        NodeKind::Document => {
            for child in doc.children(id) {
                write_node(doc, *child, false, out);
            }
        }
        NodeKind::Text(text) => {
            if raw {
                out.push_str(text);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::Element { tag, attributes } => {
            out.push('<');
            out.push_str(tag);
            for (key, value) in attributes {
                out.push_str(&format!(" {}=\"{}\"", key, escape_attribute(value)));
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&tag.as_str()) {
                return;
            }
            let raw_children = tag == "script" || tag == "style";
            for child in doc.children(id) {
                write_node(doc, *child, raw_children, out);
            }
            out.push_str(&format!("</{tag}>"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_structure() {
        let doc = parse_document(
            "<!DOCTYPE html><html><body><p class=\"intro\">Hello <b>there</b></p></body></html>",
        );
        let body = doc.body();
        assert_eq!(doc.tag(body), Some("body"));
        let p = doc.elements_by_tag(body, "p")[0];
        assert_eq!(doc.attribute(p, "class"), Some("intro"));
        assert_eq!(doc.rendered_text(p), "Hello there");
        assert!(!doc.has_pending_mutations());
    }

    #[test]
    fn test_void_and_unquoted_attributes() {
        let doc = parse_document("<form><input type=password name='pw'><input name=card_number></form>");
        let inputs = doc.elements_by_tag(doc.root(), "input");
        assert_eq!(inputs.len(), 2);
        assert_eq!(doc.attribute(inputs[0], "type"), Some("password"));
        assert_eq!(doc.attribute(inputs[0], "name"), Some("pw"));
        assert_eq!(doc.attribute(inputs[1], "name"), Some("card_number"));
        // inputs are siblings, not nested
        assert_eq!(doc.parent(inputs[1]), doc.parent(inputs[0]));
    }

    #[test]
    fn test_script_content_is_raw_text() {
        let doc = parse_document("<body><script>if (a < b) { x = '<p>'; }</script><p>after</p></body>");
        let script = doc.elements_by_tag(doc.root(), "script")[0];
        assert_eq!(doc.text_content(script), "if (a < b) { x = '<p>'; }");
        assert_eq!(doc.elements_by_tag(doc.root(), "p").len(), 1);
    }

    #[test]
    fn test_unmatched_close_tag_is_ignored() {
        let doc = parse_document("<div>one</span>two</div>");
        let div = doc.elements_by_tag(doc.root(), "div")[0];
        assert_eq!(doc.text_content(div), "onetwo");
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt; &#65;&#x42; &bogus;"), "a & b <c> AB &bogus;");
        let doc = parse_document("<a href=\"https://x.com/?a=1&amp;b=2\">x</a>");
        let a = doc.elements_by_tag(doc.root(), "a")[0];
        assert_eq!(doc.attribute(a, "href"), Some("https://x.com/?a=1&b=2"));
    }

    #[test]
    fn test_fragment_nodes_are_detached() {
        let mut doc = parse_document("<body></body>");
        let nodes = parse_fragment(&mut doc, "<p>ad</p><span>more</span>");
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|n| !doc.is_attached(*n)));
        assert!(!doc.has_pending_mutations());
    }

    #[test]
    fn test_serialization_escapes_text() {
        let doc = parse_document("<p title=\"a&quot;b\">1 &lt; 2</p>");
        assert_eq!(to_html(&doc), "<p title=\"a&quot;b\">1 &lt; 2</p>");
    }
}
