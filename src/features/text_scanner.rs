use super::{Evidence, EvidenceKind, PageAnalyzer, ScanContext};
use crate::document::{Document, NodeId};
use crate::markers::MarkerKind;
use crate::rules::{KeywordRule, RuleSet};

pub const HIGHLIGHT_WRAPPER_CLASS: &str = "vigilant-highlight-wrapper";
pub const HIGHLIGHT_TEXT_CLASS: &str = "vigilant-highlight-text";

/// Shorter text nodes are whitespace or punctuation in practice.
const MIN_TEXT_LEN: usize = 3;

/// Walks visible prose, reports the first keyword each text unit contains
/// and wraps new matches in highlight spans.
pub struct TextScanner;

impl Default for TextScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl TextScanner {
    pub fn new() -> Self {
        Self
    }

    fn first_match<'r>(rules: &'r RuleSet, text: &str) -> Option<&'r KeywordRule> {
        if text.chars().count() < MIN_TEXT_LEN {
            return None;
        }
        let lowered = text.to_lowercase();
        rules
            .keywords()
            .iter()
            .find(|rule| rule.matches(text, &lowered))
    }

    /// Replace `text_node` with a wrapper span whose keyword occurrences are
    /// themselves wrapped. Returns the wrapper.
    fn highlight(doc: &mut Document, text_node: NodeId, rule: &KeywordRule) -> NodeId {
        let text = doc.text(text_node).unwrap_or_default().to_string();
        let wrapper = doc.create_element("span");
        doc.set_attribute(wrapper, "class", HIGHLIGHT_WRAPPER_CLASS);

        let mut cursor = 0;
        for range in rule.occurrences(&text) {
            if range.start > cursor {
                let before = doc.create_text(&text[cursor..range.start]);
                doc.append_child(wrapper, before);
            }
            let mark = doc.create_element("span");
            doc.set_attribute(mark, "class", HIGHLIGHT_TEXT_CLASS);
            let matched = doc.create_text(&text[range.clone()]);
            doc.append_child(mark, matched);
            doc.append_child(wrapper, mark);
            cursor = range.end;
        }
        if cursor < text.len() {
            let after = doc.create_text(&text[cursor..]);
            doc.append_child(wrapper, after);
        }

        doc.replace_child(text_node, wrapper);
        wrapper
    }
}

impl PageAnalyzer for TextScanner {
    fn scan(&self, ctx: &mut ScanContext<'_>) -> Vec<Evidence> {
        let mut evidence = Vec::new();
        let mut pending_wraps: Vec<(NodeId, &KeywordRule)> = Vec::new();

        let doc: &Document = &*ctx.document;
        let mut stack: Vec<NodeId> = doc.children(ctx.root).iter().rev().copied().collect();

        while let Some(node) = stack.pop() {
            if doc.is_element(node) {
                if ctx.exclusion.excludes(doc, node) {
                    continue;
                }
                if ctx.markers.is_marked(MarkerKind::Text, node) {
                    // Already highlighted: judge the wrapped text as the one
                    // unit it was before wrapping, without wrapping again.
                    let text = doc.text_content(node);
                    if let Some(rule) = Self::first_match(ctx.rules, &text) {
                        evidence.push(Evidence::new(EvidenceKind::Keyword, &rule.keyword));
                    }
                    continue;
                }
                stack.extend(doc.children(node).iter().rev().copied());
                continue;
            }

            let Some(text) = doc.text(node) else {
                continue;
            };
            if let Some(rule) = Self::first_match(ctx.rules, text) {
                log::debug!("Keyword '{}' matched in text node {:?}", rule.keyword, node);
                evidence.push(Evidence::new(EvidenceKind::Keyword, &rule.keyword));
                pending_wraps.push((node, rule));
            }
        }

        for (node, rule) in pending_wraps {
            let wrapper = Self::highlight(ctx.document, node, rule);
            ctx.markers.mark(MarkerKind::Text, wrapper);
        }

        evidence
    }

    fn name(&self) -> &str {
        "text_scanner"
    }
}
