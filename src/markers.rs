use crate::document::NodeId;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    /// Highlight wrapper already placed around a keyword match.
    Text,
    /// Anchor already run through link analysis.
    Link,
}

/// "Already processed" flags kept beside the document rather than in it.
/// A marker is never cleared for the life of the session, even while its
/// element is detached.
#[derive(Debug, Default, Clone)]
pub struct ScanMarkers {
    text: HashSet<NodeId>,
    links: HashSet<NodeId>,
}

impl ScanMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, kind: MarkerKind) -> &HashSet<NodeId> {
        match kind {
            MarkerKind::Text => &self.text,
            MarkerKind::Link => &self.links,
        }
    }

    pub fn is_marked(&self, kind: MarkerKind, id: NodeId) -> bool {
        self.set(kind).contains(&id)
    }

    /// Returns false if the element was already marked.
    pub fn mark(&mut self, kind: MarkerKind, id: NodeId) -> bool {
        match kind {
            MarkerKind::Text => self.text.insert(id),
            MarkerKind::Link => self.links.insert(id),
        }
    }

    pub fn count(&self, kind: MarkerKind) -> usize {
        self.set(kind).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn test_mark_is_idempotent_per_kind() {
        let mut doc = Document::new();
        let a = doc.create_element("a");
        let mut markers = ScanMarkers::new();

        assert!(markers.mark(MarkerKind::Link, a));
        assert!(!markers.mark(MarkerKind::Link, a));
        assert!(markers.is_marked(MarkerKind::Link, a));
        assert!(!markers.is_marked(MarkerKind::Text, a));
    }

    #[test]
    fn test_marker_survives_detach_and_reinsert() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.create_element("a");
        doc.append_child(root, a);

        let mut markers = ScanMarkers::new();
        markers.mark(MarkerKind::Link, a);
        doc.remove(a);
        assert!(markers.is_marked(MarkerKind::Link, a));
        doc.append_child(root, a);
        assert!(!markers.mark(MarkerKind::Link, a));
        assert_eq!(markers.count(MarkerKind::Link), 1);
    }
}
