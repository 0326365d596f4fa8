/// Handle to a node inside a [`Document`]. Ids are never reused, so they can
/// key side tables (scan markers) without holding on to the node itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    CharacterData {
        target: NodeId,
    },
    Attributes {
        target: NodeId,
        name: String,
    },
}

impl MutationRecord {
    pub fn target(&self) -> NodeId {
        match self {
            MutationRecord::ChildList { target, .. }
            | MutationRecord::CharacterData { target }
            | MutationRecord::Attributes { target, .. } => *target,
        }
    }

    pub fn is_attribute_only(&self) -> bool {
        matches!(self, MutationRecord::Attributes { .. })
    }
}

/// Arena-backed mutable document tree. Every structural write is queued as
/// a [`MutationRecord`] until drained with [`Document::take_mutations`].
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    mutations: Vec<MutationRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            mutations: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The `<body>` element when present, otherwise the document root.
    pub fn body(&self) -> NodeId {
        self.elements_by_tag(self.root(), "body")
            .into_iter()
            .next()
            .unwrap_or_else(|| self.root())
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Comment(text.to_string()))
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.tag(id).is_some()
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attribute(id, "class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[id.0].kind {
            match attributes.iter_mut().find(|(k, _)| *k == name) {
                Some(entry) => entry.1 = value.to_string(),
                None => attributes.push((name.clone(), value.to_string())),
            }
            self.mutations
                .push(MutationRecord::Attributes { target: id, name });
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: &str) {
        if let NodeKind::Text(text) = &mut self.nodes[id.0].kind {
            *text = value.to_string();
            self.mutations
                .push(MutationRecord::CharacterData { target: id });
        }
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != child);
            self.mutations.push(MutationRecord::ChildList {
                target: parent,
                added: Vec::new(),
                removed: vec![child],
            });
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.mutations.push(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
    }

    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        self.detach(child);
        let index = self.nodes[parent.0]
            .children
            .iter()
            .position(|c| *c == reference)
            .unwrap_or(self.nodes[parent.0].children.len());
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(index, child);
        self.mutations.push(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
    }

    /// Puts `new_child` where `old_child` was; `old_child` ends up detached.
    pub fn replace_child(&mut self, old_child: NodeId, new_child: NodeId) {
        let Some(parent) = self.nodes[old_child.0].parent else {
            return;
        };
        self.detach(new_child);
        let Some(index) = self.nodes[parent.0]
            .children
            .iter()
            .position(|c| *c == old_child)
        else {
            return;
        };
        self.nodes[parent.0].children[index] = new_child;
        self.nodes[old_child.0].parent = None;
        self.nodes[new_child.0].parent = Some(parent);
        self.mutations.push(MutationRecord::ChildList {
            target: parent,
            added: vec![new_child],
            removed: vec![old_child],
        });
    }

    pub fn remove(&mut self, id: NodeId) {
        self.detach(id);
    }

    /// True while the node is reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root() {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Nearest inclusive ancestor satisfying `predicate`.
    pub fn closest<F>(&self, id: NodeId, predicate: F) -> Option<NodeId>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        let mut current = Some(id);
        while let Some(node) = current {
            if predicate(self, node) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// All descendants of `root` (excluding `root`) in document order.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(root).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    pub fn elements_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|id| self.tag(*id).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
            .collect()
    }

    pub fn element_by_id(&self, id_value: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|id| self.attribute(*id, "id") == Some(id_value))
    }

    /// Concatenated text of every descendant text node.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// Text as a reader sees it: whitespace runs collapsed, ends trimmed.
    pub fn rendered_text(&self, id: NodeId) -> String {
        self.text_content(id)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn has_pending_mutations(&self) -> bool {
        !self.mutations.is_empty()
    }

    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
