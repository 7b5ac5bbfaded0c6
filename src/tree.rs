// 🌳 Document Tree - Navigable arena of parsed bill markup
//
// The engine never parses raw markup itself. A loader (XML via roxmltree,
// or hand-built in tests) produces this arena; everything downstream only
// sees tag names, attributes, children and text.

use crate::error::ExtractionError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// CORE TYPES
// ============================================================================

/// Index of a node inside its `DocumentTree`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Arena holding every node of one document, root at index 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTree {
    nodes: Vec<Node>,
    /// SHA-256 of the source text, when the tree came from a loader
    source_fingerprint: Option<String>,
}

impl DocumentTree {
    /// Create a tree with a single root element
    pub fn new(root_tag: &str) -> Self {
        DocumentTree {
            nodes: vec![Node {
                kind: NodeKind::Element {
                    tag: root_tag.to_string(),
                    attributes: Vec::new(),
                },
                parent: None,
                children: Vec::new(),
            }],
            source_fingerprint: None,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn source_fingerprint(&self) -> Option<&str> {
        self.source_fingerprint.as_deref()
    }

    // ========================================================================
    // BUILDING
    // ========================================================================

    /// Append an element under `parent` and return its id
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> NodeId {
        let attributes = attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.push_node(parent, NodeKind::Element { tag: tag.to_string(), attributes })
    }

    /// Append a text node under `parent`
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push_node(parent, NodeKind::Text(text.to_string()))
    }

    /// Set (or replace) an attribute on an element
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[id.0].kind {
            match attributes.iter_mut().find(|(k, _)| k == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    fn push_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    // ========================================================================
    // NAVIGATION
    // ========================================================================

    /// Tag name, `None` for text nodes
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Element { .. })
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Literal text of a text node
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text(t) => Some(t.as_str()),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |c| self.is_element(*c))
    }

    /// First direct child element with the given tag
    pub fn child_by_tag(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.element_children(id)
            .find(|c| self.tag(*c) == Some(tag))
    }

    /// First descendant element (pre-order) with the given tag
    pub fn find_descendant(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(id)
            .skip(1)
            .find(|d| self.tag(*d) == Some(tag))
    }

    /// Pre-order iterator over `id` and everything below it
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![id],
        }
    }

    /// Concatenated text of every text node below `id`, in document order
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for d in self.descendants(id) {
            if let Some(t) = self.text(d) {
                out.push_str(t);
            }
        }
        out
    }

    // ========================================================================
    // LOADING
    // ========================================================================

    /// Build a tree from XML text.
    ///
    /// Namespaces are dropped (local names only) and processing
    /// instructions and comments are skipped.
    pub fn from_xml(source: &str) -> Result<Self, ExtractionError> {
        let doc = roxmltree::Document::parse(source)
            .map_err(|e| ExtractionError::MalformedDocument(e.to_string()))?;

        let xml_root = doc.root_element();
        let mut tree = DocumentTree::new(xml_root.tag_name().name());
        let root = tree.root();
        for (name, value) in owned_attributes(&xml_root) {
            tree.set_attribute(root, &name, &value);
        }

        // Explicit stack: depth is bounded by the document, not the call stack
        let mut stack: Vec<(roxmltree::Node, NodeId)> = Vec::new();
        let kids: Vec<_> = xml_root.children().collect();
        stack.extend(kids.into_iter().rev().map(|c| (c, root)));

        while let Some((xml_node, parent)) = stack.pop() {
            if xml_node.is_element() {
                let owned = owned_attributes(&xml_node);
                let attrs: Vec<(&str, &str)> = owned
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                let id = tree.append_element(parent, xml_node.tag_name().name(), &attrs);
                let kids: Vec<_> = xml_node.children().collect();
                stack.extend(kids.into_iter().rev().map(|c| (c, id)));
            } else if xml_node.is_text() {
                if let Some(text) = xml_node.text() {
                    tree.append_text(parent, text);
                }
            }
        }

        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        tree.source_fingerprint = Some(format!("{:x}", hasher.finalize()));

        Ok(tree)
    }
}

fn owned_attributes(node: &roxmltree::Node) -> Vec<(String, String)> {
    node.attributes()
        .map(|a| (a.name().to_string(), a.value().to_string()))
        .collect()
}

/// Pre-order traversal without recursion
pub struct Descendants<'a> {
    tree: &'a DocumentTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

/// Collapse runs of whitespace into single spaces and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// TESTS
// ============================================================================
