//! Arena-backed content tree.
//!
//! Every node lives in one [`Document`] arena and is addressed by a stable
//! [`NodeId`]. Moving a node between the source tree and a page tree is a
//! detach followed by an append; the node itself is never copied.

use indextree::{Arena, NodeId};
use smallvec::SmallVec;

/// Attribute storage. Most elements carry very few attributes.
pub type Attributes = SmallVec<[(String, String); 4]>;

/// Elements that never carry children and serialize as `<tag/>`.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Element payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    /// Lower-case tag name.
    pub tag: String,
    /// Attribute name/value pairs.
    pub attrs: Attributes,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Attributes::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(key, _)| key == name) {
            slot.1 = value;
            return;
        }
        self.attrs.push((name.to_string(), value));
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let idx = self.attrs.iter().position(|(key, _)| key == name)?;
        Some(self.attrs.remove(idx).1)
    }

    /// Whitespace-separated `class` tokens.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Add `class` to the class list. Returns `false` if it was already present.
    pub fn add_class(&mut self, class: &str) -> bool {
        if self.has_class(class) {
            return false;
        }
        let joined = match self.attr("class").map(str::trim) {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set_attr("class", joined);
        true
    }

    /// Remove `class` from the class list, dropping the attribute when it empties.
    pub fn remove_class(&mut self, class: &str) -> bool {
        if !self.has_class(class) {
            return false;
        }
        let kept: Vec<&str> = self.classes().filter(|c| *c != class).collect();
        let joined = kept.join(" ");
        if joined.is_empty() {
            self.remove_attr("class");
        } else {
            self.set_attr("class", joined);
        }
        true
    }

    pub fn is_void(&self) -> bool {
        VOID_TAGS.contains(&self.tag.as_str())
    }
}

/// Content node payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Anonymous root holding a sequence of nodes. Never serialized itself.
    Fragment,
    Element(Element),
    Text(String),
}

impl NodeKind {
    /// Same kind, tag and attributes, without content.
    fn empty_clone(&self) -> Self {
        match self {
            Self::Fragment => Self::Fragment,
            Self::Element(el) => Self::Element(el.clone()),
            Self::Text(_) => Self::Text(String::new()),
        }
    }
}

/// Owner of every content node.
#[derive(Clone, Debug, Default)]
pub struct Document {
    arena: Arena<NodeKind>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached fragment root.
    pub fn create_fragment(&mut self) -> NodeId {
        self.arena.new_node(NodeKind::Fragment)
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.arena.new_node(NodeKind::Element(Element::new(tag)))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.arena.new_node(NodeKind::Text(text.into()))
    }

    /// Create a detached node with the same kind, tag and attributes as
    /// `node` but no children (text nodes get an empty payload).
    pub fn empty_clone(&mut self, node: NodeId) -> Option<NodeId> {
        let kind = self.kind(node)?.empty_clone();
        Some(self.arena.new_node(kind))
    }

    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.arena
            .get(node)
            .filter(|n| !n.is_removed())
            .map(|n| n.get())
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        match self.kind(node)? {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        let entry = self.arena.get_mut(node).filter(|n| !n.is_removed())?;
        match entry.get_mut() {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Tag name for element nodes.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.tag.as_str())
    }

    pub fn is_element(&self, node: NodeId, tag: &str) -> bool {
        self.tag(node) == Some(tag)
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match self.kind(node)? {
            NodeKind::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Replace the payload of a text node. Returns `false` for non-text nodes.
    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) -> bool {
        let Some(entry) = self.arena.get_mut(node).filter(|n| !n.is_removed()) else {
            return false;
        };
        match entry.get_mut() {
            NodeKind::Text(current) => {
                *current = text.into();
                true
            }
            _ => false,
        }
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(self.kind(node), Some(NodeKind::Text(_)))
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attr(name)
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: impl Into<String>) -> bool {
        match self.element_mut(node) {
            Some(el) => {
                el.set_attr(name, value);
                true
            }
            None => false,
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena.get(node)?.parent()
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.arena.get(node)?.first_child()
    }

    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.arena.get(node)?.last_child()
    }

    pub fn has_children(&self, node: NodeId) -> bool {
        self.first_child(node).is_some()
    }

    pub fn children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        node.children(&self.arena)
    }

    /// Ancestors of `node`, nearest first, excluding `node` itself.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        node.ancestors(&self.arena).skip(1)
    }

    /// Detach `child` from its current parent and append it to `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        child.detach(&mut self.arena);
        parent.append(child, &mut self.arena);
    }

    /// Detach `child` from its current parent and make it the first child of `parent`.
    pub fn prepend(&mut self, parent: NodeId, child: NodeId) {
        child.detach(&mut self.arena);
        parent.prepend(child, &mut self.arena);
    }

    /// Detach `node` from its parent, keeping its subtree alive.
    pub fn detach(&mut self, node: NodeId) {
        node.detach(&mut self.arena);
    }

    /// Detach and free `node` together with its whole subtree.
    pub fn remove(&mut self, node: NodeId) {
        node.remove_subtree(&mut self.arena);
    }

    /// Free every child of `node`, leaving it empty.
    pub fn clear_children(&mut self, node: NodeId) {
        while let Some(child) = self.first_child(node) {
            self.remove(child);
        }
    }

    /// Concatenated text content of `node`'s subtree.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        for id in node.descendants(&self.arena) {
            if let Some(text) = self.text(id) {
                out.push_str(text);
            }
        }
        out
    }

    /// Number of live nodes in the subtree rooted at `node` (inclusive).
    pub fn subtree_len(&self, node: NodeId) -> usize {
        node.descendants(&self.arena).count()
    }
}
