//! Arena-backed HTML element tree shared by both inputs and the working tree.
//!
//! Key points:
//! - **indextree Arena**: every node lives in one arena, parents are `NodeId` handles
//! - **Tombstones**: deleted nodes stay attached to their parent but are skipped
//!   by every traversal used for matching and diffing
//! - **Text runs**: text is stored on the element (`text`) and after its closing
//!   tag (`tail`), both whitespace-normalized

use indexmap::IndexMap;
use indextree::{Arena, NodeId};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::sync::OnceLock;

use crate::action::ActionId;

/// Tags whose edits are recorded but never shown to the reader.
const INVISIBLE_TAGS: &[&str] = &[
    "script", "meta", "base", "style", "noscript", "comment", "head", "body", "html", "header",
    "main", "param", "progress",
];

/// One HTML element with its text runs and edit history.
#[derive(Debug, Clone, Default)]
pub struct NodeData {
    /// Tag name
    pub tag: String,
    /// Attributes, excluding `style`
    pub attrs: IndexMap<String, String>,
    /// Style properties split out of the `style` attribute
    pub styles: IndexMap<String, String>,
    pub(crate) text: String,
    pub(crate) tail: String,
    deleted: bool,
    leaf_count: OnceLock<usize>,
    actions: SmallVec<[ActionId; 2]>,
    popups: Vec<String>,
}

impl NodeData {
    /// Create an element with no attributes, styles or text.
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Builder: set an attribute. `style` is split into style properties.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        if key == "style" {
            self.styles.extend(parse_style_declaration(&value));
        } else {
            self.attrs.insert(key, value);
        }
        self
    }

    /// Builder: set one style property.
    pub fn with_style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles.insert(property.into(), value.into());
        self
    }

    /// Builder: set the inner text.
    pub fn with_text(mut self, text: &str) -> Self {
        self.set_text(text);
        self
    }

    /// Builder: set the tail text.
    pub fn with_tail(mut self, tail: &str) -> Self {
        self.set_tail(tail);
        self
    }

    /// Inner text (normalized).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text between this element's closing tag and the next sibling (normalized).
    pub fn tail(&self) -> &str {
        &self.tail
    }

    /// Set the inner text, normalizing whitespace.
    pub fn set_text(&mut self, text: &str) {
        self.text = normalize_whitespace(text);
    }

    /// Set the tail text, normalizing whitespace.
    pub fn set_tail(&mut self, tail: &str) {
        self.tail = normalize_whitespace(tail);
    }

    /// Whether this node is a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Ids of the edit actions applied to this node.
    pub fn actions(&self) -> &[ActionId] {
        &self.actions
    }

    /// Human-readable change descriptions.
    pub fn popups(&self) -> &[String] {
        &self.popups
    }

    /// Whether edits on this node should be shown to the reader.
    pub fn is_visible(&self) -> bool {
        !INVISIBLE_TAGS.contains(&self.tag.as_str())
    }

    /// Record an action, and its popup text if the node is visible.
    pub(crate) fn record(&mut self, action: ActionId, popup: Option<String>) {
        if let Some(popup) = popup {
            self.add_popup(popup);
        }
        self.actions.push(action);
    }

    pub(crate) fn add_popup(&mut self, popup: String) {
        if self.is_visible() {
            self.popups.push(popup);
        }
    }

    fn has_identity(&self) -> bool {
        !self.text.is_empty()
            || !self.tail.is_empty()
            || !self.attrs.is_empty()
            || !self.styles.is_empty()
    }

    /// Copy for cloning into another tree: history is cleared, tombstone flag and
    /// memoized leaf count are kept.
    fn detached_copy(&self) -> Self {
        Self {
            tag: self.tag.clone(),
            attrs: self.attrs.clone(),
            styles: self.styles.clone(),
            text: self.text.clone(),
            tail: self.tail.clone(),
            deleted: self.deleted,
            leaf_count: self.leaf_count.clone(),
            actions: SmallVec::new(),
            popups: Vec::new(),
        }
    }

    fn add_class(&mut self, class: &str) {
        match self.attrs.get_mut("class") {
            Some(current) if !current.is_empty() => {
                current.push(' ');
                current.push_str(class);
            }
            _ => {
                self.attrs.insert("class".to_string(), class.to_string());
            }
        }
    }
}

/// Collapse whitespace runs to a single space and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a CSS declaration list (`"color: red; margin: 0"`) into property/value pairs.
pub fn parse_style_declaration(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (property, value) = decl.split_once(':')?;
            let property = property.trim();
            if property.is_empty() {
                return None;
            }
            Some((property.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// A tree of HTML elements.
#[derive(Debug, Clone)]
pub struct Document {
    /// THE tree - all nodes live here
    pub arena: Arena<NodeData>,

    /// Root node (usually `<html>` or `<body>`)
    pub root: NodeId,
}

impl Document {
    /// Create a document holding a single root element.
    pub fn new(root: NodeData) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(root);
        Self { arena, root }
    }

    /// Get immutable reference to node data
    pub fn get(&self, id: NodeId) -> &NodeData {
        self.arena[id].get()
    }

    /// Get mutable reference to node data
    pub fn get_mut(&mut self, id: NodeId) -> &mut NodeData {
        self.arena[id].get_mut()
    }

    /// Append a new element as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = self.arena.new_node(data);
        parent.append(id, &mut self.arena);
        id
    }

    /// Whether `id` still belongs to this document's tree (tombstones included).
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.arena.get(id).is_some_and(|node| !node.is_removed())
            && id.ancestors(&self.arena).last() == Some(self.root)
    }

    /// Children that are not tombstones.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
            .filter(move |&child| !self.get(child).deleted)
    }

    /// All children, tombstones included.
    pub fn children_with_tombstones(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// The parent, unless it is missing or tombstoned.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id]
            .parent()
            .filter(|&parent| !self.get(parent).deleted)
    }

    /// Index of `id` among its parent's live children.
    pub fn live_position(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).position(|child| child == id)
    }

    /// Breadth-first order over live nodes.
    pub fn breadth_first(&self) -> Vec<NodeId> {
        let mut queue = VecDeque::from([self.root]);
        let mut result = Vec::new();
        while let Some(id) = queue.pop_front() {
            result.push(id);
            queue.extend(self.children(id));
        }
        result
    }

    /// Post-order (children before parents) over live nodes.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut result = Vec::new();
        self.collect_post_order(self.root, false, &mut result);
        result
    }

    /// Post-order with each node's children visited last-to-first.
    pub fn reverse_post_order(&self) -> Vec<NodeId> {
        let mut result = Vec::new();
        self.collect_post_order(self.root, true, &mut result);
        result
    }

    fn collect_post_order(&self, id: NodeId, reversed: bool, out: &mut Vec<NodeId>) {
        let mut children: Vec<NodeId> = self.children(id).collect();
        if reversed {
            children.reverse();
        }
        for child in children {
            self.collect_post_order(child, reversed, out);
        }
        out.push(id);
    }

    /// Number of leaves below `id`, computed once over live children.
    pub fn leaf_count(&self, id: NodeId) -> usize {
        let data = self.get(id);
        if let Some(&count) = data.leaf_count.get() {
            return count;
        }
        let mut children = self.children(id).peekable();
        let count = if children.peek().is_none() {
            1
        } else {
            children.map(|child| self.leaf_count(child)).sum()
        };
        *data.leaf_count.get_or_init(|| count)
    }

    /// A node with no text, tail, attributes, styles or children (tombstones included).
    /// These are skipped by matching and edit script generation.
    pub fn is_unidentifiable_leaf(&self, id: NodeId) -> bool {
        !self.get(id).has_identity() && self.children_with_tombstones(id).next().is_none()
    }

    /// Compare two subtrees by text, tail, attributes, styles and children.
    /// Tag names are not compared.
    pub fn subtree_eq(
        &self,
        id: NodeId,
        other: &Document,
        other_id: NodeId,
        include_tombstones: bool,
    ) -> bool {
        let a = self.get(id);
        let b = other.get(other_id);
        if a.text != b.text || a.tail != b.tail || a.attrs != b.attrs || a.styles != b.styles {
            return false;
        }
        let (ours, theirs): (Vec<NodeId>, Vec<NodeId>) = if include_tombstones {
            (
                self.children_with_tombstones(id).collect(),
                other.children_with_tombstones(other_id).collect(),
            )
        } else {
            (self.children(id).collect(), other.children(other_id).collect())
        };
        ours.len() == theirs.len()
            && ours
                .into_iter()
                .zip(theirs)
                .all(|(a, b)| self.subtree_eq(a, other, b, include_tombstones))
    }

    /// Deep-copy a subtree of `src` into this arena. The copy is detached and
    /// carries no history.
    pub fn clone_subtree_from(&mut self, src: &Document, id: NodeId) -> NodeId {
        let copy = self.arena.new_node(src.get(id).detached_copy());
        for child in src.children_with_tombstones(id) {
            let child_copy = self.clone_subtree_from(src, child);
            copy.append(child_copy, &mut self.arena);
        }
        copy
    }

    /// Deep-copy a subtree of this document. The copy is detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let data = self.get(id).detached_copy();
        let copy = self.arena.new_node(data);
        let children: Vec<NodeId> = self.children_with_tombstones(id).collect();
        for child in children {
            let child_copy = self.clone_subtree(child);
            copy.append(child_copy, &mut self.arena);
        }
        copy
    }

    /// Insert a detached node so that it becomes the `position`-th live child
    /// of `parent`. Tombstones sitting at that slot end up after the new node.
    /// Positions past the end append.
    pub(crate) fn insert_at(&mut self, parent: NodeId, position: usize, child: NodeId) {
        let mut physical = position;
        let mut live_seen = 0;
        for sibling in parent.children(&self.arena) {
            if live_seen == position {
                break;
            }
            if self.get(sibling).deleted {
                physical += 1;
            } else {
                live_seen += 1;
            }
        }
        match parent.children(&self.arena).nth(physical) {
            Some(anchor) => anchor.insert_before(child, &mut self.arena),
            None => parent.append(child, &mut self.arena),
        }
    }

    /// Detach a node from its parent, keeping its subtree.
    pub(crate) fn detach(&mut self, id: NodeId) {
        id.detach(&mut self.arena);
    }

    /// Mark `id` as a tombstone. Its descendants become ordinary members of the
    /// deleted subtree: their tombstone flags and history are cleared, and the
    /// ids of the actions they carried are returned.
    pub(crate) fn tombstone(&mut self, id: NodeId) -> Vec<ActionId> {
        self.get_mut(id).deleted = true;
        let mut discarded = Vec::new();
        let descendants: Vec<NodeId> = id.descendants(&self.arena).skip(1).collect();
        for descendant in descendants {
            let data = self.get_mut(descendant);
            data.deleted = false;
            data.popups.clear();
            discarded.extend(data.actions.drain(..));
        }
        discarded
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub(crate) fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        id.ancestors(&self.arena).any(|a| a == ancestor)
    }

    /// Add the `edited` class to every annotated node, preceded by `deleted` for
    /// tombstones.
    pub fn annotate_classes(&mut self) {
        let annotated: Vec<NodeId> = self
            .root
            .descendants(&self.arena)
            .filter(|&id| !self.get(id).popups.is_empty())
            .collect();
        for id in annotated {
            let data = self.get_mut(id);
            if data.deleted {
                data.add_class("deleted");
            }
            data.add_class("edited");
        }
    }

    /// Popup texts of a node as an HTML list, or `None` if it has none.
    pub fn popup_html(&self, id: NodeId) -> Option<String> {
        let popups = &self.get(id).popups;
        if popups.is_empty() {
            return None;
        }
        let mut html = String::from(" <ul>");
        for popup in popups {
            html.push_str("<li>");
            html.push_str(popup);
            html.push_str("</li>");
        }
        html.push_str("</ul>");
        Some(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn test_style_declaration_split() {
        let styles = parse_style_declaration(" color : red;margin:0 ; ;broken; font-family: a:b");
        assert_eq!(
            styles,
            vec![
                ("color".to_string(), "red".to_string()),
                ("margin".to_string(), "0".to_string()),
                ("font-family".to_string(), "a:b".to_string()),
            ]
        );
    }

    #[test]
    fn test_style_attr_goes_to_styles() {
        let data = NodeData::element("p").with_attr("style", "color: red").with_attr("id", "x");
        assert_eq!(data.styles.get("color").map(String::as_str), Some("red"));
        assert!(!data.attrs.contains_key("style"));
        assert_eq!(data.attrs.get("id").map(String::as_str), Some("x"));
    }

    #[test]
    fn test_text_is_normalized() {
        let data = NodeData::element("p").with_text("  hello \n\t world ").with_tail("\n  ");
        assert_eq!(data.text(), "hello world");
        assert_eq!(data.tail(), "");
    }

    #[test]
    fn test_unidentifiable_leaf() {
        let mut doc = Document::new(NodeData::element("body"));
        let br = doc.append(doc.root, NodeData::element("br"));
        let img = doc.append(doc.root, NodeData::element("img").with_attr("src", "a.png"));
        let div = doc.append(doc.root, NodeData::element("div"));
        doc.append(div, NodeData::element("span").with_text("x"));

        assert!(doc.is_unidentifiable_leaf(br));
        assert!(!doc.is_unidentifiable_leaf(img));
        assert!(!doc.is_unidentifiable_leaf(div));
    }

    #[test]
    fn test_leaf_count() {
        let mut doc = Document::new(NodeData::element("body"));
        let ul = doc.append(doc.root, NodeData::element("ul"));
        for text in ["a", "b", "c"] {
            doc.append(ul, NodeData::element("li").with_text(text));
        }
        doc.append(doc.root, NodeData::element("p").with_text("d"));

        assert_eq!(doc.leaf_count(ul), 3);
        assert_eq!(doc.leaf_count(doc.root), 4);
    }

    #[test]
    fn test_tombstones_are_skipped_by_traversals() {
        let mut doc = Document::new(NodeData::element("body"));
        let a = doc.append(doc.root, NodeData::element("p").with_text("a"));
        let b = doc.append(doc.root, NodeData::element("p").with_text("b"));
        let inner = doc.append(b, NodeData::element("span").with_text("inner"));
        doc.tombstone(b);

        assert_eq!(doc.children(doc.root).collect::<Vec<_>>(), vec![a]);
        assert_eq!(doc.children_with_tombstones(doc.root).count(), 2);
        assert_eq!(doc.breadth_first(), vec![doc.root, a]);
        assert_eq!(doc.post_order(), vec![a, doc.root]);
        assert_eq!(doc.parent(inner), None);
    }

    #[test]
    fn test_insert_at_skips_tombstones() {
        let mut doc = Document::new(NodeData::element("ul"));
        let a = doc.append(doc.root, NodeData::element("li").with_text("a"));
        let gone = doc.append(doc.root, NodeData::element("li").with_text("gone"));
        let b = doc.append(doc.root, NodeData::element("li").with_text("b"));
        doc.tombstone(gone);

        let new = doc.arena.new_node(NodeData::element("li").with_text("new"));
        doc.insert_at(doc.root, 1, new);

        let all: Vec<NodeId> = doc.children_with_tombstones(doc.root).collect();
        assert_eq!(all, vec![a, new, gone, b]);
        assert_eq!(doc.live_position(new), Some(1));

        let end = doc.arena.new_node(NodeData::element("li").with_text("end"));
        doc.insert_at(doc.root, 10, end);
        assert_eq!(doc.children(doc.root).last(), Some(end));
    }

    #[test]
    fn test_clone_subtree_is_independent() {
        let mut src = Document::new(NodeData::element("body"));
        let div = src.append(src.root, NodeData::element("div").with_attr("id", "x"));
        src.append(div, NodeData::element("p").with_text("hi"));
        src.get_mut(div).add_popup("note".to_string());

        let mut dst = Document::new(NodeData::element("body"));
        let copy = dst.clone_subtree_from(&src, div);

        assert!(dst.subtree_eq(copy, &src, div, false));
        assert!(dst.get(copy).popups().is_empty());
        assert!(dst.arena[copy].parent().is_none());

        dst.get_mut(copy).attrs.insert("id".into(), "y".into());
        assert_eq!(src.get(div).attrs["id"], "x");
    }

    #[test]
    fn test_annotate_classes() {
        let mut doc = Document::new(NodeData::element("div"));
        let p = doc.append(doc.root, NodeData::element("p").with_attr("class", "lead"));
        let q = doc.append(doc.root, NodeData::element("p").with_text("old"));
        doc.get_mut(p).add_popup("Updated".to_string());
        doc.get_mut(q).add_popup("This node is deleted".to_string());
        doc.tombstone(q);

        doc.annotate_classes();

        assert_eq!(doc.get(p).attrs["class"], "lead edited");
        assert_eq!(doc.get(q).attrs["class"], "deleted edited");
        assert_eq!(
            doc.popup_html(p).as_deref(),
            Some(" <ul><li>Updated</li></ul>")
        );
        assert_eq!(doc.popup_html(doc.root), None);
    }
}
