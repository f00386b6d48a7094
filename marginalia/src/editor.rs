//! Applies edit actions to the working tree one at a time.
//!
//! Every applied action is appended to the script and recorded on its target
//! node together with a popup text describing the change.

use indexmap::IndexMap;
use indextree::NodeId;

use crate::action::{ActionId, EditAction, EditScript};
use crate::error::DiffError;
use crate::node::{Document, NodeData};
use crate::trace;

/// Owns the working tree and the script of everything applied to it.
#[derive(Debug)]
pub struct TreeEditor {
    doc: Document,
    script: EditScript,
}

enum Scope {
    Attribute,
    Style,
}

impl Scope {
    fn label(&self) -> &'static str {
        match self {
            Scope::Attribute => "",
            Scope::Style => " style",
        }
    }

    fn map<'d>(&self, data: &'d NodeData) -> &'d IndexMap<String, String> {
        match self {
            Scope::Attribute => &data.attrs,
            Scope::Style => &data.styles,
        }
    }

    fn map_mut<'d>(&self, data: &'d mut NodeData) -> &'d mut IndexMap<String, String> {
        match self {
            Scope::Attribute => &mut data.attrs,
            Scope::Style => &mut data.styles,
        }
    }
}

impl TreeEditor {
    /// Start editing `doc` with an empty script.
    pub fn new(doc: Document) -> Self {
        Self {
            doc,
            script: EditScript::new(),
        }
    }

    /// The working tree.
    pub fn doc(&self) -> &Document {
        &self.doc
    }

    /// Everything applied so far.
    pub fn script(&self) -> &EditScript {
        &self.script
    }

    /// Give back the edited tree and its script.
    pub fn into_parts(self) -> (Document, EditScript) {
        (self.doc, self.script)
    }

    /// Copy a subtree of `src` into the working tree, detached and ready to
    /// be inserted.
    pub fn clone_from(&mut self, src: &Document, id: NodeId) -> NodeId {
        self.doc.clone_subtree_from(src, id)
    }

    /// Validate and apply one action.
    pub fn apply(&mut self, action: EditAction) -> Result<ActionId, DiffError> {
        self.validate(&action)?;
        let target = action.target();

        match action {
            EditAction::InsertNode {
                new_parent,
                position,
                ..
            } => {
                let id = self.script.push(action);
                self.record(target, id, "This node is inserted".to_string());
                self.doc.insert_at(new_parent, position, target);
                Ok(id)
            }

            EditAction::DeleteNode { .. } => {
                let id = self.script.push(action);
                self.record(target, id, "This node is deleted".to_string());
                let discarded = self.doc.tombstone(target);
                trace!(
                    target = usize::from(target),
                    discarded = discarded.len(),
                    "delete"
                );
                self.script.discard(discarded);
                Ok(id)
            }

            EditAction::MoveNode {
                new_parent,
                position,
                ..
            } => {
                let (old_parent, old_index) = self
                    .doc
                    .parent(target)
                    .zip(self.doc.live_position(target))
                    .ok_or_else(|| invalid(&action, "target has no live parent"))?;
                let popup = if old_parent == new_parent {
                    format!(
                        "Moved from {}({old_index}) to {}({position})",
                        self.doc.get(old_parent).tag,
                        self.doc.get(new_parent).tag
                    )
                } else {
                    "Moved to a new parent".to_string()
                };
                let id = self.script.push(action);
                self.record(target, id, popup);

                // leave a tombstoned copy where the node used to be
                let ghost = self.doc.clone_subtree(target);
                self.doc.tombstone(ghost);
                self.doc.get_mut(ghost).add_popup("This node is moved".to_string());
                self.doc.insert_at(old_parent, old_index, ghost);

                self.doc.detach(target);
                self.doc.insert_at(new_parent, position, target);
                Ok(id)
            }

            EditAction::RenameNode { ref new_tag, .. } => {
                let popup = format!("Tag rename: {}->{new_tag}", self.doc.get(target).tag);
                let new_tag = new_tag.clone();
                let id = self.script.push(action);
                self.record(target, id, popup);
                self.doc.get_mut(target).tag = new_tag;
                Ok(id)
            }

            EditAction::UpdateText { ref new_value, .. } => {
                let new_value = new_value.clone();
                let id = self.script.push(action);
                let data = self.doc.get_mut(target);
                data.text = new_value;
                data.record(id, None);
                Ok(id)
            }

            EditAction::UpdateTail { ref new_value, .. } => {
                let new_value = new_value.clone();
                let id = self.script.push(action);
                let data = self.doc.get_mut(target);
                data.tail = new_value;
                data.record(id, None);
                Ok(id)
            }

            EditAction::InsertAttribute { .. }
            | EditAction::UpdateAttribute { .. }
            | EditAction::RenameAttribute { .. }
            | EditAction::DeleteAttribute { .. } => self.apply_key_value(action, Scope::Attribute),

            EditAction::InsertStyle { .. }
            | EditAction::UpdateStyle { .. }
            | EditAction::RenameStyle { .. }
            | EditAction::DeleteStyle { .. } => self.apply_key_value(action, Scope::Style),
        }
    }

    fn apply_key_value(&mut self, action: EditAction, scope: Scope) -> Result<ActionId, DiffError> {
        let target = action.target();
        let label = scope.label();

        let current = scope.map(self.doc.get(target));
        let popup = match &action {
            EditAction::InsertAttribute { key, value, .. }
            | EditAction::InsertStyle { key, value, .. } => {
                format!("Inserted{label}: {key}->{value}")
            }
            EditAction::UpdateAttribute { key, value, .. }
            | EditAction::UpdateStyle { key, value, .. } => {
                let old = current.get(key).map_or("", String::as_str);
                format!("Updated{label} {key}: {old}->{value}")
            }
            EditAction::RenameAttribute {
                old_key, new_key, ..
            }
            | EditAction::RenameStyle {
                old_key, new_key, ..
            } => format!("Renamed{label}: {old_key}->{new_key}"),
            EditAction::DeleteAttribute { key, .. } | EditAction::DeleteStyle { key, .. } => {
                format!("Deleted{label}: {key}")
            }
            _ => return Err(invalid(&action, "not an attribute or style action")),
        };

        let map = scope.map_mut(self.doc.get_mut(target));
        match &action {
            EditAction::InsertAttribute { key, value, .. }
            | EditAction::InsertStyle { key, value, .. }
            | EditAction::UpdateAttribute { key, value, .. }
            | EditAction::UpdateStyle { key, value, .. } => {
                map.insert(key.clone(), value.clone());
            }
            EditAction::RenameAttribute {
                old_key, new_key, ..
            }
            | EditAction::RenameStyle {
                old_key, new_key, ..
            } => {
                if let Some(value) = map.shift_remove(old_key) {
                    map.insert(new_key.clone(), value);
                }
            }
            EditAction::DeleteAttribute { key, .. } | EditAction::DeleteStyle { key, .. } => {
                map.shift_remove(key);
            }
            _ => {}
        }

        let id = self.script.push(action);
        self.record(target, id, popup);
        Ok(id)
    }

    fn record(&mut self, target: NodeId, id: ActionId, popup: String) {
        self.doc.get_mut(target).record(id, Some(popup));
    }

    fn validate(&self, action: &EditAction) -> Result<(), DiffError> {
        let target = action.target();
        let exists = self
            .doc
            .arena
            .get(target)
            .is_some_and(|node| !node.is_removed());
        if !exists {
            return Err(invalid(action, "target is not in the working tree"));
        }

        match action {
            EditAction::InsertNode { new_parent, .. } => {
                if self.doc.arena[target].parent().is_some() || target == self.doc.root {
                    return Err(invalid(action, "inserted node is already attached"));
                }
                self.check_parent(action, *new_parent)
            }
            EditAction::MoveNode { new_parent, .. } => {
                self.check_attached(action)?;
                if self.doc.is_ancestor_or_self(target, *new_parent) {
                    return Err(invalid(action, "cannot move a node into its own subtree"));
                }
                self.check_parent(action, *new_parent)
            }
            EditAction::DeleteNode { .. } => {
                self.check_attached(action)?;
                if target == self.doc.root {
                    return Err(invalid(action, "cannot delete the root"));
                }
                Ok(())
            }
            EditAction::UpdateAttribute { key, .. } | EditAction::DeleteAttribute { key, .. } => {
                self.check_attached(action)?;
                self.check_key(action, &self.doc.get(target).attrs, key)
            }
            EditAction::RenameAttribute { old_key, .. } => {
                self.check_attached(action)?;
                self.check_key(action, &self.doc.get(target).attrs, old_key)
            }
            EditAction::UpdateStyle { key, .. } | EditAction::DeleteStyle { key, .. } => {
                self.check_attached(action)?;
                self.check_key(action, &self.doc.get(target).styles, key)
            }
            EditAction::RenameStyle { old_key, .. } => {
                self.check_attached(action)?;
                self.check_key(action, &self.doc.get(target).styles, old_key)
            }
            EditAction::InsertAttribute { key, .. } if key == "style" => {
                Err(invalid(action, "style is diffed as style properties"))
            }
            _ => self.check_attached(action),
        }
    }

    fn check_attached(&self, action: &EditAction) -> Result<(), DiffError> {
        if self.doc.is_attached(action.target()) {
            Ok(())
        } else {
            Err(invalid(action, "target is detached from the working tree"))
        }
    }

    fn check_parent(&self, action: &EditAction, parent: NodeId) -> Result<(), DiffError> {
        if !self.doc.is_attached(parent) {
            return Err(invalid(action, "new parent is not in the working tree"));
        }
        if self.doc.get(parent).is_deleted() {
            return Err(invalid(action, "new parent is deleted"));
        }
        Ok(())
    }

    fn check_key(
        &self,
        action: &EditAction,
        map: &IndexMap<String, String>,
        key: &str,
    ) -> Result<(), DiffError> {
        if map.contains_key(key) {
            Ok(())
        } else {
            Err(invalid(action, &format!("no such key `{key}`")))
        }
    }
}

fn invalid(action: &EditAction, reason: &str) -> DiffError {
    DiffError::InvalidAction {
        action: action.kind().to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    fn list() -> (Document, NodeId, [NodeId; 3]) {
        let mut doc = Document::new(NodeData::element("body"));
        let ul = doc.append(doc.root, NodeData::element("ul"));
        let a = doc.append(ul, NodeData::element("li").with_text("a"));
        let b = doc.append(ul, NodeData::element("li").with_text("b"));
        let c = doc.append(ul, NodeData::element("li").with_text("c"));
        (doc, ul, [a, b, c])
    }

    fn texts(doc: &Document, parent: NodeId) -> Vec<String> {
        doc.children(parent)
            .map(|id| doc.get(id).text().to_string())
            .collect()
    }

    #[test]
    fn test_move_leaves_tombstone() {
        let (doc, ul, [_, _, c]) = list();
        let mut editor = TreeEditor::new(doc);

        editor
            .apply(EditAction::MoveNode {
                target: c,
                new_parent: ul,
                position: 0,
            })
            .unwrap();

        let doc = editor.doc();
        assert_eq!(texts(doc, ul), vec!["c", "a", "b"]);
        let all: Vec<NodeId> = doc.children_with_tombstones(ul).collect();
        assert_eq!(all.len(), 4);
        let ghost = all[3];
        assert!(doc.get(ghost).is_deleted());
        assert_eq!(doc.get(ghost).popups(), ["This node is moved"]);
        assert!(doc.get(ghost).actions().is_empty());
        assert_eq!(doc.get(c).popups(), ["Moved from ul(2) to ul(0)"]);
    }

    #[test]
    fn test_move_to_other_parent() {
        let (mut doc, ul, [a, _, _]) = list();
        let div = doc.append(doc.root, NodeData::element("div").with_attr("id", "d"));
        let mut editor = TreeEditor::new(doc);

        editor
            .apply(EditAction::MoveNode {
                target: a,
                new_parent: div,
                position: 0,
            })
            .unwrap();

        let doc = editor.doc();
        assert_eq!(texts(doc, ul), vec!["b", "c"]);
        assert_eq!(texts(doc, div), vec!["a"]);
        assert_eq!(doc.get(a).popups(), ["Moved to a new parent"]);
    }

    #[test]
    fn test_move_into_own_subtree_is_rejected() {
        let (doc, ul, [a, _, _]) = list();
        let mut editor = TreeEditor::new(doc);
        let err = editor
            .apply(EditAction::MoveNode {
                target: ul,
                new_parent: a,
                position: 0,
            })
            .unwrap_err();
        assert!(matches!(err, DiffError::InvalidAction { .. }));
        assert!(editor.script().is_empty());
    }

    #[test]
    fn test_delete_discards_descendant_actions() {
        let (doc, ul, [a, _, _]) = list();
        let mut editor = TreeEditor::new(doc);

        editor
            .apply(EditAction::UpdateText {
                target: a,
                new_value: "<del>a</del><ins>z</ins>".into(),
            })
            .unwrap();
        let delete = editor.apply(EditAction::DeleteNode { target: ul }).unwrap();

        let (doc, script) = editor.into_parts();
        assert_eq!(script.len(), 1);
        assert!(script.get(delete).is_some());
        assert!(doc.get(ul).is_deleted());
        assert!(doc.get(a).actions().is_empty());
        assert_eq!(doc.get(ul).popups(), ["This node is deleted"]);
        assert!(doc.children(doc.root).next().is_none());
    }

    #[test]
    fn test_attribute_actions() {
        let mut doc = Document::new(NodeData::element("body"));
        let p = doc.append(
            doc.root,
            NodeData::element("p")
                .with_attr("id", "x")
                .with_attr("title", "old")
                .with_attr("lang", "en"),
        );
        let mut editor = TreeEditor::new(doc);

        for action in [
            EditAction::UpdateAttribute {
                target: p,
                key: "title".into(),
                value: "new".into(),
            },
            EditAction::RenameAttribute {
                target: p,
                old_key: "id".into(),
                new_key: "name".into(),
            },
            EditAction::InsertAttribute {
                target: p,
                key: "dir".into(),
                value: "ltr".into(),
            },
            EditAction::DeleteAttribute {
                target: p,
                key: "lang".into(),
            },
        ] {
            editor.apply(action).unwrap();
        }

        let data = editor.doc().get(p);
        assert_eq!(data.attrs.get("title").map(String::as_str), Some("new"));
        assert_eq!(data.attrs.get("name").map(String::as_str), Some("x"));
        assert_eq!(data.attrs.get("dir").map(String::as_str), Some("ltr"));
        assert!(!data.attrs.contains_key("id"));
        assert!(!data.attrs.contains_key("lang"));
        assert_eq!(
            data.popups(),
            [
                "Updated title: old->new",
                "Renamed: id->name",
                "Inserted: dir->ltr",
                "Deleted: lang",
            ]
        );
    }

    #[test]
    fn test_style_actions_log_style_values() {
        let mut doc = Document::new(NodeData::element("body"));
        let p = doc.append(
            doc.root,
            NodeData::element("p").with_attr("style", "color: red; margin: 0"),
        );
        let mut editor = TreeEditor::new(doc);

        editor
            .apply(EditAction::UpdateStyle {
                target: p,
                key: "color".into(),
                value: "blue".into(),
            })
            .unwrap();
        editor
            .apply(EditAction::RenameStyle {
                target: p,
                old_key: "margin".into(),
                new_key: "padding".into(),
            })
            .unwrap();

        let data = editor.doc().get(p);
        assert_eq!(data.styles.get("color").map(String::as_str), Some("blue"));
        assert_eq!(data.styles.get("padding").map(String::as_str), Some("0"));
        assert_eq!(
            data.popups(),
            ["Updated style color: red->blue", "Renamed style: margin->padding"]
        );
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let (doc, _, [a, _, _]) = list();
        let mut editor = TreeEditor::new(doc);
        let err = editor
            .apply(EditAction::DeleteAttribute {
                target: a,
                key: "id".into(),
            })
            .unwrap_err();
        assert!(matches!(err, DiffError::InvalidAction { .. }));
    }

    #[test]
    fn test_invisible_nodes_get_no_popup() {
        let mut doc = Document::new(NodeData::element("html"));
        let script = doc.append(doc.root, NodeData::element("script").with_text("x()"));
        let mut editor = TreeEditor::new(doc);

        let id = editor
            .apply(EditAction::RenameNode {
                target: script,
                new_tag: "noscript".into(),
            })
            .unwrap();

        let data = editor.doc().get(script);
        assert_eq!(data.tag, "noscript");
        assert!(data.popups().is_empty());
        assert_eq!(data.actions(), [id]);
    }
}
