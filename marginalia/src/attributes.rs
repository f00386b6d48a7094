//! Attribute and style diffing with rename detection.
//!
//! Both maps are diffed the same way: update changed values, turn a removed
//! key whose value reappears under a new key into a rename, insert what is
//! left of the new keys, delete what is left of the removed ones. Keys are
//! visited in sorted order.

use indexmap::IndexMap;
use indextree::NodeId;

use crate::action::{ActionId, EditAction};
use crate::editor::TreeEditor;
use crate::error::DiffError;
use crate::node::NodeData;

/// One planned change to a key/value map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEdit {
    /// Change the value of a key present on both sides
    Update {
        /// The key
        key: String,
        /// Value on the right
        value: String,
    },
    /// Give a removed key's value to a new key
    Rename {
        /// Key only on the left
        old_key: String,
        /// Key only on the right
        new_key: String,
    },
    /// Add a key only on the right
    Insert {
        /// The key
        key: String,
        /// Value on the right
        value: String,
    },
    /// Remove a key only on the left
    Delete {
        /// The key
        key: String,
    },
}

/// Plan the edits turning `left` into `right`, in application order.
pub fn plan_key_edits(
    left: &IndexMap<String, String>,
    right: &IndexMap<String, String>,
) -> Vec<KeyEdit> {
    let mut edits = Vec::new();
    if left.is_empty() && right.is_empty() {
        return edits;
    }

    let mut common: Vec<&String> = left.keys().filter(|k| right.contains_key(*k)).collect();
    let mut removed: Vec<&String> = left.keys().filter(|k| !right.contains_key(*k)).collect();
    let mut added: Vec<&String> = right.keys().filter(|k| !left.contains_key(*k)).collect();
    common.sort();
    removed.sort();
    added.sort();

    for key in common {
        if left[key] != right[key] {
            edits.push(KeyEdit::Update {
                key: key.clone(),
                value: right[key].clone(),
            });
        }
    }

    let mut deleted = Vec::new();
    for key in removed {
        let value = &left[key];
        match added.iter().position(|new_key| &right[*new_key] == value) {
            Some(index) => {
                let new_key = added.remove(index);
                edits.push(KeyEdit::Rename {
                    old_key: key.clone(),
                    new_key: new_key.clone(),
                });
            }
            None => deleted.push(key),
        }
    }

    for key in added {
        edits.push(KeyEdit::Insert {
            key: key.clone(),
            value: right[key].clone(),
        });
    }

    for key in deleted {
        edits.push(KeyEdit::Delete { key: key.clone() });
    }

    edits
}

/// Diff style properties of `target` against `right` and apply the result.
pub fn diff_styles(
    editor: &mut TreeEditor,
    target: NodeId,
    right: &NodeData,
) -> Result<Vec<ActionId>, DiffError> {
    let edits = plan_key_edits(&editor.doc().get(target).styles, &right.styles);
    edits
        .into_iter()
        .map(|edit| {
            editor.apply(match edit {
                KeyEdit::Update { key, value } => EditAction::UpdateStyle { target, key, value },
                KeyEdit::Rename { old_key, new_key } => EditAction::RenameStyle {
                    target,
                    old_key,
                    new_key,
                },
                KeyEdit::Insert { key, value } => EditAction::InsertStyle { target, key, value },
                KeyEdit::Delete { key } => EditAction::DeleteStyle { target, key },
            })
        })
        .collect()
}

/// Diff styles, then plain attributes, of `target` against `right` and apply
/// the result.
pub fn diff_attributes(
    editor: &mut TreeEditor,
    target: NodeId,
    right: &NodeData,
) -> Result<Vec<ActionId>, DiffError> {
    let mut applied = diff_styles(editor, target, right)?;

    let edits = plan_key_edits(&editor.doc().get(target).attrs, &right.attrs);
    for edit in edits {
        let action = match edit {
            KeyEdit::Update { key, value } => EditAction::UpdateAttribute { target, key, value },
            KeyEdit::Rename { old_key, new_key } => EditAction::RenameAttribute {
                target,
                old_key,
                new_key,
            },
            KeyEdit::Insert { key, value } => EditAction::InsertAttribute { target, key, value },
            KeyEdit::Delete { key } => EditAction::DeleteAttribute { target, key },
        };
        applied.push(editor.apply(action)?);
    }
    Ok(applied)
}
