//! Edit actions and the ordered script they are collected into.

use core::fmt;

use indextree::NodeId;

use crate::{debug, trace};

/// Index of an action in its [`EditScript`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(usize);

/// One edit applied to the working tree.
///
/// All node ids refer to the working (left) tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAction {
    /// Insert a detached clone of a right node.
    InsertNode {
        /// The detached clone
        target: NodeId,
        /// Parent in the working tree
        new_parent: NodeId,
        /// Index among the parent's live children
        position: usize,
    },

    /// Tombstone a node and its subtree.
    DeleteNode {
        /// Root of the deleted subtree
        target: NodeId,
    },

    /// Relocate a node, leaving a tombstoned copy at the old position.
    MoveNode {
        /// The node being moved
        target: NodeId,
        /// Parent after the move
        new_parent: NodeId,
        /// Index among the new parent's live children
        position: usize,
    },

    /// Change the tag name.
    RenameNode {
        /// The renamed node
        target: NodeId,
        /// Tag name after the rename
        new_tag: String,
    },

    /// Add an attribute.
    InsertAttribute {
        /// The edited node
        target: NodeId,
        /// Attribute name
        key: String,
        /// Attribute value
        value: String,
    },
    /// Change the value of an existing attribute.
    UpdateAttribute {
        /// The edited node
        target: NodeId,
        /// Attribute name
        key: String,
        /// New value
        value: String,
    },
    /// Move an attribute's value to a new name.
    RenameAttribute {
        /// The edited node
        target: NodeId,
        /// Name before the rename
        old_key: String,
        /// Name after the rename
        new_key: String,
    },
    /// Remove an attribute.
    DeleteAttribute {
        /// The edited node
        target: NodeId,
        /// Attribute name
        key: String,
    },

    /// Add a style property.
    InsertStyle {
        /// The edited node
        target: NodeId,
        /// Property name
        key: String,
        /// Property value
        value: String,
    },
    /// Change the value of an existing style property.
    UpdateStyle {
        /// The edited node
        target: NodeId,
        /// Property name
        key: String,
        /// New value
        value: String,
    },
    /// Move a style property's value to a new name.
    RenameStyle {
        /// The edited node
        target: NodeId,
        /// Name before the rename
        old_key: String,
        /// Name after the rename
        new_key: String,
    },
    /// Remove a style property.
    DeleteStyle {
        /// The edited node
        target: NodeId,
        /// Property name
        key: String,
    },

    /// Replace the inner text. The value carries `<del>`/`<ins>` markup.
    UpdateText {
        /// The edited node
        target: NodeId,
        /// Annotated text
        new_value: String,
    },

    /// Replace the tail text. The value carries `<del>`/`<ins>` markup.
    UpdateTail {
        /// The edited node
        target: NodeId,
        /// Annotated tail
        new_value: String,
    },
}

impl EditAction {
    /// The node this action applies to.
    pub fn target(&self) -> NodeId {
        match self {
            EditAction::InsertNode { target, .. }
            | EditAction::DeleteNode { target }
            | EditAction::MoveNode { target, .. }
            | EditAction::RenameNode { target, .. }
            | EditAction::InsertAttribute { target, .. }
            | EditAction::UpdateAttribute { target, .. }
            | EditAction::RenameAttribute { target, .. }
            | EditAction::DeleteAttribute { target, .. }
            | EditAction::InsertStyle { target, .. }
            | EditAction::UpdateStyle { target, .. }
            | EditAction::RenameStyle { target, .. }
            | EditAction::DeleteStyle { target, .. }
            | EditAction::UpdateText { target, .. }
            | EditAction::UpdateTail { target, .. } => *target,
        }
    }

    /// Short name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            EditAction::InsertNode { .. } => "InsertNode",
            EditAction::DeleteNode { .. } => "DeleteNode",
            EditAction::MoveNode { .. } => "MoveNode",
            EditAction::RenameNode { .. } => "RenameNode",
            EditAction::InsertAttribute { .. } => "InsertAttribute",
            EditAction::UpdateAttribute { .. } => "UpdateAttribute",
            EditAction::RenameAttribute { .. } => "RenameAttribute",
            EditAction::DeleteAttribute { .. } => "DeleteAttribute",
            EditAction::InsertStyle { .. } => "InsertStyle",
            EditAction::UpdateStyle { .. } => "UpdateStyle",
            EditAction::RenameStyle { .. } => "RenameStyle",
            EditAction::DeleteStyle { .. } => "DeleteStyle",
            EditAction::UpdateText { .. } => "UpdateText",
            EditAction::UpdateTail { .. } => "UpdateTail",
        }
    }
}

impl fmt::Display for EditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = usize::from(self.target());
        match self {
            EditAction::InsertNode {
                new_parent,
                position,
                ..
            } => write!(
                f,
                "Insert(a:{t} @{position} under a:{})",
                usize::from(*new_parent)
            ),
            EditAction::DeleteNode { .. } => write!(f, "Delete(a:{t})"),
            EditAction::MoveNode {
                new_parent,
                position,
                ..
            } => write!(
                f,
                "Move(a:{t} -> a:{} @{position})",
                usize::from(*new_parent)
            ),
            EditAction::RenameNode { new_tag, .. } => write!(f, "Rename(a:{t} -> <{new_tag}>)"),
            EditAction::InsertAttribute { key, value, .. } => {
                write!(f, "InsertAttr(a:{t} {key}={value:?})")
            }
            EditAction::UpdateAttribute { key, value, .. } => {
                write!(f, "UpdateAttr(a:{t} {key} → {value:?})")
            }
            EditAction::RenameAttribute {
                old_key, new_key, ..
            } => write!(f, "RenameAttr(a:{t} {old_key} → {new_key})"),
            EditAction::DeleteAttribute { key, .. } => write!(f, "DeleteAttr(a:{t} {key})"),
            EditAction::InsertStyle { key, value, .. } => {
                write!(f, "InsertStyle(a:{t} {key}: {value})")
            }
            EditAction::UpdateStyle { key, value, .. } => {
                write!(f, "UpdateStyle(a:{t} {key} → {value})")
            }
            EditAction::RenameStyle {
                old_key, new_key, ..
            } => write!(f, "RenameStyle(a:{t} {old_key} → {new_key})"),
            EditAction::DeleteStyle { key, .. } => write!(f, "DeleteStyle(a:{t} {key})"),
            EditAction::UpdateText { new_value, .. } => {
                write!(f, "SetText(a:{t} text={new_value:?})")
            }
            EditAction::UpdateTail { new_value, .. } => {
                write!(f, "SetTail(a:{t} tail={new_value:?})")
            }
        }
    }
}

/// Ordered edit script. Slots of discarded actions stay empty so that
/// previously handed out [`ActionId`]s remain valid.
#[derive(Debug, Default)]
pub struct EditScript {
    slots: Vec<Option<EditAction>>,
}

impl EditScript {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, action: EditAction) -> ActionId {
        debug!(%action, "emit");
        let id = ActionId(self.slots.len());
        self.slots.push(Some(action));
        id
    }

    pub(crate) fn discard(&mut self, ids: impl IntoIterator<Item = ActionId>) {
        for ActionId(index) in ids {
            if let Some(slot) = self.slots.get_mut(index) {
                slot.take();
                trace!(index, "discard");
            }
        }
    }

    /// The action with this id, unless it was discarded.
    pub fn get(&self, id: ActionId) -> Option<&EditAction> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Number of live actions.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Whether no live action remains.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live actions in application order.
    pub fn iter(&self) -> impl Iterator<Item = &EditAction> {
        self.slots.iter().flatten()
    }

    /// Consume the script, keeping live actions in application order.
    pub fn into_actions(self) -> Vec<EditAction> {
        self.slots.into_iter().flatten().collect()
    }
}
