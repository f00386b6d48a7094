//! Chawathe edit script generation.
//!
//! Transforms the left tree into the right tree in place, emitting one action
//! per change. Based on "Change Detection in Hierarchically Structured
//! Information" (Chawathe et al., 1996).
//!
//! The algorithm has 2 passes:
//! 1. Breadth-first over the right tree: insert unmatched nodes, rename, update
//!    attributes, move nodes whose parent changed, align children, update text
//! 2. Reverse post-order over the left tree: delete nodes that are still unmatched
//!
//! Every action is applied to the working tree as soon as it is emitted, so
//! later decisions see the already edited state.

use crate::{debug, trace};

use indextree::NodeId;
use rapidhash::RapidHashSet as HashSet;

use crate::action::{EditAction, EditScript};
use crate::attributes::diff_attributes;
use crate::editor::TreeEditor;
use crate::error::DiffError;
use crate::matching::Matching;
use crate::node::Document;
use crate::sequence::longest_common_subsequence;
use crate::text::diff_text;

/// State of one edit script run.
struct Generator<'r> {
    right: &'r Document,
    editor: TreeEditor,
    matching: Matching,
    /// Left nodes confirmed to be in the right place among their siblings
    in_order_left: HashSet<NodeId>,
    /// Right nodes whose partner is in the right place
    in_order_right: HashSet<NodeId>,
}

/// Generate the edit script turning `left` into `right`, given a matching of
/// the two trees. Returns the actions and the edited left tree.
pub fn generate_edit_script(
    left: Document,
    right: &Document,
    matching: Matching,
) -> Result<(Vec<EditAction>, Document), DiffError> {
    let (doc, script, _) = run(left, right, matching)?;
    Ok((script.into_actions(), doc))
}

/// Like [`generate_edit_script`], also returning the script with its ids and
/// the final matching (which includes inserted clones).
pub(crate) fn run(
    left: Document,
    right: &Document,
    matching: Matching,
) -> Result<(Document, EditScript, Matching), DiffError> {
    trace!(matched_pairs = matching.len(), "generate_edit_script start");
    let mut generator = Generator {
        right,
        editor: TreeEditor::new(left),
        matching,
        in_order_left: HashSet::default(),
        in_order_right: HashSet::default(),
    };

    for r in right.breadth_first() {
        if right.is_unidentifiable_leaf(r) {
            continue;
        }
        generator.visit(r)?;
    }

    generator.delete_unmatched()?;

    let Generator {
        editor, matching, ..
    } = generator;
    matching.check_cardinality()?;
    let (doc, script) = editor.into_parts();
    debug!(total_ops = script.len(), "generate_edit_script done");
    Ok((doc, script, matching))
}

impl Generator<'_> {
    fn doc(&self) -> &Document {
        self.editor.doc()
    }

    /// Update, insert, move and align for one right node.
    fn visit(&mut self, r: NodeId) -> Result<(), DiffError> {
        let right = self.right;
        let left_target = right.parent(r).and_then(|parent| self.matching.get_left(parent));

        let l = match self.matching.get_left(r) {
            None => {
                // the clone takes over the partners of the whole right subtree;
                // their old left partners stay in place until the delete pass
                self.release_subtree(r);
                let position = self.find_position(r)?;
                let new_parent = left_target.ok_or(DiffError::UnmatchedParent {
                    node: usize::from(r),
                })?;
                let clone = self.editor.clone_from(right, r);
                self.editor.apply(EditAction::InsertNode {
                    target: clone,
                    new_parent,
                    position,
                })?;
                self.match_recursively(clone, r)?;
                diff_attributes(&mut self.editor, clone, right.get(r))?;
                clone
            }
            Some(l) => {
                let new_tag = &right.get(r).tag;
                if self.doc().get(l).tag != *new_tag {
                    self.editor.apply(EditAction::RenameNode {
                        target: l,
                        new_tag: new_tag.clone(),
                    })?;
                }
                diff_attributes(&mut self.editor, l, right.get(r))?;

                if let Some(left_parent) = self.doc().parent(l)
                    && Some(left_parent) != left_target
                {
                    let position = self.find_position(r)?;
                    let new_parent = left_target.ok_or(DiffError::UnmatchedParent {
                        node: usize::from(r),
                    })?;
                    self.editor.apply(EditAction::MoveNode {
                        target: l,
                        new_parent,
                        position,
                    })?;
                    self.in_order_left.insert(l);
                    self.in_order_right.insert(r);
                }
                l
            }
        };

        self.align_children(l, r)?;
        self.update_text(l, r)
    }

    /// Unmatch the left partners of every node below right node `r`.
    fn release_subtree(&mut self, r: NodeId) {
        for descendant in r.descendants(&self.right.arena) {
            if let Some(stale) = self.matching.get_left(descendant) {
                trace!(
                    left = usize::from(stale),
                    right = usize::from(descendant),
                    "release stale partner"
                );
                self.matching.remove_left(stale);
            }
        }
    }

    /// Match an inserted clone with the right subtree it was copied from,
    /// node by node.
    fn match_recursively(&mut self, clone: NodeId, r: NodeId) -> Result<(), DiffError> {
        let right = self.right;
        let mut stack = vec![(clone, r)];
        while let Some((l, r)) = stack.pop() {
            if !self.doc().subtree_eq(l, right, r, false) {
                return Err(DiffError::CloneMismatch {
                    left: usize::from(l),
                    right: usize::from(r),
                });
            }
            self.in_order_left.insert(l);
            self.in_order_right.insert(r);
            trace!(l = usize::from(l), r = usize::from(r), "match clone");
            self.matching.add(l, r, 1.0);

            let left_children: Vec<NodeId> = self.doc().children(l).collect();
            let right_children: Vec<NodeId> = right.children(r).collect();
            if left_children.len() != right_children.len() {
                return Err(DiffError::CloneChildCount {
                    left: usize::from(l),
                    left_children: left_children.len(),
                    right_children: right_children.len(),
                });
            }
            stack.extend(left_children.into_iter().zip(right_children));
        }
        Ok(())
    }

    /// Move children of `l` so that those matched into `r` appear in the same
    /// order as their partners, with as few moves as possible.
    fn align_children(&mut self, l: NodeId, r: NodeId) -> Result<(), DiffError> {
        let right = self.right;
        let doc = self.doc();
        let left_children: Vec<NodeId> = doc
            .children(l)
            .filter(|&child| {
                self.matching
                    .get_right(child)
                    .is_some_and(|partner| right.parent(partner) == Some(r))
            })
            .collect();
        let right_children: Vec<NodeId> = right
            .children(r)
            .filter(|&child| {
                self.matching
                    .get_left(child)
                    .is_some_and(|partner| doc.parent(partner) == Some(l))
            })
            .collect();
        if left_children.is_empty() && right_children.is_empty() {
            return Ok(());
        }

        let lcs = longest_common_subsequence(&left_children, &right_children, |&a, &b| {
            self.matching.get_right(a) == Some(b)
        });
        for (i, j) in lcs {
            self.in_order_left.insert(left_children[i]);
            self.in_order_right.insert(right_children[j]);
        }

        for child in left_children {
            if self.in_order_left.contains(&child) {
                continue;
            }
            let Some(partner) = self.matching.get_right(child) else {
                continue;
            };
            let position = self.find_position(partner)?;
            trace!(
                child = usize::from(child),
                partner = usize::from(partner),
                position,
                "align: out of order"
            );
            self.editor.apply(EditAction::MoveNode {
                target: child,
                new_parent: l,
                position,
            })?;
            self.in_order_left.insert(child);
            self.in_order_right.insert(partner);
        }
        Ok(())
    }

    /// Target index, among the live children of the left parent, for the
    /// partner of right node `r`.
    ///
    /// Counts the left siblings up to the partner of the nearest in-order
    /// sibling preceding `r`. Only siblings that stay where they are count:
    /// in-order ones and unmatched ones (which will be deleted in place).
    fn find_position(&self, r: NodeId) -> Result<usize, DiffError> {
        let right = self.right;
        let Some(parent) = right.parent(r) else {
            return Ok(0);
        };
        let siblings: Vec<NodeId> = right.children(parent).collect();
        let index = siblings.iter().position(|&s| s == r).unwrap_or(0);
        let Some(&sibling) = siblings[..index]
            .iter()
            .rev()
            .find(|s| self.in_order_right.contains(*s))
        else {
            return Ok(0);
        };

        let sibling_partner = self
            .matching
            .get_left(sibling)
            .ok_or(DiffError::MissingPartner {
                node: usize::from(sibling),
            })?;
        let own_partner = self.matching.get_left(r);

        let doc = self.doc();
        let Some(left_parent) = doc.parent(sibling_partner) else {
            return Ok(0);
        };
        let mut position = 0;
        for child in doc.children(left_parent) {
            if Some(child) == own_partner {
                continue;
            }
            if self.in_order_left.contains(&child) || !self.matching.contains_left(child) {
                position += 1;
            }
            if child == sibling_partner {
                break;
            }
        }
        Ok(position)
    }

    fn update_text(&mut self, l: NodeId, r: NodeId) -> Result<(), DiffError> {
        let (old, new) = (self.doc().get(l), self.right.get(r));
        let text = (old.text() != new.text()).then(|| diff_text(old.text(), new.text()));
        let tail = (old.tail() != new.tail()).then(|| diff_text(old.tail(), new.tail()));

        if let Some(new_value) = text {
            self.editor.apply(EditAction::UpdateText {
                target: l,
                new_value,
            })?;
        }
        if let Some(new_value) = tail {
            self.editor.apply(EditAction::UpdateTail {
                target: l,
                new_value,
            })?;
        }
        Ok(())
    }

    /// Delete every identifiable left node that is still unmatched. Children
    /// come before their parents, so a deleted parent drops the actions
    /// already recorded on its subtree.
    fn delete_unmatched(&mut self) -> Result<(), DiffError> {
        for l in self.doc().reverse_post_order() {
            if self.doc().is_unidentifiable_leaf(l) || self.matching.contains_left(l) {
                continue;
            }
            self.editor.apply(EditAction::DeleteNode { target: l })?;
        }
        Ok(())
    }
}
