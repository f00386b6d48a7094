use facet::Facet;

/// Errors that abort a diff run.
///
/// Node ids are reported as their arena index (`usize::from(NodeId)`).
#[derive(Facet, Debug)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum DiffError {
    /// partner mappings disagree: {left} left partners but {right} right partners
    MatchingCardinality {
        /// Number of left-to-right entries
        left: usize,
        /// Number of right-to-left entries
        right: usize,
    },

    /// cannot match unequal subtrees (left node {left}, right node {right})
    CloneMismatch {
        /// Node of the inserted clone
        left: usize,
        /// Right node it was copied from
        right: usize,
    },

    /// cloned node {left} has {left_children} children but its right partner has {right_children}
    CloneChildCount {
        /// Node of the inserted clone
        left: usize,
        /// Live children of the clone
        left_children: usize,
        /// Children of the right node
        right_children: usize,
    },

    /// right node {node} has no matched parent in the working tree
    UnmatchedParent {
        /// The right node being placed
        node: usize,
    },

    /// in-order node {node} has no partner
    MissingPartner {
        /// The right node without a partner
        node: usize,
    },

    /// invalid {action} action: {reason}
    InvalidAction {
        /// Kind of the rejected action
        action: String,
        /// What made it invalid
        reason: String,
    },
}
