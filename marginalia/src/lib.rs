//! # Marginalia
//!
//! Minimum-disruption diffing of HTML element trees, with the changes written
//! into the margin of the old tree.
//!
//! ## Algorithm Overview
//!
//! The diff works in phases:
//!
//! 1. **Matching**: pair left and right nodes by a weighted similarity of their
//!    attributes, styles, text and already matched children, resolved in the
//!    manner of the stable marriage problem
//! 2. **Edit script generation**: a Chawathe-style breadth-first pass that
//!    inserts, renames, updates, moves and aligns, followed by a delete pass
//! 3. **Annotation**: every edit is applied to the left tree as it is emitted
//!    and leaves a popup text on the node it touched. Deleted and moved-away
//!    nodes stay in the tree as tombstones
//!
//! ## Usage
//!
//! ```
//! use marginalia::{Document, EditAction, MatchingConfig, NodeData, diff_documents};
//!
//! let mut left = Document::new(NodeData::element("body"));
//! let p = left.append(left.root, NodeData::element("p").with_text("the cat"));
//!
//! let mut right = Document::new(NodeData::element("body"));
//! right.append(right.root, NodeData::element("p").with_text("the bat"));
//!
//! let diff = diff_documents(left, &right, &MatchingConfig::default()).unwrap();
//! assert_eq!(
//!     diff.actions,
//!     vec![EditAction::UpdateText {
//!         target: p,
//!         new_value: "the <del>c</del><ins>b</ins>at".to_string(),
//!     }]
//! );
//!
//! let tree = diff.into_annotated_tree();
//! assert_eq!(tree.get(p).text(), "the <del>c</del><ins>b</ins>at");
//! ```

#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]

pub use indextree;

mod tracing_macros;
pub(crate) use tracing_macros::{debug, trace};

mod action;
/// Attribute and style diffing with rename detection
pub mod attributes;
mod chawathe;
mod editor;
mod error;
/// Stable-marriage node matching
pub mod matching;
mod node;
/// Sequence matching and longest common subsequences
pub mod sequence;
/// Node similarity scores
pub mod similarity;
/// Inline text diffs
pub mod text;

pub use action::{ActionId, EditAction, EditScript};
pub use chawathe::generate_edit_script;
pub use editor::TreeEditor;
pub use error::DiffError;
pub use matching::{Matching, MatchingConfig, Partner, compute_matching};
pub use node::{Document, NodeData, normalize_whitespace, parse_style_declaration};
pub use similarity::SimilarityWeights;
pub use text::{accept_changes, diff_text};

/// Result of a diff run.
#[derive(Debug)]
pub struct Diff {
    /// The edit script, in the order the actions were applied
    pub actions: Vec<EditAction>,
    /// The left tree with every action applied and annotated
    pub tree: Document,
    /// Final matching, including inserted nodes
    pub matching: Matching,
}

impl Diff {
    /// The edited tree with `edited`/`deleted` classes added to changed nodes.
    pub fn into_annotated_tree(self) -> Document {
        let mut tree = self.tree;
        tree.annotate_classes();
        tree
    }
}

/// Diff `left` against `right`.
///
/// `left` is consumed: it becomes the working tree that the edit script is
/// applied to. Fails without partial output if any internal invariant breaks.
pub fn diff_documents(
    left: Document,
    right: &Document,
    config: &MatchingConfig,
) -> Result<Diff, DiffError> {
    let matching = compute_matching(&left, right, config)?;
    let (tree, script, matching) = chawathe::run(left, right, matching)?;
    debug!(actions = script.len(), "diff_documents done");
    Ok(Diff {
        actions: script.into_actions(),
        tree,
        matching,
    })
}
