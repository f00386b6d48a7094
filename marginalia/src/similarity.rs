//! Similarity scores between a left and a right node.
//!
//! Every score is in `[0, 1]`. `None` means "not applicable": the factor is
//! absent on both sides and is left out of any average it would take part in.

use indexmap::IndexMap;
use indextree::NodeId;

use crate::matching::Matching;
use crate::node::{Document, NodeData};

/// Relative importance of the factors in [`content_similarity`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityWeights {
    /// Weight of plain attributes
    pub attribute: f64,
    /// Weight of style properties
    pub style: f64,
    /// Used for both inner text and tail
    pub text: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            attribute: 1.0,
            style: 1.0,
            text: 1.0,
        }
    }
}

/// `(tag, attribute)` pairs that must agree for two nodes of that tag to match.
const HARD_DISCRIMINATORS: &[(&str, &str)] = &[("img", "src")];

/// Normalized edit-distance similarity.
pub fn string_similarity(a: &str, b: &str) -> Option<f64> {
    if a.is_empty() && b.is_empty() {
        return None;
    }
    if a == b {
        return Some(1.0);
    }
    Some(strsim::normalized_levenshtein(a, b))
}

/// Fraction of class tokens shared between two `class` values, over the
/// larger token count.
pub fn class_similarity(a: &str, b: &str) -> f64 {
    let left: Vec<&str> = a.split_whitespace().collect();
    let right: Vec<&str> = b.split_whitespace().collect();
    let total = left.len().max(right.len());
    if total == 0 {
        return 1.0;
    }
    let shared = left.iter().filter(|class| right.contains(class)).count();
    shared as f64 / total as f64
}

/// Similarity of two key/value maps (attributes or styles): the summed
/// per-key similarity of shared keys over the larger key count.
pub fn attribute_similarity(
    left: &IndexMap<String, String>,
    right: &IndexMap<String, String>,
) -> Option<f64> {
    if left.is_empty() && right.is_empty() {
        return None;
    }
    let total = left.len().max(right.len());
    let summed: f64 = left
        .iter()
        .filter_map(|(key, value)| {
            let other = right.get(key)?;
            Some(if key == "class" {
                class_similarity(value, other)
            } else {
                // two empty values are equal
                string_similarity(value, other).unwrap_or(1.0)
            })
        })
        .sum();
    Some(summed / total as f64)
}

/// False if a hard discriminator rules the pair out.
pub fn could_be_matched(left: &NodeData, right: &NodeData) -> bool {
    HARD_DISCRIMINATORS.iter().all(|&(tag, attr)| {
        if left.tag != tag || right.tag != tag {
            return true;
        }
        match left.attrs.get(attr) {
            Some(value) => right.attrs.get(attr) == Some(value),
            None => true,
        }
    })
}

/// Weighted average of attribute, style, text and tail similarity.
///
/// Depends only on the two nodes, never on the matching, so it can be
/// computed for many candidates at once.
pub fn content_similarity(
    left: &NodeData,
    right: &NodeData,
    weights: &SimilarityWeights,
) -> Option<f64> {
    if !could_be_matched(left, right) {
        return Some(0.0);
    }

    let factors = [
        (attribute_similarity(&left.attrs, &right.attrs), weights.attribute),
        (attribute_similarity(&left.styles, &right.styles), weights.style),
        (string_similarity(left.text(), right.text()), weights.text),
        (string_similarity(left.tail(), right.tail()), weights.text),
    ];

    let mut max = 0.0;
    let mut sum = 0.0;
    for (score, weight) in factors {
        if let Some(score) = score {
            max += weight;
            sum += score * weight;
        }
    }
    (max > 0.0).then(|| sum / max)
}

/// Score for nodes without any identifying content: nodes with the same tag,
/// no identifiable children and partnered parents are equal, other such nodes
/// are not. `None` if either node has an identifiable child.
pub fn structural_similarity(
    left: &Document,
    l: NodeId,
    right: &Document,
    r: NodeId,
    matching: &Matching,
) -> Option<f64> {
    if identifiable_children(left, l).next().is_some()
        || identifiable_children(right, r).next().is_some()
    {
        return None;
    }
    if left.get(l).tag != right.get(r).tag {
        return Some(0.0);
    }
    let parents_match = left
        .parent(l)
        .and_then(|parent| matching.get_right(parent))
        .is_some_and(|partner| Some(partner) == right.parent(r));
    Some(if parents_match { 1.0 } else { 0.0 })
}

/// Node similarity with the structural fallback applied.
pub fn node_similarity(
    left: &Document,
    l: NodeId,
    right: &Document,
    r: NodeId,
    matching: &Matching,
    weights: &SimilarityWeights,
) -> Option<f64> {
    content_similarity(left.get(l), right.get(r), weights)
        .or_else(|| structural_similarity(left, l, right, r, matching))
}

/// Fraction of `l`'s children already matched to a child of `r`, over the
/// larger child count. Unidentifiable leaves are never matched, so they are
/// left out of both counts; `None` if no identifiable child remains.
pub fn child_similarity(
    left: &Document,
    l: NodeId,
    right: &Document,
    r: NodeId,
    matching: &Matching,
) -> Option<f64> {
    let left_children: Vec<NodeId> = identifiable_children(left, l).collect();
    let mut right_children: Vec<NodeId> = identifiable_children(right, r).collect();
    let total = left_children.len().max(right_children.len());
    if total == 0 {
        return None;
    }
    let mut count = 0;
    for child in left_children {
        if let Some(partner) = matching.get_right(child)
            && let Some(index) = right_children.iter().position(|&c| c == partner)
        {
            right_children.swap_remove(index);
            count += 1;
        }
    }
    Some(count as f64 / total as f64)
}

fn identifiable_children(doc: &Document, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    doc.children(id)
        .filter(move |&child| !doc.is_unidentifiable_leaf(child))
}
