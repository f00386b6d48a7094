//! Node matching between the left and right trees.
//!
//! Left nodes are visited bottom-up. Each one is scored against every right
//! node; a pair is kept when it beats the current partner of both sides, in
//! the manner of the stable marriage problem. A left node that loses its
//! partner goes back into the queue.

use crate::{debug, trace};

use indextree::NodeId;
use rapidhash::RapidHashMap as HashMap;
use rayon::prelude::*;
use std::collections::VecDeque;

use crate::error::DiffError;
use crate::node::Document;
use crate::similarity::{
    SimilarityWeights, child_similarity, content_similarity, structural_similarity,
};

/// Below this many candidates the content scores are computed on one thread.
const PARALLEL_THRESHOLD: usize = 64;

/// The node a given node is matched to, with the score that justified it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partner {
    /// The partner node, in the other tree
    pub node: NodeId,
    /// Combined similarity of the pair
    pub similarity: f64,
}

/// A bidirectional mapping between left and right nodes.
///
/// Both directions are updated together, so they are always inverses.
#[derive(Debug, Default, Clone)]
pub struct Matching {
    left_to_right: HashMap<NodeId, Partner>,
    right_to_left: HashMap<NodeId, Partner>,
}

impl Matching {
    /// Create a new empty matching.
    pub fn new() -> Self {
        Self::default()
    }

    /// Match `left` with `right`, unlinking any previous partner of either.
    pub fn add(&mut self, left: NodeId, right: NodeId, similarity: f64) {
        if let Some(old) = self.left_to_right.remove(&left) {
            self.right_to_left.remove(&old.node);
        }
        if let Some(old) = self.right_to_left.remove(&right) {
            self.left_to_right.remove(&old.node);
        }
        self.left_to_right.insert(
            left,
            Partner {
                node: right,
                similarity,
            },
        );
        self.right_to_left.insert(
            right,
            Partner {
                node: left,
                similarity,
            },
        );
    }

    /// Remove the pair containing `left`, if any.
    pub fn remove_left(&mut self, left: NodeId) -> Option<Partner> {
        let partner = self.left_to_right.remove(&left)?;
        self.right_to_left.remove(&partner.node);
        Some(partner)
    }

    /// Right partner of a left node.
    pub fn get_right(&self, left: NodeId) -> Option<NodeId> {
        self.left_to_right.get(&left).map(|p| p.node)
    }

    /// Left partner of a right node.
    pub fn get_left(&self, right: NodeId) -> Option<NodeId> {
        self.right_to_left.get(&right).map(|p| p.node)
    }

    /// Right partner of a left node, with its score.
    pub fn left_partner(&self, left: NodeId) -> Option<Partner> {
        self.left_to_right.get(&left).copied()
    }

    /// Left partner of a right node, with its score.
    pub fn right_partner(&self, right: NodeId) -> Option<Partner> {
        self.right_to_left.get(&right).copied()
    }

    /// Whether a left node is matched.
    pub fn contains_left(&self, left: NodeId) -> bool {
        self.left_to_right.contains_key(&left)
    }

    /// Whether a right node is matched.
    pub fn contains_right(&self, right: NodeId) -> bool {
        self.right_to_left.contains_key(&right)
    }

    /// Number of matched pairs.
    pub fn len(&self) -> usize {
        self.left_to_right.len()
    }

    /// Whether no pair is matched.
    pub fn is_empty(&self) -> bool {
        self.left_to_right.is_empty()
    }

    /// All pairs as `(left, right)`, sorted by left node.
    pub fn pairs(&self) -> Vec<(NodeId, NodeId)> {
        let mut pairs: Vec<(NodeId, NodeId)> = self
            .left_to_right
            .iter()
            .map(|(&left, partner)| (left, partner.node))
            .collect();
        pairs.sort_by_key(|&(left, _)| usize::from(left));
        pairs
    }

    /// Fails if the two directions have different sizes.
    pub fn check_cardinality(&self) -> Result<(), DiffError> {
        if self.left_to_right.len() != self.right_to_left.len() {
            return Err(DiffError::MatchingCardinality {
                left: self.left_to_right.len(),
                right: self.right_to_left.len(),
            });
        }
        Ok(())
    }
}

/// Thresholds and weights for matching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchingConfig {
    /// Minimum node similarity (F)
    pub node_threshold: f64,
    /// Minimum fraction of matched children (T)
    pub child_threshold: f64,
    /// Weights of the content similarity factors
    pub weights: SimilarityWeights,
}

impl MatchingConfig {
    /// Out-of-range thresholds fall back to defaults: F must lie in (0, 1)
    /// (else 0.5), T in [0.5, 1] (else 0.2).
    pub fn new(node_threshold: f64, child_threshold: f64) -> Self {
        let node_threshold = if node_threshold > 0.0 && node_threshold < 1.0 {
            node_threshold
        } else {
            0.5
        };
        let child_threshold = if (0.5..=1.0).contains(&child_threshold) {
            child_threshold
        } else {
            0.2
        };
        Self {
            node_threshold,
            child_threshold,
            weights: SimilarityWeights::default(),
        }
    }

    /// Builder: replace the similarity weights.
    pub fn with_weights(mut self, weights: SimilarityWeights) -> Self {
        self.weights = weights;
        self
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Compute the matching between two trees. The roots are always matched.
pub fn compute_matching(
    left: &Document,
    right: &Document,
    config: &MatchingConfig,
) -> Result<Matching, DiffError> {
    debug!(
        left_nodes = left.arena.count(),
        right_nodes = right.arena.count(),
        "compute_matching start"
    );

    let mut matching = Matching::new();
    matching.add(left.root, right.root, 1.0);

    let mut unmatched: VecDeque<NodeId> = left
        .post_order()
        .into_iter()
        .filter(|&id| id != left.root)
        .collect();
    let candidates: Vec<NodeId> = right
        .post_order()
        .into_iter()
        .filter(|&id| id != right.root && !right.is_unidentifiable_leaf(id))
        .collect();

    while let Some(l) = unmatched.pop_front() {
        if left.is_unidentifiable_leaf(l) {
            continue;
        }

        let child_threshold = if left.leaf_count(l) <= 4 {
            config.child_threshold.min(0.4)
        } else {
            config.child_threshold
        };

        let l_data = left.get(l);
        let score = |&r: &NodeId| content_similarity(l_data, right.get(r), &config.weights);
        let content: Vec<Option<f64>> = if candidates.len() >= PARALLEL_THRESHOLD {
            candidates.par_iter().map(score).collect()
        } else {
            candidates.iter().map(score).collect()
        };

        for (&r, content) in candidates.iter().zip(content) {
            // a right node already paired with an identical subtree cannot do better
            if let Some(current) = matching.right_partner(r)
                && current.similarity >= 1.0
                && right.subtree_eq(r, left, current.node, false)
            {
                continue;
            }

            let node_sim =
                content.or_else(|| structural_similarity(left, l, right, r, &matching));
            let child_sim = child_similarity(left, l, right, r, &matching);

            if node_sim.is_some_and(|s| s < config.node_threshold)
                || child_sim.is_some_and(|s| s < child_threshold)
            {
                continue;
            }
            let combined = match (node_sim, child_sim) {
                (Some(n), Some(c)) => (n + c) / 2.0,
                (Some(n), None) => n,
                (None, Some(c)) => c,
                (None, None) => continue,
            };

            offer(&mut matching, &mut unmatched, l, r, combined);

            if combined >= 1.0 && left.subtree_eq(l, right, r, true) {
                break;
            }
        }
    }

    matching.check_cardinality()?;
    debug!(matched = matching.len(), "compute_matching done");
    Ok(matching)
}

/// Keep `(l, r)` if it beats both current partners. An evicted left node is
/// queued again.
fn offer(
    matching: &mut Matching,
    unmatched: &mut VecDeque<NodeId>,
    l: NodeId,
    r: NodeId,
    similarity: f64,
) {
    if let Some(current) = matching.left_partner(l)
        && current.similarity > similarity
    {
        return;
    }

    if let Some(rival) = matching.right_partner(r) {
        if similarity <= rival.similarity {
            return;
        }
        trace!(
            l = usize::from(l),
            r = usize::from(r),
            evicted = usize::from(rival.node),
            similarity,
            "offer: evict"
        );
        unmatched.push_back(rival.node);
    } else {
        trace!(
            l = usize::from(l),
            r = usize::from(r),
            similarity,
            "offer: accept"
        );
    }
    matching.add(l, r, similarity);
}
