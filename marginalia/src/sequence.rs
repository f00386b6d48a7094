//! Sequence alignment.
//!
//! [`SequenceMatcher`] finds matching blocks by repeatedly taking the longest
//! common run and recursing on both sides of it, then turns them into
//! opcodes. [`longest_common_subsequence`] is the classic dynamic program used
//! to align sibling lists.

use core::hash::Hash;
use core::ops::Range;
use rapidhash::RapidHashMap as HashMap;

/// A run where `a[a..a + len] == b[b..b + len]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingBlock {
    /// Start in the first sequence
    pub a: usize,
    /// Start in the second sequence
    pub b: usize,
    /// Length of the run
    pub len: usize,
}

/// What an [`Opcode`] does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTag {
    /// Both ranges hold the same elements
    Equal,
    /// The `a` range is removed
    Delete,
    /// The `b` range is added
    Insert,
    /// The `a` range is replaced by the `b` range
    Replace,
}

/// Rewrites `a[a]` into `b[b]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opcode {
    /// Kind of change
    pub tag: OpTag,
    /// Range in the first sequence
    pub a: Range<usize>,
    /// Range in the second sequence
    pub b: Range<usize>,
}

/// Compares two sequences of hashable elements.
pub struct SequenceMatcher<'s, T> {
    a: &'s [T],
    b: &'s [T],
    /// For each distinct element of `b`, the ascending indices where it occurs
    b2j: HashMap<&'s T, Vec<usize>>,
}

impl<'s, T: Eq + Hash> SequenceMatcher<'s, T> {
    /// Index `b` for matching against `a`.
    pub fn new(a: &'s [T], b: &'s [T]) -> Self {
        let mut b2j: HashMap<&'s T, Vec<usize>> = HashMap::default();
        for (j, item) in b.iter().enumerate() {
            b2j.entry(item).or_default().push(j);
        }
        Self { a, b, b2j }
    }

    /// Longest common run inside `a[alo..ahi]` and `b[blo..bhi]`. Among runs of
    /// equal length the one starting earliest in `a`, then in `b`, wins.
    pub fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> MatchingBlock {
        let mut best = MatchingBlock {
            a: alo,
            b: blo,
            len: 0,
        };
        // length of the longest run ending at a[i - 1] and b[j]
        let mut run_at: HashMap<usize, usize> = HashMap::default();
        for i in alo..ahi {
            let mut next: HashMap<usize, usize> = HashMap::default();
            if let Some(indices) = self.b2j.get(&self.a[i]) {
                for &j in indices {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| run_at.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next.insert(j, k);
                    if k > best.len {
                        best = MatchingBlock {
                            a: i + 1 - k,
                            b: j + 1 - k,
                            len: k,
                        };
                    }
                }
            }
            run_at = next;
        }
        best
    }

    /// Matching blocks in ascending order, adjacent blocks merged, terminated
    /// by the sentinel `(a.len(), b.len(), 0)`.
    pub fn matching_blocks(&self) -> Vec<MatchingBlock> {
        let mut raw = Vec::new();
        self.collect_blocks(0, self.a.len(), 0, self.b.len(), &mut raw);

        let mut merged: Vec<MatchingBlock> = Vec::with_capacity(raw.len() + 1);
        for block in raw {
            match merged.last_mut() {
                Some(prev) if prev.a + prev.len == block.a && prev.b + prev.len == block.b => {
                    prev.len += block.len;
                }
                _ => merged.push(block),
            }
        }
        merged.push(MatchingBlock {
            a: self.a.len(),
            b: self.b.len(),
            len: 0,
        });
        merged
    }

    fn collect_blocks(
        &self,
        alo: usize,
        ahi: usize,
        blo: usize,
        bhi: usize,
        out: &mut Vec<MatchingBlock>,
    ) {
        let longest = self.find_longest_match(alo, ahi, blo, bhi);
        if longest.len == 0 {
            return;
        }
        if alo < longest.a && blo < longest.b {
            self.collect_blocks(alo, longest.a, blo, longest.b, out);
        }
        out.push(longest);
        let (a_end, b_end) = (longest.a + longest.len, longest.b + longest.len);
        if a_end < ahi && b_end < bhi {
            self.collect_blocks(a_end, ahi, b_end, bhi, out);
        }
    }

    /// Opcodes covering both sequences completely, in order.
    pub fn opcodes(&self) -> Vec<Opcode> {
        let mut opcodes = Vec::new();
        let (mut i, mut j) = (0, 0);
        for block in self.matching_blocks() {
            let tag = match (i < block.a, j < block.b) {
                (true, true) => Some(OpTag::Replace),
                (true, false) => Some(OpTag::Delete),
                (false, true) => Some(OpTag::Insert),
                (false, false) => None,
            };
            if let Some(tag) = tag {
                opcodes.push(Opcode {
                    tag,
                    a: i..block.a,
                    b: j..block.b,
                });
            }
            i = block.a + block.len;
            j = block.b + block.len;
            if block.len > 0 {
                opcodes.push(Opcode {
                    tag: OpTag::Equal,
                    a: block.a..i,
                    b: block.b..j,
                });
            }
        }
        opcodes
    }
}

/// Index pairs of a longest common subsequence of `a` and `b` under `eq`, in
/// ascending order.
pub fn longest_common_subsequence<A, B>(
    a: &[A],
    b: &[B],
    eq: impl Fn(&A, &B) -> bool,
) -> Vec<(usize, usize)> {
    let (m, n) = (a.len(), b.len());
    let mut table = vec![vec![0usize; n + 1]; m + 1];
    for i in 1..=m {
        for j in 1..=n {
            table[i][j] = if eq(&a[i - 1], &b[j - 1]) {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }

    let mut pairs = Vec::new();
    let (mut i, mut j) = (m, n);
    while i > 0 && j > 0 {
        if eq(&a[i - 1], &b[j - 1]) {
            pairs.push((i - 1, j - 1));
            i -= 1;
            j -= 1;
        } else if table[i - 1][j] > table[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    pairs.reverse();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_longest_match_prefers_earliest() {
        let a = chars("xabyab");
        let b = chars("ab");
        let matcher = SequenceMatcher::new(&a, &b);
        assert_eq!(
            matcher.find_longest_match(0, a.len(), 0, b.len()),
            MatchingBlock { a: 1, b: 0, len: 2 }
        );
    }

    #[test]
    fn test_opcodes_single_substitution() {
        let a = chars("the cat");
        let b = chars("the bat");
        let opcodes = SequenceMatcher::new(&a, &b).opcodes();
        assert_eq!(
            opcodes,
            vec![
                Opcode {
                    tag: OpTag::Equal,
                    a: 0..4,
                    b: 0..4
                },
                Opcode {
                    tag: OpTag::Replace,
                    a: 4..5,
                    b: 4..5
                },
                Opcode {
                    tag: OpTag::Equal,
                    a: 5..7,
                    b: 5..7
                },
            ]
        );
    }

    #[test]
    fn test_opcodes_insert_and_delete() {
        let a = chars("abcd");
        let b = chars("abxcd");
        let tags: Vec<OpTag> = SequenceMatcher::new(&a, &b)
            .opcodes()
            .into_iter()
            .map(|op| op.tag)
            .collect();
        assert_eq!(tags, vec![OpTag::Equal, OpTag::Insert, OpTag::Equal]);

        let a = chars("abcd");
        let b = chars("abd");
        let opcodes = SequenceMatcher::new(&a, &b).opcodes();
        assert_eq!(
            opcodes[1],
            Opcode {
                tag: OpTag::Delete,
                a: 2..3,
                b: 2..2
            }
        );
    }

    #[test]
    fn test_nothing_in_common() {
        let a = chars("abc");
        let b = chars("xyz");
        let matcher = SequenceMatcher::new(&a, &b);
        assert_eq!(
            matcher.matching_blocks(),
            vec![MatchingBlock { a: 3, b: 3, len: 0 }]
        );
        assert_eq!(
            matcher.opcodes(),
            vec![Opcode {
                tag: OpTag::Replace,
                a: 0..3,
                b: 0..3
            }]
        );
    }

    #[test]
    fn test_adjacent_blocks_are_merged() {
        let a = chars("abcabc");
        let b = chars("abcabc");
        assert_eq!(
            SequenceMatcher::new(&a, &b).matching_blocks(),
            vec![
                MatchingBlock { a: 0, b: 0, len: 6 },
                MatchingBlock { a: 6, b: 6, len: 0 },
            ]
        );
    }

    #[test]
    fn test_lcs() {
        let a = ["a", "b", "c", "d"];
        let b = ["c", "a", "b", "d"];
        let pairs = longest_common_subsequence(&a, &b, |x, y| x == y);
        assert_eq!(pairs, vec![(0, 1), (1, 2), (3, 3)]);
        assert!(longest_common_subsequence(&a, &[] as &[&str], |x, y| x == y).is_empty());
    }
}
