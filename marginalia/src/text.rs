//! Inline text diffs marked up with `<del>` and `<ins>`.

use crate::sequence::{OpTag, SequenceMatcher};
use crate::similarity::string_similarity;

/// Below this similarity the whole text is replaced instead of diffed.
const WHOLESALE_THRESHOLD: f64 = 0.5;

const DEL_OPEN: &str = "<del>";
const DEL_CLOSE: &str = "</del>";
const INS_OPEN: &str = "<ins>";
const INS_CLOSE: &str = "</ins>";

/// Render `new` as an edit of `old`.
///
/// ```
/// assert_eq!(
///     marginalia::diff_text("the cat", "the bat"),
///     "the <del>c</del><ins>b</ins>at"
/// );
/// ```
pub fn diff_text(old: &str, new: &str) -> String {
    let mut out = String::with_capacity(old.len() + new.len() + 22);

    if string_similarity(old, new).is_none_or(|s| s < WHOLESALE_THRESHOLD) {
        push_span(&mut out, DEL_OPEN, old, DEL_CLOSE);
        push_span(&mut out, INS_OPEN, new, INS_CLOSE);
        return out;
    }

    let a: Vec<char> = old.chars().collect();
    let b: Vec<char> = new.chars().collect();
    for op in SequenceMatcher::new(&a, &b).opcodes() {
        match op.tag {
            OpTag::Equal => out.extend(&a[op.a]),
            OpTag::Delete => push_chars(&mut out, DEL_OPEN, &a[op.a], DEL_CLOSE),
            OpTag::Insert => push_chars(&mut out, INS_OPEN, &b[op.b], INS_CLOSE),
            OpTag::Replace => {
                push_chars(&mut out, DEL_OPEN, &a[op.a], DEL_CLOSE);
                push_chars(&mut out, INS_OPEN, &b[op.b], INS_CLOSE);
            }
        }
    }
    out
}

fn push_span(out: &mut String, open: &str, text: &str, close: &str) {
    if text.is_empty() {
        return;
    }
    out.push_str(open);
    out.push_str(text);
    out.push_str(close);
}

fn push_chars(out: &mut String, open: &str, text: &[char], close: &str) {
    if text.is_empty() {
        return;
    }
    out.push_str(open);
    out.extend(text);
    out.push_str(close);
}

/// Drop `<del>` spans and unwrap `<ins>` spans, giving the new text back.
pub fn accept_changes(annotated: &str) -> String {
    let mut out = String::with_capacity(annotated.len());
    let mut rest = annotated;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix(DEL_OPEN) {
            rest = match after.find(DEL_CLOSE) {
                Some(end) => &after[end + DEL_CLOSE.len()..],
                None => "",
            };
        } else if let Some(after) = rest.strip_prefix(INS_OPEN) {
            rest = after;
        } else if let Some(after) = rest.strip_prefix(INS_CLOSE) {
            rest = after;
        } else {
            let first = rest.chars().next().map_or(1, char::len_utf8);
            let cut = rest[first..]
                .find('<')
                .map_or(rest.len(), |offset| offset + first);
            out.push_str(&rest[..cut]);
            rest = &rest[cut..];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn test_single_character_replace() {
        assert_eq!(diff_text("the cat", "the bat"), "the <del>c</del><ins>b</ins>at");
    }

    #[test]
    fn test_insertion_only() {
        assert_eq!(
            diff_text("hello world", "hello big world"),
            "hello <ins>big </ins>world"
        );
    }

    #[test]
    fn test_deletion_only() {
        assert_eq!(diff_text("abcdef", "abdef"), "ab<del>c</del>def");
    }

    #[test]
    fn test_dissimilar_text_is_replaced_wholesale() {
        assert_eq!(
            diff_text("completely", "unrelated"),
            "<del>completely</del><ins>unrelated</ins>"
        );
        assert_eq!(diff_text("", "new text"), "<ins>new text</ins>");
        assert_eq!(diff_text("old text", ""), "<del>old text</del>");
    }

    #[test]
    fn test_non_ascii() {
        assert_eq!(diff_text("café au lait", "cafés au lait"), "café<ins>s</ins> au lait");
    }

    #[test]
    fn test_accept_changes() {
        for (old, new) in [
            ("the cat", "the bat"),
            ("hello world", "hello big world"),
            ("completely", "unrelated"),
            ("a < b", "a <= b"),
            ("café", "cafés"),
        ] {
            assert_eq!(accept_changes(&diff_text(old, new)), new, "{old} -> {new}");
        }
    }
}
