//! Break-point classification over raw text.
//!
//! A text run may only be cut immediately after a breaking character.
//! All offsets are UTF-8 byte offsets into the scanned string.

const SOFT_HYPHEN: char = '\u{00AD}';
const ZERO_WIDTH_SPACE: char = '\u{200B}';
const FIGURE_SPACE: char = '\u{2007}';

/// Characters that look like spaces but must never be used as a break point.
pub fn is_non_breaking_char(ch: char) -> bool {
    matches!(
        ch,
        '\u{00A0}' | '\u{202F}' | FIGURE_SPACE | '\u{2060}' | '\u{FEFF}'
    )
}

/// `true` when a line/word split is permitted right after `ch`.
pub fn is_breaking_char(ch: char) -> bool {
    if is_non_breaking_char(ch) {
        return false;
    }
    match ch {
        ' ' | '\t' | '\n' | '\r' | '\u{000C}' => true,
        '-' | '\u{2010}' | '\u{2013}' | '\u{2014}' | SOFT_HYPHEN | ZERO_WIDTH_SPACE => true,
        '\u{1680}' | '\u{2000}'..='\u{200A}' | '\u{205F}' | '\u{3000}' => true,
        _ => false,
    }
}

/// Offset of the first breaking character at or after `start`, or
/// `text.len()` when the rest of the text is one unbreakable run.
///
/// `start` past the end clamps to the length; a `start` inside a multi-byte
/// character snaps forward to the next character boundary.
pub fn next_break_offset(text: &str, start: usize) -> usize {
    let start = ceil_char_boundary(text, start);
    text[start..]
        .char_indices()
        .find(|(_, ch)| is_breaking_char(*ch))
        .map(|(idx, _)| start + idx)
        .unwrap_or(text.len())
}

/// End of the break unit beginning at `start`: just past the next breaking
/// character, or the end of the text.
pub fn break_unit_end(text: &str, start: usize) -> usize {
    let offset = next_break_offset(text, start);
    match text[offset..].chars().next() {
        Some(ch) => offset + ch.len_utf8(),
        None => offset,
    }
}

/// Iterator over successive break unit ends of `text`.
///
/// Every yielded offset is a legal end for a kept prefix; the last one is
/// always `text.len()` for non-empty text.
pub fn break_units(text: &str) -> BreakUnits<'_> {
    BreakUnits { text, pos: 0 }
}

/// Iterator returned by [`break_units`].
#[derive(Clone, Debug)]
pub struct BreakUnits<'a> {
    text: &'a str,
    pos: usize,
}

impl Iterator for BreakUnits<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.text.len() {
            return None;
        }
        self.pos = break_unit_end(self.text, self.pos);
        Some(self.pos)
    }
}

impl core::iter::FusedIterator for BreakUnits<'_> {}

fn ceil_char_boundary(text: &str, idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    let mut idx = idx;
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_break_offset_finds_space() {
        assert_eq!(next_break_offset("hello world", 0), 5);
    }

    #[test]
    fn next_break_offset_finds_hyphen() {
        assert_eq!(next_break_offset("already-breakable", 0), 7);
    }

    #[test]
    fn next_break_offset_returns_len_without_break() {
        assert_eq!(next_break_offset("nowrap", 0), 6);
    }

    #[test]
    fn next_break_offset_scans_from_start() {
        let text = "one two three";
        assert_eq!(next_break_offset(text, 4), 7);
        assert_eq!(next_break_offset(text, 3), 3);
        assert_eq!(next_break_offset(text, 8), text.len());
        assert_eq!(next_break_offset(text, 99), text.len());
    }

    #[test]
    fn no_break_space_is_not_a_break_point() {
        let text = "10\u{00A0}km away";
        assert_eq!(next_break_offset(text, 0), "10\u{00A0}km".len());
        assert!(is_non_breaking_char('\u{00A0}'));
        assert!(!is_breaking_char('\u{00A0}'));
        assert!(!is_breaking_char('\u{2007}'));
    }

    #[test]
    fn dashes_and_soft_hyphen_break() {
        for ch in ['\u{2013}', '\u{2014}', '\u{00AD}', '\t', '\n', '\u{2003}'] {
            assert!(is_breaking_char(ch), "{ch:?} should break");
        }
        assert!(!is_breaking_char('a'));
        assert!(!is_breaking_char('.'));
    }

    #[test]
    fn start_inside_multibyte_char_snaps_forward() {
        let text = "é b";
        assert_eq!(next_break_offset(text, 1), 2);
    }

    #[test]
    fn break_unit_end_includes_breaking_char() {
        assert_eq!(break_unit_end("hello world", 0), 6);
        assert_eq!(break_unit_end("hello world", 6), 11);
        assert_eq!(break_unit_end("em\u{2014}dash", 0), "em\u{2014}".len());
    }

    #[test]
    fn break_units_walk_whole_text() {
        let units: Vec<usize> = break_units("a b-c").collect();
        assert_eq!(units, vec![2, 4, 5]);
        assert_eq!(break_units("").count(), 0);
    }
}
