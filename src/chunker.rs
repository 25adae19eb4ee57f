//! Splitting long input into provider-sized chunks
//!
//! Chunks are contiguous slices of the input, each keeping its trailing
//! separator, so concatenating them gives back the original text byte for
//! byte. Cuts happen at the coarsest boundary that fits: lines first, then
//! sentence ends, then whitespace, and only as a last resort in the middle
//! of a word. Sizes are counted in characters, not bytes.

use std::ops::Range;

/// Per-request character limit of the translation endpoints
pub const DEFAULT_MAX_CHUNK: usize = 5000;

/// Detection is more reliable on short, clean samples
pub const DETECTION_MAX_CHUNK: usize = 500;

/// A slice of the original text and where it sits in it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Position in the chunk sequence
    pub index: usize,
    /// Byte offset of `text` in the original input
    pub offset: usize,
    /// The slice itself, trailing separator included
    pub text: &'a str,
}

impl<'a> Chunk<'a> {
    /// The chunk without its trailing line break; this is what gets sent
    pub fn body(&self) -> &'a str {
        let text = self.text.strip_suffix('\n').unwrap_or(self.text);
        text.strip_suffix('\r').unwrap_or(text)
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, Copy)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

const TEXT_BOUNDARIES: &[Boundary] = &[Boundary::Line, Boundary::Sentence, Boundary::Word];
const DETECTION_BOUNDARIES: &[Boundary] = &[
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
];

/// Split `text` into ordered chunks of at most `max_size` characters.
///
/// With `bias_for_detection` the limit is additionally capped at
/// [`DETECTION_MAX_CHUNK`] and paragraph breaks are preferred. Empty input
/// yields no chunks.
pub fn split(text: &str, max_size: usize, bias_for_detection: bool) -> Vec<Chunk<'_>> {
    let max_size = max_size.max(1);
    let (max_size, boundaries) = if bias_for_detection {
        (max_size.min(DETECTION_MAX_CHUNK), DETECTION_BOUNDARIES)
    } else {
        (max_size, TEXT_BOUNDARIES)
    };

    let mut ranges = Vec::new();
    pack(text, 0, max_size, boundaries, &mut ranges);

    ranges
        .into_iter()
        .enumerate()
        .map(|(index, range)| Chunk {
            index,
            offset: range.start,
            text: &text[range],
        })
        .collect()
}

/// Concatenate chunks back into the text they came from
pub fn rejoin(chunks: &[Chunk<'_>]) -> String {
    chunks.iter().map(|chunk| chunk.text).collect()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Greedily pack units of the first boundary kind; units that are too big on
/// their own are split again with the finer boundaries.
fn pack(
    text: &str,
    base: usize,
    max_size: usize,
    boundaries: &[Boundary],
    out: &mut Vec<Range<usize>>,
) {
    if char_len(text) <= max_size {
        if !text.is_empty() {
            out.push(base..base + text.len());
        }
        return;
    }

    let Some((&boundary, finer)) = boundaries.split_first() else {
        hard_split(text, base, max_size, out);
        return;
    };

    let mut start = 0;
    let mut pos = 0;
    let mut pending = 0;

    for len in unit_lengths(text, boundary) {
        let unit = &text[pos..pos + len];
        let unit_chars = char_len(unit);

        if unit_chars > max_size {
            if pos > start {
                out.push(base + start..base + pos);
            }
            pack(unit, base + pos, max_size, finer, out);
            pos += len;
            start = pos;
            pending = 0;
            continue;
        }

        if pending + unit_chars > max_size && pos > start {
            out.push(base + start..base + pos);
            start = pos;
            pending = 0;
        }
        pos += len;
        pending += unit_chars;
    }

    if pos > start {
        out.push(base + start..base + pos);
    }
}

fn hard_split(text: &str, base: usize, max_size: usize, out: &mut Vec<Range<usize>>) {
    let mut start = 0;
    let mut count = 0;
    for (i, _) in text.char_indices() {
        if count == max_size {
            out.push(base + start..base + i);
            start = i;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        out.push(base + start..base + text.len());
    }
}

/// Byte lengths of consecutive units; they always sum to `text.len()`
fn unit_lengths(text: &str, boundary: Boundary) -> Vec<usize> {
    match boundary {
        Boundary::Paragraph => text.split_inclusive("\n\n").map(str::len).collect(),
        Boundary::Line => text.split_inclusive('\n').map(str::len).collect(),
        Boundary::Word => text
            .split_inclusive(char::is_whitespace)
            .map(str::len)
            .collect(),
        Boundary::Sentence => sentence_lengths(text),
    }
}

fn is_cjk_terminator(c: char) -> bool {
    matches!(c, '。' | '！' | '？')
}

fn is_latin_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Sentences end after `.`, `!` or `?` plus whitespace, or right after a
/// full-width terminator. Trailing whitespace stays with the sentence.
fn sentence_lengths(text: &str) -> Vec<usize> {
    let mut lengths = Vec::new();
    let mut start = 0;
    let mut seen_terminator = false;
    let mut cut_pending = false;

    for (i, c) in text.char_indices() {
        if cut_pending
            && !c.is_whitespace()
            && !is_cjk_terminator(c)
            && !is_latin_terminator(c)
        {
            lengths.push(i - start);
            start = i;
            cut_pending = false;
        }

        if is_cjk_terminator(c) {
            cut_pending = true;
            seen_terminator = false;
        } else if is_latin_terminator(c) {
            seen_terminator = true;
        } else if c.is_whitespace() {
            if seen_terminator {
                cut_pending = true;
                seen_terminator = false;
            }
        } else {
            seen_terminator = false;
        }
    }

    if start < text.len() {
        lengths.push(text.len() - start);
    }
    lengths
}
