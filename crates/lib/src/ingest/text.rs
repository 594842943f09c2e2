//! # Text Chunking
//!
//! A recursive character splitter. It tries paragraph breaks first, then line
//! breaks, then spaces, and finally single characters, so chunks end on the
//! most meaningful boundary that still fits the size limit. Consecutive chunks
//! share up to `chunk_overlap` characters.

use super::IngestError;
use std::collections::VecDeque;

/// The target maximum size for a single chunk, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 350;

/// The character overlap between consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits `text` into chunks of at most `chunk_size` characters.
///
/// A single word longer than `chunk_size` is broken at character boundaries.
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<String>, IngestError> {
    if text.trim().is_empty() {
        return Err(IngestError::EmptyContent);
    }
    if chunk_size == 0 || chunk_overlap >= chunk_size {
        return Err(IngestError::InvalidChunking {
            chunk_size,
            chunk_overlap,
        });
    }
    Ok(split_recursive(text, &SEPARATORS, chunk_size, chunk_overlap))
}

fn split_recursive(
    text: &str,
    separators: &[&str],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    // Pick the first separator present in the text; "" always matches.
    let none: &[&str] = &[];
    let (separator, remaining) = separators
        .iter()
        .enumerate()
        .find(|(_, s)| s.is_empty() || text.contains(**s))
        .map(|(i, s)| (*s, &separators[i + 1..]))
        .unwrap_or(("", none));

    let mut final_chunks = Vec::new();
    let mut good_splits: Vec<&str> = Vec::new();

    for split in split_on(text, separator) {
        if char_len(split) < chunk_size {
            good_splits.push(split);
            continue;
        }
        if !good_splits.is_empty() {
            final_chunks.extend(merge_splits(&good_splits, separator, chunk_size, chunk_overlap));
            good_splits.clear();
        }
        if remaining.is_empty() {
            final_chunks.push(split.to_string());
        } else {
            final_chunks.extend(split_recursive(split, remaining, chunk_size, chunk_overlap));
        }
    }

    if !good_splits.is_empty() {
        final_chunks.extend(merge_splits(&good_splits, separator, chunk_size, chunk_overlap));
    }
    final_chunks
}

/// Splits on `separator`, dropping empty pieces. An empty separator yields
/// one slice per character.
fn split_on<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split(separator).filter(|s| !s.is_empty()).collect()
    }
}

/// Greedily packs small splits into chunks, carrying a tail of up to
/// `chunk_overlap` characters into the next chunk.
fn merge_splits(
    splits: &[&str],
    separator: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    let separator_len = char_len(separator);
    let mut chunks = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for split in splits {
        let len = char_len(split);
        let joiner = |current: &VecDeque<&str>| if current.is_empty() { 0 } else { separator_len };

        if total + len + joiner(&current) > chunk_size && !current.is_empty() {
            if let Some(chunk) = join_chunk(&current, separator) {
                chunks.push(chunk);
            }
            while total > chunk_overlap
                || (total + len + joiner(&current) > chunk_size && total > 0)
            {
                let dropped_joiner = if current.len() > 1 { separator_len } else { 0 };
                match current.pop_front() {
                    Some(first) => total -= char_len(first) + dropped_joiner,
                    None => break,
                }
            }
        }

        current.push_back(split);
        total += len + if current.len() > 1 { separator_len } else { 0 };
    }

    if let Some(chunk) = join_chunk(&current, separator) {
        chunks.push(chunk);
    }
    chunks
}

fn join_chunk(parts: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
