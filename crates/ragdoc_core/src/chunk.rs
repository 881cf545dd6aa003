use serde::{Deserialize, Serialize};

use crate::error::{AppError, INVALID_CONFIG};

/// Smallest chunk budget accepted by the production configuration.
pub const MIN_MAX_CHARS: usize = 200;

/// Fraction of `max_chars` under which a trailing fragment is folded
/// into the previous chunk (divisor, i.e. 10%).
const TAIL_MERGE_DIVISOR: usize = 10;

/// Validated chunking parameters for the ingestion pipeline.
///
/// The defaults mirror what the original corpus was indexed with:
/// 2000-char chunks with a 200-char overlap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl ChunkConfig {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self, AppError> {
        if max_chars < MIN_MAX_CHARS {
            return Err(AppError::new(
                INVALID_CONFIG,
                "Chunk budget below the supported minimum",
            )
            .with_details(format!("max_chars={max_chars}; min={MIN_MAX_CHARS}")));
        }
        if overlap_chars >= max_chars {
            return Err(AppError::new(
                INVALID_CONFIG,
                "Chunk overlap must be smaller than the chunk budget",
            )
            .with_details(format!(
                "overlap_chars={overlap_chars}; max_chars={max_chars}"
            )));
        }
        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: 2000,
            overlap_chars: 200,
        }
    }
}

/// One segment of normalized text, addressed by char offsets.
///
/// Spans of neighboring chunks may intersect (overlap), but a span only
/// begins or ends mid-sentence when `forced_split` is set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkSpan {
    pub sequence_index: u32,
    /// Inclusive char offset into the normalized text.
    pub start: usize,
    /// Exclusive char offset into the normalized text.
    pub end: usize,
    pub forced_split: bool,
}

/// The unit of indexing and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: String,
    pub source_id: String,
    pub sequence_index: u32,
    pub text: String,
    pub char_span: (usize, usize),
    pub forced_split: bool,
}

/// Deterministic chunk identifier: `<source_id>_chunk_<sequence_index>`.
pub fn chunk_id_for(source_id: &str, sequence_index: u32) -> String {
    format!("{source_id}_chunk_{sequence_index}")
}

/// Chunk a normalized document and materialize identified chunks.
pub fn chunk_document(source_id: &str, text: &str, cfg: ChunkConfig) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let spans = chunk(text, cfg.max_chars, cfg.overlap_chars);
    let forced = spans.iter().filter(|s| s.forced_split).count();
    if forced > 0 {
        tracing::warn!(
            source_id,
            forced_splits = forced,
            "chunker fell back to hard whitespace splits"
        );
    }
    spans
        .into_iter()
        .map(|s| Chunk {
            chunk_id: chunk_id_for(source_id, s.sequence_index),
            source_id: source_id.to_string(),
            sequence_index: s.sequence_index,
            text: chars[s.start..s.end].iter().collect(),
            char_span: (s.start, s.end),
            forced_split: s.forced_split,
        })
        .collect()
}

/// Split normalized text into bounded, sentence-aligned, overlapping
/// spans.
///
/// Sentences accumulate greedily into the current chunk while the
/// prospective length stays below `max_chars`; a chunk closes at the
/// last sentence boundary before the budget. A single sentence longer
/// than the budget is hard-split at the nearest whitespace and flagged.
/// The next chunk starts `overlap_chars` before the previous end,
/// rounded backward to a sentence boundary so no partial sentence is
/// ever repeated. A trailing fragment shorter than 10% of `max_chars`
/// is folded into the previous chunk when the merge still fits the
/// budget.
///
/// The sentence heuristic (terminal punctuation + whitespace +
/// uppercase or opening quote, or a paragraph break) mis-splits around
/// abbreviations; that is a documented limitation, not a bug.
pub fn chunk(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<ChunkSpan> {
    let max_chars = max_chars.max(1);
    let overlap_chars = overlap_chars.min(max_chars - 1);

    let chars: Vec<char> = text.chars().collect();
    let sents = sentences(&chars);
    if sents.is_empty() {
        return Vec::new();
    }

    let mut spans: Vec<ChunkSpan> = Vec::new();
    let mut seq: u32 = 0;
    let mut si = 0usize; // current sentence index
    let mut pos = sents[0].0; // current scan position (char offset)

    loop {
        let (sent_start, sent_end) = sents[si];

        // Pathological case: the remaining piece of the current
        // sentence alone exceeds the budget. Hard-split at whitespace.
        if sent_end - pos > max_chars {
            let limit = pos + max_chars;
            let split_at = last_whitespace_before(&chars, pos, limit).unwrap_or(limit);
            let end = trim_end(&chars, pos, split_at);
            spans.push(ChunkSpan {
                sequence_index: seq,
                start: pos,
                end,
                forced_split: true,
            });
            seq += 1;
            pos = split_at;
            while pos < sent_end && chars[pos].is_whitespace() {
                pos += 1;
            }
            continue;
        }

        // Greedy sentence accumulation: add the next full sentence only
        // while the prospective chunk stays below the budget.
        let start = pos;
        let mut end = sent_end;
        let mut last_full = si;
        while last_full + 1 < sents.len() && sents[last_full + 1].1 - start < max_chars {
            last_full += 1;
            end = sents[last_full].1;
        }

        spans.push(ChunkSpan {
            sequence_index: seq,
            start,
            end,
            // Continuations of a hard split begin mid-sentence.
            forced_split: pos != sent_start,
        });
        seq += 1;

        if last_full + 1 == sents.len() {
            break;
        }

        // Default start for the next chunk: the first unseen sentence.
        let next_si = last_full + 1;
        let mut start_si = next_si;
        if overlap_chars > 0 {
            let desired = end.saturating_sub(overlap_chars);
            let candidate = (si..=last_full)
                .rev()
                .find(|&k| sents[k].0 <= desired && sents[k].0 > start);
            if let Some(k) = candidate {
                // Keep the overlap only when the chunk starting there
                // can still reach past the previous end; otherwise the
                // overlap would produce a chunk contained in this one.
                if sents[next_si].1 - sents[k].0 < max_chars {
                    start_si = k;
                }
            }
        }
        si = start_si;
        pos = sents[start_si].0;
    }

    merge_trailing_fragment(&mut spans, max_chars);
    spans
}

/// Sentence spans (start, end) in char offsets, ends trimmed of
/// trailing whitespace. A new sentence begins after `.`, `!` or `?`
/// followed by whitespace and an uppercase or opening-quote character,
/// or after a paragraph break.
fn sentences(chars: &[char]) -> Vec<(usize, usize)> {
    let n = chars.len();
    let mut first = 0usize;
    while first < n && chars[first].is_whitespace() {
        first += 1;
    }
    if first == n {
        return Vec::new();
    }

    let mut starts = vec![first];
    let mut i = first;
    while i < n {
        let c = chars[i];
        if c == '.' || c == '!' || c == '?' {
            let mut j = i + 1;
            while j < n && chars[j].is_whitespace() {
                j += 1;
            }
            if j > i + 1 && j < n && is_sentence_opener(chars[j]) {
                starts.push(j);
                i = j;
                continue;
            }
        } else if c == '\n' && i + 1 < n && chars[i + 1] == '\n' {
            let mut j = i + 2;
            while j < n && chars[j].is_whitespace() {
                j += 1;
            }
            if j < n {
                starts.push(j);
                i = j;
                continue;
            }
        }
        i += 1;
    }

    let mut sents = Vec::with_capacity(starts.len());
    for (k, &s) in starts.iter().enumerate() {
        let raw_end = if k + 1 < starts.len() {
            starts[k + 1]
        } else {
            n
        };
        let e = trim_end(chars, s, raw_end);
        if e > s {
            sents.push((s, e));
        }
    }
    sents
}

fn is_sentence_opener(c: char) -> bool {
    c.is_uppercase() || matches!(c, '"' | '\'' | '\u{201C}' | '\u{2018}' | '(' | '[')
}

fn last_whitespace_before(chars: &[char], start: usize, limit: usize) -> Option<usize> {
    let mut j = limit.min(chars.len());
    while j > start + 1 {
        if chars[j - 1].is_whitespace() {
            return Some(j - 1);
        }
        j -= 1;
    }
    None
}

fn trim_end(chars: &[char], start: usize, mut end: usize) -> usize {
    while end > start && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    end
}

fn merge_trailing_fragment(spans: &mut Vec<ChunkSpan>, max_chars: usize) {
    if spans.len() < 2 {
        return;
    }
    let last = spans[spans.len() - 1];
    let prev = spans[spans.len() - 2];
    let tail_len = last.end - last.start;
    let merged_len = last.end - prev.start;
    if tail_len < max_chars / TAIL_MERGE_DIVISOR && merged_len <= max_chars {
        spans.pop();
        let prev = spans.last_mut().expect("previous chunk exists");
        prev.end = last.end;
        prev.forced_split = prev.forced_split || last.forced_split;
    }
}
