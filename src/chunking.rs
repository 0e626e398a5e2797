use crate::config::constants::MAX_CHARS_LIMIT;
use crate::error::ChunkingError;

/// Characters that may close a sentence or a clause
///
/// Non-ASCII terminators (`。`, `！`, ...) end a sentence even when no
/// whitespace follows, since scripts that use them do not separate words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryConfig {
    pub sentence_terminators: Vec<char>,
    pub clause_separators: Vec<char>,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            sentence_terminators: vec!['.', '!', '?', '…', '。', '！', '？'],
            clause_separators: vec![',', ';', ':', '、', '，', '；'],
        }
    }
}

impl BoundaryConfig {
    /// Parse a terminator list such as `".!?"` from configuration
    pub fn parse_chars(value: &str) -> Vec<char> {
        value.chars().filter(|c| !c.is_whitespace()).collect()
    }
}

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk
    pub max_chars: usize,
    pub boundaries: BoundaryConfig,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: MAX_CHARS_LIMIT,
            boundaries: BoundaryConfig::default(),
        }
    }
}

impl ChunkingConfig {
    pub fn with_max_chars(max_chars: usize) -> Self {
        Self {
            max_chars,
            ..Self::default()
        }
    }
}

/// A bounded, contiguous slice of the input text tagged with its position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    index: usize,
    text: String,
}

impl TextChunk {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in characters (what the API limit counts)
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Splits text into chunks of at most `max_chars` characters.
///
/// Chunks are contiguous: joining them in index order gives back `text`
/// byte for byte. Cuts prefer, in order, the last sentence boundary, a clause
/// boundary in the second half of the window, or whitespace inside the
/// window; a run with none of those is hard-split at exactly `max_chars`.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextChunk>, ChunkingError> {
    if config.max_chars == 0 {
        return Err(ChunkingError::ZeroLimit);
    }

    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let cut = next_cut(rest, config);
        let (head, tail) = rest.split_at(cut);
        chunks.push(TextChunk::new(chunks.len(), head));
        rest = tail;
    }

    Ok(chunks)
}

/// Byte offset at which the next chunk of `text` ends
fn next_cut(text: &str, config: &ChunkingConfig) -> usize {
    let window_end = match text.char_indices().nth(config.max_chars) {
        Some((offset, _)) => offset,
        None => return text.len(),
    };

    sentence_cut(text, window_end, &config.boundaries.sentence_terminators)
        .or_else(|| clause_cut(text, window_end, config))
        .or_else(|| whitespace_cut(text, window_end))
        .unwrap_or(window_end)
}

/// Last sentence boundary inside the window, including the whitespace after it
fn sentence_cut(text: &str, window_end: usize, terminators: &[char]) -> Option<usize> {
    let window = &text[..window_end];

    for (pos, ch) in window.char_indices().rev() {
        if !terminators.contains(&ch) {
            continue;
        }

        let mut end = pos + ch.len_utf8();

        // Closing quotes and brackets belong to the sentence they close
        for next in text[end..].chars() {
            if matches!(next, '"' | '\'' | ')' | ']' | '”' | '’' | '」' | '』' | '）') {
                end += next.len_utf8();
            } else {
                break;
            }
        }

        if end > window_end {
            continue;
        }

        let at_boundary = match text[end..].chars().next() {
            None => true,
            Some(next) => next.is_whitespace() || !ch.is_ascii(),
        };

        if at_boundary {
            let cut = absorb_whitespace(text, end, window_end);
            if has_content(&text[..cut]) {
                return Some(cut);
            }
        }
    }

    None
}

/// Last clause separator followed by whitespace inside the window
///
/// Only taken when it fills at least half the window.
fn clause_cut(text: &str, window_end: usize, config: &ChunkingConfig) -> Option<usize> {
    let window = &text[..window_end];
    let separators = &config.boundaries.clause_separators;

    for (pos, ch) in window.char_indices().rev() {
        if !separators.contains(&ch) {
            continue;
        }

        let end = pos + ch.len_utf8();
        // "1,000" is not a clause boundary
        let at_boundary = match text[end..].chars().next() {
            None => true,
            Some(next) => next.is_whitespace() || !ch.is_ascii(),
        };

        if at_boundary && end <= window_end {
            let cut = absorb_whitespace(text, end, window_end);
            if text[..cut].chars().count() * 2 < config.max_chars {
                return None;
            }
            if has_content(&text[..cut]) {
                return Some(cut);
            }
        }
    }

    None
}

/// Cut right after the last whitespace character inside the window
fn whitespace_cut(text: &str, window_end: usize) -> Option<usize> {
    let window = &text[..window_end];

    window
        .char_indices()
        .rev()
        .find(|(_, ch)| ch.is_whitespace())
        .map(|(pos, ch)| pos + ch.len_utf8())
        .filter(|&cut| has_content(&text[..cut]))
}

/// Advance `from` over whitespace without passing `limit`
fn absorb_whitespace(text: &str, from: usize, limit: usize) -> usize {
    let mut end = from;
    for ch in text[from..].chars() {
        if !ch.is_whitespace() || end + ch.len_utf8() > limit {
            break;
        }
        end += ch.len_utf8();
    }
    end
}

fn has_content(text: &str) -> bool {
    text.chars().any(|c| !c.is_whitespace())
}
