use serde::{Deserialize, Serialize};

use crate::error::{codes, AppError};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Window size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks. Must be smaller than `chunk_size`.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Pull a non-final chunk's end back to the last whitespace in the tail of its window.
    #[serde(default = "default_snap")]
    pub snap_to_whitespace: bool,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

fn default_snap() -> bool {
    true
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            snap_to_whitespace: true,
        }
    }
}

impl ChunkConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_size == 0 {
            return Err(AppError::new(codes::CONFIG_INVALID, "Chunk size must be positive"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::new(
                codes::CONFIG_INVALID,
                "Chunk overlap must be smaller than chunk size",
            )
            .with_details(format!(
                "chunk_size={}; chunk_overlap={}",
                self.chunk_size, self.chunk_overlap
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextChunk {
    pub ordinal: u32,
    pub text: String,
    /// Byte offset of the chunk start in the source text.
    pub start: usize,
    /// Characters shared with the previous chunk (0 for the first chunk).
    pub overlap: usize,
}

impl TextChunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Lazy splitter over a borrowed text. Cloning restarts from the clone point.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    cfg: ChunkConfig,
    pos: usize,
    next_overlap: usize,
    ordinal: u32,
    done: bool,
}

pub fn chunk_text<'a>(text: &'a str, cfg: &ChunkConfig) -> Result<Chunks<'a>, AppError> {
    cfg.validate()?;
    Ok(Chunks {
        text,
        cfg: *cfg,
        pos: 0,
        next_overlap: 0,
        ordinal: 0,
        done: text.is_empty(),
    })
}

impl<'a> Iterator for Chunks<'a> {
    type Item = TextChunk;

    fn next(&mut self) -> Option<TextChunk> {
        if self.done {
            return None;
        }

        let rest = &self.text[self.pos..];
        // Byte offset (relative to `pos`) of chars 0..=chunk_size; the last entry is the hard cut.
        let bounds: Vec<usize> = rest
            .char_indices()
            .take(self.cfg.chunk_size + 1)
            .map(|(i, _)| i)
            .collect();

        if bounds.len() <= self.cfg.chunk_size {
            self.done = true;
            return Some(TextChunk {
                ordinal: self.ordinal,
                text: rest.to_string(),
                start: self.pos,
                overlap: self.next_overlap,
            });
        }

        let mut n_chars = self.cfg.chunk_size;
        if self.cfg.snap_to_whitespace {
            if let Some(cut) = snap_point(rest, &bounds, &self.cfg) {
                n_chars = cut;
            }
        }

        let chunk = TextChunk {
            ordinal: self.ordinal,
            text: rest[..bounds[n_chars]].to_string(),
            start: self.pos,
            overlap: self.next_overlap,
        };

        // n_chars > chunk_overlap, so the window always advances.
        self.pos += bounds[n_chars - self.cfg.chunk_overlap];
        self.next_overlap = self.cfg.chunk_overlap;
        self.ordinal += 1;
        Some(chunk)
    }
}

/// Char count of the snapped chunk: one past the last whitespace char in the final 20% of the
/// window, provided the chunk stays longer than the overlap.
fn snap_point(rest: &str, bounds: &[usize], cfg: &ChunkConfig) -> Option<usize> {
    let n = cfg.chunk_size;
    let lower = (n - n / 5).max(cfg.chunk_overlap + 1);
    (lower..=n).rev().find(|&cut| {
        let i = cut - 1;
        rest[bounds[i]..].chars().next().is_some_and(char::is_whitespace)
    })
}

/// Inverse of [`chunk_text`]: drops each chunk's leading overlap and concatenates.
pub fn join_chunks<'c, I>(chunks: I) -> String
where
    I: IntoIterator<Item = &'c TextChunk>,
{
    let mut out = String::new();
    for c in chunks {
        match c.text.char_indices().nth(c.overlap) {
            Some((i, _)) => out.push_str(&c.text[i..]),
            None if c.overlap == 0 => out.push_str(&c.text),
            None => {}
        }
    }
    out
}
