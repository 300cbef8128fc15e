use crate::chunk::Chunk;

#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    /// Maximum chunk width in characters
    pub chunk_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { chunk_size: 500 }
    }
}

/// A run of non-whitespace characters, in both char and byte coordinates.
#[derive(Clone, Copy)]
struct Word {
    char_start: usize,
    char_end: usize,
    byte_start: usize,
    byte_end: usize,
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Greedily wrap `text` into chunks of at most `chunk_size` characters.
    ///
    /// Breaks only at whitespace. A word wider than the limit is never split
    /// and becomes a chunk of its own. Whitespace between words of the same
    /// chunk is kept verbatim; whitespace at chunk boundaries is dropped.
    pub fn chunk_text(&self, doc_id: &str, text: &str, source: &str) -> Vec<Chunk> {
        let width = self.config.chunk_size.max(1);
        let mut chunks = Vec::new();
        let mut current: Option<(Word, Word)> = None; // (first word, last word)

        for word in split_words(text) {
            current = match current.take() {
                None => Some((word, word)),
                Some((first, _last)) if word.char_end - first.char_start <= width => {
                    Some((first, word))
                }
                Some((first, last)) => {
                    chunks.push(self.make_chunk(doc_id, text, source, &first, &last));
                    Some((word, word))
                }
            };
        }

        if let Some((first, last)) = current {
            chunks.push(self.make_chunk(doc_id, text, source, &first, &last));
        }

        chunks
    }

    /// The whole text as one chunk (chunking disabled).
    pub fn single_chunk(doc_id: &str, text: &str, source: &str) -> Chunk {
        Chunk::new(
            doc_id.to_string(),
            text.to_string(),
            source.to_string(),
            (0, text.chars().count()),
        )
    }

    fn make_chunk(&self, doc_id: &str, text: &str, source: &str, first: &Word, last: &Word) -> Chunk {
        Chunk::new(
            doc_id.to_string(),
            text[first.byte_start..last.byte_end].to_string(),
            source.to_string(),
            (first.char_start, last.char_end),
        )
    }
}

fn split_words(text: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut open: Option<(usize, usize)> = None; // (char_start, byte_start)

    for (char_idx, (byte_idx, ch)) in text.char_indices().enumerate() {
        match (ch.is_whitespace(), open) {
            (false, None) => open = Some((char_idx, byte_idx)),
            (true, Some((char_start, byte_start))) => {
                words.push(Word {
                    char_start,
                    char_end: char_idx,
                    byte_start,
                    byte_end: byte_idx,
                });
                open = None;
            }
            _ => {}
        }
    }

    if let Some((char_start, byte_start)) = open {
        words.push(Word {
            char_start,
            char_end: text.chars().count(),
            byte_start,
            byte_end: text.len(),
        });
    }

    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize) -> Chunker {
        Chunker::new(ChunkerConfig { chunk_size: size })
    }

    #[test]
    fn test_basic_chunking() {
        let chunker = Chunker::new(ChunkerConfig::default());
        let text = "This is a test paragraph.\n\nThis is another paragraph.";
        let chunks = chunker.chunk_text("test-doc", text, "test.txt");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].doc_id, "test-doc");
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn test_chunks_respect_width() {
        let text = "alpha beta gamma delta epsilon zeta";
        let chunks = chunker(11).chunk_text("d", text, "s");

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha beta", "gamma delta", "epsilon", "zeta"]);
        assert!(chunks.iter().all(|c| c.char_len() <= 11));
    }

    #[test]
    fn test_long_word_is_not_split() {
        let chunks = chunker(4).chunk_text("d", "ab supercalifragilistic cd", "s");
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["ab", "supercalifragilistic", "cd"]);
    }

    #[test]
    fn test_offsets_are_character_based() {
        let text = "  été über naïve";
        let chunks = chunker(8).chunk_text("d", text, "s");

        assert_eq!(chunks[0].text, "été über");
        assert_eq!(chunks[0].offset, (2, 10));
        assert_eq!(chunks[1].text, "naïve");
        assert_eq!(chunks[1].offset, (11, 16));
    }

    #[test]
    fn test_whitespace_only_yields_nothing() {
        assert!(chunker(10).chunk_text("d", " \n\t ", "s").is_empty());
        assert!(chunker(10).chunk_text("d", "", "s").is_empty());
    }

    #[test]
    fn test_single_chunk_keeps_text() {
        let chunk = Chunker::single_chunk("d", "Alice manages Bob.", "s");
        assert_eq!(chunk.text, "Alice manages Bob.");
        assert_eq!(chunk.offset, (0, 18));
    }
}
