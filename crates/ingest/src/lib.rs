pub mod chunk;
pub mod chunker;
pub mod reader;

pub use chunk::Chunk;
pub use chunker::{Chunker, ChunkerConfig};
pub use reader::FileReader;

use sha2::{Digest, Sha256};

/// Generate a stable document ID from a path or any other name
pub fn generate_doc_id(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// Split in-memory text into chunks; `None` keeps the text whole
pub fn chunk_document(name: &str, text: &str, config: Option<ChunkerConfig>) -> Vec<Chunk> {
    let doc_id = generate_doc_id(name);

    match config {
        Some(config) => Chunker::new(config).chunk_text(&doc_id, text, name),
        None if text.trim().is_empty() => Vec::new(),
        None => vec![Chunker::single_chunk(&doc_id, text, name)],
    }
}
