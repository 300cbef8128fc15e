pub mod extractor;
pub mod llm;
pub mod parser;
pub mod prompt;
pub mod schema;

pub use extractor::{ExtractionMethod, FactExtractor, HybridExtractor, JsonExtractor, LineExtractor};
pub use llm::OllamaClient;
pub use schema::{Triple, TripleSet};

use anyhow::Result;

/// Run `extractor` over every chunk, concatenating the triples in chunk order
pub async fn extract_chunks<'a, I>(extractor: &dyn FactExtractor, chunks: I) -> Result<TripleSet>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut facts = TripleSet::new();

    for (index, text) in chunks.into_iter().enumerate() {
        let triples = extractor.extract(text).await?;
        tracing::debug!(chunk = index, extractor = extractor.name(), triples = triples.len(), "Chunk extracted");
        facts.extend(triples);
    }

    Ok(facts)
}
