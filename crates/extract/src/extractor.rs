use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::llm::OllamaClient;
use crate::parser;
use crate::prompt;
use crate::schema::{Triple, TripleSet};

/// Anything that turns a piece of text into triples
#[async_trait]
pub trait FactExtractor: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, text: &str) -> Result<Vec<Triple>>;
}

/// Prompts for `(subject, predicate, object)` lines and parses them strictly
pub struct LineExtractor {
    llm_client: OllamaClient,
}

impl LineExtractor {
    pub fn new(llm_client: OllamaClient) -> Self {
        Self { llm_client }
    }
}

#[async_trait]
impl FactExtractor for LineExtractor {
    fn name(&self) -> &str {
        "line"
    }

    async fn extract(&self, text: &str) -> Result<Vec<Triple>> {
        let response = self.llm_client
            .generate(&prompt::build_line_prompt(text))
            .await
            .context("Failed to extract triples")?;

        let triples = parser::parse_triples(&response);
        tracing::debug!(extractor = "line", triples = triples.len(), "Extracted triples");
        Ok(triples)
    }
}

#[derive(Deserialize)]
struct TripleResponse {
    #[serde(default)]
    triples: Vec<Triple>,
}

/// Prompts in Ollama's JSON mode and deserializes the triples
pub struct JsonExtractor {
    llm_client: OllamaClient,
    max_retries: usize,
}

impl JsonExtractor {
    pub fn new(llm_client: OllamaClient, max_retries: usize) -> Self {
        Self {
            llm_client,
            max_retries,
        }
    }
}

#[async_trait]
impl FactExtractor for JsonExtractor {
    fn name(&self) -> &str {
        "json"
    }

    async fn extract(&self, text: &str) -> Result<Vec<Triple>> {
        let json_str = self.llm_client
            .generate_json_with_retry(&prompt::build_json_prompt(text), self.max_retries)
            .await
            .context("Failed to extract triples after retries")?;

        let parsed: TripleResponse = serde_json::from_str(&json_str)
            .context("Failed to parse extraction result")?;

        let triples: Vec<Triple> = parsed.triples
            .into_iter()
            .filter_map(Triple::cleaned)
            .collect();
        tracing::debug!(extractor = "json", triples = triples.len(), "Extracted triples");
        Ok(triples)
    }
}

/// Union of several extractors, structural duplicates removed
pub struct HybridExtractor {
    extractors: Vec<Box<dyn FactExtractor>>,
}

impl HybridExtractor {
    pub fn new(extractors: Vec<Box<dyn FactExtractor>>) -> Self {
        Self { extractors }
    }
}

#[async_trait]
impl FactExtractor for HybridExtractor {
    fn name(&self) -> &str {
        "hybrid"
    }

    async fn extract(&self, text: &str) -> Result<Vec<Triple>> {
        let results = futures::future::try_join_all(
            self.extractors.iter().map(|extractor| extractor.extract(text)),
        )
        .await?;

        let union: TripleSet = results.into_iter().flatten().collect();
        Ok(union.deduplicated().as_slice().to_vec())
    }
}

/// Extraction strategy, selected by name from config or the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    #[serde(alias = "ollama")]
    Line,
    Json,
    Hybrid,
}

impl ExtractionMethod {
    pub fn build(self, llm_client: OllamaClient, json_retries: usize) -> Box<dyn FactExtractor> {
        match self {
            ExtractionMethod::Line => Box::new(LineExtractor::new(llm_client)),
            ExtractionMethod::Json => Box::new(JsonExtractor::new(llm_client, json_retries)),
            ExtractionMethod::Hybrid => Box::new(HybridExtractor::new(vec![
                Box::new(LineExtractor::new(llm_client.clone())),
                Box::new(JsonExtractor::new(llm_client, json_retries)),
            ])),
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractionMethod::Line => "line",
            ExtractionMethod::Json => "json",
            ExtractionMethod::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

impl FromStr for ExtractionMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "line" | "ollama" => Ok(ExtractionMethod::Line),
            "json" => Ok(ExtractionMethod::Json),
            "hybrid" => Ok(ExtractionMethod::Hybrid),
            other => anyhow::bail!("Unknown extraction method: {} (expected line, json or hybrid)", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    struct Scripted(&'static str, Vec<Triple>);

    #[async_trait]
    impl FactExtractor for Scripted {
        fn name(&self) -> &str {
            self.0
        }

        async fn extract(&self, _text: &str) -> Result<Vec<Triple>> {
            Ok(self.1.clone())
        }
    }

    fn ollama_body(response: &str) -> String {
        serde_json::json!({ "response": response }).to_string()
    }

    #[tokio::test]
    async fn test_hybrid_unions_and_dedups() {
        let hybrid = HybridExtractor::new(vec![
            Box::new(Scripted("a", vec![
                Triple::new("A", "manages", "B"),
                Triple::new("B", "works_at", "C"),
            ])),
            Box::new(Scripted("b", vec![
                Triple::new("B", "works_at", "C"),
                Triple::new("X", "owns", "Y"),
            ])),
        ]);

        let triples = hybrid.extract("text").await.unwrap();
        assert_eq!(
            triples,
            vec![
                Triple::new("A", "manages", "B"),
                Triple::new("B", "works_at", "C"),
                Triple::new("X", "owns", "Y"),
            ]
        );
    }

    #[tokio::test]
    async fn test_line_extractor_parses_llm_output() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(ollama_body("(Alice, manages, Bob)\nnot a triple\n(Bob, works at, Acme)"))
            .create_async()
            .await;

        let extractor = LineExtractor::new(OllamaClient::new(server.url(), "llama3".into()));
        let triples = extractor.extract("Alice manages Bob, who works at Acme.").await.unwrap();

        assert_eq!(triples.len(), 2);
        assert_eq!(triples[1], Triple::new("Bob", "works at", "Acme"));
    }

    #[tokio::test]
    async fn test_json_extractor_drops_blank_triples() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .match_body(Matcher::PartialJson(serde_json::json!({ "format": "json" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(ollama_body(
                r#"{"triples":[{"subject":"Alice","relation":"manages","object":"Bob"},{"subject":"","relation":"is","object":"x"}]}"#,
            ))
            .create_async()
            .await;

        let extractor = JsonExtractor::new(OllamaClient::new(server.url(), "llama3".into()), 2);
        let triples = extractor.extract("Alice manages Bob.").await.unwrap();

        assert_eq!(triples, vec![Triple::new("Alice", "manages", "Bob")]);
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("hybrid".parse::<ExtractionMethod>().unwrap(), ExtractionMethod::Hybrid);
        assert_eq!("Ollama".parse::<ExtractionMethod>().unwrap(), ExtractionMethod::Line);
        assert!("spacy".parse::<ExtractionMethod>().is_err());
        assert_eq!(ExtractionMethod::Json.to_string(), "json");
    }
}
