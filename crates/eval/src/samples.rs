use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One source text and a summary of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub source: String,
    pub summary: String,
}

/// Samples by name, iterated in name order
pub type SampleSet = BTreeMap<String, Sample>;

/// Load a JSON object mapping sample names to `{source, summary}`
pub fn load_samples(path: &Path) -> Result<SampleSet> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read samples file: {}", path.display()))?;

    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse samples file: {}", path.display()))
}

pub fn builtin_samples() -> SampleSet {
    let mut samples = SampleSet::new();

    samples.insert(
        "sample1".to_string(),
        Sample {
            source: "Marie Curie was born in Warsaw. She discovered polonium and radium. \
                     Curie won the Nobel Prize in Physics in 1903. She worked at the University of Paris."
                .to_string(),
            summary: "Marie Curie, born in Warsaw, discovered polonium and radium and won the Nobel Prize in Physics."
                .to_string(),
        },
    );

    samples.insert(
        "sample2".to_string(),
        Sample {
            source: "The Amazon River flows through Brazil. It empties into the Atlantic Ocean. \
                     The river supports the Amazon rainforest."
                .to_string(),
            summary: "The Amazon River flows through Peru and empties into the Pacific Ocean. \
                      It was discovered by Columbus."
                .to_string(),
        },
    );

    samples.insert(
        "sample3".to_string(),
        Sample {
            source: "Tim Berners-Lee invented the World Wide Web in 1989 while working at CERN. \
                     He founded the World Wide Web Consortium."
                .to_string(),
            summary: "Tim Berners-Lee created the World Wide Web at CERN and founded the W3C.".to_string(),
        },
    );

    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.json");
        std::fs::write(
            &path,
            r#"{"b": {"source": "x", "summary": "y"}, "a": {"source": "p", "summary": "q"}}"#,
        )
        .unwrap();

        let samples = load_samples(&path).unwrap();

        assert_eq!(samples.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(samples["b"].summary, "y");
    }

    #[test]
    fn test_load_samples_rejects_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.json");
        std::fs::write(&path, r#"{"a": {"source": "p"}}"#).unwrap();

        assert!(load_samples(&path).is_err());
    }

    #[test]
    fn test_builtin_samples_are_non_empty() {
        let samples = builtin_samples();
        assert!(!samples.is_empty());
        assert!(samples.values().all(|s| !s.source.is_empty() && !s.summary.is_empty()));
    }
}
