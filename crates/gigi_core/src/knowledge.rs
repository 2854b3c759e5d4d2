use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::embed::EmbeddingProvider;
use crate::error::{GigiError, Result};
use crate::normalize::normalize;

/// Question → answer pairs keyed by normalized question, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeBase {
    entries: Vec<(String, String)>,
}

impl KnowledgeBase {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            GigiError::InvalidKnowledgeBase(format!("read {}: {err}", path.display()))
        })?;
        let kb = Self::from_json_str(&contents)?;
        info!(path = %path.display(), entries = kb.len(), "loaded knowledge base");
        Ok(kb)
    }

    /// Parses a flat JSON object of question → answer strings.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(contents)?;
        let Value::Object(map) = root else {
            return Err(GigiError::InvalidKnowledgeBase(
                "expected a JSON object of question -> answer".to_string(),
            ));
        };

        let mut kb = Self::default();
        for (question, answer) in map {
            let Value::String(answer) = answer else {
                return Err(GigiError::InvalidKnowledgeBase(format!(
                    "answer for {question:?} is not a string"
                )));
            };
            kb.insert(&question, answer)?;
        }

        Ok(kb)
    }

    pub fn from_pairs<I, Q, A>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Q, A)>,
        Q: AsRef<str>,
        A: Into<String>,
    {
        let mut kb = Self::default();
        for (question, answer) in pairs {
            kb.insert(question.as_ref(), answer.into())?;
        }
        Ok(kb)
    }

    /// A later question that normalizes to an existing key replaces its
    /// answer; the key keeps its original position.
    fn insert(&mut self, question: &str, answer: String) -> Result<()> {
        let key = normalize(question);
        if key.is_empty() {
            return Err(GigiError::InvalidKnowledgeBase(format!(
                "question {question:?} is empty after normalization"
            )));
        }

        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => {
                warn!(key = %key, question, "duplicate knowledge-base key, keeping later answer");
                existing.1 = answer;
            }
            None => self.entries.push((key, answer)),
        }

        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, answer)| answer.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, a)| (k.as_str(), a.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEntry {
    pub key: String,
    pub answer: String,
    pub embedding: Vec<f32>,
}

/// The knowledge base with one precomputed embedding per key.
///
/// Built once at startup; rebuilding is the only way to pick up a changed
/// knowledge base.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeIndex {
    entries: Vec<IndexedEntry>,
}

impl KnowledgeIndex {
    pub fn build<E>(kb: &KnowledgeBase, embedder: &E) -> Result<Self>
    where
        E: EmbeddingProvider + ?Sized,
    {
        let keys: Vec<&str> = kb.keys().collect();
        let embeddings = embedder.embed_batch(&keys).map_err(GigiError::embedding)?;

        if embeddings.len() != keys.len() {
            return Err(GigiError::Embedding(format!(
                "provider returned {} vectors for {} keys",
                embeddings.len(),
                keys.len()
            )));
        }

        let entries: Vec<IndexedEntry> = kb
            .iter()
            .zip(embeddings)
            .map(|((key, answer), embedding)| IndexedEntry {
                key: key.to_string(),
                answer: answer.to_string(),
                embedding,
            })
            .collect();

        info!(entries = entries.len(), "precomputed knowledge-base embeddings");
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[IndexedEntry] {
        &self.entries
    }

    pub fn embedding(&self, key: &str) -> Option<&[f32]> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.embedding.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbeddingProvider;
    use std::io::Write;

    #[test]
    fn loads_flat_object_in_file_order() {
        let kb = KnowledgeBase::from_json_str(
            r#"{
                "Qual o email do credenciamento?": "credenciamento@empresa.com",
                "Preciso do link do portal frotista": "https://portal.example/frotista"
            }"#,
        )
        .unwrap();

        let keys: Vec<&str> = kb.keys().collect();
        assert_eq!(
            keys,
            vec![
                "qual o email do credenciamento",
                "preciso do link do portal frotista"
            ]
        );
        assert_eq!(
            kb.get("qual o email do credenciamento"),
            Some("credenciamento@empresa.com")
        );
    }

    #[test]
    fn later_duplicate_overwrites_in_place() {
        let kb = KnowledgeBase::from_json_str(
            r#"{"Olá?": "primeira", "outra": "x", "ola": "segunda"}"#,
        )
        .unwrap();

        assert_eq!(kb.len(), 2);
        assert_eq!(kb.get("ola"), Some("segunda"));
        assert_eq!(kb.keys().next(), Some("ola"));
    }

    #[test]
    fn rejects_non_object_and_nested_values() {
        for bad in [r#"["a", "b"]"#, r#"{"a": {"b": "c"}}"#, r#"{"a": 1}"#, "not json"] {
            assert!(KnowledgeBase::from_json_str(bad).is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn rejects_key_that_normalizes_to_nothing() {
        let err = KnowledgeBase::from_json_str(r#"{"?!": "x"}"#).unwrap_err();
        assert!(matches!(err, GigiError::InvalidKnowledgeBase(_)));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = KnowledgeBase::from_path(&dir.path().join("base.json")).unwrap_err();
        assert!(matches!(err, GigiError::InvalidKnowledgeBase(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"Qual é o horário?": "Das 8h às 18h."}}"#).unwrap();
        let kb = KnowledgeBase::from_path(file.path()).unwrap();
        assert_eq!(kb.get("qual e o horario"), Some("Das 8h às 18h."));
    }

    #[test]
    fn index_has_one_vector_per_key() {
        let kb = KnowledgeBase::from_pairs([
            ("Qual o email?", "a@b.c"),
            ("qual o EMAIL", "d@e.f"),
            ("link do portal", "https://portal"),
        ])
        .unwrap();
        let provider = HashEmbeddingProvider::new(64);
        let index = KnowledgeIndex::build(&kb, &provider).unwrap();

        assert_eq!(index.len(), kb.len());
        assert_eq!(index.len(), 2);
        for key in kb.keys() {
            assert_eq!(
                index.embedding(key).unwrap(),
                provider.embed(key).unwrap().as_slice()
            );
        }
        assert!(index.embedding("qual o email?").is_none());
        assert_eq!(index.entries()[0].answer, "d@e.f");
    }

    #[test]
    fn empty_knowledge_base_builds_empty_index() {
        let kb = KnowledgeBase::from_json_str("{}").unwrap();
        let index = KnowledgeIndex::build(&kb, &HashEmbeddingProvider::default()).unwrap();
        assert!(index.is_empty());
    }
}
