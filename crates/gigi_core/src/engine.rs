use rand::Rng;
use tracing::{debug, warn};

use crate::compose::{compose_reply, fallback_reply};
use crate::config::EngineConfig;
use crate::embed::EmbeddingProvider;
use crate::error::{GigiError, Result};
use crate::intent::{IntentDefinition, IntentTable};
use crate::knowledge::{KnowledgeBase, KnowledgeIndex};
use crate::model::{IntentMatch, KnowledgeMatch, Reply, ReplySource};
use crate::normalize::normalize;
use crate::retrieval::{best_scoring, clears};

/// Threshold an intent score must beat, growing with question length.
pub fn intent_threshold(question: &str, config: &EngineConfig) -> f32 {
    let length = question.chars().count() as f32;
    (length / config.intent_length_scale)
        .max(config.intent_floor)
        .min(config.intent_ceiling)
}

/// Decides between an intent reply, a knowledge-base answer and a fallback.
///
/// Everything the engine reads is computed in [`MatchingEngine::new`], so a
/// constructed engine can be shared by reference across threads as long as
/// the embedder allows it.
pub struct MatchingEngine<E> {
    embedder: E,
    index: KnowledgeIndex,
    intents: IntentTable,
    // One vector per example phrase, parallel to `intents`.
    intent_examples: Vec<Vec<Vec<f32>>>,
    config: EngineConfig,
}

impl<E: EmbeddingProvider> MatchingEngine<E> {
    pub fn new(
        embedder: E,
        index: KnowledgeIndex,
        intents: IntentTable,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut intent_examples = Vec::with_capacity(intents.len());
        for intent in intents.iter() {
            let phrases: Vec<&str> = intent.examples.iter().map(String::as_str).collect();
            let vectors = embedder.embed_batch(&phrases).map_err(|err| {
                GigiError::Embedding(format!("intent {:?}: {err:#}", intent.name))
            })?;
            if vectors.len() != phrases.len() {
                return Err(GigiError::Embedding(format!(
                    "intent {:?}: provider returned {} vectors for {} examples",
                    intent.name,
                    vectors.len(),
                    phrases.len()
                )));
            }
            intent_examples.push(vectors);
        }

        Ok(Self {
            embedder,
            index,
            intents,
            intent_examples,
            config,
        })
    }

    /// Precomputes the knowledge-base embeddings, then builds the engine.
    pub fn from_knowledge_base(
        embedder: E,
        kb: &KnowledgeBase,
        intents: IntentTable,
        config: EngineConfig,
    ) -> Result<Self> {
        let index = KnowledgeIndex::build(kb, &embedder)?;
        Self::new(embedder, index, intents, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn index(&self) -> &KnowledgeIndex {
        &self.index
    }

    pub fn intents(&self) -> &IntentTable {
        &self.intents
    }

    pub fn classify_intent(&self, question: &str) -> Option<IntentMatch> {
        match self.best_intent(question) {
            Ok(found) => found.map(|(intent, score, threshold)| IntentMatch {
                intent: intent.name.clone(),
                score,
                threshold,
            }),
            Err(err) => {
                warn!(error = %err, "could not embed question for intent detection");
                None
            }
        }
    }

    /// Winning intent with its score and the threshold it cleared. Errors when
    /// the question can't be embedded; knowledge lookup must not run then.
    fn best_intent(&self, question: &str) -> Result<Option<(&IntentDefinition, f32, f32)>> {
        let query = self
            .embedder
            .embed(&question.to_lowercase())
            .map_err(GigiError::embedding)?;

        // An intent scores as its closest example phrase.
        let scored = self
            .intents
            .iter()
            .zip(&self.intent_examples)
            .map(|(intent, examples)| {
                let closest = examples
                    .iter()
                    .map(|example| self.embedder.similarity(&query, example))
                    .fold(f32::NEG_INFINITY, f32::max);
                (intent, closest)
            });

        let Some((intent, score)) = best_scoring(scored) else {
            return Ok(None);
        };
        let threshold = intent_threshold(question, &self.config);
        debug!(intent = %intent.name, score, threshold, "best intent");

        Ok(clears(score, threshold).then_some((intent, score, threshold)))
    }

    pub fn match_knowledge(&self, question: &str) -> Option<KnowledgeMatch> {
        let normalized = normalize(question);
        let query = match self.embedder.embed(&normalized) {
            Ok(query) => query,
            Err(err) => {
                let error = format!("{err:#}");
                warn!(%error, "could not embed question for knowledge lookup");
                return None;
            }
        };

        let scored = self
            .index
            .entries()
            .iter()
            .map(|entry| (entry, self.embedder.similarity(&query, &entry.embedding)));

        let (entry, score) = best_scoring(scored)?;
        debug!(key = %entry.key, score, threshold = self.config.kb_threshold, "best knowledge key");

        clears(score, self.config.kb_threshold).then(|| KnowledgeMatch {
            key: entry.key.clone(),
            answer: entry.answer.clone(),
            score,
        })
    }

    /// Answers one question. Callers must not pass blank text.
    pub fn answer_with<R: Rng + ?Sized>(&self, question: &str, rng: &mut R) -> Reply {
        match self.best_intent(question) {
            Ok(Some((intent, _, _))) => {
                let base = &intent.replies[rng.gen_range(0..intent.replies.len())];
                return Reply {
                    text: compose_reply(base, rng),
                    source: ReplySource::Intent(intent.name.clone()),
                };
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "could not embed question for intent detection");
                return Self::fallback(rng);
            }
        }

        if let Some(found) = self.match_knowledge(question) {
            return Reply {
                text: compose_reply(&found.answer, rng),
                source: ReplySource::Knowledge(found.key),
            };
        }

        Self::fallback(rng)
    }

    fn fallback<R: Rng + ?Sized>(rng: &mut R) -> Reply {
        Reply {
            text: fallback_reply(rng).to_string(),
            source: ReplySource::Fallback,
        }
    }

    pub fn answer(&self, question: &str) -> Reply {
        self.answer_with(question, &mut rand::thread_rng())
    }
}
