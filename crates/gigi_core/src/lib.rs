pub mod compose;
pub mod config;
pub mod embed;
pub mod engine;
pub mod error;
pub mod eval;
pub mod intent;
pub mod knowledge;
pub mod minilm_embed;
pub mod model;
pub mod normalize;
pub mod retrieval;
pub mod transcript;

pub use compose::{
    compose_reply, fallback_reply, CLOSING_MESSAGE, FALLBACK_REPLIES, REPLY_EMOJIS,
    WELCOME_MESSAGE,
};
pub use config::{EngineConfig, DEFAULT_HISTORY_LIMIT, DEFAULT_KB_THRESHOLD};
pub use embed::{EmbeddingProvider, HashEmbeddingProvider};
pub use engine::{intent_threshold, MatchingEngine};
pub use error::{GigiError, Result};
pub use eval::{evaluate_cases, EvalCase, EvalOutcome, EvalSummary, Expectation};
pub use intent::{IntentDefinition, IntentTable};
pub use knowledge::{IndexedEntry, KnowledgeBase, KnowledgeIndex};
pub use minilm_embed::MiniLmEmbeddingProvider;
pub use model::{IntentMatch, KnowledgeMatch, Reply, ReplySource};
pub use normalize::normalize;
pub use retrieval::{best_scoring, clears, cosine_similarity};
pub use transcript::{Speaker, Transcript};
