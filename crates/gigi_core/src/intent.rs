use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{GigiError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentDefinition {
    pub name: String,
    pub examples: Vec<String>,
    pub replies: Vec<String>,
}

/// Intents in declaration order. Earlier intents win exact score ties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentTable {
    intents: Vec<IntentDefinition>,
}

#[derive(Deserialize)]
struct RawIntentTable {
    examples: Map<String, Value>,
    replies: Map<String, Value>,
}

impl IntentTable {
    pub fn new(intents: Vec<IntentDefinition>) -> Result<Self> {
        let table = Self { intents };
        table.validate()?;
        Ok(table)
    }

    /// The assistant's built-in greeting, farewell, thanks and help intents.
    pub fn portuguese() -> Self {
        fn def(name: &str, examples: &[&str], replies: &[&str]) -> IntentDefinition {
            IntentDefinition {
                name: name.to_string(),
                examples: examples.iter().map(|s| s.to_string()).collect(),
                replies: replies.iter().map(|s| s.to_string()).collect(),
            }
        }

        Self {
            intents: vec![
                def(
                    "saudacao",
                    &["oi", "olá", "bom dia", "boa tarde", "boa noite", "e aí"],
                    &[
                        "Olá! Que bom te ver por aqui! 😊",
                        "Oi! Como posso te ajudar hoje?",
                        "E aí! Pronta pra te ajudar!",
                    ],
                ),
                def(
                    "despedida",
                    &["tchau", "até logo", "até mais", "encerrar", "falou"],
                    &[
                        "Até mais! Se cuida. 😉",
                        "Tchauzinho! Sempre por aqui.",
                        "Foi ótimo falar com você. 👍",
                    ],
                ),
                def(
                    "agradecimento",
                    &["obrigado", "obrigada", "valeu", "agradecido", "grato"],
                    &[
                        "De nada! Sempre por aqui.",
                        "Imagina! GIGI sempre pronta pra ajudar.",
                        "Fico feliz em ajudar! 💜",
                    ],
                ),
                def(
                    "ajuda",
                    &["ajuda", "como funciona", "como usar", "o que você faz", "explica"],
                    &[
                        "Posso responder perguntas! É só digitar.",
                        "Sou uma assistente virtual treinada para te ajudar.",
                        "Me pergunte algo e eu tentarei ajudar!",
                    ],
                ),
            ],
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Parses `{"examples": {name: [..]}, "replies": {name: [..]}}`.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let raw: RawIntentTable = serde_json::from_str(contents)?;
        let mut replies = raw.replies;

        let mut intents = Vec::with_capacity(raw.examples.len());
        for (name, examples) in raw.examples {
            let Some(intent_replies) = replies.remove(&name) else {
                return Err(GigiError::InvalidIntentTable(format!(
                    "intent {name:?} has examples but no replies"
                )));
            };
            intents.push(IntentDefinition {
                examples: phrases(&name, "examples", examples)?,
                replies: phrases(&name, "replies", intent_replies)?,
                name,
            });
        }

        if let Some(orphan) = replies.keys().next() {
            return Err(GigiError::InvalidIntentTable(format!(
                "intent {orphan:?} has replies but no examples"
            )));
        }

        Self::new(intents)
    }

    fn validate(&self) -> Result<()> {
        for (i, intent) in self.intents.iter().enumerate() {
            if intent.name.trim().is_empty() {
                return Err(GigiError::InvalidIntentTable(
                    "intent with empty name".to_string(),
                ));
            }
            if self.intents[..i].iter().any(|other| other.name == intent.name) {
                return Err(GigiError::InvalidIntentTable(format!(
                    "intent {:?} declared twice",
                    intent.name
                )));
            }
            if intent.examples.is_empty() {
                return Err(GigiError::InvalidIntentTable(format!(
                    "intent {:?} has no examples",
                    intent.name
                )));
            }
            if intent.replies.is_empty() {
                return Err(GigiError::InvalidIntentTable(format!(
                    "intent {:?} has no replies",
                    intent.name
                )));
            }
            if let Some(blank) = intent
                .examples
                .iter()
                .chain(&intent.replies)
                .find(|p| p.trim().is_empty())
            {
                return Err(GigiError::InvalidIntentTable(format!(
                    "intent {:?} has a blank phrase {blank:?}",
                    intent.name
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&IntentDefinition> {
        self.intents.iter().find(|i| i.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IntentDefinition> {
        self.intents.iter()
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

impl Default for IntentTable {
    fn default() -> Self {
        Self::portuguese()
    }
}

fn phrases(name: &str, field: &str, value: Value) -> Result<Vec<String>> {
    serde_json::from_value(value).map_err(|err| {
        GigiError::InvalidIntentTable(format!(
            "{field} of intent {name:?} must be a list of strings: {err}"
        ))
    })
}
