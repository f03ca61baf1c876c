use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::GenerationError;
use crate::llm_providers::{parse_json_response, TextCompleter};
use crate::models::{CandidateItem, ContentUnit, Item, QuizQuestion};

const CARD_SYSTEM_PROMPT: &str = r#"You are a flashcard assistant. Only return a clean JSON array like:
[
  { "term": "What is X?", "definition": "Y" }
]"#;

const QUIZ_SYSTEM_PROMPT: &str =
    "You are an AI quiz generator. Always respond with valid JSON in the requested format.";

#[derive(Debug, Deserialize)]
struct RawCard {
    #[serde(default)]
    term: String,
    #[serde(default)]
    definition: String,
}

/// Turns one content unit into candidate items via the text-completion
/// collaborator. Each unit is isolated: a failed call or an unparseable
/// response fails only that unit and never the surrounding pipeline. No
/// retries happen here; retry policy belongs to the caller.
#[derive(Clone)]
pub struct ItemGenerator {
    completer: Arc<dyn TextCompleter>,
}

impl ItemGenerator {
    pub fn new(completer: Arc<dyn TextCompleter>) -> Self {
        Self { completer }
    }

    pub async fn generate(&self, unit: &ContentUnit) -> Result<Vec<CandidateItem>, GenerationError> {
        let prompt = format!("Create flashcards from this page:\n\n{}", unit.text);

        let response = self
            .completer
            .complete(Some(CARD_SYSTEM_PROMPT), &prompt)
            .await
            .map_err(GenerationError::Completion)?;

        debug!(
            unit_index = unit.index,
            response_length = response.len(),
            "Raw model response for unit"
        );

        let raw: Vec<RawCard> = parse_json_response(&response)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        let total = raw.len();
        let candidates: Vec<CandidateItem> = raw
            .into_iter()
            .filter_map(|card| {
                let term = card.term.trim();
                let definition = card.definition.trim();
                // Entries missing either side are dropped silently.
                (!term.is_empty() && !definition.is_empty()).then(|| CandidateItem {
                    term: term.to_string(),
                    definition: definition.to_string(),
                })
            })
            .collect();

        if candidates.len() < total {
            warn!(
                unit_index = unit.index,
                dropped = total - candidates.len(),
                "Dropped incomplete card entries from model response"
            );
        }

        info!(
            unit_index = unit.index,
            candidate_count = candidates.len(),
            provider = self.completer.name(),
            "Generated candidate items for unit"
        );

        Ok(candidates)
    }

    /// Converts a deck's committed items into quiz questions. This is one
    /// model call over the whole deck, so unlike per-unit generation a
    /// failure here is surfaced to the caller.
    pub async fn generate_quiz(
        &self,
        items: &[Item],
        types: &[String],
        count: usize,
    ) -> Result<Vec<QuizQuestion>, GenerationError> {
        let cards = items
            .iter()
            .map(|item| format!("- {}: {}", item.term, item.definition))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            r#"Convert the following flashcards into {count} quiz questions in this format:
[
  {{
    "question_type": "mcq" or "short",
    "question": "...",
    "options": ["..."] (for mcq, otherwise null),
    "answer": "...",
    "explanation": "..."
  }}
]

Only include question types from: {types}

FLASHCARDS:
{cards}"#,
            count = count,
            types = types.join(", "),
            cards = cards,
        );

        let response = self
            .completer
            .complete(Some(QUIZ_SYSTEM_PROMPT), &prompt)
            .await
            .map_err(GenerationError::Completion)?;

        let mut questions: Vec<QuizQuestion> = parse_json_response(&response)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
        questions.truncate(count);

        info!(
            question_count = questions.len(),
            item_count = items.len(),
            "Generated quiz questions from deck"
        );

        Ok(questions)
    }
}
