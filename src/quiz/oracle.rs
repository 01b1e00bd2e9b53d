use async_trait::async_trait;
use chatgpt::client::ChatGPT;
use chatgpt::types::CompletionResponse;
use thiserror::Error;

use crate::quiz::{Level, Question};

/// A generated question must offer at least this many choices.
const MIN_OPTIONS: usize = 4;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("question model request failed: {0}")]
    Backend(#[from] chatgpt::err::Error),
    #[error("malformed model response: {0}")]
    Malformed(String),
}

/// External natural-language service that turns a word and a difficulty
/// into a question payload, and suggests new words to practice.
#[async_trait]
pub trait QuestionOracle: Send + Sync {
    async fn generate(&self, word: &str, level: Level) -> Result<Question, GenerationError>;

    /// Suggest `count` new practice words. When `known` is non-empty the
    /// suggestion is made relative to those words at the requested level.
    async fn suggest_words(
        &self,
        count: usize,
        level: Level,
        known: &[String],
    ) -> Result<Vec<String>, GenerationError>;
}

pub struct ChatGptOracle {
    client: ChatGPT,
}

impl ChatGptOracle {
    pub fn new(client: ChatGPT) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QuestionOracle for ChatGptOracle {
    async fn generate(&self, word: &str, level: Level) -> Result<Question, GenerationError> {
        log::debug!("generating a {level} question for \"{word}\"");

        let prompt = format!(
            "Create a question for the word \"{word}\" at a \"{level}\" difficulty level.\n\
             The question should include:\n\
             - A query text\n\
             - Multiple choice options (at least 4)\n\
             - Indicate the correct answer\n\
             - A short explanation of why that answer is correct\n\
             Return a JSON response with the structure \
             {{\"query_text\", \"options\", \"correctAnswer\", \"explanation\"}}."
        );

        let response: CompletionResponse = self.client.send_message(&prompt).await?;
        let content = response.message().clone().content;

        log::debug!("completion for \"{word}\": {content:?}");

        parse_question(&content, level)
    }

    async fn suggest_words(
        &self,
        count: usize,
        level: Level,
        known: &[String],
    ) -> Result<Vec<String>, GenerationError> {
        log::debug!("asking for {count} {level} practice words ({} known)", known.len());

        let prompt = if known.is_empty() {
            format!(
                "Give me {count} words in English to practice vocabulary.\n\
                 Don't reply with anything else, not even the meaning of the word.\n\
                 Return a JSON response with an array of words and the key 'words'."
            )
        } else {
            format!(
                "Give me {count} words in English to practice vocabulary. \
                 You had previously given me the words: {}.\n\
                 I want more {level} words than those.\n\
                 Don't reply with anything else, not even the meaning of the word.\n\
                 Return a JSON response with an array of words and the key 'words'.",
                known.join(", ")
            )
        };

        let response: CompletionResponse = self.client.send_message(&prompt).await?;
        let content = response.message().clone().content;

        log::debug!("word suggestions: {content:?}");

        parse_word_list(&content)
    }
}

// Wire shape of a generated question, exactly as the prompt requests it.
#[derive(serde::Deserialize)]
struct QuestionPayload {
    query_text: String,
    options: Vec<String>,
    #[serde(rename = "correctAnswer")]
    correct_answer: usize,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(serde::Deserialize)]
struct WordListPayload {
    words: Vec<String>,
}

/// Decode and validate a model reply into a typed question. Partial or
/// malformed payloads are rejected rather than trusted.
fn parse_question(content: &str, level: Level) -> Result<Question, GenerationError> {
    let payload: QuestionPayload = serde_json::from_str(strip_code_fences(content))
        .map_err(|e| GenerationError::Malformed(e.to_string()))?;

    if payload.query_text.trim().is_empty() {
        return Err(GenerationError::Malformed("empty query_text".to_string()));
    }
    if payload.options.len() < MIN_OPTIONS {
        return Err(GenerationError::Malformed(format!(
            "expected at least {MIN_OPTIONS} options, got {}",
            payload.options.len()
        )));
    }
    if payload.correct_answer >= payload.options.len() {
        return Err(GenerationError::Malformed(format!(
            "correctAnswer {} is out of range for {} options",
            payload.correct_answer,
            payload.options.len()
        )));
    }

    Ok(Question::new(
        payload.query_text,
        payload.options,
        payload.correct_answer,
        payload.explanation,
        level,
    ))
}

fn parse_word_list(content: &str) -> Result<Vec<String>, GenerationError> {
    let payload: WordListPayload = serde_json::from_str(strip_code_fences(content))
        .map_err(|e| GenerationError::Malformed(e.to_string()))?;

    if payload.words.is_empty() {
        return Err(GenerationError::Malformed("empty word list".to_string()));
    }
    Ok(payload.words)
}

// The model sometimes wraps its JSON in a markdown code block.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_PAYLOAD: &str = r#"{
        "query_text": "What does \"ubiquitous\" mean?",
        "options": ["rare", "everywhere", "noisy", "fragile"],
        "correctAnswer": 1,
        "explanation": "Something ubiquitous is found everywhere."
    }"#;

    #[test]
    fn accepts_a_well_formed_payload() {
        let question = parse_question(VALID_PAYLOAD, Level::Hard).unwrap();
        assert_eq!(question.query_text, "What does \"ubiquitous\" mean?");
        assert_eq!(question.options.len(), 4);
        assert_eq!(question.correct_answer_index, 1);
        assert_eq!(
            question.answer_explanation.as_deref(),
            Some("Something ubiquitous is found everywhere.")
        );
        assert_eq!(question.level, Level::Hard);
        assert!(!question.has_been_asked);
        assert_eq!(question.user_answer_index, None);
    }

    #[test]
    fn accepts_a_fenced_payload() {
        let fenced = format!("```json\n{VALID_PAYLOAD}\n```");
        let question = parse_question(&fenced, Level::Easy).unwrap();
        assert_eq!(question.correct_answer_index, 1);
    }

    #[test]
    fn explanation_is_optional() {
        let payload = r#"{
            "query_text": "Pick the synonym of \"arid\".",
            "options": ["dry", "wet", "cold", "tall"],
            "correctAnswer": 0
        }"#;
        let question = parse_question(payload, Level::Medium).unwrap();
        assert_eq!(question.answer_explanation, None);
    }

    #[test]
    fn rejects_too_few_options() {
        let payload = r#"{
            "query_text": "Pick one.",
            "options": ["a", "b", "c"],
            "correctAnswer": 0
        }"#;
        assert!(matches!(
            parse_question(payload, Level::Medium),
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_an_out_of_range_correct_answer() {
        let payload = r#"{
            "query_text": "Pick one.",
            "options": ["a", "b", "c", "d"],
            "correctAnswer": 4
        }"#;
        assert!(matches!(
            parse_question(payload, Level::Medium),
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_an_empty_query_text() {
        let payload = r#"{
            "query_text": "  ",
            "options": ["a", "b", "c", "d"],
            "correctAnswer": 0
        }"#;
        assert!(matches!(
            parse_question(payload, Level::Medium),
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_non_json_chatter() {
        assert!(matches!(
            parse_question("Sure! Here is your question:", Level::Medium),
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn decodes_a_word_list() {
        let words = parse_word_list(r#"{"words": ["arid", "ubiquitous"]}"#).unwrap();
        assert_eq!(words, vec!["arid".to_string(), "ubiquitous".to_string()]);
    }

    #[test]
    fn rejects_an_empty_word_list() {
        assert!(matches!(
            parse_word_list(r#"{"words": []}"#),
            Err(GenerationError::Malformed(_))
        ));
    }
}
