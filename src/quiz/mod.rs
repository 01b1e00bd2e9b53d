pub mod difficulty;
pub mod oracle;
pub mod pool;
pub mod session;

pub use difficulty::Level;

use std::fmt;

use uuid::Uuid;

/// Stable identity of a learner, as handed to us by the chat transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct QuestionId(Uuid);

impl QuestionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QuestionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One generated multiple-choice question.
///
/// A question is answered at most once: `has_been_asked` flips to true and
/// `user_answer_index` is set together, and the question is never re-opened.
/// `correct_answer_index` never changes after creation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub query_text: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
    pub answer_explanation: Option<String>,
    pub level: Level,
    pub has_been_asked: bool,
    pub user_answer_index: Option<usize>,
}

impl Question {
    pub fn new(
        query_text: String,
        options: Vec<String>,
        correct_answer_index: usize,
        answer_explanation: Option<String>,
        level: Level,
    ) -> Self {
        Self {
            id: QuestionId::new(),
            query_text,
            options,
            correct_answer_index,
            answer_explanation,
            level,
            has_been_asked: false,
            user_answer_index: None,
        }
    }
}

/// A question annotated with the word it practices. This is the shape of
/// unanswered-pool snapshots and of the session's current-question pointer;
/// the word is needed to request a follow-up question after an answer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PendingQuestion {
    pub word: String,
    pub question: Question,
}
