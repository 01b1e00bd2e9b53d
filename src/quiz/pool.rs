use thiserror::Error;

use crate::quiz::{Question, QuestionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("question {0} is not part of this record")]
pub struct QuestionNotFound(pub QuestionId);

/// All questions generated for one word of one user.
///
/// `has_unanswered` is a cached view of `questions` and is recomputed on
/// every mutation, so it always equals
/// `questions.iter().any(|q| !q.has_been_asked)`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QuestionRecord {
    pub word: String,
    questions: Vec<Question>,
    has_unanswered: bool,
}

impl QuestionRecord {
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            questions: Vec::new(),
            has_unanswered: false,
        }
    }

    pub fn append(&mut self, questions: Vec<Question>) {
        self.questions.extend(questions);
        self.recompute_unanswered();
    }

    /// Record the user's answer for one question.
    ///
    /// Precondition: a question is answered at most once; callers must not
    /// mark the same id twice.
    pub fn mark_answered(
        &mut self,
        id: QuestionId,
        answer_index: usize,
    ) -> Result<(), QuestionNotFound> {
        let question = self
            .questions
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or(QuestionNotFound(id))?;

        question.has_been_asked = true;
        question.user_answer_index = Some(answer_index);
        self.recompute_unanswered();
        Ok(())
    }

    pub fn unanswered(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter().filter(|q| !q.has_been_asked)
    }

    pub fn has_unanswered(&self) -> bool {
        self.has_unanswered
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    fn recompute_unanswered(&mut self) {
        self.has_unanswered = self.questions.iter().any(|q| !q.has_been_asked);
    }
}
