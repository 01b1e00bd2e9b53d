use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use crate::quiz::pool::QuestionRecord;
use crate::quiz::{PendingQuestion, Question, QuestionId, UserId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("not found")]
    NotFound,
}

/// Durable per-user session state: the word pool, the question records and
/// the current-question pointer.
///
/// Every operation may fail with `StoreError::Unavailable` on infrastructure
/// trouble; callers surface that as a generic failure instead of retrying
/// without bound.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The question currently presented and awaiting an answer, if any.
    async fn current_question(&self, user: UserId)
        -> Result<Option<PendingQuestion>, StoreError>;

    /// Overwrite the current-question pointer; `None` clears it.
    async fn set_current_question(
        &self,
        user: UserId,
        question: Option<PendingQuestion>,
    ) -> Result<(), StoreError>;

    /// Union `words` into the user's word pool. Words already present are
    /// kept as-is; the pool is a set.
    async fn add_words(&self, user: UserId, words: &[String]) -> Result<(), StoreError>;

    async fn list_words(&self, user: UserId) -> Result<Vec<String>, StoreError>;

    /// Append freshly generated questions to `word`'s record, creating the
    /// record on first use and maintaining its unanswered flag.
    async fn append_questions(
        &self,
        user: UserId,
        word: &str,
        questions: Vec<Question>,
    ) -> Result<(), StoreError>;

    /// Mark a question answered. Fails with `StoreError::NotFound` when no
    /// record of this user contains the id.
    async fn mark_answered(
        &self,
        user: UserId,
        question_id: QuestionId,
        answer_index: usize,
    ) -> Result<(), StoreError>;

    /// Fresh snapshot of every unanswered question across all records,
    /// each annotated with its owning word. Recomputed on every call.
    async fn list_unanswered(&self, user: UserId) -> Result<Vec<PendingQuestion>, StoreError>;
}

#[derive(Debug, Default)]
struct UserDocument {
    // Unique; kept in insertion order so word listings read back stably.
    words: Vec<String>,
    records: Vec<QuestionRecord>,
    current: Option<PendingQuestion>,
}

/// In-process `SessionStore`. One document per user behind a single mutex;
/// good enough for a single bot process and for tests.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<UserId, UserDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_user<T>(
        &self,
        user: UserId,
        f: impl FnOnce(&mut UserDocument) -> T,
    ) -> Result<T, StoreError> {
        let mut users = self
            .users
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(f(users.entry(user).or_default()))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn current_question(
        &self,
        user: UserId,
    ) -> Result<Option<PendingQuestion>, StoreError> {
        self.with_user(user, |doc| doc.current.clone())
    }

    async fn set_current_question(
        &self,
        user: UserId,
        question: Option<PendingQuestion>,
    ) -> Result<(), StoreError> {
        self.with_user(user, |doc| doc.current = question)
    }

    async fn add_words(&self, user: UserId, words: &[String]) -> Result<(), StoreError> {
        self.with_user(user, |doc| {
            for word in words {
                if !doc.words.iter().any(|known| known == word) {
                    doc.words.push(word.clone());
                }
            }
        })
    }

    async fn list_words(&self, user: UserId) -> Result<Vec<String>, StoreError> {
        self.with_user(user, |doc| doc.words.clone())
    }

    async fn append_questions(
        &self,
        user: UserId,
        word: &str,
        questions: Vec<Question>,
    ) -> Result<(), StoreError> {
        self.with_user(user, |doc| {
            if !doc.words.iter().any(|known| known == word) {
                doc.words.push(word.to_string());
            }
            match doc.records.iter_mut().find(|record| record.word == word) {
                Some(record) => record.append(questions),
                None => {
                    let mut record = QuestionRecord::new(word);
                    record.append(questions);
                    doc.records.push(record);
                }
            }
        })
    }

    async fn mark_answered(
        &self,
        user: UserId,
        question_id: QuestionId,
        answer_index: usize,
    ) -> Result<(), StoreError> {
        self.with_user(user, |doc| {
            for record in &mut doc.records {
                if record.mark_answered(question_id, answer_index).is_ok() {
                    return Ok(());
                }
            }
            Err(StoreError::NotFound)
        })?
    }

    async fn list_unanswered(&self, user: UserId) -> Result<Vec<PendingQuestion>, StoreError> {
        self.with_user(user, |doc| {
            let mut pending = Vec::new();
            for record in &doc.records {
                for question in record.unanswered() {
                    pending.push(PendingQuestion {
                        word: record.word.clone(),
                        question: question.clone(),
                    });
                }
            }
            pending
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::Level;

    const USER: UserId = UserId(7);

    fn question(text: &str, level: Level) -> Question {
        Question::new(
            text.to_string(),
            vec![
                "one".to_string(),
                "two".to_string(),
                "three".to_string(),
                "four".to_string(),
            ],
            0,
            None,
            level,
        )
    }

    #[tokio::test]
    async fn add_words_unions_instead_of_duplicating() {
        let store = MemoryStore::new();
        store
            .add_words(USER, &["arid".to_string(), "ubiquitous".to_string()])
            .await
            .unwrap();
        store
            .add_words(USER, &["ubiquitous".to_string(), "laconic".to_string()])
            .await
            .unwrap();

        assert_eq!(
            store.list_words(USER).await.unwrap(),
            vec![
                "arid".to_string(),
                "ubiquitous".to_string(),
                "laconic".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn append_questions_creates_the_record_and_registers_the_word() {
        let store = MemoryStore::new();
        store
            .append_questions(USER, "arid", vec![question("q1", Level::Medium)])
            .await
            .unwrap();

        assert_eq!(store.list_words(USER).await.unwrap(), vec!["arid".to_string()]);
        let pending = store.list_unanswered(USER).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].word, "arid");
    }

    #[tokio::test]
    async fn snapshot_spans_all_records_and_is_idempotent() {
        let store = MemoryStore::new();
        store
            .append_questions(USER, "arid", vec![question("q1", Level::Medium)])
            .await
            .unwrap();
        store
            .append_questions(USER, "laconic", vec![question("q2", Level::Easy)])
            .await
            .unwrap();

        let first = store.list_unanswered(USER).await.unwrap();
        let second = store.list_unanswered(USER).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn mark_answered_removes_the_question_from_the_snapshot() {
        let store = MemoryStore::new();
        let q = question("q1", Level::Medium);
        let id = q.id;
        store.append_questions(USER, "arid", vec![q]).await.unwrap();

        store.mark_answered(USER, id, 3).await.unwrap();

        assert!(store.list_unanswered(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_answered_fails_for_an_unknown_id() {
        let store = MemoryStore::new();
        store
            .append_questions(USER, "arid", vec![question("q1", Level::Medium)])
            .await
            .unwrap();

        let result = store.mark_answered(USER, QuestionId::new(), 0).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn current_question_round_trips_and_clears() {
        let store = MemoryStore::new();
        assert_eq!(store.current_question(USER).await.unwrap(), None);

        let pending = PendingQuestion {
            word: "arid".to_string(),
            question: question("q1", Level::Medium),
        };
        store
            .set_current_question(USER, Some(pending.clone()))
            .await
            .unwrap();
        assert_eq!(store.current_question(USER).await.unwrap(), Some(pending));

        store.set_current_question(USER, None).await.unwrap();
        assert_eq!(store.current_question(USER).await.unwrap(), None);
    }

    #[tokio::test]
    async fn users_do_not_share_state() {
        let store = MemoryStore::new();
        store
            .append_questions(USER, "arid", vec![question("q1", Level::Medium)])
            .await
            .unwrap();

        let other = UserId(8);
        assert!(store.list_words(other).await.unwrap().is_empty());
        assert!(store.list_unanswered(other).await.unwrap().is_empty());
    }
}
