use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::quiz::oracle::{GenerationError, QuestionOracle};
use crate::quiz::{Level, UserId};
use crate::store::{SessionStore, StoreError};

pub const CORRECT_FEEDBACK: &str = "Correct answer! 🎉";
pub const WRONG_FEEDBACK: &str = "Oops! That was not correct. 😢 Try another one!";
pub const ALL_ANSWERED: &str =
    "You have answered every question! 🎓 Send /start to pick up new words.";
pub const NO_WORDS_YET: &str =
    "You don't have any words to practice yet. Send /start to pick some!";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no question is currently awaiting an answer")]
    NoActiveQuestion,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Outbound boundary to the chat transport. Fire-and-forget: implementations
/// deliver on a best-effort basis and swallow their own send failures.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Show a question. Each option is addressable by its index, which is
    /// the selector token an answer event refers back to.
    async fn present_question(&self, prompt: &str, options: &[String]);

    async fn present_feedback(&self, text: &str);

    async fn present_completion(&self, text: &str);
}

/// Drives one user's quiz: records answers, adjusts difficulty, requests
/// follow-up questions and keeps presenting the next unanswered one.
///
/// All public operations serialize per user, so only one event per user is
/// ever in flight and `record_answer` always runs against the question set
/// by that user's most recent `select_next`.
pub struct SessionController {
    store: Arc<dyn SessionStore>,
    oracle: Arc<dyn QuestionOracle>,
    user_locks: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionController {
    pub fn new(store: Arc<dyn SessionStore>, oracle: Arc<dyn QuestionOracle>) -> Self {
        Self {
            store,
            oracle,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    fn user_lock(&self, user: UserId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.user_locks.lock().expect("user lock table poisoned");
        locks.entry(user).or_default().clone()
    }

    /// Ask the oracle for `count` new practice words and union them into the
    /// user's word pool. Returns the suggested words for presentation.
    pub async fn seed_words(
        &self,
        user: UserId,
        count: usize,
        level: Level,
    ) -> Result<Vec<String>, SessionError> {
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        // Easier/harder requests are made relative to what the user has
        // already been given.
        let known = if level == Level::Medium {
            Vec::new()
        } else {
            self.store.list_words(user).await?
        };

        let words = self.oracle.suggest_words(count, level, &known).await?;
        self.store.add_words(user, &words).await?;

        log::info!("seeded {} candidate words for user {user}", words.len());
        Ok(words)
    }

    /// Generate one question per pooled word at `seed_level`, then present
    /// the first question. A word whose generation fails is skipped; the
    /// quiz starts with whatever could be generated.
    pub async fn start_quiz(
        &self,
        user: UserId,
        seed_level: Level,
        presenter: &dyn Presenter,
    ) -> Result<(), SessionError> {
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        let words = self.store.list_words(user).await?;
        if words.is_empty() {
            presenter.present_feedback(NO_WORDS_YET).await;
            return Ok(());
        }

        for word in &words {
            match self.oracle.generate(word, seed_level).await {
                Ok(question) => {
                    self.store
                        .append_questions(user, word, vec![question])
                        .await?;
                }
                Err(err) => {
                    log::error!("could not generate a seed question for \"{word}\": {err}");
                }
            }
        }

        self.select_next_locked(user, presenter).await
    }

    /// Record the answer to the current question, give feedback, adjust the
    /// difficulty for the word and move on to the next question.
    ///
    /// Fails with `SessionError::NoActiveQuestion` when no question is
    /// awaiting an answer (stale button, duplicate tap); state is untouched.
    pub async fn record_answer(
        &self,
        user: UserId,
        selected_index: usize,
        presenter: &dyn Presenter,
    ) -> Result<(), SessionError> {
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        let Some(current) = self.store.current_question(user).await? else {
            return Err(SessionError::NoActiveQuestion);
        };

        let is_correct = selected_index == current.question.correct_answer_index;
        if is_correct {
            presenter.present_feedback(CORRECT_FEEDBACK).await;
        } else {
            let feedback = match current.question.answer_explanation.as_deref() {
                Some(explanation) => {
                    format!("Oops! That was not correct. 😢\n\n{explanation}")
                }
                None => WRONG_FEEDBACK.to_string(),
            };
            presenter.present_feedback(&feedback).await;
        }

        match self
            .store
            .mark_answered(user, current.question.id, selected_index)
            .await
        {
            Ok(()) => {}
            // Record/question divergence between presentation and answer is
            // best-effort territory; the round still completes.
            Err(StoreError::NotFound) => {
                log::warn!(
                    "question {} vanished from user {user}'s records before it was marked answered",
                    current.question.id
                );
            }
            Err(err) => return Err(err.into()),
        }

        if let Some(next_level) = current.question.level.adjust(is_correct) {
            match self.oracle.generate(&current.word, next_level).await {
                Ok(question) => {
                    self.store
                        .append_questions(user, &current.word, vec![question])
                        .await?;
                }
                // A missing follow-up degrades the session but must never
                // stall it.
                Err(err) => {
                    log::error!(
                        "follow-up generation for \"{}\" at {next_level} failed: {err}",
                        current.word
                    );
                }
            }
        }

        self.select_next_locked(user, presenter).await
    }

    /// Pick an unanswered question uniformly at random, make it current and
    /// present it; with nothing left, clear the pointer and announce
    /// completion.
    pub async fn select_next(
        &self,
        user: UserId,
        presenter: &dyn Presenter,
    ) -> Result<(), SessionError> {
        let lock = self.user_lock(user);
        let _guard = lock.lock().await;

        self.select_next_locked(user, presenter).await
    }

    async fn select_next_locked(
        &self,
        user: UserId,
        presenter: &dyn Presenter,
    ) -> Result<(), SessionError> {
        let pending = self.store.list_unanswered(user).await?;

        let Some(next) = pending.choose(&mut rand::thread_rng()).cloned() else {
            self.store.set_current_question(user, None).await?;
            presenter.present_completion(ALL_ANSWERED).await;
            return Ok(());
        };

        self.store
            .set_current_question(user, Some(next.clone()))
            .await?;
        presenter
            .present_question(&next.question.query_text, &next.question.options)
            .await;
        Ok(())
    }
}
