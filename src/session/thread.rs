//! Interaction thread state for one expanded document.
//!
//! Transitions are plain methods so the controller can apply them inside a
//! single state update. Load status (`Idle -> Loading -> Ready | LoadError`)
//! and submit status (`Idle -> Submitting -> Idle | Failed`) move
//! independently.

use tracing::debug;

use crate::api::ApiError;
use crate::models::InteractionRecord;

/// Fallback when loading the history fails without a server message.
pub const LOAD_FAILED_MESSAGE: &str = "could not load the interaction history";
/// Fallback when a question fails without a server message.
pub const SUBMIT_FAILED_MESSAGE: &str = "could not send the question";
/// Shown when a blank question is submitted.
pub const EMPTY_QUESTION_MESSAGE: &str = "type a question about the document first";

/// Loading state of the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadStatus {
    Idle,
    Loading,
    Ready,
    LoadError(String),
}

/// State of question submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitStatus {
    Idle,
    Submitting,
    Failed(String),
}

/// What `begin_submit` decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitGate {
    /// Send this (trimmed) question.
    Send(String),
    /// A submission or history load is in flight; nothing to do.
    Busy,
    /// The question was blank.
    Rejected,
}

/// Questions and answers for one document, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionThread {
    document_id: String,
    status: ThreadStatus,
    submit: SubmitStatus,
    interactions: Vec<InteractionRecord>,
    /// Answers that arrived while a (re)load was in flight, newest first.
    arrived_during_load: Vec<InteractionRecord>,
    draft: String,
}

impl InteractionThread {
    pub fn new(document_id: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            status: ThreadStatus::Idle,
            submit: SubmitStatus::Idle,
            interactions: Vec::new(),
            arrived_during_load: Vec::new(),
            draft: String::new(),
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn status(&self) -> &ThreadStatus {
        &self.status
    }

    pub fn submit_status(&self) -> &SubmitStatus {
        &self.submit
    }

    /// Interactions, newest first.
    pub fn interactions(&self) -> &[InteractionRecord] {
        &self.interactions
    }

    /// Question text typed but not yet successfully sent.
    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_submitting(&self) -> bool {
        self.submit == SubmitStatus::Submitting
    }

    /// Error message of the last failed load or submit, if any.
    pub fn error(&self) -> Option<&str> {
        match (&self.submit, &self.status) {
            (SubmitStatus::Failed(msg), _) => Some(msg),
            (_, ThreadStatus::LoadError(msg)) => Some(msg),
            _ => None,
        }
    }

    pub fn set_draft(&mut self, text: &str) {
        self.draft = text.to_string();
    }

    pub fn begin_load(&mut self) {
        self.status = ThreadStatus::Loading;
        self.arrived_during_load.clear();
    }

    /// Apply the result of a history fetch.
    ///
    /// Answers received while the fetch was in flight stay at the top unless
    /// the fetched history already contains them.
    pub fn finish_load(&mut self, result: Result<Vec<InteractionRecord>, ApiError>) {
        let arrived = std::mem::take(&mut self.arrived_during_load);
        match result {
            Ok(mut interactions) => {
                let missing: Vec<_> = arrived
                    .into_iter()
                    .filter(|a| !interactions.iter().any(|i| i.id == a.id))
                    .collect();
                interactions.splice(0..0, missing);
                debug!(
                    "Loaded {} interactions for document {}",
                    interactions.len(),
                    self.document_id
                );
                self.interactions = interactions;
                self.status = ThreadStatus::Ready;
            }
            Err(e) => {
                self.interactions = arrived;
                self.status = ThreadStatus::LoadError(e.user_message(LOAD_FAILED_MESSAGE));
            }
        }
    }

    /// Decide whether a question may be sent.
    ///
    /// Questions wait for the history to arrive. An in-flight submission or
    /// load wins over validation, so a blank resubmit while busy does not
    /// clobber the submitting state.
    pub fn begin_submit(&mut self, question: &str) -> SubmitGate {
        if self.is_submitting() || self.status == ThreadStatus::Loading {
            return SubmitGate::Busy;
        }

        let trimmed = question.trim();
        if trimmed.is_empty() {
            self.submit = SubmitStatus::Failed(EMPTY_QUESTION_MESSAGE.to_string());
            return SubmitGate::Rejected;
        }

        self.draft = question.to_string();
        self.submit = SubmitStatus::Submitting;
        SubmitGate::Send(trimmed.to_string())
    }

    /// Apply the result of a question submission.
    pub fn finish_submit(&mut self, result: Result<InteractionRecord, ApiError>) {
        match result {
            Ok(interaction) => {
                if self.status == ThreadStatus::Loading {
                    self.arrived_during_load.insert(0, interaction.clone());
                }
                self.interactions.insert(0, interaction);
                self.draft.clear();
                self.submit = SubmitStatus::Idle;
            }
            Err(e) => {
                self.submit = SubmitStatus::Failed(e.user_message(SUBMIT_FAILED_MESSAGE));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn interaction(id: &str, minute: u32) -> InteractionRecord {
        InteractionRecord {
            id: id.to_string(),
            document_id: "doc".to_string(),
            query: format!("question {}", id),
            response: format!("answer {}", id),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_new_thread_is_idle_and_empty() {
        let thread = InteractionThread::new("doc");
        assert_eq!(thread.status(), &ThreadStatus::Idle);
        assert_eq!(thread.submit_status(), &SubmitStatus::Idle);
        assert!(thread.interactions().is_empty());
        assert!(thread.error().is_none());
    }

    #[test]
    fn test_load_preserves_server_order() {
        let mut thread = InteractionThread::new("doc");
        thread.begin_load();
        assert_eq!(thread.status(), &ThreadStatus::Loading);

        thread.finish_load(Ok(vec![interaction("i1", 2), interaction("i2", 1)]));
        assert_eq!(thread.status(), &ThreadStatus::Ready);
        let ids: Vec<_> = thread.interactions().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i1", "i2"]);
    }

    #[test]
    fn test_load_failure_leaves_empty_list() {
        let mut thread = InteractionThread::new("doc");
        thread.finish_load(Ok(vec![interaction("old", 1)]));

        thread.begin_load();
        thread.finish_load(Err(ApiError::Transport("reset".to_string())));

        assert!(thread.interactions().is_empty());
        assert!(matches!(thread.status(), ThreadStatus::LoadError(_)));
    }

    #[test]
    fn test_submit_prepends_and_clears_draft() {
        let mut thread = InteractionThread::new("doc");
        thread.finish_load(Ok(vec![interaction("i1", 2), interaction("i2", 1)]));

        assert_eq!(
            thread.begin_submit("  what is the total?  "),
            SubmitGate::Send("what is the total?".to_string())
        );
        assert!(thread.is_submitting());
        assert_eq!(thread.draft(), "  what is the total?  ");

        thread.finish_submit(Ok(interaction("i0", 3)));
        let ids: Vec<_> = thread.interactions().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i0", "i1", "i2"]);
        assert_eq!(thread.draft(), "");
        assert_eq!(thread.submit_status(), &SubmitStatus::Idle);
    }

    #[test]
    fn test_submit_failure_keeps_draft_and_list() {
        let mut thread = InteractionThread::new("doc");
        thread.finish_load(Ok(vec![interaction("i1", 1)]));

        thread.begin_submit("who signed it?");
        thread.finish_submit(Err(ApiError::Application {
            status: Some(429),
            message: Some("too many questions".to_string()),
        }));

        assert_eq!(thread.draft(), "who signed it?");
        assert_eq!(thread.interactions().len(), 1);
        assert_eq!(
            thread.submit_status(),
            &SubmitStatus::Failed("too many questions".to_string())
        );
        assert_eq!(thread.error(), Some("too many questions"));
    }

    #[test]
    fn test_submit_failure_without_message_uses_fallback() {
        let mut thread = InteractionThread::new("doc");
        thread.begin_submit("q");
        thread.finish_submit(Err(ApiError::Application {
            status: Some(500),
            message: None,
        }));
        assert_eq!(thread.error(), Some(SUBMIT_FAILED_MESSAGE));
    }

    #[test]
    fn test_blank_question_is_rejected() {
        let mut thread = InteractionThread::new("doc");
        assert_eq!(thread.begin_submit("   \t"), SubmitGate::Rejected);
        assert!(!thread.is_submitting());
        assert_eq!(thread.error(), Some(EMPTY_QUESTION_MESSAGE));
    }

    #[test]
    fn test_second_submit_while_busy_is_ignored() {
        let mut thread = InteractionThread::new("doc");
        assert!(matches!(thread.begin_submit("first"), SubmitGate::Send(_)));
        assert_eq!(thread.begin_submit("second"), SubmitGate::Busy);
        assert_eq!(thread.begin_submit("   "), SubmitGate::Busy);
        assert_eq!(thread.draft(), "first");
        assert!(thread.is_submitting());
    }

    #[test]
    fn test_submit_waits_for_history() {
        let mut thread = InteractionThread::new("doc");
        thread.begin_load();
        assert_eq!(thread.begin_submit("early?"), SubmitGate::Busy);
        assert!(!thread.is_submitting());
        assert_eq!(thread.draft(), "");

        thread.finish_load(Ok(vec![interaction("i1", 1)]));
        assert!(matches!(thread.begin_submit("now?"), SubmitGate::Send(_)));
    }

    #[test]
    fn test_answer_during_reload_survives() {
        let mut thread = InteractionThread::new("doc");
        thread.finish_load(Ok(vec![interaction("i1", 1)]));

        assert!(matches!(thread.begin_submit("q"), SubmitGate::Send(_)));
        thread.begin_load();
        thread.finish_submit(Ok(interaction("i2", 2)));
        thread.finish_load(Ok(vec![interaction("i1", 1)]));

        let ids: Vec<_> = thread.interactions().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i2", "i1"]);
    }

    #[test]
    fn test_reload_containing_answer_does_not_duplicate() {
        let mut thread = InteractionThread::new("doc");
        thread.begin_submit("q");
        thread.begin_load();
        thread.finish_submit(Ok(interaction("i2", 2)));
        thread.finish_load(Ok(vec![interaction("i2", 2), interaction("i1", 1)]));

        let ids: Vec<_> = thread.interactions().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i2", "i1"]);
    }

    #[test]
    fn test_retry_after_failure() {
        let mut thread = InteractionThread::new("doc");
        thread.begin_submit("q");
        thread.finish_submit(Err(ApiError::Transport("down".to_string())));

        assert!(matches!(thread.begin_submit("q"), SubmitGate::Send(_)));
        thread.finish_submit(Ok(interaction("i0", 1)));
        assert!(thread.error().is_none());
    }
}
