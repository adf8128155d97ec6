//! Session controller.
//!
//! All state lives in a `watch` channel. Every mutation is a synchronous
//! closure passed to `send_if_modified`, so a completed network call is applied
//! in one step and observers see either the old or the new state.
//!
//! Each expansion and each thread load gets a fresh ticket from a counter.
//! A response is applied only if its ticket still matches the expanded
//! document when it arrives; otherwise it is dropped.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::thread::{InteractionThread, SubmitGate, EMPTY_QUESTION_MESSAGE};
use super::SessionError;
use crate::api::DocumentService;
use crate::encoding::decode_data_url;
use crate::export::{
    base_name, image_entry_name, text_entry_name, ArchiveBuilder, ArchiveImage, ArchiveSink,
    ArchiveText, DocumentArchive,
};
use crate::models::{DocumentRecord, InteractionRecord};

/// Fallback when the document list fails without a server message.
pub const LIST_FAILED_MESSAGE: &str = "could not load the document history";

/// Loading state of the document list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ListStatus {
    #[default]
    NotLoaded,
    Loading,
    Loaded,
    Failed(String),
}

/// The document whose detail view is open.
#[derive(Debug, Clone)]
pub struct ExpandedDocument {
    document_id: String,
    generation: u64,
    load_ticket: u64,
    thread: InteractionThread,
}

impl ExpandedDocument {
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn thread(&self) -> &InteractionThread {
        &self.thread
    }
}

/// Everything the presentation layer renders for one session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    documents: Vec<DocumentRecord>,
    list_status: ListStatus,
    expanded: Option<ExpandedDocument>,
    export_error: Option<String>,
    next_ticket: u64,
}

impl SessionState {
    pub fn documents(&self) -> &[DocumentRecord] {
        &self.documents
    }

    pub fn list_status(&self) -> &ListStatus {
        &self.list_status
    }

    pub fn document(&self, document_id: &str) -> Option<&DocumentRecord> {
        self.documents.iter().find(|d| d.id == document_id)
    }

    pub fn expanded(&self) -> Option<&ExpandedDocument> {
        self.expanded.as_ref()
    }

    pub fn expanded_document_id(&self) -> Option<&str> {
        self.expanded.as_ref().map(|e| e.document_id.as_str())
    }

    /// Thread of the expanded document.
    pub fn thread(&self) -> Option<&InteractionThread> {
        self.expanded.as_ref().map(|e| &e.thread)
    }

    /// Error of the most recent export, cleared by the next successful one.
    pub fn export_error(&self) -> Option<&str> {
        self.export_error.as_deref()
    }

    fn take_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn expanded_mut(&mut self, document_id: &str) -> Option<&mut ExpandedDocument> {
        self.expanded
            .as_mut()
            .filter(|e| e.document_id == document_id)
    }

    fn current_expansion_mut(&mut self, generation: u64) -> Option<&mut ExpandedDocument> {
        self.expanded
            .as_mut()
            .filter(|e| e.generation == generation)
    }

    fn set_export_error(&mut self, error: Option<String>) -> bool {
        if self.export_error == error {
            return false;
        }
        self.export_error = error;
        true
    }
}

/// Result of toggling a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Collapsed,
    Expanded(LoadOutcome),
}

/// Result of loading a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// History applied with this many interactions.
    Loaded(usize),
    /// The document was closed or reopened before the response arrived.
    Discarded,
}

/// Result of submitting a question.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The answer was prepended to the thread.
    Answered(InteractionRecord),
    /// Another question or the history load was still in flight; nothing
    /// was sent.
    Ignored,
    /// The document was closed or reopened before the answer arrived.
    Discarded,
}

/// Controller for one authenticated user's visit.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct DocumentSession {
    service: Arc<dyn DocumentService>,
    token: Arc<str>,
    state: Arc<watch::Sender<SessionState>>,
}

impl DocumentSession {
    /// Start a session for the holder of `token`.
    pub fn new(service: Arc<dyn DocumentService>, token: &str) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            service,
            token: Arc::from(token),
            state: Arc::new(state),
        }
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Tear the session down (logout).
    ///
    /// The shared state is reset to empty, so other handles and subscribers
    /// see the logout. Thread responses still in flight are discarded.
    pub fn end(self) {
        self.state.send_modify(|state| {
            // Keep the ticket counter so old responses never match a new expansion.
            *state = SessionState {
                next_ticket: state.next_ticket,
                ..SessionState::default()
            };
        });
        info!("Session ended");
    }

    /// Fetch the user's documents.
    ///
    /// On failure the list is left empty and `list_status` carries the error.
    pub async fn load_documents(&self) -> Result<usize, SessionError> {
        self.state
            .send_modify(|state| state.list_status = ListStatus::Loading);

        match self.service.list_documents(&self.token).await {
            Ok(documents) => {
                let count = documents.len();
                self.state.send_modify(|state| {
                    // Close the detail view if its document is gone.
                    let gone = state
                        .expanded_document_id()
                        .is_some_and(|id| !documents.iter().any(|d| d.id == id));
                    if gone {
                        state.expanded = None;
                    }
                    state.documents = documents;
                    state.list_status = ListStatus::Loaded;
                });
                info!("Loaded {} documents", count);
                Ok(count)
            }
            Err(e) => {
                warn!("Failed to load document history: {}", e);
                let message = e.user_message(LIST_FAILED_MESSAGE);
                self.state.send_modify(|state| {
                    state.documents.clear();
                    state.expanded = None;
                    state.list_status = ListStatus::Failed(message);
                });
                Err(e.into())
            }
        }
    }

    /// Open `document_id`, or close it if it is already open.
    ///
    /// Opening discards any previous thread and loads a fresh one.
    pub async fn toggle_expanded(&self, document_id: &str) -> Result<ToggleOutcome, SessionError> {
        let mut expanded = Err(SessionError::UnknownDocument(document_id.to_string()));
        self.state.send_if_modified(|state| {
            if state.expanded_document_id() == Some(document_id) {
                state.expanded = None;
                expanded = Ok(false);
                return true;
            }
            if state.document(document_id).is_none() {
                return false;
            }
            let generation = state.take_ticket();
            state.expanded = Some(ExpandedDocument {
                document_id: document_id.to_string(),
                generation,
                load_ticket: 0,
                thread: InteractionThread::new(document_id),
            });
            expanded = Ok(true);
            true
        });

        if expanded? {
            debug!("Expanded document {}", document_id);
            self.load_thread(document_id)
                .await
                .map(ToggleOutcome::Expanded)
        } else {
            debug!("Collapsed document {}", document_id);
            Ok(ToggleOutcome::Collapsed)
        }
    }

    /// (Re)load the interaction history of the expanded document.
    pub async fn load_thread(&self, document_id: &str) -> Result<LoadOutcome, SessionError> {
        let mut ticket = Err(SessionError::NotExpanded(document_id.to_string()));
        self.state.send_if_modified(|state| {
            let load_ticket = state.take_ticket();
            match state.expanded_mut(document_id) {
                Some(expanded) => {
                    expanded.load_ticket = load_ticket;
                    expanded.thread.begin_load();
                    ticket = Ok((expanded.generation, load_ticket));
                    true
                }
                None => false,
            }
        });
        let (generation, load_ticket) = ticket?;

        let result = self
            .service
            .list_interactions(&self.token, document_id)
            .await;
        let outcome = result.as_ref().map(Vec::len).map_err(Clone::clone);

        let mut applied = false;
        self.state.send_if_modified(|state| {
            match state
                .current_expansion_mut(generation)
                .filter(|e| e.load_ticket == load_ticket)
            {
                Some(expanded) => {
                    expanded.thread.finish_load(result);
                    applied = true;
                    true
                }
                None => false,
            }
        });

        if !applied {
            debug!("Discarding stale interaction history for {}", document_id);
            return Ok(LoadOutcome::Discarded);
        }

        match outcome {
            Ok(count) => Ok(LoadOutcome::Loaded(count)),
            Err(e) => {
                warn!("Failed to load interactions for {}: {}", document_id, e);
                Err(e.into())
            }
        }
    }

    /// Update the pending question text of the expanded document.
    pub fn set_draft(&self, document_id: &str, text: &str) -> Result<(), SessionError> {
        let mut found = false;
        self.state.send_if_modified(|state| match state.expanded_mut(document_id) {
            Some(expanded) => {
                expanded.thread.set_draft(text);
                found = true;
                true
            }
            None => false,
        });

        if found {
            Ok(())
        } else {
            Err(SessionError::NotExpanded(document_id.to_string()))
        }
    }

    /// Ask a question about the expanded document.
    ///
    /// Blank questions are rejected without a network call, and a question
    /// submitted while another is in flight is ignored.
    pub async fn submit_question(
        &self,
        document_id: &str,
        question: &str,
    ) -> Result<SubmitOutcome, SessionError> {
        let mut gate = Err(SessionError::NotExpanded(document_id.to_string()));
        self.state.send_if_modified(|state| match state.expanded_mut(document_id) {
            Some(expanded) => {
                let decision = expanded.thread.begin_submit(question);
                let changed = decision != SubmitGate::Busy;
                gate = Ok((expanded.generation, decision));
                changed
            }
            None => false,
        });
        let (generation, decision) = gate?;

        let question = match decision {
            SubmitGate::Send(question) => question,
            SubmitGate::Busy => {
                debug!("Question for {} ignored, thread is busy", document_id);
                return Ok(SubmitOutcome::Ignored);
            }
            SubmitGate::Rejected => {
                return Err(SessionError::Validation(EMPTY_QUESTION_MESSAGE.to_string()));
            }
        };

        let result = self
            .service
            .ask_question(&self.token, document_id, &question)
            .await;
        let outcome = result.clone();

        let mut applied = false;
        self.state.send_if_modified(|state| match state.current_expansion_mut(generation) {
            Some(expanded) => {
                expanded.thread.finish_submit(result);
                applied = true;
                true
            }
            None => false,
        });

        if !applied {
            debug!("Discarding stale answer for {}", document_id);
            return Ok(SubmitOutcome::Discarded);
        }

        match outcome {
            Ok(record) => Ok(SubmitOutcome::Answered(record)),
            Err(e) => {
                warn!("Question about {} failed: {}", document_id, e);
                Err(e.into())
            }
        }
    }

    /// Build the archive for a document without saving it.
    pub fn prepare_export(&self, document_id: &str) -> Result<DocumentArchive, SessionError> {
        let document = self.state.borrow().document(document_id).cloned();
        let result = match document {
            Some(document) => build_document_archive(&document),
            None => Err(SessionError::UnknownDocument(document_id.to_string())),
        };
        self.record_export(&result);
        result
    }

    /// Build a document's archive and hand it to `sink`.
    ///
    /// A malformed image aborts the export before anything is saved.
    pub fn export_document(
        &self,
        document_id: &str,
        sink: &dyn ArchiveSink,
    ) -> Result<PathBuf, SessionError> {
        let archive = self.prepare_export(document_id)?;
        let result = sink
            .save(&archive.file_name, &archive.bytes)
            .map_err(SessionError::from);
        self.record_export(&result);

        if let Ok(path) = &result {
            info!(
                "Exported document {} to {} ({} bytes)",
                document_id,
                path.display(),
                archive.bytes.len()
            );
        }
        result
    }

    fn record_export<T>(&self, result: &Result<T, SessionError>) {
        let error = match result {
            Ok(_) => None,
            Err(e) => {
                warn!("Export failed: {}", e);
                Some(e.to_string())
            }
        };
        self.state
            .send_if_modified(|state| state.set_export_error(error));
    }
}

/// Decode the image and package it with the extracted text.
fn build_document_archive(document: &DocumentRecord) -> Result<DocumentArchive, SessionError> {
    let image = document
        .encoded_image
        .as_deref()
        .filter(|encoded| !encoded.is_empty())
        .map(decode_data_url)
        .transpose()?;
    let text = document
        .extracted_text
        .as_deref()
        .filter(|text| !text.is_empty());

    let file_name = image_entry_name(&document.file_name);
    let text_name = text_entry_name(&file_name);

    let archive = ArchiveBuilder::new(base_name(&file_name))
        .image(image.as_ref().map(|decoded| ArchiveImage {
            name: &file_name,
            bytes: &decoded.bytes,
        }))
        .text(text.map(|content| ArchiveText {
            name: &text_name,
            content,
        }))
        .modified_at(document.created_at)
        .build()?;

    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::encoding::encode_data_url;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    /// Service whose answers are fixed up front.
    struct StaticService {
        documents: Result<Vec<DocumentRecord>, ApiError>,
    }

    #[async_trait]
    impl DocumentService for StaticService {
        async fn list_documents(&self, _token: &str) -> Result<Vec<DocumentRecord>, ApiError> {
            self.documents.clone()
        }

        async fn list_interactions(
            &self,
            _token: &str,
            _document_id: &str,
        ) -> Result<Vec<InteractionRecord>, ApiError> {
            Ok(Vec::new())
        }

        async fn ask_question(
            &self,
            _token: &str,
            document_id: &str,
            question: &str,
        ) -> Result<InteractionRecord, ApiError> {
            Ok(InteractionRecord {
                id: "answer".to_string(),
                document_id: document_id.to_string(),
                query: question.to_string(),
                response: "ok".to_string(),
                created_at: Utc::now(),
            })
        }
    }

    fn document(id: &str, image: Option<String>, text: Option<&str>) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            file_name: format!("{}.png", id),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            status: Default::default(),
            extracted_text: text.map(str::to_string),
            encoded_image: image,
        }
    }

    fn session(documents: Result<Vec<DocumentRecord>, ApiError>) -> DocumentSession {
        DocumentSession::new(Arc::new(StaticService { documents }), "token")
    }

    #[tokio::test]
    async fn test_load_documents_failure_sets_flag() {
        let session = session(Err(ApiError::Application {
            status: Some(401),
            message: Some("Unauthorized".to_string()),
        }));

        assert!(session.load_documents().await.is_err());
        let state = session.snapshot();
        assert!(state.documents().is_empty());
        assert_eq!(
            state.list_status(),
            &ListStatus::Failed("Unauthorized".to_string())
        );
    }

    #[tokio::test]
    async fn test_toggle_unknown_document() {
        let session = session(Ok(vec![document("a", None, None)]));
        session.load_documents().await.unwrap();

        let result = session.toggle_expanded("zzz").await;
        assert!(matches!(result, Err(SessionError::UnknownDocument(_))));
        assert!(session.snapshot().expanded_document_id().is_none());
    }

    #[tokio::test]
    async fn test_toggle_twice_collapses() {
        let session = session(Ok(vec![document("a", None, None)]));
        session.load_documents().await.unwrap();

        assert_eq!(
            session.toggle_expanded("a").await.unwrap(),
            ToggleOutcome::Expanded(LoadOutcome::Loaded(0))
        );
        assert_eq!(session.snapshot().expanded_document_id(), Some("a"));

        assert_eq!(
            session.toggle_expanded("a").await.unwrap(),
            ToggleOutcome::Collapsed
        );
        assert!(session.snapshot().thread().is_none());
    }

    #[tokio::test]
    async fn test_submit_requires_expanded_document() {
        let session = session(Ok(vec![document("a", None, None)]));
        session.load_documents().await.unwrap();

        let result = session.submit_question("a", "hello").await;
        assert!(matches!(result, Err(SessionError::NotExpanded(_))));
    }

    #[tokio::test]
    async fn test_set_draft() {
        let session = session(Ok(vec![document("a", None, None)]));
        session.load_documents().await.unwrap();
        session.toggle_expanded("a").await.unwrap();

        session.set_draft("a", "half typed").unwrap();
        assert_eq!(session.snapshot().thread().unwrap().draft(), "half typed");
        assert!(session.set_draft("b", "x").is_err());
    }

    #[tokio::test]
    async fn test_prepare_export_with_image_and_text() {
        let image = encode_data_url(&[1, 2, 3, 4], "image/png");
        let session = session(Ok(vec![document("scan", Some(image), Some("hello"))]));
        session.load_documents().await.unwrap();

        let archive = session.prepare_export("scan").unwrap();
        assert_eq!(archive.file_name, "scan.zip");
        assert!(session.snapshot().export_error().is_none());
    }

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    #[tokio::test]
    async fn test_export_keeps_original_entry_name() {
        let image = encode_data_url(&[1, 2, 3, 4], "image/png");
        let mut odd = document("odd", Some(image.clone()), Some("hello"));
        odd.file_name = "scan:1.png".to_string();
        let mut escaping = document("escaping", Some(image), Some("hello"));
        escaping.file_name = "../evil.png".to_string();
        let session = session(Ok(vec![odd, escaping]));
        session.load_documents().await.unwrap();

        let archive = session.prepare_export("odd").unwrap();
        let mut names = entry_names(&archive.bytes);
        names.sort();
        assert_eq!(names, vec!["scan:1.png", "scan:1.txt"]);

        let archive = session.prepare_export("escaping").unwrap();
        let mut names = entry_names(&archive.bytes);
        names.sort();
        assert_eq!(names, vec!["_evil.png", "_evil.txt"]);
    }

    #[tokio::test]
    async fn test_malformed_image_aborts_export() {
        let session = session(Ok(vec![document(
            "scan",
            Some("data:image/png;base64,@@@@".to_string()),
            Some("hello"),
        )]));
        session.load_documents().await.unwrap();
        session.toggle_expanded("scan").await.unwrap();

        let result = session.prepare_export("scan");
        assert!(matches!(result, Err(SessionError::MalformedEncoding(_))));

        let state = session.snapshot();
        assert!(state.export_error().is_some());
        assert_eq!(state.expanded_document_id(), Some("scan"));
        assert_eq!(state.documents().len(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let session = session(Ok(vec![document("a", None, None)]));
        let mut rx = session.subscribe();

        session.load_documents().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().documents().len(), 1);
    }

    #[tokio::test]
    async fn test_end_clears_shared_state() {
        let session = session(Ok(vec![document("a", None, Some("text"))]));
        session.load_documents().await.unwrap();
        session.toggle_expanded("a").await.unwrap();
        let other = session.clone();
        let mut rx = other.subscribe();
        rx.borrow_and_update();

        session.end();

        assert!(rx.has_changed().unwrap());
        let state = other.snapshot();
        assert!(state.documents().is_empty());
        assert!(state.expanded().is_none());
        assert_eq!(state.list_status(), &ListStatus::NotLoaded);
        assert!(matches!(
            other.submit_question("a", "still there?").await,
            Err(SessionError::NotExpanded(_))
        ));
    }
}
