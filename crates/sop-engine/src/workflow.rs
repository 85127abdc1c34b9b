//! Per-session SOP workflow
//!
//! A [`SopSession`] holds one user's form. [`WorkflowController`] applies
//! [`FormEvent`]s to it: editing fields, asking for an AI suggestion,
//! accepting or declining that suggestion, and generating the document.
//! The controller owns no session state, so sessions never interfere.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::date;
use crate::fields::{FieldKey, FieldSet, FieldUpdate};
use crate::render::{RenderError, RenderedDocument, TemplateSource};
use crate::suggest::{ConfigError, SuggestError, SuggestionService};

/// What happened to the latest suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Accepted,
    Declined,
}

/// AI-drafted text for the Actions field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    pub status: SuggestionStatus,
}

impl Suggestion {
    pub fn pending(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: SuggestionStatus::Pending,
        }
    }

    /// The suggestion panel is open until the user accepts or declines
    pub fn is_expanded(&self) -> bool {
        self.status == SuggestionStatus::Pending
    }
}

/// Suggestion lifecycle
///
/// `Accepted` and `Declined` describe the event that produced them; the next
/// event moves the session back to `Idle` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionPhase {
    #[default]
    Idle,
    /// Held only while the completion call is in flight. The session is
    /// locked for the whole call, so views never show it.
    AwaitingSuggestion,
    SuggestionReady,
    Accepted,
    Declined,
}

/// Document generation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentPhase {
    #[default]
    Idle,
    Validating,
    Rendered,
    ValidationFailed,
    RenderFailed,
}

/// One user's form state
#[derive(Debug, Clone, Default)]
pub struct SopSession {
    pub fields: FieldSet,
    pub suggestion: Option<Suggestion>,
    pub document: Option<RenderedDocument>,
    suggestion_phase: SuggestionPhase,
    document_phase: DocumentPhase,
}

impl SopSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields(fields: FieldSet) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    pub fn suggestion_phase(&self) -> SuggestionPhase {
        self.suggestion_phase
    }

    pub fn document_phase(&self) -> DocumentPhase {
        self.document_phase
    }

    /// Close out an accepted or declined suggestion
    fn settle_suggestion_phase(&mut self) {
        if matches!(
            self.suggestion_phase,
            SuggestionPhase::Accepted | SuggestionPhase::Declined
        ) {
            self.suggestion_phase = SuggestionPhase::Idle;
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            fields: self.fields.clone(),
            missing_required: self.fields.missing_required(),
            suggestion: self.suggestion.as_ref().map(|s| SuggestionView {
                text: s.text.clone(),
                status: s.status,
                expanded: s.is_expanded(),
            }),
            suggestion_phase: self.suggestion_phase,
            document: self.document.as_ref().map(|d| DownloadView {
                filename: d.filename.clone(),
                mime_type: d.mime_type().to_string(),
                size: d.size(),
            }),
            document_phase: self.document_phase,
        }
    }
}

/// Serializable snapshot of a session for the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub fields: FieldSet,
    pub missing_required: Vec<FieldKey>,
    pub suggestion: Option<SuggestionView>,
    pub suggestion_phase: SuggestionPhase,
    pub document: Option<DownloadView>,
    pub document_phase: DocumentPhase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionView {
    pub text: String,
    pub status: SuggestionStatus,
    pub expanded: bool,
}

/// Describes the generated file without carrying its bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadView {
    pub filename: String,
    pub mime_type: String,
    pub size: usize,
}

/// User actions on the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    EditFields(FieldUpdate),
    RequestSuggestion,
    AcceptSuggestion,
    DeclineSuggestion,
    GenerateDocument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
}

/// Short message shown after an event succeeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }
}

/// Input problems the user can fix
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a Title first.")]
    TitleRequired,

    #[error("Please fill in required fields: {}", join_names(.0))]
    MissingFields(Vec<FieldKey>),

    #[error("Please enter the date in DD MONTH YYYY format (e.g., 02 MARCH 2025)")]
    InvalidDate,

    #[error("There is no suggestion to accept or decline.")]
    NoSuggestion,
}

fn join_names(keys: &[FieldKey]) -> String {
    keys.iter()
        .map(FieldKey::name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why an event could not be applied
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("AI suggestions are unavailable: {0}")]
    Configuration(#[from] ConfigError),

    #[error("API call failed: {0}")]
    Upstream(#[from] SuggestError),

    #[error("Error generating document: {0}")]
    Render(#[from] RenderError),
}

impl WorkflowError {
    /// Text to show next to the form
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// Applies form events to sessions
pub struct WorkflowController {
    service: Option<Arc<dyn SuggestionService>>,
    template: TemplateSource,
}

impl WorkflowController {
    pub fn new(service: Option<Arc<dyn SuggestionService>>, template: TemplateSource) -> Self {
        Self { service, template }
    }

    pub fn has_suggestion_service(&self) -> bool {
        self.service.is_some()
    }

    pub fn template(&self) -> &TemplateSource {
        &self.template
    }

    pub async fn handle(
        &self,
        session: &mut SopSession,
        event: FormEvent,
    ) -> Result<Notice, WorkflowError> {
        match event {
            FormEvent::EditFields(update) => {
                session.settle_suggestion_phase();
                session.fields.apply(update);
                Ok(Notice::info("Fields updated."))
            }
            FormEvent::RequestSuggestion => self.request_suggestion(session).await,
            FormEvent::AcceptSuggestion => {
                let suggestion = session
                    .suggestion
                    .as_mut()
                    .ok_or(ValidationError::NoSuggestion)?;
                session.fields.actions = suggestion.text.clone();
                suggestion.status = SuggestionStatus::Accepted;
                session.suggestion_phase = SuggestionPhase::Accepted;
                Ok(Notice::success("SOP updated from suggestion."))
            }
            FormEvent::DeclineSuggestion => {
                let suggestion = session
                    .suggestion
                    .as_mut()
                    .ok_or(ValidationError::NoSuggestion)?;
                suggestion.status = SuggestionStatus::Declined;
                session.suggestion_phase = SuggestionPhase::Declined;
                Ok(Notice::info("SOP suggestion declined."))
            }
            FormEvent::GenerateDocument => {
                session.settle_suggestion_phase();
                self.generate_document(session)
            }
        }
    }

    async fn request_suggestion(&self, session: &mut SopSession) -> Result<Notice, WorkflowError> {
        if session.fields.title.trim().is_empty() {
            return Err(ValidationError::TitleRequired.into());
        }
        let service = self.service.as_ref().ok_or(ConfigError::MissingApiKey)?;

        session.settle_suggestion_phase();
        let previous = session.suggestion_phase;
        session.suggestion_phase = SuggestionPhase::AwaitingSuggestion;

        let result = service
            .suggest(&session.fields.title, &session.fields.actions)
            .await;
        match result {
            Ok(text) => {
                info!("Received SOP suggestion ({} chars)", text.len());
                session.suggestion = Some(Suggestion::pending(text));
                session.suggestion_phase = SuggestionPhase::SuggestionReady;
                Ok(Notice::success("SOP suggestion ready."))
            }
            Err(e) => {
                warn!("SOP suggestion failed: {}", e);
                session.suggestion_phase = previous;
                Err(e.into())
            }
        }
    }

    fn generate_document(&self, session: &mut SopSession) -> Result<Notice, WorkflowError> {
        session.document = None;
        session.document_phase = DocumentPhase::Validating;

        let missing = session.fields.missing_required();
        if !missing.is_empty() {
            session.document_phase = DocumentPhase::ValidationFailed;
            return Err(ValidationError::MissingFields(missing).into());
        }
        if date::parse_sop_date(&session.fields.date).is_err() {
            session.document_phase = DocumentPhase::ValidationFailed;
            return Err(ValidationError::InvalidDate.into());
        }

        match self.template.render(&session.fields) {
            Ok(document) => {
                let notice = Notice::success(format!("Generated {}", document.filename));
                session.document = Some(document);
                session.document_phase = DocumentPhase::Rendered;
                Ok(notice)
            }
            Err(e) => {
                warn!("Rendering {} failed: {}", self.template.describe(), e);
                session.document_phase = DocumentPhase::RenderFailed;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::test_support::docx_with_body;
    use crate::docx::DocxPackage;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BODY: &str = concat!(
        r#"<w:p><w:r><w:t>{{TITLE}} ({{CHECKLIST.NO}})</w:t></w:r></w:p>"#,
        r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>{{ACTIONS}}</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
    );

    enum Reply {
        Text(&'static str),
        Fail(u16),
    }

    struct StubService {
        reply: Reply,
        calls: AtomicUsize,
    }

    impl StubService {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SuggestionService for StubService {
        async fn suggest(&self, _title: &str, _actions: &str) -> Result<String, SuggestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Text(text) => Ok(text.to_string()),
                Reply::Fail(status) => Err(SuggestError::Status {
                    status: *status,
                    body: "unavailable".to_string(),
                }),
            }
        }
    }

    fn template() -> TemplateSource {
        TemplateSource::Bytes(Arc::from(docx_with_body(BODY)))
    }

    fn controller(service: Option<Arc<StubService>>) -> WorkflowController {
        let service = service.map(|s| s as Arc<dyn SuggestionService>);
        WorkflowController::new(service, template())
    }

    fn filled_session() -> SopSession {
        let mut fields = FieldSet::with_date("02 MARCH 2025");
        fields.title = "Radio Check".to_string();
        fields.checklist_no = "100.001".to_string();
        fields.actions = "Turn on radio.".to_string();
        SopSession::with_fields(fields)
    }

    #[tokio::test]
    async fn test_suggestion_requires_title() {
        let stub = StubService::new(Reply::Text("A. B. C."));
        let controller = controller(Some(stub.clone()));
        let mut session = SopSession::new();

        let err = controller
            .handle(&mut session, FormEvent::RequestSuggestion)
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Please enter a Title first.");
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
        assert!(session.suggestion.is_none());
        assert_eq!(session.suggestion_phase(), SuggestionPhase::Idle);
    }

    #[tokio::test]
    async fn test_whitespace_title_counts_as_missing() {
        let controller = controller(Some(StubService::new(Reply::Text("x"))));
        let mut session = SopSession::new();
        session.fields.title = "   ".to_string();
        let err = controller
            .handle(&mut session, FormEvent::RequestSuggestion)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Validation(ValidationError::TitleRequired)
        ));
    }

    #[tokio::test]
    async fn test_accepting_suggestion_replaces_actions() {
        let controller = controller(Some(StubService::new(Reply::Text("A. B. C."))));
        let mut session = filled_session();

        controller
            .handle(&mut session, FormEvent::RequestSuggestion)
            .await
            .unwrap();
        let view = session.view();
        let suggestion = view.suggestion.unwrap();
        assert!(suggestion.expanded);
        assert_eq!(suggestion.status, SuggestionStatus::Pending);
        assert_eq!(view.suggestion_phase, SuggestionPhase::SuggestionReady);
        assert_eq!(session.fields.actions, "Turn on radio.");

        let notice = controller
            .handle(&mut session, FormEvent::AcceptSuggestion)
            .await
            .unwrap();
        assert_eq!(notice.message, "SOP updated from suggestion.");
        assert_eq!(session.fields.actions, "A. B. C.");

        let suggestion = session.view().suggestion.unwrap();
        assert!(!suggestion.expanded);
        assert_eq!(suggestion.text, "A. B. C.");
        assert_eq!(session.suggestion_phase(), SuggestionPhase::Accepted);
    }

    #[tokio::test]
    async fn test_declining_keeps_actions() {
        let controller = controller(Some(StubService::new(Reply::Text("A. B. C."))));
        let mut session = filled_session();

        controller
            .handle(&mut session, FormEvent::RequestSuggestion)
            .await
            .unwrap();
        let notice = controller
            .handle(&mut session, FormEvent::DeclineSuggestion)
            .await
            .unwrap();

        assert_eq!(notice.message, "SOP suggestion declined.");
        assert_eq!(session.fields.actions, "Turn on radio.");
        let suggestion = session.view().suggestion.unwrap();
        assert!(!suggestion.expanded);
        assert_eq!(suggestion.status, SuggestionStatus::Declined);
        assert_eq!(session.suggestion_phase(), SuggestionPhase::Declined);
    }

    #[tokio::test]
    async fn test_next_event_after_accept_or_decline_returns_to_idle() {
        let controller = controller(Some(StubService::new(Reply::Text("A. B. C."))));
        for (answer, after) in [
            (FormEvent::AcceptSuggestion, SuggestionPhase::Accepted),
            (FormEvent::DeclineSuggestion, SuggestionPhase::Declined),
        ] {
            let mut session = filled_session();
            controller
                .handle(&mut session, FormEvent::RequestSuggestion)
                .await
                .unwrap();
            controller.handle(&mut session, answer).await.unwrap();
            assert_eq!(session.suggestion_phase(), after);

            controller
                .handle(&mut session, FormEvent::EditFields(FieldUpdate::default()))
                .await
                .unwrap();
            assert_eq!(session.suggestion_phase(), SuggestionPhase::Idle);
            assert!(!session.view().suggestion.unwrap().expanded);
        }

        let mut session = filled_session();
        controller
            .handle(&mut session, FormEvent::RequestSuggestion)
            .await
            .unwrap();
        controller
            .handle(&mut session, FormEvent::AcceptSuggestion)
            .await
            .unwrap();
        controller
            .handle(&mut session, FormEvent::GenerateDocument)
            .await
            .unwrap();
        assert_eq!(session.suggestion_phase(), SuggestionPhase::Idle);
    }

    #[tokio::test]
    async fn test_new_suggestion_reopens_panel() {
        let controller = controller(Some(StubService::new(Reply::Text("again"))));
        let mut session = filled_session();
        session.suggestion = Some(Suggestion {
            text: "old".to_string(),
            status: SuggestionStatus::Declined,
        });

        controller
            .handle(&mut session, FormEvent::RequestSuggestion)
            .await
            .unwrap();
        assert_eq!(session.suggestion, Some(Suggestion::pending("again")));
        assert!(session.view().suggestion.unwrap().expanded);
    }

    #[tokio::test]
    async fn test_accept_without_suggestion_is_rejected() {
        let controller = controller(None);
        let mut session = filled_session();
        for event in [FormEvent::AcceptSuggestion, FormEvent::DeclineSuggestion] {
            let err = controller.handle(&mut session, event).await.unwrap_err();
            assert!(matches!(
                err,
                WorkflowError::Validation(ValidationError::NoSuggestion)
            ));
        }
        assert_eq!(session.fields.actions, "Turn on radio.");
    }

    #[tokio::test]
    async fn test_upstream_failure_leaves_state_untouched() {
        let controller = controller(Some(StubService::new(Reply::Fail(503))));
        let mut session = filled_session();
        session.suggestion = Some(Suggestion::pending("earlier"));
        let before = session.view();

        let err = controller
            .handle(&mut session, FormEvent::RequestSuggestion)
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Upstream(_)));
        assert!(err.user_message().starts_with("API call failed: "));
        assert_eq!(session.view(), before);
    }

    #[tokio::test]
    async fn test_missing_service_is_a_configuration_error() {
        let controller = controller(None);
        let mut session = filled_session();
        let err = controller
            .handle(&mut session, FormEvent::RequestSuggestion)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Configuration(_)));
        assert!(!controller.has_suggestion_service());
    }

    #[tokio::test]
    async fn test_missing_required_fields_block_generation() {
        let controller = controller(None);
        let mut session = filled_session();
        session.fields.checklist_no = String::new();

        let err = controller
            .handle(&mut session, FormEvent::GenerateDocument)
            .await
            .unwrap_err();

        assert_eq!(
            err.user_message(),
            "Please fill in required fields: checklist_no"
        );
        assert!(session.document.is_none());
        assert_eq!(session.document_phase(), DocumentPhase::ValidationFailed);
    }

    #[tokio::test]
    async fn test_missing_fields_are_listed_in_order() {
        let controller = controller(None);
        let mut session = SopSession::with_fields(FieldSet::with_date(""));
        let err = controller
            .handle(&mut session, FormEvent::GenerateDocument)
            .await
            .unwrap_err();
        assert_eq!(
            err.user_message(),
            "Please fill in required fields: title, checklist_no, date, actions"
        );
    }

    #[tokio::test]
    async fn test_invalid_date_blocks_generation() {
        let controller = controller(None);
        let mut session = filled_session();
        session.fields.date = "2025-03-02".to_string();

        let err = controller
            .handle(&mut session, FormEvent::GenerateDocument)
            .await
            .unwrap_err();

        assert_eq!(
            err.user_message(),
            "Please enter the date in DD MONTH YYYY format (e.g., 02 MARCH 2025)"
        );
        assert!(session.document.is_none());
    }

    #[tokio::test]
    async fn test_generate_document() {
        let controller = controller(None);
        let mut session = filled_session();

        let notice = controller
            .handle(&mut session, FormEvent::GenerateDocument)
            .await
            .unwrap();
        assert_eq!(notice.message, "Generated 100.001 - Radio Check.docx");
        assert_eq!(session.document_phase(), DocumentPhase::Rendered);

        let document = session.document.as_ref().unwrap();
        let text = DocxPackage::from_bytes(&document.bytes)
            .unwrap()
            .document()
            .unwrap()
            .text();
        assert_eq!(text, "Radio Check (100.001)\nTurn on radio.");

        let download = session.view().document.unwrap();
        assert_eq!(download.filename, "100.001 - Radio Check.docx");
        assert_eq!(download.size, document.bytes.len());
    }

    #[tokio::test]
    async fn test_failed_generation_drops_previous_document() {
        let controller = controller(None);
        let mut session = filled_session();
        controller
            .handle(&mut session, FormEvent::GenerateDocument)
            .await
            .unwrap();
        assert!(session.document.is_some());

        session.fields.title = String::new();
        controller
            .handle(&mut session, FormEvent::GenerateDocument)
            .await
            .unwrap_err();
        assert!(session.document.is_none());
        assert!(session.view().document.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_template_is_a_render_error() {
        let controller = WorkflowController::new(
            None,
            TemplateSource::File(PathBuf::from("/nonexistent/TEMPLATE.docx")),
        );
        let mut session = filled_session();
        let err = controller
            .handle(&mut session, FormEvent::GenerateDocument)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Render(_)));
        assert!(err.user_message().starts_with("Error generating document: "));
        assert_eq!(session.document_phase(), DocumentPhase::RenderFailed);
    }

    #[tokio::test]
    async fn test_edit_fields_applies_update() {
        let controller = controller(None);
        let mut session = filled_session();
        controller
            .handle(
                &mut session,
                FormEvent::EditFields(FieldUpdate::single(FieldKey::Position, "Operator")),
            )
            .await
            .unwrap();
        assert_eq!(session.fields.position, "Operator");
        assert_eq!(session.fields.title, "Radio Check");
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let controller = controller(Some(StubService::new(Reply::Text("shared"))));
        let mut first = filled_session();
        let second = filled_session();

        controller
            .handle(&mut first, FormEvent::RequestSuggestion)
            .await
            .unwrap();
        controller
            .handle(&mut first, FormEvent::AcceptSuggestion)
            .await
            .unwrap();

        assert_eq!(first.fields.actions, "shared");
        assert_eq!(second.fields.actions, "Turn on radio.");
        assert!(second.suggestion.is_none());
    }
}
