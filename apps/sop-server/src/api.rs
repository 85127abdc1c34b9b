//! API handlers for the SOP server
//!
//! Provides REST endpoints for:
//! - Form metadata
//! - Session lifecycle
//! - Field edits and AI suggestions
//! - Document generation and download

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use sop_engine::date::{DATE_EXAMPLE, DATE_FORMAT_HINT};
use sop_engine::{FieldKey, FieldUpdate, FormEvent, Notice, SessionView};

use crate::error::ServerError;
use crate::state::{AppState, SessionHandle};

/// Shown above the form
pub const CLASSIFICATION_BANNER: &str = "DO NOT INPUT ANY CLASSIFIED INFORMATION";

/// Sidebar help shown next to the form
#[derive(Serialize)]
pub struct FormHelp {
    pub intro: &'static str,
    pub tip: &'static str,
    pub example_title: &'static str,
    pub example_actions: &'static str,
    pub note: &'static str,
}

pub const FORM_HELP: FormHelp = FormHelp {
    intro: "Use this tool to speed up your SOP creation process. You can use the AI to help \
            you create the SOP, and then download the final document.",
    tip: "Provide a clear, descriptive title that outlines the specific procedure. In the \
          actions section, include detailed steps and note any unique, organization-specific \
          practices. This extra detail helps the AI generate an accurate and tailored SOP.",
    example_title: "Update CISCO 9300 Series Switch Firmware",
    example_actions: "Download the latest firmware from {Airforce Approved URL} and update via USB.",
    note: "Outside of the Airforce, using TFTP, a web interface, etc. would be the norm.",
};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub sessions: usize,
    pub suggestions_enabled: bool,
}

/// Handler: GET /health
pub async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "sop-server",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.sessions.len().await,
        suggestions_enabled: state.workflow.has_suggestion_service(),
    })
}

/// One input on the form
#[derive(Serialize)]
pub struct FormField {
    pub key: FieldKey,
    pub placeholder: &'static str,
    pub label: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

/// Form layout response
#[derive(Serialize)]
pub struct FormResponse {
    pub success: bool,
    pub banner: &'static str,
    pub help: FormHelp,
    pub date_format: &'static str,
    pub date_example: &'static str,
    pub fields: Vec<FormField>,
}

/// Handler: GET /api/form
pub async fn handle_form() -> Json<FormResponse> {
    let fields = FieldKey::ALL
        .into_iter()
        .map(|key| FormField {
            key,
            placeholder: key.placeholder_key(),
            label: key.label(),
            required: key.is_required(),
            hint: key.hint(),
        })
        .collect();

    Json(FormResponse {
        success: true,
        banner: CLASSIFICATION_BANNER,
        help: FORM_HELP,
        date_format: DATE_FORMAT_HINT,
        date_example: DATE_EXAMPLE,
        fields,
    })
}

/// Session creation response
#[derive(Serialize)]
pub struct SessionCreatedResponse {
    pub success: bool,
    pub id: Uuid,
    pub view: SessionView,
}

/// Session view response
#[derive(Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub view: SessionView,
}

/// Response to a form event
#[derive(Serialize)]
pub struct EventResponse {
    pub success: bool,
    pub notice: Notice,
    pub view: SessionView,
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub success: bool,
}

/// Handler: POST /api/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionCreatedResponse>) {
    let (id, session) = state.sessions.create().await;
    let view = session.lock().await.view();
    (
        StatusCode::CREATED,
        Json(SessionCreatedResponse {
            success: true,
            id,
            view,
        }),
    )
}

/// Handler: GET /api/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ServerError> {
    let session = lookup(&state, &id).await?;
    let view = session.lock().await.view();
    Ok(Json(SessionResponse {
        success: true,
        view,
    }))
}

/// Handler: DELETE /api/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ServerError> {
    let uuid = parse_id(&id)?;
    if state.sessions.remove(&uuid).await {
        Ok(Json(DeletedResponse { success: true }))
    } else {
        Err(ServerError::SessionNotFound(id))
    }
}

/// Handler: PATCH /api/sessions/:id/fields
pub async fn handle_update_fields(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<FieldUpdate>, JsonRejection>,
) -> Result<Json<EventResponse>, ServerError> {
    let Json(update) = body?;
    apply_event(&state, &id, FormEvent::EditFields(update)).await
}

/// Handler: POST /api/sessions/:id/suggestion
pub async fn handle_request_suggestion(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EventResponse>, ServerError> {
    apply_event(&state, &id, FormEvent::RequestSuggestion).await
}

/// Handler: POST /api/sessions/:id/suggestion/accept
pub async fn handle_accept_suggestion(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EventResponse>, ServerError> {
    apply_event(&state, &id, FormEvent::AcceptSuggestion).await
}

/// Handler: POST /api/sessions/:id/suggestion/decline
pub async fn handle_decline_suggestion(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EventResponse>, ServerError> {
    apply_event(&state, &id, FormEvent::DeclineSuggestion).await
}

/// Handler: POST /api/sessions/:id/document
pub async fn handle_generate_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EventResponse>, ServerError> {
    apply_event(&state, &id, FormEvent::GenerateDocument).await
}

/// Handler: GET /api/sessions/:id/document
pub async fn handle_download_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServerError> {
    let session = lookup(&state, &id).await?;
    let session = session.lock().await;
    let document = session
        .document
        .as_ref()
        .ok_or(ServerError::DocumentNotFound)?;

    info!("Serving {} ({} bytes)", document.filename, document.size());

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(document.mime_type()),
            ),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&document.filename),
            ),
        ],
        document.bytes.clone(),
    )
        .into_response())
}

/// Lock the session and run one workflow event against it
async fn apply_event(
    state: &AppState,
    id: &str,
    event: FormEvent,
) -> Result<Json<EventResponse>, ServerError> {
    let session = lookup(state, id).await?;
    let mut session = session.lock().await;
    debug!("Session {}: {:?}", id, event);

    let notice = state.workflow.handle(&mut session, event).await?;
    Ok(Json(EventResponse {
        success: true,
        notice,
        view: session.view(),
    }))
}

async fn lookup(state: &AppState, id: &str) -> Result<SessionHandle, ServerError> {
    let uuid = parse_id(id)?;
    state
        .sessions
        .get(&uuid)
        .await
        .ok_or_else(|| ServerError::SessionNotFound(id.to_string()))
}

fn parse_id(id: &str) -> Result<Uuid, ServerError> {
    Uuid::parse_str(id).map_err(|_| ServerError::SessionNotFound(id.to_string()))
}

/// `attachment` disposition with an ASCII fallback name and an RFC 5987
/// `filename*` carrying the exact UTF-8 name
pub(crate) fn content_disposition(filename: &str) -> HeaderValue {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();

    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect();

    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_content_disposition_plain_name() {
        let value = content_disposition("100.001 - Radio Check.docx");
        assert_eq!(
            value.to_str().unwrap(),
            "attachment; filename=\"100.001 - Radio Check.docx\"; filename*=UTF-8''100.001%20-%20Radio%20Check.docx"
        );
    }

    #[test]
    fn test_content_disposition_escapes_quotes_and_unicode() {
        let value = content_disposition("7 - \"Café\".docx");
        let text = value.to_str().unwrap();
        assert!(text.starts_with("attachment; filename=\"7 - _Caf__.docx\""));
        assert!(text.ends_with("filename*=UTF-8''7%20-%20%22Caf%C3%A9%22.docx"));
    }
}
