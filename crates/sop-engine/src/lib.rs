//! SOP document engine
//!
//! This crate provides everything behind the SOP Creator form, including:
//! - The fixed SOP field model and date format
//! - `{{KEY}}` placeholder substitution over DOCX paragraphs and table cells
//! - Template rendering to a downloadable `.docx`
//! - The AI suggestion client
//! - The per-session workflow (suggest, accept/decline, generate)
//!
//! Nothing here depends on a particular UI runtime; `apps/sop-server` is one
//! adapter that drives [`workflow::WorkflowController`] over HTTP.

pub mod date;
pub mod docx;
pub mod fields;
pub mod render;
pub mod substitution;
pub mod suggest;
pub mod workflow;

pub use fields::{FieldKey, FieldSet, FieldUpdate};
pub use render::{render, RenderError, RenderedDocument, TemplateSource};
pub use suggest::{CompletionClient, SuggestConfig, SuggestError, SuggestionService};
pub use workflow::{FormEvent, Notice, SessionView, SopSession, WorkflowController, WorkflowError};
