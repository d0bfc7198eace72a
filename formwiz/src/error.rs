//! Error types shared across the engine.
//!
//! User-validation failures and failed submissions are reported as data
//! ([`crate::validate::CompletenessReport`], [`crate::submit::SubmissionResult`]);
//! the types here cover failures that end a step or the whole run.

pub use crate::data::schema::SchemaError;

/// Captured values that do not fit the field tree they were captured for.
///
/// This is a contract violation between the engine and the rendering
/// target, not a user error.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// A key whose base name is not a field of the step.
    #[error("captured key `{key}` has no matching field in the step")]
    UnknownField { key: String },
    /// A key using the separator without the `parent__child__order` shape.
    #[error("captured key `{key}` is not a valid addon key")]
    MalformedKey { key: String },
    /// A composite key whose parent is not an addon field.
    #[error("captured key `{key}` addresses `{parent}`, which is not an addon field")]
    NotAnAddon { key: String, parent: String },
    /// An addon field captured with something other than a group list.
    #[error("captured value of addon `{name}` is not a group list")]
    ShapeMismatch { name: String },
}

/// Failures of a transport before any response was received.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or completed.
    #[error("request failed: {0}")]
    Request(String),
    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// Local I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure of a rendering target to paint a field tree.
#[derive(Debug, thiserror::Error)]
#[error("render failed: {0}")]
pub struct RenderError(pub String);

/// Terminal failure of a wizard run.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    /// The configuration handed to the engine is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The schema source could not be fetched.
    #[error("failed to load schema: {0}")]
    Load(String),
    /// Schema integrity failure.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Captured values do not match the field tree.
    #[error("internal contract violation: {0}")]
    Contract(#[from] AggregateError),
    /// The rendering target failed.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// The rendering target stopped reporting events before a submission succeeded.
    #[error("step {step} was abandoned before it was submitted")]
    Aborted { step: u32 },
    /// A failed submission configured as a hard failure.
    #[error("submission of step {step} failed: {message}")]
    Submission { step: u32, message: String },
}

impl WizardError {
    /// Whether the error indicates an internal defect rather than bad input.
    pub fn is_defect(&self) -> bool {
        matches!(self, WizardError::Contract(_))
    }
}
