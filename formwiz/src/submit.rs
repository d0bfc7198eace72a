//! Timeout-guarded submission.
//!
//! Both suspension points of the engine live here: [`fetch_schema`] while
//! loading and [`submit`] for every accepted step. Each one races the
//! transport against a timer. The losing future is dropped, so a response
//! arriving after the deadline is never observed.

use std::{future::Future, time::Duration};

use serde::Serialize;
use serde_json::Value;
use tokio::time::sleep;

use crate::{
    aggregate::StructuredRecord,
    data::{FieldSchema, schema::parse_schema},
    error::{TransportError, WizardError},
};

/// Submission timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(8000);

/// Result message of a timed out submission.
pub const TIMEOUT_MESSAGE: &str = "Timed out.";

/// Notice shown after a timed out submission.
pub const TIMEOUT_NOTICE: &str =
    "Took too long to get a response from the server. Please try again.";

/// Notice shown after a rejected or failed submission.
pub const FAILURE_NOTICE: &str = "There was an error submitting the form data.";

/// Message for a submission without an endpoint.
pub const MISSING_ENDPOINT_MESSAGE: &str = "A URL to send the form data to must be set.";

/// A response received by a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    /// HTTP-style status code.
    pub status: u16,
    /// Decoded JSON body, if there was one.
    pub data: Option<Value>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Deadline-bounded JSON exchange with a remote endpoint.
///
/// `timeout` is a hint for implementations that can enforce it themselves;
/// callers in this crate always race the returned future against their own
/// timer as well.
pub trait Transport: Send + Sync {
    /// Fetches a JSON document.
    fn get(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;

    /// Posts a JSON body.
    fn post(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// How a submission attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubmissionKind {
    /// The endpoint answered with a success status.
    Accepted,
    /// The endpoint answered with a non-success status.
    Rejected,
    /// The timer won the race.
    TimedOut,
    /// The transport failed before a response was received.
    Unreachable,
    /// No endpoint was configured.
    NoEndpoint,
}

/// Outcome of one submission attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionResult {
    pub ok: bool,
    pub status: Option<u16>,
    pub message: String,
    /// Decoded response body of an accepted submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub kind: SubmissionKind,
}

/// A transient message for the user about a submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub ok: bool,
    pub text: String,
}

impl SubmissionResult {
    fn failed(kind: SubmissionKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            status,
            message: message.into(),
            data: None,
            kind,
        }
    }

    /// The notice to show for this result.
    ///
    /// An accepted submission only yields a notice when a success message
    /// is configured.
    pub fn notice(&self, success_message: Option<&str>) -> Option<Notice> {
        let text = match self.kind {
            SubmissionKind::Accepted => success_message?,
            SubmissionKind::TimedOut => TIMEOUT_NOTICE,
            SubmissionKind::Rejected | SubmissionKind::Unreachable => FAILURE_NOTICE,
            SubmissionKind::NoEndpoint => MISSING_ENDPOINT_MESSAGE,
        };
        Some(Notice {
            ok: self.ok,
            text: text.to_string(),
        })
    }
}

/// Posts a step record to `endpoint`, giving up after `timeout`.
///
/// Never fails: every outcome, including timeouts and transport errors,
/// is reported as a [`SubmissionResult`].
pub async fn submit<T: Transport>(
    transport: &T,
    endpoint: &str,
    record: &StructuredRecord,
    timeout: Duration,
) -> SubmissionResult {
    if endpoint.trim().is_empty() {
        warn!("Submission skipped: no endpoint configured");
        return SubmissionResult::failed(SubmissionKind::NoEndpoint, None, MISSING_ENDPOINT_MESSAGE);
    }

    let body = record.to_json();
    debug!("Posting {} field(s) to {endpoint}", record.len());

    let response = tokio::select! {
        _ = sleep(timeout) => None,
        res = transport.post(endpoint, &body, timeout) => Some(res),
    };

    let result = match response {
        None => SubmissionResult::failed(SubmissionKind::TimedOut, None, TIMEOUT_MESSAGE),
        Some(Err(e)) => SubmissionResult::failed(SubmissionKind::Unreachable, None, e.to_string()),
        Some(Ok(resp)) if !resp.is_success() => SubmissionResult::failed(
            SubmissionKind::Rejected,
            Some(resp.status),
            format!("Server responded with status {}.", resp.status),
        ),
        Some(Ok(resp)) => SubmissionResult {
            ok: true,
            status: Some(resp.status),
            message: "Submitted.".to_string(),
            data: resp.data,
            kind: SubmissionKind::Accepted,
        },
    };

    if !result.ok {
        warn!("Submission to {endpoint} failed: {}", result.message);
    }
    result
}

/// Fetches and parses the schema source.
///
/// # Errors
///
/// A timeout, a transport failure, a non-success status or a missing body
/// give [`WizardError::Load`]; a document that is not a usable schema gives
/// [`WizardError::Schema`].
pub async fn fetch_schema<T: Transport>(
    transport: &T,
    url: &str,
    timeout: Duration,
) -> Result<Vec<FieldSchema>, WizardError> {
    info!("Loading form schema from {url}");

    let response = tokio::select! {
        _ = sleep(timeout) => {
            return Err(WizardError::Load(format!(
                "no response from {url} within {} ms",
                timeout.as_millis()
            )));
        }
        res = transport.get(url, timeout) => res.map_err(|e| WizardError::Load(e.to_string()))?,
    };

    if !response.is_success() {
        return Err(WizardError::Load(format!(
            "{url} responded with status {}",
            response.status
        )));
    }
    let document = response
        .data
        .ok_or_else(|| WizardError::Load(format!("{url} returned an empty body")))?;

    let schema = parse_schema(document)?;
    debug!("Loaded {} field definition(s)", schema.len());
    Ok(schema)
}
