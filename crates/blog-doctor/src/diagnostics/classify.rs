//! Failure classification
//!
//! Maps a `ClientError` onto one of the failure kinds, first by structured
//! codes and HTTP status, then by message patterns. Both passes apply the
//! same priority: policy, rejected credentials, missing object, timeout,
//! connectivity.

use super::check::{CheckResult, Component};
use crate::client::{ClientError, ClientErrorKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Failure kinds a check step can resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Step exceeded its deadline
    TransientTimeout,
    /// Rejected by a permission or row-level security policy
    PolicyDenied,
    /// API key or access token rejected
    InvalidCredentials,
    /// Required table or function does not exist
    StructuralMissing,
    /// Backend unreachable
    ConnectivityFailure,
    /// Anything else
    Unclassified,
    /// Run was cancelled by the caller
    Cancelled,
}

impl FailureKind {
    /// Status a result of this kind carries
    pub fn status(&self) -> super::CheckStatus {
        use super::CheckStatus;
        match self {
            FailureKind::TransientTimeout | FailureKind::PolicyDenied | FailureKind::Cancelled => {
                CheckStatus::Warning
            }
            FailureKind::InvalidCredentials
            | FailureKind::StructuralMissing
            | FailureKind::ConnectivityFailure
            | FailureKind::Unclassified => CheckStatus::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::TransientTimeout => "transient_timeout",
            FailureKind::PolicyDenied => "policy_denied",
            FailureKind::InvalidCredentials => "invalid_credentials",
            FailureKind::StructuralMissing => "structural_missing",
            FailureKind::ConnectivityFailure => "connectivity_failure",
            FailureKind::Unclassified => "unclassified",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SQLSTATE / PostgREST codes for permission failures
const POLICY_CODES: &[&str] = &["42501", "PGRST301", "PGRST302", "28000"];
/// SQLSTATE / PostgREST codes for missing objects
const MISSING_CODES: &[&str] = &["42P01", "42883", "3F000", "PGRST202", "PGRST205"];

static POLICY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)row[- ]level security|permission denied|violates .*policy|\bpolicy\b|not authori[sz]ed|insufficient privilege",
    )
    .expect("valid policy pattern")
});

static CREDENTIALS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)invalid api key|no api key|invalid jwt|jwt expired")
        .expect("valid credentials pattern")
});

static MISSING_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)does not exist|could not find the (table|function)|relation "?[\w.]+"? does not exist|not found in the schema cache"#,
    )
    .expect("valid missing-object pattern")
});

static TIMEOUT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)timed out|timeout").expect("valid timeout pattern"));

static NETWORK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)failed to fetch|network ?error|connection (refused|reset)|error sending request|dns error|err_blocked_by_client|load failed",
    )
    .expect("valid network pattern")
});

fn classify_structured(error: &ClientError) -> Option<FailureKind> {
    let code = error.code();
    if code.is_some_and(|c| POLICY_CODES.contains(&c)) || error.status == Some(403) {
        return Some(FailureKind::PolicyDenied);
    }
    // 401 without a policy code: the gateway refused the key itself
    if error.status == Some(401) {
        return Some(FailureKind::InvalidCredentials);
    }
    if code.is_some_and(|c| MISSING_CODES.contains(&c)) {
        return Some(FailureKind::StructuralMissing);
    }
    match error.kind {
        ClientErrorKind::Timeout => Some(FailureKind::TransientTimeout),
        ClientErrorKind::Network => Some(FailureKind::ConnectivityFailure),
        ClientErrorKind::Api | ClientErrorKind::Decode => None,
    }
}

fn classify_message(error: &ClientError) -> Option<FailureKind> {
    let message = error.message.as_str();
    if POLICY_PATTERN.is_match(message) {
        Some(FailureKind::PolicyDenied)
    } else if CREDENTIALS_PATTERN.is_match(message) {
        Some(FailureKind::InvalidCredentials)
    } else if MISSING_PATTERN.is_match(message) {
        Some(FailureKind::StructuralMissing)
    } else if TIMEOUT_PATTERN.is_match(message) {
        Some(FailureKind::TransientTimeout)
    } else if NETWORK_PATTERN.is_match(message) {
        Some(FailureKind::ConnectivityFailure)
    } else {
        None
    }
}

/// Classify a client error
pub fn classify(error: &ClientError) -> FailureKind {
    classify_structured(error)
        .or_else(|| classify_message(error))
        .unwrap_or(FailureKind::Unclassified)
}

/// Build the result for a failed client call
pub fn failure_result(component: Component, error: &ClientError) -> CheckResult {
    let target = component.target().map(str::to_string);
    failure_result_on(component, target.as_deref(), error)
}

/// Same as [`failure_result`], naming `target` as the object the call touched
pub fn failure_result_on(
    component: Component,
    target: Option<&str>,
    error: &ClientError,
) -> CheckResult {
    let kind = classify(error);
    let message = match kind {
        FailureKind::PolicyDenied => format!(
            "Access to {} was rejected by a permission or row-level security policy; \
             review the policies on the table or run with a role that is allowed to do this",
            component
        ),
        FailureKind::InvalidCredentials => format!(
            "The Supabase backend rejected the credentials used for {}; \
             check SUPABASE_ANON_KEY and SUPABASE_ACCESS_TOKEN",
            component
        ),
        FailureKind::StructuralMissing => match target {
            Some(target) => format!(
                "{} does not exist in the database; create it before using the blog feature",
                target
            ),
            None => format!("A required database object for {} does not exist", component),
        },
        FailureKind::TransientTimeout => format!(
            "{} timed out at the transport level; this is usually transient, re-run the diagnostic",
            component
        ),
        FailureKind::ConnectivityFailure => format!(
            "Could not reach the Supabase backend while checking {}; network access is required, \
             check SUPABASE_URL and the anon key. Ad blockers, privacy extensions and analytics \
             scripts are known to block these requests, rule them out before suspecting the server",
            component
        ),
        FailureKind::Unclassified | FailureKind::Cancelled => {
            format!("Unexpected error while checking {}", component)
        }
    };

    let mut result = CheckResult::error(component, message)
        .with_kind(kind)
        .with_detail("raw_message", error.message.clone());
    result.status = kind.status();
    if let Some(code) = error.code() {
        result = result.with_detail("code", code);
    }
    if let Some(status) = error.status {
        result = result.with_detail("http_status", status);
    }
    if let Some(hint) = &error.hint {
        result = result.with_detail("hint", hint.clone());
    }
    result.with_cause(error.clone())
}

/// Result for a step that exceeded its deadline
pub fn timeout_result(component: Component, limit: Duration) -> CheckResult {
    CheckResult::warning(
        component.clone(),
        format!(
            "{} did not answer within {} ms; timeouts are usually transient, re-run the diagnostic",
            component,
            limit.as_millis()
        ),
    )
    .with_kind(FailureKind::TransientTimeout)
    .with_detail("timeout_ms", limit)
}

/// Result for a step interrupted by cancellation
pub fn cancelled_result(component: Component) -> CheckResult {
    CheckResult::warning(
        component.clone(),
        format!("{} was interrupted because the run was cancelled", component),
    )
    .with_kind(FailureKind::Cancelled)
}

/// Result for a step never started because the run was cancelled
pub fn skipped_result(component: Component) -> CheckResult {
    CheckResult::warning(
        component.clone(),
        format!("{} skipped: run cancelled", component),
    )
    .with_kind(FailureKind::Cancelled)
    .with_detail("skipped", true)
}
