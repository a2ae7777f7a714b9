//! Business errors embedded in procedure output.
//!
//! A procedure reports failure by filling a fixed field of its first line
//! instead of raising a database error. The field may hold several reasons
//! joined by `|`. Reasons that say the person or record has no data classify
//! as not-found; reasons that say the record already exists classify as a
//! conflict; anything else is a bad request.

use std::sync::LazyLock;

use regex::Regex;

use crate::record::REASON_SEPARATOR;
use crate::{LineFormat, OnBaseError};

static NO_RECORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bno\s+(records?|person|persons|data|applications?|holds?|documents?)\b|\b(person|student|records?)\s+(was\s+)?(not\s+found|does\s+not\s+exist)\b",
    )
    .expect("no-records pattern compiles")
});

static ALREADY_EXISTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\balready\s+(exists?|existed)\b|\bhas\s+existed\b|\bduplicate\b")
        .expect("already-exists pattern compiles")
});

/// The error signal of `lines`, if the first line carries one.
pub fn extract_error(lines: &[String], format: &LineFormat) -> Option<String> {
    let first = lines.first()?;
    format.fields(first).text(format.error_position)
}

/// Splits an error signal into its non-empty, trimmed reasons.
pub fn reasons(signal: &str) -> Vec<String> {
    signal
        .split(REASON_SEPARATOR)
        .map(str::trim)
        .filter(|reason| !reason.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `reason` says there is nothing on record for the entity.
pub fn is_not_found(reason: &str) -> bool {
    NO_RECORDS.is_match(reason)
}

/// Whether `reason` says the record already exists.
pub fn is_conflict(reason: &str) -> bool {
    ALREADY_EXISTS.is_match(reason)
}

/// Classifies an error signal into a typed failure.
pub fn classify(signal: &str) -> OnBaseError {
    let reasons = reasons(signal);
    if let Some(reason) = reasons.iter().find(|r| is_not_found(r)) {
        return OnBaseError::NotFound(reason.clone());
    }
    if let Some(reason) = reasons.iter().find(|r| is_conflict(r)) {
        return OnBaseError::Conflict(reason.clone());
    }
    if reasons.is_empty() {
        return OnBaseError::BadRequest(vec![signal.to_string()]);
    }
    OnBaseError::BadRequest(reasons)
}

/// Extracts and classifies the error signal of `lines`.
pub fn check(lines: &[String], format: &LineFormat) -> Result<(), OnBaseError> {
    match extract_error(lines, format) {
        Some(signal) => {
            let error = classify(&signal);
            tracing::warn!(signal = %signal, "procedure reported an error");
            Err(error)
        }
        None => Ok(()),
    }
}
