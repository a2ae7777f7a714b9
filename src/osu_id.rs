use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use handled::Handle;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::api::ApiError;

/////////////////////////////////////////////// OsuId ////////////////////////////////////////////////

/// A person identifier: exactly nine ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OsuId(String);

impl OsuId {
    /// Number of digits in an identifier.
    pub const LEN: usize = 9;

    /// Validates and wraps `id`.
    pub fn new(id: &str) -> Result<Self, OsuIdParseError> {
        if id.len() == Self::LEN && id.bytes().all(|b| b.is_ascii_digit()) {
            Ok(OsuId(id.to_string()))
        } else {
            Err(OsuIdParseError::new(id.to_string()))
        }
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier, returning its text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for OsuId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OsuId {
    type Err = OsuIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OsuId::new(s)
    }
}

impl Serialize for OsuId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for OsuId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        OsuId::new(&s).map_err(serde::de::Error::custom)
    }
}

///////////////////////////////////////////// OsuIdParseError //////////////////////////////////////////

/// Error returned when an identifier is not nine digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsuIdParseError {
    invalid_id: String,
}

impl OsuIdParseError {
    /// Creates a new OsuIdParseError.
    pub fn new(id: String) -> Self {
        OsuIdParseError { invalid_id: id }
    }

    /// Returns the rejected identifier.
    pub fn invalid_id(&self) -> &str {
        &self.invalid_id
    }
}

impl Display for OsuIdParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "osuId must be 9 digits, got {:?}", self.invalid_id)
    }
}

impl std::error::Error for OsuIdParseError {}

impl Handle<ApiError> for OsuIdParseError {
    fn handle(&self) -> Option<ApiError> {
        Some(ApiError::bad_request(vec!["osuId must be 9 digits".to_string()]))
    }
}

impl From<OsuIdParseError> for ApiError {
    fn from(e: OsuIdParseError) -> Self {
        e.handle()
            .unwrap_or_else(|| ApiError::bad_request(vec![e.to_string()]))
    }
}
