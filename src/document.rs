//! # Documents
//!
//! Indexing a document returns exactly one line describing the stored
//! document, so parsing reads the first line only.
//!
//! ```text
//! 0 osuId                 6 keywordValue               12 userId
//! 1 documentId (integer)  7 termCode                   13 activityDate
//! 2 documentVersion (num) 8 applicationNumber (number) 14 pendingInd
//! 3 documentTypeName      9 aidYear                    15 comment
//! 4 documentReceiveDate   10 sequenceNumber (number)   16 error signal
//! 5 keywordName           11 source
//! ```

use axum::Router;
use axum::http::StatusCode;
use axum::extract::State;
use axum::response::Json;
use axum::routing::post;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::{ApiError, AppState, Document, JsonApiBody};
use crate::{LineFormat, OsuId, RecordParseError, ResourceKind};

mod position {
    pub const OSU_ID: usize = 0;
    pub const DOCUMENT_ID: usize = 1;
    pub const DOCUMENT_VERSION: usize = 2;
    pub const DOCUMENT_TYPE_NAME: usize = 3;
    pub const DOCUMENT_RECEIVE_DATE: usize = 4;
    pub const KEYWORD_NAME: usize = 5;
    pub const KEYWORD_VALUE: usize = 6;
    pub const TERM_CODE: usize = 7;
    pub const APPLICATION_NUMBER: usize = 8;
    pub const AID_YEAR: usize = 9;
    pub const SEQUENCE_NUMBER: usize = 10;
    pub const SOURCE: usize = 11;
    pub const USER_ID: usize = 12;
    pub const ACTIVITY_DATE: usize = 13;
    pub const PENDING_IND: usize = 14;
    pub const COMMENT: usize = 15;
}

/// Oracle `DD-MON-YYYY HH24:MI:SS`, as `chrono` spells it.
pub const RECEIVE_DATE_FORMAT: &str = "%d-%b-%Y %H:%M:%S";

/// A stored document as reported by the indexing procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub osu_id: Option<String>,
    pub document_id: i64,
    pub document_version: Option<f64>,
    pub document_type_name: Option<String>,
    pub document_receive_date: Option<String>,
    pub keyword_name: Option<String>,
    pub keyword_value: Option<String>,
    pub term_code: Option<String>,
    pub application_number: Option<f64>,
    pub aid_year: Option<String>,
    pub sequence_number: Option<f64>,
    pub source: Option<String>,
    pub user_id: Option<String>,
    pub activity_date: Option<String>,
    pub pending_ind: bool,
    pub comment: Option<String>,
}

impl DocumentRecord {
    /// The resource identifier.
    pub fn resource_id(&self) -> String {
        self.document_id.to_string()
    }
}

/// Parses the single document line.
pub fn parse(lines: &[String], format: &LineFormat) -> Result<DocumentRecord, RecordParseError> {
    let line = lines.first().ok_or(RecordParseError::NoRecord)?;
    let fields = format.fields(line);
    let document_id = fields
        .integer(position::DOCUMENT_ID, "documentId")?
        .ok_or(RecordParseError::MissingField {
            field: "documentId",
            position: position::DOCUMENT_ID,
        })?;
    Ok(DocumentRecord {
        osu_id: fields.text(position::OSU_ID),
        document_id,
        document_version: fields.number(position::DOCUMENT_VERSION, "documentVersion")?,
        document_type_name: fields.text(position::DOCUMENT_TYPE_NAME),
        document_receive_date: fields.text(position::DOCUMENT_RECEIVE_DATE),
        keyword_name: fields.text(position::KEYWORD_NAME),
        keyword_value: fields.text(position::KEYWORD_VALUE),
        term_code: fields.text(position::TERM_CODE),
        application_number: fields.number(position::APPLICATION_NUMBER, "applicationNumber")?,
        aid_year: fields.text(position::AID_YEAR),
        sequence_number: fields.number(position::SEQUENCE_NUMBER, "sequenceNumber")?,
        source: fields.text(position::SOURCE),
        user_id: fields.text(position::USER_ID),
        activity_date: fields.text(position::ACTIVITY_DATE),
        pending_ind: fields.flag(position::PENDING_IND),
        comment: fields.text(position::COMMENT),
    })
}

/// Attributes accepted when indexing a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DocumentRequest {
    pub osu_id: OsuId,
    pub document_id: u64,
    pub document_type_name: String,
    pub document_receive_date: String,
    pub keyword_name: String,
    pub keyword_value: String,
    #[serde(default)]
    pub term_code: Option<String>,
    #[serde(default)]
    pub application_number: Option<u32>,
    #[serde(default)]
    pub aid_year: Option<String>,
    #[serde(default)]
    pub sequence_number: Option<u32>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl DocumentRequest {
    /// Checks the attributes the procedure cannot validate itself.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut details = Vec::new();
        if NaiveDateTime::parse_from_str(&self.document_receive_date, RECEIVE_DATE_FORMAT)
            .is_err()
        {
            details.push(
                "data.attributes.documentReceiveDate must be in Oracle Date format: DD-MON-YYYY HH24:MI:SS"
                    .to_string(),
            );
        }
        if self.keyword_name.trim().is_empty() {
            details.push("data.attributes.keywordName must not be empty".to_string());
        }
        if details.is_empty() {
            Ok(())
        } else {
            Err(details)
        }
    }

    /// The request as bind parameters.
    pub fn binds(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

////////////////////////////////////////////// Routes //////////////////////////////////////////////////

async fn post_document(
    State(state): State<AppState>,
    JsonApiBody(body): JsonApiBody<DocumentRequest>,
) -> Result<(StatusCode, Json<Document<DocumentRecord>>), ApiError> {
    let request = body.data.attributes;
    request.validate().map_err(ApiError::bad_request)?;
    let record = state.onbase.post_document(&request).await?;
    let id = record.resource_id();
    Ok((
        StatusCode::CREATED,
        Json(state.links.created(ResourceKind::Document, &id, record)),
    ))
}

/// Routes for `/onbase/documents`.
pub fn create_document_router(state: AppState) -> Router {
    Router::new()
        .route("/onbase/documents", post(post_document))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> LineFormat {
        ResourceKind::Document.default_format()
    }

    fn request() -> DocumentRequest {
        serde_json::from_value(serde_json::json!({
            "osuId": "931234567",
            "documentId": 4242,
            "documentTypeName": "Transcript",
            "documentReceiveDate": "20-MAY-2019 13:45:00",
            "keywordName": "TERM",
            "keywordValue": "201901"
        }))
        .unwrap()
    }

    #[test]
    fn parses_first_line_only() {
        let lines = vec![
            "931234567;4242;1.0;Transcript;20-MAY-2019 13:45:00;TERM;201901;201901;3;1920;2;WEB;onbase;21-MAY-2019;Y;ok;".to_string(),
            "garbage".to_string(),
        ];
        let record = parse(&lines, &format()).unwrap();
        assert_eq!(record.document_id, 4242);
        assert_eq!(record.resource_id(), "4242");
        assert_eq!(record.document_version, Some(1.0));
        assert_eq!(record.application_number, Some(3.0));
        assert_eq!(record.sequence_number, Some(2.0));
        assert_eq!(record.keyword_name.as_deref(), Some("TERM"));
        assert!(record.pending_ind);
        assert_eq!(record.comment.as_deref(), Some("ok"));
    }

    #[test]
    fn large_document_ids_keep_every_digit() {
        let lines = vec!["931234567;9007199254740993;".to_string()];
        let record = parse(&lines, &format()).unwrap();
        assert_eq!(record.document_id, 9_007_199_254_740_993);
        assert_eq!(record.resource_id(), "9007199254740993");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["documentId"], 9_007_199_254_740_993_i64);
    }

    #[test]
    fn no_lines_is_no_record() {
        assert_eq!(parse(&[], &format()), Err(RecordParseError::NoRecord));
    }

    #[test]
    fn missing_document_id_fails() {
        let err = parse(&["931234567;".to_string()], &format()).unwrap_err();
        assert_eq!(
            err,
            RecordParseError::MissingField {
                field: "documentId",
                position: 1,
            }
        );
    }

    #[test]
    fn receive_date_uses_oracle_format() {
        assert!(request().validate().is_ok());
        let mut upper = request();
        upper.document_receive_date = "01-JAN-2020 00:00:00".to_string();
        assert!(upper.validate().is_ok());
        let mut iso = request();
        iso.document_receive_date = "2019-05-20T13:45:00".to_string();
        assert_eq!(iso.validate().unwrap_err().len(), 1);
    }

    #[test]
    fn binds_carry_the_person() {
        let binds = request().binds();
        assert_eq!(binds["osuId"], "931234567");
        assert_eq!(binds["documentId"], 4242);
        assert!(binds["termCode"].is_null());
    }

    #[test]
    fn rejects_short_osu_id() {
        let result = serde_json::from_value::<DocumentRequest>(serde_json::json!({
            "osuId": "123",
            "documentId": 1,
            "documentTypeName": "T",
            "documentReceiveDate": "20-MAY-2019 13:45:00",
            "keywordName": "TERM",
            "keywordValue": "201901"
        }));
        assert!(result.is_err());
    }
}
