//! # Admissions
//!
//! The admission procedure emits one line per application checklist item.
//! Lines sharing a term code and application number belong to the same
//! application, so parsing folds them into one [`Application`] per composite
//! key, in the order the keys were first seen.
//!
//! ```text
//! 0 osuId              8 admitCode             16 checklist.code
//! 1 termCode      (key) 9 statusCode           17 checklist.description
//! 2 applicationNumber   10 statusDate          18 checklist.receiveDate
//!   (key, integer)      11 initialCompleteDate 19 checklist.mandatoryInd
//! 3 decisionCode        12 justCompletedInd    20 checklist.sequenceNumber
//! 4 decisionDate        13 uacPendingInd       21 error signal
//! 5 levelCode           14 startSession
//! 6 campusCode          15 aswInd
//! 7 studentTypeCode
//! ```

use std::collections::HashMap;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::{ApiError, AppState, Document, JsonApiBody, ensure_matching_id};
use crate::{LineFormat, OsuId, RecordParseError, ResourceKind};

mod position {
    pub const TERM_CODE: usize = 1;
    pub const APPLICATION_NUMBER: usize = 2;
    pub const DECISION_CODE: usize = 3;
    pub const DECISION_DATE: usize = 4;
    pub const LEVEL_CODE: usize = 5;
    pub const CAMPUS_CODE: usize = 6;
    pub const STUDENT_TYPE_CODE: usize = 7;
    pub const ADMIT_CODE: usize = 8;
    pub const STATUS_CODE: usize = 9;
    pub const STATUS_DATE: usize = 10;
    pub const INITIAL_COMPLETE_DATE: usize = 11;
    pub const JUST_COMPLETED_IND: usize = 12;
    pub const UAC_PENDING_IND: usize = 13;
    pub const START_SESSION: usize = 14;
    pub const ASW_IND: usize = 15;
    pub const CHECKLIST_CODE: usize = 16;
    pub const CHECKLIST_DESCRIPTION: usize = 17;
    pub const CHECKLIST_RECEIVE_DATE: usize = 18;
    pub const CHECKLIST_MANDATORY_IND: usize = 19;
    pub const CHECKLIST_SEQUENCE_NUMBER: usize = 20;
}

////////////////////////////////////////////// Admission ///////////////////////////////////////////////

/// The admission record of a person.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admission {
    /// Applications in first-seen order.
    pub applications: Vec<Application>,
}

/// One application, keyed by term code and application number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub term_code: String,
    pub application_number: i64,
    pub decision_code: Option<String>,
    pub decision_date: Option<String>,
    pub level_code: Option<String>,
    pub campus_code: Option<String>,
    pub student_type_code: Option<String>,
    pub admit_code: Option<String>,
    pub status_code: Option<String>,
    pub status_date: Option<String>,
    pub initial_complete_date: Option<String>,
    pub just_completed_ind: bool,
    pub uac_pending_ind: bool,
    pub start_session: Option<String>,
    pub asw_ind: bool,
    /// Checklist items in line order.
    pub checklists: Vec<ChecklistItem>,
}

/// One checklist item of an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub code: String,
    pub description: Option<String>,
    pub receive_date: Option<String>,
    pub mandatory_ind: bool,
    pub sequence_number: Option<i64>,
}

/// The composite key that folds lines into one application.
pub fn composite_key(term_code: &str, application_number: i64) -> String {
    format!("{}-{}", term_code, application_number)
}

/// Parses admission lines, grouping checklist items under their application.
///
/// When `application_number` is given only the matching applications are kept.
pub fn parse(
    lines: &[String],
    format: &LineFormat,
    application_number: Option<i64>,
) -> Result<Admission, RecordParseError> {
    let mut applications: Vec<Application> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for line in lines {
        let fields = format.fields(line);
        let term_code = fields.required(position::TERM_CODE, "termCode")?;
        let application_number = fields
            .integer(position::APPLICATION_NUMBER, "applicationNumber")?
            .ok_or(RecordParseError::MissingField {
                field: "applicationNumber",
                position: position::APPLICATION_NUMBER,
            })?;
        let checklist = match fields.text(position::CHECKLIST_CODE) {
            Some(code) => Some(ChecklistItem {
                code,
                description: fields.text(position::CHECKLIST_DESCRIPTION),
                receive_date: fields.text(position::CHECKLIST_RECEIVE_DATE),
                mandatory_ind: fields.flag(position::CHECKLIST_MANDATORY_IND),
                sequence_number: fields
                    .integer(position::CHECKLIST_SEQUENCE_NUMBER, "sequenceNumber")?,
            }),
            None => None,
        };

        let key = composite_key(term_code, application_number);
        if let Some(&idx) = index.get(&key) {
            applications[idx].checklists.extend(checklist);
            continue;
        }

        index.insert(key, applications.len());
        applications.push(Application {
            term_code: term_code.to_string(),
            application_number,
            decision_code: fields.text(position::DECISION_CODE),
            decision_date: fields.text(position::DECISION_DATE),
            level_code: fields.text(position::LEVEL_CODE),
            campus_code: fields.text(position::CAMPUS_CODE),
            student_type_code: fields.text(position::STUDENT_TYPE_CODE),
            admit_code: fields.text(position::ADMIT_CODE),
            status_code: fields.text(position::STATUS_CODE),
            status_date: fields.text(position::STATUS_DATE),
            initial_complete_date: fields.text(position::INITIAL_COMPLETE_DATE),
            just_completed_ind: fields.flag(position::JUST_COMPLETED_IND),
            uac_pending_ind: fields.flag(position::UAC_PENDING_IND),
            start_session: fields.text(position::START_SESSION),
            asw_ind: fields.flag(position::ASW_IND),
            checklists: checklist.into_iter().collect(),
        });
    }

    if let Some(number) = application_number {
        applications.retain(|application| application.application_number == number);
    }
    Ok(Admission { applications })
}

/////////////////////////////////////////////// Patch //////////////////////////////////////////////////

/// Attributes accepted when updating an application checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AdmissionPatch {
    pub term_code: String,
    pub application_number: i64,
    pub checklist_code: String,
    #[serde(default)]
    pub checklist_receive_date: Option<String>,
}

impl AdmissionPatch {
    /// The patch as bind parameters (without the person identifier).
    pub fn binds(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

////////////////////////////////////////////// Routes //////////////////////////////////////////////////

async fn get_admission(
    State(state): State<AppState>,
    Path(osu_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Document<Admission>>, ApiError> {
    let osu_id = OsuId::new(&osu_id)?;
    let application_number = match params.get("applicationNumber") {
        Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
            ApiError::bad_request(vec!["applicationNumber must be an integer".to_string()])
        })?),
        None => None,
    };
    let admission = state
        .onbase
        .get_admission(&osu_id, application_number)
        .await?;
    Ok(Json(state.links.document(
        ResourceKind::Admission,
        osu_id.as_str(),
        admission,
    )))
}

async fn patch_admission(
    State(state): State<AppState>,
    Path(osu_id): Path<String>,
    JsonApiBody(body): JsonApiBody<AdmissionPatch>,
) -> Result<Json<Document<Admission>>, ApiError> {
    let osu_id = OsuId::new(&osu_id)?;
    ensure_matching_id(osu_id.as_str(), &body)?;
    let admission = state
        .onbase
        .patch_admission(&osu_id, &body.data.attributes)
        .await?;
    Ok(Json(state.links.document(
        ResourceKind::Admission,
        osu_id.as_str(),
        admission,
    )))
}

/// Routes for `/onbase/admissions/:osu_id`.
pub fn create_admission_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/onbase/admissions/:osu_id",
            get(get_admission).patch(patch_admission),
        )
        .with_state(state)
}
