//! # Financial Aid
//!
//! One line per tracking requirement, in the order the procedure emits them.
//!
//! ```text
//! 0 osuId                  5 statusDescription   10 sequenceNumber (integer)
//! 1 aidYear                6 statusDate          11 satisfiedInd
//! 2 requirementCode        7 establishedDate     12 mandatoryInd
//! 3 requirementDescription 8 termCode            13 periodCode
//! 4 statusCode             9 fundCode            14 error signal
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
    pub const AID_YEAR: usize = 1;
    pub const REQUIREMENT_CODE: usize = 2;
    pub const REQUIREMENT_DESCRIPTION: usize = 3;
    pub const STATUS_CODE: usize = 4;
    pub const STATUS_DESCRIPTION: usize = 5;
    pub const STATUS_DATE: usize = 6;
    pub const ESTABLISHED_DATE: usize = 7;
    pub const TERM_CODE: usize = 8;
    pub const FUND_CODE: usize = 9;
    pub const SEQUENCE_NUMBER: usize = 10;
    pub const SATISFIED_IND: usize = 11;
    pub const MANDATORY_IND: usize = 12;
    pub const PERIOD_CODE: usize = 13;
}

/// Financial aid tracking requirements of a person.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialAid {
    pub tracking_requirements: Vec<TrackingRequirement>,
}

/// A requirement the person must satisfy for an aid year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRequirement {
    pub aid_year: Option<String>,
    pub requirement_code: String,
    pub requirement_description: Option<String>,
    pub status_code: Option<String>,
    pub status_description: Option<String>,
    pub status_date: Option<String>,
    pub established_date: Option<String>,
    pub term_code: Option<String>,
    pub fund_code: Option<String>,
    pub sequence_number: Option<i64>,
    pub satisfied_ind: bool,
    pub mandatory_ind: bool,
    pub period_code: Option<String>,
}

/// Parses tracking requirement lines.
pub fn parse(lines: &[String], format: &LineFormat) -> Result<FinancialAid, RecordParseError> {
    let tracking_requirements = lines
        .iter()
        .map(|line| {
            let fields = format.fields(line);
            Ok(TrackingRequirement {
                aid_year: fields.text(position::AID_YEAR),
                requirement_code: fields
                    .required(position::REQUIREMENT_CODE, "requirementCode")?
                    .to_string(),
                requirement_description: fields.text(position::REQUIREMENT_DESCRIPTION),
                status_code: fields.text(position::STATUS_CODE),
                status_description: fields.text(position::STATUS_DESCRIPTION),
                status_date: fields.text(position::STATUS_DATE),
                established_date: fields.text(position::ESTABLISHED_DATE),
                term_code: fields.text(position::TERM_CODE),
                fund_code: fields.text(position::FUND_CODE),
                sequence_number: fields.integer(position::SEQUENCE_NUMBER, "sequenceNumber")?,
                satisfied_ind: fields.flag(position::SATISFIED_IND),
                mandatory_ind: fields.flag(position::MANDATORY_IND),
                period_code: fields.text(position::PERIOD_CODE),
            })
        })
        .collect::<Result<Vec<_>, RecordParseError>>()?;
    Ok(FinancialAid {
        tracking_requirements,
    })
}

/// Whether `year` looks like an aid year such as `1920`.
pub fn is_aid_year(year: &str) -> bool {
    year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit())
}

/// Attributes accepted when updating a tracking requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FinancialAidPatch {
    pub aid_year: String,
    pub requirement_code: String,
    pub status_code: String,
    #[serde(default)]
    pub status_date: Option<String>,
}

impl FinancialAidPatch {
    /// The patch as bind parameters (without the person identifier).
    pub fn binds(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

////////////////////////////////////////////// Routes //////////////////////////////////////////////////

async fn get_financial_aid(
    State(state): State<AppState>,
    Path(osu_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Document<FinancialAid>>, ApiError> {
    let osu_id = OsuId::new(&osu_id)?;
    let year = params.get("financialAidYear").map(String::as_str);
    if let Some(year) = year {
        if !is_aid_year(year) {
            return Err(ApiError::bad_request(vec![
                "financialAidYear must be 4 digits".to_string(),
            ]));
        }
    }
    let financial_aid = state.onbase.get_financial_aid(&osu_id, year).await?;
    Ok(Json(state.links.document(
        ResourceKind::FinancialAid,
        osu_id.as_str(),
        financial_aid,
    )))
}

async fn patch_financial_aid(
    State(state): State<AppState>,
    Path(osu_id): Path<String>,
    JsonApiBody(body): JsonApiBody<FinancialAidPatch>,
) -> Result<Json<Document<FinancialAid>>, ApiError> {
    let osu_id = OsuId::new(&osu_id)?;
    ensure_matching_id(osu_id.as_str(), &body)?;
    if !is_aid_year(&body.data.attributes.aid_year) {
        return Err(ApiError::bad_request(vec![
            "data.attributes.aidYear must be 4 digits".to_string(),
        ]));
    }
    let financial_aid = state
        .onbase
        .patch_financial_aid(&osu_id, &body.data.attributes)
        .await?;
    Ok(Json(state.links.document(
        ResourceKind::FinancialAid,
        osu_id.as_str(),
        financial_aid,
    )))
}

/// Routes for `/onbase/financial-aid/:osu_id`.
pub fn create_financial_aid_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/onbase/financial-aid/:osu_id",
            get(get_financial_aid).patch(patch_financial_aid),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> LineFormat {
        ResourceKind::FinancialAid.default_format()
    }

    #[test]
    fn one_requirement_per_line_in_order() {
        let lines = vec![
            "931234567;1920;VERIF;Verification;R;Received;01-JUL-2019;15-JUN-2019;201901;PELL;2;Y;N;F;".to_string(),
            "931234567;1920;TAXRT;Tax Return;I;Incomplete;;;;;;N;Y;;".to_string(),
        ];
        let aid = parse(&lines, &format()).unwrap();
        assert_eq!(aid.tracking_requirements.len(), 2);
        let first = &aid.tracking_requirements[0];
        assert_eq!(first.aid_year.as_deref(), Some("1920"));
        assert_eq!(first.requirement_code, "VERIF");
        assert_eq!(first.status_description.as_deref(), Some("Received"));
        assert_eq!(first.fund_code.as_deref(), Some("PELL"));
        assert_eq!(first.sequence_number, Some(2));
        assert!(first.satisfied_ind);
        assert!(!first.mandatory_ind);
        let second = &aid.tracking_requirements[1];
        assert_eq!(second.requirement_code, "TAXRT");
        assert_eq!(second.status_date, None);
        assert_eq!(second.sequence_number, None);
        assert!(second.mandatory_ind);
    }

    #[test]
    fn missing_requirement_code_fails() {
        let err = parse(&["931234567;1920;".to_string()], &format()).unwrap_err();
        assert_eq!(
            err,
            RecordParseError::MissingField {
                field: "requirementCode",
                position: 2,
            }
        );
    }

    #[test]
    fn aid_year_shape() {
        assert!(is_aid_year("1920"));
        assert!(!is_aid_year("19-20"));
        assert!(!is_aid_year("192"));
    }

    #[test]
    fn patch_rejects_unknown_attributes() {
        let result = serde_json::from_str::<FinancialAidPatch>(
            r#"{"aidYear":"1920","requirementCode":"VERIF","statusCode":"R","extra":1}"#,
        );
        assert!(result.is_err());
    }
}
