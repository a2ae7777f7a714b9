//! # Holds
//!
//! One line per hold, no grouping. Positions 6 through 13 are eight slots
//! naming the processes a hold affects; they collapse into one list with the
//! empty slots dropped.
//!
//! ```text
//! 0 osuId  3 reason    6..=13 processesAffected  15 originatorCode
//! 1 code   4 fromDate  14 amount (number)        16 releaseInd
//! 2 desc   5 toDate                              17 error signal
//! ```

use std::collections::HashMap;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::get;
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, AppState, Document};
use crate::{LineFormat, OsuId, RecordParseError, ResourceKind};

mod position {
    pub const CODE: usize = 1;
    pub const DESCRIPTION: usize = 2;
    pub const REASON: usize = 3;
    pub const FROM_DATE: usize = 4;
    pub const TO_DATE: usize = 5;
    pub const FIRST_PROCESS: usize = 6;
    pub const PROCESS_SLOTS: usize = 8;
    pub const AMOUNT: usize = 14;
    pub const ORIGINATOR_CODE: usize = 15;
    pub const RELEASE_IND: usize = 16;
}

/// The holds placed on a person.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holds {
    pub holds: Vec<Hold>,
}

/// A single hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hold {
    pub code: String,
    pub description: Option<String>,
    pub reason: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub processes_affected: Vec<String>,
    pub amount: Option<f64>,
    pub originator_code: Option<String>,
    pub release_ind: bool,
}

/// Parses hold lines; with `codes`, only holds whose code is listed are kept.
pub fn parse(
    lines: &[String],
    format: &LineFormat,
    codes: Option<&[String]>,
) -> Result<Holds, RecordParseError> {
    let mut holds = Vec::with_capacity(lines.len());
    for line in lines {
        let fields = format.fields(line);
        let code = fields.required(position::CODE, "code")?;
        if let Some(codes) = codes {
            if !codes.iter().any(|c| c == code) {
                continue;
            }
        }
        let processes_affected = (position::FIRST_PROCESS
            ..position::FIRST_PROCESS + position::PROCESS_SLOTS)
            .filter_map(|pos| fields.text(pos))
            .collect();
        holds.push(Hold {
            code: code.to_string(),
            description: fields.text(position::DESCRIPTION),
            reason: fields.text(position::REASON),
            from_date: fields.text(position::FROM_DATE),
            to_date: fields.text(position::TO_DATE),
            processes_affected,
            amount: fields.number(position::AMOUNT, "amount")?,
            originator_code: fields.text(position::ORIGINATOR_CODE),
            release_ind: fields.flag(position::RELEASE_IND),
        });
    }
    Ok(Holds { holds })
}

/// Splits a comma-separated `codes` query into its non-empty codes.
///
/// A query naming no codes at all is no filter.
pub fn parse_codes(raw: &str) -> Option<Vec<String>> {
    let codes: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect();
    if codes.is_empty() { None } else { Some(codes) }
}

////////////////////////////////////////////// Routes //////////////////////////////////////////////////

async fn get_holds(
    State(state): State<AppState>,
    Path(osu_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Document<Holds>>, ApiError> {
    let osu_id = OsuId::new(&osu_id)?;
    let codes = params.get("codes").and_then(|raw| parse_codes(raw));
    let holds = state.onbase.get_holds(&osu_id, codes.as_deref()).await?;
    Ok(Json(state.links.document(
        ResourceKind::Holds,
        osu_id.as_str(),
        holds,
    )))
}

/// Routes for `/onbase/holds/:osu_id`.
pub fn create_holds_router(state: AppState) -> Router {
    Router::new()
        .route("/onbase/holds/:osu_id", get(get_holds))
        .with_state(state)
}
