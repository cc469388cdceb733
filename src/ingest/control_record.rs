//! Control Record Parsing
//!
//! The control stream carries change records for the league's team control
//! table. Two shapes are accepted:
//!
//! - table change-stream records: `{"eventName", "dynamodb": {"NewImage", "OldImage"}}`
//!   with typed attributes (`{"team": {"S": ..}, "control": {"BOOL": ..}}`)
//! - plain records: `{"team", "restricted", "isRemoval"}`

use crate::models::ControlChange;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRecordError {
    Malformed(String),
    MissingTeam,
    MissingFlag { team: String },
}

impl std::fmt::Display for ControlRecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(reason) => write!(f, "malformed control record: {}", reason),
            Self::MissingTeam => write!(f, "control record has no team"),
            Self::MissingFlag { team } => {
                write!(f, "control record for {} has no control flag", team)
            }
        }
    }
}

impl std::error::Error for ControlRecordError {}

const REMOVE_EVENT: &str = "REMOVE";

fn non_empty(s: Option<&str>) -> Option<String> {
    s.filter(|s| !s.is_empty()).map(str::to_string)
}

/// Parse a raw control payload. The returned change has sequence 0; the
/// reader stamps arrival order.
pub fn parse_control(payload: &str) -> Result<ControlChange, ControlRecordError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| ControlRecordError::Malformed(e.to_string()))?;
    control_from_value(&value)
}

pub fn control_from_value(value: &Value) -> Result<ControlChange, ControlRecordError> {
    if !value.is_object() {
        return Err(ControlRecordError::Malformed("expected a JSON object".into()));
    }
    if value.get("dynamodb").is_some() {
        change_stream_record(value)
    } else {
        plain_record(value)
    }
}

fn change_stream_record(value: &Value) -> Result<ControlChange, ControlRecordError> {
    let images = &value["dynamodb"];

    if value["eventName"].as_str() == Some(REMOVE_EVENT) {
        let team = non_empty(images["OldImage"]["team"]["S"].as_str())
            .ok_or(ControlRecordError::MissingTeam)?;
        return Ok(ControlChange::removal(team));
    }

    let image = &images["NewImage"];
    let team = non_empty(image["team"]["S"].as_str()).ok_or(ControlRecordError::MissingTeam)?;
    let restricted = image["control"]["BOOL"]
        .as_bool()
        .ok_or_else(|| ControlRecordError::MissingFlag { team: team.clone() })?;
    Ok(ControlChange::upsert(team, restricted))
}

fn plain_record(value: &Value) -> Result<ControlChange, ControlRecordError> {
    let team = non_empty(value["team"].as_str()).ok_or(ControlRecordError::MissingTeam)?;

    if value["isRemoval"].as_bool().unwrap_or(false) {
        return Ok(ControlChange::removal(team));
    }
    let restricted = value["restricted"]
        .as_bool()
        .ok_or_else(|| ControlRecordError::MissingFlag { team: team.clone() })?;
    Ok(ControlChange::upsert(team, restricted))
}
