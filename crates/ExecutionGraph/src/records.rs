//! # Execution Records
//!
//! Input shapes handed over by the execution backend. Every field is lenient:
//! unknown enum strings land in an `Unknown` variant, absent fields use
//! defaults, and values of the wrong shape (numeric strings, integer ids,
//! `YYYY-MM-DD HH:MM:SS` timestamps) are coerced or dropped with a warning,
//! so a partially populated payload still produces a graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Backend status of a single execution step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Compensated,
    #[serde(other)]
    Unknown,
}

/// Outcome of a pre-execution gate check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateStatus {
    Passed,
    Blocked,
    #[default]
    Pending,
    #[serde(other)]
    Unknown,
}

/// Overall verdict of a compliance evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceResult {
    Pass,
    Fail,
    Conditional,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Risk classification attached to a logistics event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A single gate evaluation (e.g. `FUNDS_AVAILABLE`, `MARKET_HOURS`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GateRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub gate_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub status: GateStatus,
    #[serde(default, deserialize_with = "lenient::string")]
    pub block_reason: Option<String>,
}

/// Wrapper matching the backend's `{ "gates": [...] }` payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GateEvaluation {
    #[serde(default)]
    pub gates: Vec<GateRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRecord {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub overall_result: ComplianceResult,
    /// Rule payloads are passed through untouched; the backend sends either
    /// rule codes or full rule objects.
    #[serde(default)]
    pub failed_rules: Vec<Value>,
}

/// One unit of a trade-execution workflow.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStepRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(default, alias = "step_order", deserialize_with = "lenient::integer")]
    pub order: Option<i64>,
    #[serde(default, alias = "step_name", deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub status: Option<StepStatus>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub failure_reason: Option<String>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub step_data: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LogisticsEventRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub event_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub risk_level: RiskLevel,
}

/// Wrapper matching the backend's `{ "events": [...] }` payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LogisticsTimeline {
    #[serde(default)]
    pub events: Vec<LogisticsEventRecord>,
}

/// What-if comparison against taking no action.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterfactualRecord {
    #[serde(default, deserialize_with = "lenient::number")]
    pub roi_delta: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub risk_delta: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub opportunity_cost: Option<f64>,
}

/// The full bag of records the builder consumes. Any collection may be absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecords {
    #[serde(default)]
    pub gates: Option<GateEvaluation>,
    #[serde(default)]
    pub compliance: Option<ComplianceRecord>,
    #[serde(default)]
    pub steps: Option<Vec<ExecutionStepRecord>>,
    #[serde(default)]
    pub logistics: Option<LogisticsTimeline>,
    #[serde(default)]
    pub counterfactual: Option<CounterfactualRecord>,
}

impl ExecutionRecords {
    /// Parses a backend payload. Field-level problems degrade to defaults;
    /// only structurally invalid JSON is rejected.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Field deserializers that coerce what they can and drop the rest.
mod lenient {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

    pub fn or_default<'de, D, T>(de: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(de)?;
        Ok(T::deserialize(&value).unwrap_or_else(|e| {
            tracing::warn!(%value, error = %e, "Unreadable field, using default");
            T::default()
        }))
    }

    pub fn string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(de)? {
            Value::Null => None,
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => {
                tracing::warn!(value = %other, "Expected a string, dropping field");
                None
            }
        })
    }

    pub fn number<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(de)? {
            Value::Null => None,
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().or_else(|| {
                tracing::warn!(value = %s, "Expected a number, dropping field");
                None
            }),
            other => {
                tracing::warn!(value = %other, "Expected a number, dropping field");
                None
            }
        })
    }

    pub fn integer<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
        let parsed = match Value::deserialize(de)? {
            Value::Null => return Ok(None),
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        if parsed.is_none() {
            tracing::warn!("Expected an integer, dropping field");
        }
        Ok(parsed)
    }

    /// Accepts RFC 3339, Postgres text output (`2024-05-01 10:00:00+00`) and
    /// offset-less timestamps, which are read as UTC.
    pub fn timestamp<'de, D: Deserializer<'de>>(
        de: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = match Value::deserialize(de)? {
            Value::Null => return Ok(None),
            Value::String(s) => s,
            other => {
                tracing::warn!(value = %other, "Expected a timestamp, dropping field");
                return Ok(None);
            }
        };
        let raw = raw.trim();

        let parsed = DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z"))
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NAIVE_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                    .map(|naive| naive.and_utc())
            });
        if parsed.is_none() {
            tracing::warn!(value = raw, "Unrecognised timestamp, dropping field");
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_field_names_are_accepted() {
        let json = r#"{
            "steps": [
                {"id": "a", "step_order": 2, "step_name": "Reserve", "status": "SUCCESS"},
                {"id": "b", "order": 1, "name": "Quote", "status": "SOMETHING_NEW"}
            ]
        }"#;
        let records = ExecutionRecords::from_json(json).unwrap();
        let steps = records.steps.unwrap();

        assert_eq!(steps[0].order, Some(2));
        assert_eq!(steps[0].name.as_deref(), Some("Reserve"));
        assert_eq!(steps[1].status, Some(StepStatus::Unknown));
        assert!(records.gates.is_none());
    }

    #[test]
    fn test_missing_fields_default() {
        let json = r#"{
            "gates": {"gates": [{}]},
            "logistics": {"events": [{"risk_level": "EXTREME"}]}
        }"#;
        let records = ExecutionRecords::from_json(json).unwrap();

        let gate = &records.gates.unwrap().gates[0];
        assert_eq!(gate.status, GateStatus::Pending);
        assert!(gate.gate_type.is_none());
        assert_eq!(records.logistics.unwrap().events[0].risk_level, RiskLevel::Unknown);
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let json = r#"{"counterfactual": {
            "roi_delta": "1.50", "risk_delta": -0.25, "opportunity_cost": "n/a"
        }}"#;
        let cf = ExecutionRecords::from_json(json).unwrap().counterfactual.unwrap();

        assert_eq!(cf.roi_delta, Some(1.5));
        assert_eq!(cf.risk_delta, Some(-0.25));
        assert_eq!(cf.opportunity_cost, None);
    }

    #[test]
    fn test_integer_ids_become_strings() {
        let json = r#"{
            "logistics": {"events": [{"id": 7, "event_type": "PICKUP", "risk_level": "LOW"}]},
            "steps": [{"id": 42, "step_order": "3", "status": 5}]
        }"#;
        let records = ExecutionRecords::from_json(json).unwrap();

        let event = &records.logistics.unwrap().events[0];
        assert_eq!(event.id.as_deref(), Some("7"));
        assert_eq!(event.risk_level, RiskLevel::Low);

        let step = &records.steps.unwrap()[0];
        assert_eq!(step.id.as_deref(), Some("42"));
        assert_eq!(step.order, Some(3));
        assert_eq!(step.status, None);
    }

    #[test]
    fn test_postgres_timestamps_are_accepted() {
        let json = r#"{"steps": [
            {"id": "a", "started_at": "2024-05-01 10:00:00",
             "completed_at": "2024-05-01 10:00:03.250+02"},
            {"id": "b", "started_at": "2024-05-01T10:00:00Z", "completed_at": "yesterday"}
        ]}"#;
        let steps = ExecutionRecords::from_json(json).unwrap().steps.unwrap();

        let started = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap();
        let completed = DateTime::parse_from_rfc3339("2024-05-01T08:00:03.250Z").unwrap();
        assert_eq!(steps[0].started_at, Some(started.with_timezone(&Utc)));
        assert_eq!(steps[0].completed_at, Some(completed.with_timezone(&Utc)));
        assert_eq!(steps[1].started_at, Some(started.with_timezone(&Utc)));
        assert_eq!(steps[1].completed_at, None);
    }
}
