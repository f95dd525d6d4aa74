use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Candidate field names for the two attributes the pipeline needs.
///
/// Order matters: the first alias present in a sample wins.
#[derive(Debug, Clone, Copy)]
pub struct FieldAliases {
    pub value: &'static [&'static str],
    pub timestamp: &'static [&'static str],
}

/// Aliases seen across the generation, load, interchange and reservoir endpoints
pub const ONS_ALIASES: FieldAliases = FieldAliases {
    value: &[
        "geracao",
        "val_geracao",
        "carga",
        "val_carga",
        "intercambio",
        "val_intercambio",
        "energiaArmazenada",
        "ear_verif",
        "volumeUtil",
        "volume",
        "Valor",
        "valor",
    ],
    timestamp: &[
        "instante",
        "din_instante",
        "Data",
        "data",
        "dataHora",
        "dat_referencia",
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Value,
    Timestamp,
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRole::Value => write!(f, "value"),
            FieldRole::Timestamp => write!(f, "timestamp"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("sample record is not an object")]
    NotAnObject,
    #[error("no known {} field in sample record", join_roles(.0))]
    Unresolved(Vec<FieldRole>),
}

fn join_roles(roles: &[FieldRole]) -> String {
    roles
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Which attribute of a record holds the measurement and which the timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub value_field: &'static str,
    pub timestamp_field: &'static str,
}

impl FieldAliases {
    /// Resolve both roles from one sample record.
    ///
    /// Presence is checked by key, so a field holding `null` still resolves.
    pub fn infer(&self, sample: &Value) -> Result<FieldMapping, InferenceError> {
        let object = sample.as_object().ok_or(InferenceError::NotAnObject)?;

        let first_present = |candidates: &[&'static str]| {
            candidates
                .iter()
                .copied()
                .find(|name| object.contains_key(*name))
        };

        let value_field = first_present(self.value);
        let timestamp_field = first_present(self.timestamp);

        match (value_field, timestamp_field) {
            (Some(value_field), Some(timestamp_field)) => Ok(FieldMapping {
                value_field,
                timestamp_field,
            }),
            (value, timestamp) => {
                let mut missing = Vec::new();
                if value.is_none() {
                    missing.push(FieldRole::Value);
                }
                if timestamp.is_none() {
                    missing.push(FieldRole::Timestamp);
                }
                Err(InferenceError::Unresolved(missing))
            }
        }
    }
}

/// Read a measurement as a finite number.
///
/// Accepts JSON numbers and numeric strings; a single decimal comma is
/// treated as a decimal point.
pub fn parse_value(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            s.parse::<f64>()
                .ok()
                .or_else(|| s.replacen(',', ".", 1).parse::<f64>().ok())?
        }
        _ => return None,
    };

    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_generation_record() {
        let sample = json!({"geracao": 120, "instante": "2024-01-01T00:00:00"});
        let mapping = ONS_ALIASES.infer(&sample).unwrap();
        assert_eq!(mapping.value_field, "geracao");
        assert_eq!(mapping.timestamp_field, "instante");
    }

    #[test]
    fn test_infer_prefers_earlier_alias() {
        let sample = json!({"Valor": 1.0, "carga": 2.0, "Data": "/Date(0)/", "instante": "x"});
        let mapping = ONS_ALIASES.infer(&sample).unwrap();
        assert_eq!(mapping.value_field, "carga");
        assert_eq!(mapping.timestamp_field, "instante");
    }

    #[test]
    fn test_infer_is_structural() {
        let sample = json!({"geracao": null, "instante": null});
        assert!(ONS_ALIASES.infer(&sample).is_ok());
    }

    #[test]
    fn test_infer_failure_names_roles() {
        let err = ONS_ALIASES.infer(&json!({"foo": 1})).unwrap_err();
        assert_eq!(
            err,
            InferenceError::Unresolved(vec![FieldRole::Value, FieldRole::Timestamp])
        );

        let err = ONS_ALIASES.infer(&json!({"geracao": 1})).unwrap_err();
        assert_eq!(err, InferenceError::Unresolved(vec![FieldRole::Timestamp]));
        assert_eq!(err.to_string(), "no known timestamp field in sample record");

        assert_eq!(
            ONS_ALIASES.infer(&json!([1, 2])).unwrap_err(),
            InferenceError::NotAnObject
        );
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value(&json!(42)), Some(42.0));
        assert_eq!(parse_value(&json!("1234.5")), Some(1234.5));
        assert_eq!(parse_value(&json!(" 1234,5 ")), Some(1234.5));
        assert_eq!(parse_value(&json!("abc")), None);
        assert_eq!(parse_value(&json!("NaN")), None);
        assert_eq!(parse_value(&json!("inf")), None);
        assert_eq!(parse_value(&json!(null)), None);
        assert_eq!(parse_value(&json!(true)), None);
    }
}
