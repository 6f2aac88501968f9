//! Wire model for the Smart Maic device API.

use std::collections::HashMap;
use std::num::ParseFloatError;

use serde::Deserialize;

/// One report as returned by `GET <device>/?page=getwdata`.
///
/// The device sends more top-level keys (`time`, `pout`, `powset`); only the
/// identifier and the measurement map are of interest here, everything else
/// is ignored during deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceReport {
    /// Device identifier, logged on successful fetches.
    #[serde(default)]
    pub devid: String,

    /// Measurements keyed by field code (`V1`, `A2`, `TWh`, ...).
    #[serde(default)]
    pub data: HashMap<String, Field>,
}

impl DeviceReport {
    /// Look up a field value by its device code.
    pub fn field(&self, code: &str) -> Option<&FieldValue> {
        self.data.get(code).map(|f| &f.value)
    }
}

/// Wrapper object the device puts around every measurement.
#[derive(Debug, Clone, Deserialize)]
pub struct Field {
    pub value: FieldValue,
}

/// A measurement value, transmitted as either a JSON number or a numeric
/// string depending on firmware revision.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Convert to `f64`. Fails for strings that do not parse as a number.
    pub fn as_f64(&self) -> Result<f64, ParseFloatError> {
        match self {
            FieldValue::Number(v) => Ok(*v),
            FieldValue::Text(s) => s.trim().parse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_string_and_number_values() {
        let json = r#"{
            "devid": "12345678",
            "time": "1700000000",
            "data": {
                "V1": { "value": "230.5" },
                "A1": { "value": 1.2 },
                "T": { "value": "25" }
            }
        }"#;

        let report: DeviceReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.devid, "12345678");
        assert_eq!(report.field("V1").unwrap().as_f64().unwrap(), 230.5);
        assert_eq!(report.field("A1").unwrap().as_f64().unwrap(), 1.2);
        assert_eq!(report.field("T").unwrap().as_f64().unwrap(), 25.0);
    }

    #[test]
    fn test_missing_data_key_defaults_to_empty() {
        let report: DeviceReport = serde_json::from_str(r#"{"devid": "x"}"#).unwrap();
        assert!(report.data.is_empty());
        assert!(report.field("V1").is_none());
    }

    #[test]
    fn test_non_numeric_string_fails_conversion() {
        let value = FieldValue::Text("n/a".to_string());
        assert!(value.as_f64().is_err());
    }

    #[test]
    fn test_whitespace_is_tolerated() {
        let value = FieldValue::Text(" 49.98 ".to_string());
        assert_eq!(value.as_f64().unwrap(), 49.98);
    }
}
