//! Scan response decoding.
//!
//! The service answers with loosely typed JSON. Decoding here is lenient:
//! unknown classification or action strings become `Unknown`, missing maps
//! become empty, and unexpected extra fields are kept in [`ScanMetadata`].

use crate::threat::ThreatCategory;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Overall classification of the scanned content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Benign,
    Malicious,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Action the service recommends for the scanned content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Allow,
    Block,
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Classification::Benign => "benign",
            Classification::Malicious => "malicious",
            Classification::Unknown => "unknown",
        })
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Action::Allow => "allow",
            Action::Block => "block",
            Action::Unknown => "unknown",
        })
    }
}

/// Ordered `(category, detected)` flags, in the order the service sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreatFlags(Vec<(ThreatCategory, bool)>);

impl ThreatFlags {
    pub fn new(flags: Vec<(ThreatCategory, bool)>) -> Self {
        Self(flags)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ThreatCategory, bool)> {
        self.0.iter()
    }

    /// Categories whose flag is set, in response order.
    pub fn detected(&self) -> impl Iterator<Item = &ThreatCategory> {
        self.0
            .iter()
            .filter(|(_, detected)| *detected)
            .map(|(category, _)| category)
    }

    pub fn any_detected(&self) -> bool {
        self.0.iter().any(|(_, detected)| *detected)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Map<String, Value>> for ThreatFlags {
    fn from(map: Map<String, Value>) -> Self {
        Self(
            map.into_iter()
                .map(|(code, value)| (ThreatCategory::from_code(&code), is_set(&value)))
                .collect(),
        )
    }
}

/// Identifiers and any extra fields returned alongside the verdict.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanMetadata {
    pub tr_id: Option<String>,
    pub profile_name: Option<String>,
    pub profile_id: Option<String>,
    pub report_id: Option<String>,
    pub scan_id: Option<String>,
    /// Every other top-level field, verbatim.
    pub extra: Map<String, Value>,
}

/// Decoded result of one scan.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "WireScanResponse")]
pub struct ScanResponse {
    pub classification: Classification,
    pub recommended_action: Action,
    /// Threats found in the submitted content.
    pub input_threats: ThreatFlags,
    /// Threats the service expects in the generated reply.
    pub predicted_output_threats: ThreatFlags,
    /// Wall-clock time of the whole scan operation, retries included.
    /// Zero until the scan client records it.
    pub latency_ms: f64,
    pub raw_metadata: ScanMetadata,
}

impl ScanResponse {
    /// Decode a response body.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

#[derive(Deserialize)]
struct WireScanResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    category: Classification,
    #[serde(default, deserialize_with = "null_as_default")]
    action: Action,
    #[serde(default)]
    prompt_detected: Option<Map<String, Value>>,
    #[serde(default)]
    response_detected: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient_string")]
    tr_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    profile_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    profile_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    report_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    scan_id: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<WireScanResponse> for ScanResponse {
    fn from(wire: WireScanResponse) -> Self {
        Self {
            classification: wire.category,
            recommended_action: wire.action,
            input_threats: wire.prompt_detected.map(ThreatFlags::from).unwrap_or_default(),
            predicted_output_threats: wire
                .response_detected
                .map(ThreatFlags::from)
                .unwrap_or_default(),
            latency_ms: 0.0,
            raw_metadata: ScanMetadata {
                tr_id: wire.tr_id,
                profile_name: wire.profile_name,
                profile_id: wire.profile_id,
                report_id: wire.report_id,
                scan_id: wire.scan_id,
                extra: wire.extra,
            },
        }
    }
}

/// Flag truthiness: `true`, non-zero numbers and non-empty strings,
/// arrays or objects count as detected.
fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept identifiers sent as strings or numbers.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> ScanResponse {
        ScanResponse::from_slice(value.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_decode_full_response() {
        let response = decode(json!({
            "action": "block",
            "category": "malicious",
            "profile_id": "00000000-0000-0000-0000-000000000001",
            "profile_name": "dev-profile",
            "prompt_detected": { "url_cats": false, "dlp": true, "injection": true },
            "report_id": "R0001",
            "response_detected": { "toxic_content": true },
            "scan_id": "S0001",
            "tr_id": "1234",
            "source": "AI-Runtime-API"
        }));

        assert_eq!(response.classification, Classification::Malicious);
        assert_eq!(response.recommended_action, Action::Block);
        assert_eq!(
            response.input_threats.detected().cloned().collect::<Vec<_>>(),
            vec![ThreatCategory::DataLoss, ThreatCategory::PromptInjection]
        );
        assert_eq!(response.input_threats.len(), 3);
        assert!(response.predicted_output_threats.any_detected());
        assert_eq!(response.raw_metadata.profile_name.as_deref(), Some("dev-profile"));
        assert_eq!(response.raw_metadata.report_id.as_deref(), Some("R0001"));
        assert_eq!(response.raw_metadata.extra["source"], "AI-Runtime-API");
        assert_eq!(response.latency_ms, 0.0);
    }

    #[test]
    fn test_missing_and_unknown_fields_decode_as_unknown() {
        let response = decode(json!({ "category": "suspicious", "action": null }));
        assert_eq!(response.classification, Classification::Unknown);
        assert_eq!(response.recommended_action, Action::Unknown);
        assert!(response.input_threats.is_empty());
        assert!(response.predicted_output_threats.is_empty());
    }

    #[test]
    fn test_null_maps_are_empty() {
        let response = decode(json!({
            "category": "benign",
            "action": "allow",
            "prompt_detected": null,
            "response_detected": {}
        }));
        assert!(response.input_threats.is_empty());
        assert!(!response.predicted_output_threats.any_detected());
    }

    #[test]
    fn test_flag_truthiness() {
        assert!(is_set(&json!(true)));
        assert!(is_set(&json!(1)));
        assert!(is_set(&json!(["x"])));
        assert!(is_set(&json!({"k": 1})));
        assert!(!is_set(&json!(false)));
        assert!(!is_set(&json!(0)));
        assert!(!is_set(&json!("")));
        assert!(!is_set(&json!({})));
        assert!(!is_set(&Value::Null));
    }

    #[test]
    fn test_numeric_ids_are_kept() {
        let response = decode(json!({ "scan_id": 42, "category": "benign" }));
        assert_eq!(response.raw_metadata.scan_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_non_object_body_is_rejected() {
        assert!(ScanResponse::from_slice(b"[1,2,3]").is_err());
        assert!(ScanResponse::from_slice(b"<html>").is_err());
    }
}
