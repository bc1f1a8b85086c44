//! Parsing of the recognition service's JSON answer.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::{RawExtraction, RawRow, Recognizer};
use crate::error::RecognitionError;
use crate::models::document::MediaType;

lazy_static! {
    // First JSON object or array embedded in surrounding prose
    static ref EMBEDDED_JSON: Regex = Regex::new(r"(?s)(\{.*\}|\[.*\])").unwrap();
}

/// Keys under which a payload may carry its rows.
const ROW_KEYS: &[&str] = &["items", "rows", "line_items", "lines"];

/// Turn a recognition payload into a [`RawExtraction`].
///
/// Accepts `{"header": {...}, "items": [...]}` or a bare array of rows,
/// optionally wrapped in Markdown code fences or surrounded by prose. Nested
/// objects inside a row are flattened into their leaf keys; non-string
/// scalars are stringified and arrays are joined with spaces.
pub fn parse_payload(text: &str) -> Result<RawExtraction, RecognitionError> {
    let cleaned = text
        .trim_start_matches('\u{feff}')
        .replace("```json", "")
        .replace("```", "");
    let cleaned = cleaned.trim();

    let value: Value = match serde_json::from_str(cleaned) {
        Ok(value) => value,
        Err(first_err) => {
            let embedded = EMBEDDED_JSON
                .captures(cleaned)
                .and_then(|caps| caps.get(1))
                .ok_or_else(|| {
                    RecognitionError::MalformedResponse(format!("no JSON found: {}", first_err))
                })?;
            debug!("Recovered JSON block embedded in recognition response");
            serde_json::from_str(embedded.as_str())
                .map_err(|e| RecognitionError::MalformedResponse(e.to_string()))?
        }
    };

    let (header, rows) = match &value {
        Value::Array(rows) => (RawRow::new(), rows.as_slice()),
        Value::Object(map) => {
            let rows = ROW_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array))
                .ok_or_else(|| {
                    RecognitionError::MalformedResponse("payload has no row array".into())
                })?;

            let mut header = RawRow::new();
            if let Some(fields) = map.get("header") {
                flatten_into(fields, None, &mut header);
            }
            (header, rows.as_slice())
        }
        _ => {
            return Err(RecognitionError::MalformedResponse(
                "payload is neither an object nor an array".into(),
            ));
        }
    };

    let rows = rows
        .iter()
        .map(|row| {
            let mut pairs = RawRow::new();
            // Scalars in place of a row keep their slot so row positions hold
            if row.is_object() {
                flatten_into(row, None, &mut pairs);
            }
            pairs
        })
        .collect();

    Ok(RawExtraction { header, rows })
}

fn flatten_into(value: &Value, key: Option<&str>, out: &mut RawRow) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten_into(v, Some(k), out);
            }
        }
        Value::Null => {}
        other => {
            if let (Some(key), Some(text)) = (key, scalar_text(other)) {
                out.push((key.to_string(), text));
            }
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(scalar_text).collect();
            Some(parts.join(" "))
        }
        Value::Null | Value::Object(_) => None,
    }
}

/// Recognizer for documents that already are recognition payloads.
///
/// Useful for re-auditing saved service output and for offline runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadRecognizer;

impl PayloadRecognizer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Recognizer for PayloadRecognizer {
    async fn recognize(
        &self,
        bytes: &[u8],
        media_type: &MediaType,
    ) -> Result<RawExtraction, RecognitionError> {
        if *media_type != MediaType::Json {
            return Err(RecognitionError::UnsupportedMediaType(
                media_type.as_mime().to_string(),
            ));
        }

        let text = std::str::from_utf8(bytes)
            .map_err(|e| RecognitionError::MalformedResponse(format!("payload is not UTF-8: {}", e)))?;
        parse_payload(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn test_parse_header_and_items() {
        let text = r#"{
            "header": { "Supplier": "南亞", "VendorOrderNo": "11411B0324", "PurchaseDate": "1141028" },
            "items": [
                {
                    "ProductName": "膠合劑",
                    "Quantity": "40",
                    "PriceFields": { "UnitPrice": "200", "Amount": 8000 },
                    "RawPrices": "250 80 200 8000",
                    "Remarks": null
                }
            ]
        }"#;

        let raw = parse_payload(text).unwrap();
        assert_eq!(raw.header.len(), 3);
        assert!(raw.header.contains(&pair("Supplier", "南亞")));
        assert_eq!(raw.rows.len(), 1);

        let row = &raw.rows[0];
        assert!(row.contains(&pair("UnitPrice", "200")));
        assert!(row.contains(&pair("Amount", "8000")));
        assert!(row.contains(&pair("RawPrices", "250 80 200 8000")));
        assert!(!row.iter().any(|(k, _)| k == "Remarks" || k == "PriceFields"));
    }

    #[test]
    fn test_parse_fenced_array() {
        let text = "```json\n[{\"name\": \"Bolt\", \"qty\": 3}, 7]\n```";
        let raw = parse_payload(text).unwrap();

        assert!(raw.header.is_empty());
        assert_eq!(raw.rows.len(), 2);
        assert_eq!(raw.rows[0], vec![pair("name", "Bolt"), pair("qty", "3")]);
        assert!(raw.rows[1].is_empty());
    }

    #[test]
    fn test_parse_json_inside_prose() {
        let text = "Here is the table you asked for:\n{\"items\": [{\"amount\": \"12.50\"}]}\nThanks!";
        let raw = parse_payload(text).unwrap();
        assert_eq!(raw.rows[0], vec![pair("amount", "12.50")]);
    }

    #[test]
    fn test_parse_array_values_are_joined() {
        let raw = parse_payload(r#"[{"raw_prices": [250, 80, "200"]}]"#).unwrap();
        assert_eq!(raw.rows[0], vec![pair("raw_prices", "250 80 200")]);
    }

    #[test]
    fn test_parse_rejects_non_payloads() {
        assert!(matches!(
            parse_payload("I could not read this document."),
            Err(RecognitionError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_payload(r#"{"header": {"Supplier": "Acme"}}"#),
            Err(RecognitionError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_payload("42"),
            Err(RecognitionError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_payload_recognizer_rejects_other_media() {
        let recognizer = PayloadRecognizer::new();
        let err = recognizer.recognize(b"%PDF-1.7", &MediaType::Pdf).await.unwrap_err();
        assert_eq!(err, RecognitionError::UnsupportedMediaType("application/pdf".into()));

        let raw = recognizer
            .recognize(br#"[{"name": "Bolt"}]"#, &MediaType::Json)
            .await
            .unwrap();
        assert_eq!(raw.rows.len(), 1);
    }
}
