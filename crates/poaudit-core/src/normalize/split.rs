//! Splitting size/model text off item names.

use regex::Regex;

use crate::error::{PoauditError, Result};

/// Built-in patterns, tried in order. Each has `name` and `spec` groups.
pub const DEFAULT_SPEC_PATTERNS: &[&str] = &[
    // Trailing parenthesized spec: "Gloves (L)", "膠合劑（1KG）"
    r"^(?P<name>.+?)\s*[(（](?P<spec>[^()（）]+)[)）]$",
    // Trailing measurement: "Hose 1\"", "Adhesive 1KG", "Plank 20x30cm"
    r#"(?i)^(?P<name>.+?)\s+(?P<spec>\d[\d./x×*\-]*\s*(?:mm|cm|ml|kg|inch|in|m|g|l|"|'|吋|分|公分|公斤|公升)?)$"#,
    // Trailing model code: "Bolt M8x40", "Valve DN25"
    r"^(?P<name>.+?)\s+(?P<spec>[A-Z]{1,4}-?\d[\w./×\-]*)$",
];

/// Splits an item name into `(name, spec)` using an ordered pattern set.
///
/// Patterns are applied repeatedly until none matches, with each newly split
/// piece prepended to the accumulated spec. Because the result is a fixpoint,
/// splitting an already split name again changes nothing.
#[derive(Debug, Clone)]
pub struct NameSpecSplitter {
    patterns: Vec<Regex>,
}

impl NameSpecSplitter {
    /// Compile the given patterns. Each must define `name` and `spec` groups.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let regex = Regex::new(pattern).map_err(|e| {
                PoauditError::Config(format!("invalid spec pattern `{}`: {}", pattern, e))
            })?;

            let names: Vec<&str> = regex.capture_names().flatten().collect();
            if !names.contains(&"name") || !names.contains(&"spec") {
                return Err(PoauditError::Config(format!(
                    "spec pattern `{}` must define `name` and `spec` groups",
                    pattern
                )));
            }
            compiled.push(regex);
        }

        Ok(Self { patterns: compiled })
    }

    /// Split `name`, returning the remaining name and the spec text, if any.
    pub fn split(&self, name: &str) -> (String, Option<String>) {
        let mut name = name.trim().to_string();
        let mut specs: Vec<String> = Vec::new();

        while let Some((head, tail)) = self.split_once(&name) {
            specs.insert(0, tail);
            name = head;
        }

        let spec = (!specs.is_empty()).then(|| specs.join(" "));
        (name, spec)
    }

    fn split_once(&self, name: &str) -> Option<(String, String)> {
        self.patterns.iter().find_map(|regex| {
            let caps = regex.captures(name)?;
            let head = caps.name("name")?.as_str().trim();
            let tail = caps.name("spec")?.as_str().trim();

            // Both halves must be non-empty, which also guarantees progress
            if head.is_empty() || tail.is_empty() || head.len() >= name.len() {
                return None;
            }
            Some((head.to_string(), tail.to_string()))
        })
    }
}

impl Default for NameSpecSplitter {
    fn default() -> Self {
        let patterns = DEFAULT_SPEC_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self { patterns }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_patterns_compile() {
        let splitter = NameSpecSplitter::new(DEFAULT_SPEC_PATTERNS).unwrap();
        assert_eq!(splitter.patterns.len(), DEFAULT_SPEC_PATTERNS.len());
    }

    #[test]
    fn test_split_trailing_measurement() {
        let splitter = NameSpecSplitter::default();

        assert_eq!(
            splitter.split("軟管 1\""),
            ("軟管".to_string(), Some("1\"".to_string()))
        );
        assert_eq!(
            splitter.split("Adhesive 1KG"),
            ("Adhesive".to_string(), Some("1KG".to_string()))
        );
        assert_eq!(
            splitter.split("Bolt M8x40"),
            ("Bolt".to_string(), Some("M8x40".to_string()))
        );
        assert_eq!(
            splitter.split("Gloves (L)"),
            ("Gloves".to_string(), Some("L".to_string()))
        );
    }

    #[test]
    fn test_split_accumulates_in_reading_order() {
        let splitter = NameSpecSplitter::default();
        assert_eq!(
            splitter.split("Garden hose 1\" 10m"),
            ("Garden hose".to_string(), Some("1\" 10m".to_string()))
        );
    }

    #[test]
    fn test_split_leaves_plain_names_alone() {
        let splitter = NameSpecSplitter::default();
        assert_eq!(splitter.split("Copy paper"), ("Copy paper".to_string(), None));
        assert_eq!(splitter.split("  膠合劑 "), ("膠合劑".to_string(), None));
    }

    #[test]
    fn test_split_is_idempotent() {
        let splitter = NameSpecSplitter::default();
        for input in ["Garden hose 1\" 10m", "Bolt M8x40", "Copy paper", "Valve DN25 (brass)"] {
            let (name, _) = splitter.split(input);
            let (again, spec) = splitter.split(&name);
            assert_eq!(again, name);
            assert_eq!(spec, None);
        }
    }

    #[test]
    fn test_rejects_pattern_without_groups() {
        assert!(NameSpecSplitter::new(&[r"^(.+)\s+(\d+)$"]).is_err());
        assert!(NameSpecSplitter::new(&[r"^(?P<name>.+"]).is_err());
    }
}
