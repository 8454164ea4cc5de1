//! Policy rows
//!
//! A row is one stored attribute tuple for a policy definition such as
//! `p = sub, obj, act`. Every row carries an effect; when the definition has
//! no `eft` column the effect is `allow`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of the reserved effect attribute
pub const EFFECT_ATTR: &str = "eft";

/// Effect of a policy row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Grant access
    #[default]
    Allow,
    /// Refuse access (wins under deny-override)
    Deny,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Effect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(Effect::Allow),
            "deny" => Ok(Effect::Deny),
            other => Err(other.to_string()),
        }
    }
}

/// One stored policy tuple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyRow {
    /// Policy definition symbol (e.g. `p`)
    pub key: String,

    /// Attribute values in definition order
    pub values: Vec<String>,

    #[serde(default)]
    pub effect: Effect,
}

impl PolicyRow {
    /// Create an `allow` row
    pub fn new<K, I, S>(key: K, values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PolicyRow {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
            effect: Effect::Allow,
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }

    pub fn is_allow(&self) -> bool {
        self.effect == Effect::Allow
    }

    pub fn is_deny(&self) -> bool {
        self.effect == Effect::Deny
    }

    /// Parse a JSON array of rows
    pub fn list_from_json(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize rows to a JSON array
    pub fn list_to_json(rows: &[PolicyRow]) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_parse() {
        assert_eq!("allow".parse::<Effect>(), Ok(Effect::Allow));
        assert_eq!("deny".parse::<Effect>(), Ok(Effect::Deny));
        assert!("Deny".parse::<Effect>().is_err());
        assert_eq!(Effect::default(), Effect::Allow);
    }

    #[test]
    fn test_row_defaults_to_allow() {
        let row = PolicyRow::new("p", ["alice", "data1", "read"]);
        assert!(row.is_allow());
        assert_eq!(row.values.len(), 3);

        let row = row.with_effect(Effect::Deny);
        assert!(row.is_deny());
    }

    #[test]
    fn test_rows_json_roundtrip() {
        let rows = vec![
            PolicyRow::new("p", ["alice", "data1", "read"]),
            PolicyRow::new("p", ["bob", "data2", "write"]).with_effect(Effect::Deny),
        ];

        let json = PolicyRow::list_to_json(&rows).unwrap();
        assert!(json.contains("\"deny\""));
        assert_eq!(PolicyRow::list_from_json(&json).unwrap(), rows);
    }

    #[test]
    fn test_rows_json_effect_optional() {
        let rows = PolicyRow::list_from_json(r#"[{"key": "p", "values": ["a", "b"]}]"#).unwrap();
        assert_eq!(rows[0].effect, Effect::Allow);
    }
}
