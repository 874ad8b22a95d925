use serde::{Deserialize, Serialize};

/// A concrete candidate value on one axis of the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// Numeric view used by arithmetic; booleans count as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Str(_) => None,
        }
    }

    /// Truthiness: zero, empty strings and `false` are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(v) => *v != 0,
            Self::Float(v) => *v != 0.0,
            Self::Str(s) => !s.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_deserialization_picks_narrowest_type() {
        let values: Vec<ParamValue> = serde_json::from_str(r#"[1, 2.5, true, "ijk"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                ParamValue::Int(1),
                ParamValue::Float(2.5),
                ParamValue::Bool(true),
                ParamValue::Str("ijk".into()),
            ]
        );
    }

    #[test]
    fn truthiness_follows_value() {
        assert!(!ParamValue::Int(0).is_truthy());
        assert!(ParamValue::Float(0.5).is_truthy());
        assert!(!ParamValue::Str(String::new()).is_truthy());
        assert!(ParamValue::Bool(true).is_truthy());
    }
}
