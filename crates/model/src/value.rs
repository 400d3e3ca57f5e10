use serde::{Deserialize, Serialize};

/// A resolved reference to another record (e.g. a language or a manager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefTarget {
    pub id: i64,
    pub label: String,
}

impl RefTarget {
    pub fn new(id: i64, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }
}

/// Canonical machine value of a cell. One payload shape per cell kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Empty,
    Text(String),
    Decimal(f64),
    /// Three-state flag: set true, set false, or unset.
    Tri(Option<bool>),
    /// Free-text date. Forwarded unchanged; calendar normalization is downstream.
    Date(String),
    /// Ordered list of strings (e.g. alternate names).
    List(Vec<String>),
    Reference(RefTarget),
    References(Vec<RefTarget>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Empty
    }
}

impl Value {
    /// Human-readable rendering used for a cell's display text.
    pub fn display(&self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Text(s) => s.clone(),
            Value::Decimal(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Value::Tri(None) => String::new(),
            Value::Tri(Some(true)) => "yes".to_string(),
            Value::Tri(Some(false)) => "no".to_string(),
            Value::Date(s) => s.clone(),
            Value::List(items) => items.join(", "),
            Value::Reference(r) => r.label.clone(),
            Value::References(refs) => refs
                .iter()
                .map(|r| r.label.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// True when the value carries no content (empty text/list counts as empty).
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Text(s) | Value::Date(s) => s.is_empty(),
            Value::Tri(flag) => flag.is_none(),
            Value::List(items) => items.is_empty(),
            Value::References(refs) => refs.is_empty(),
            Value::Decimal(_) | Value::Reference(_) => false,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_scalar_values() {
        assert_eq!(Value::Empty.display(), "");
        assert_eq!(Value::Text("Jane".into()).display(), "Jane");
        assert_eq!(Value::Decimal(100.0).display(), "100");
        assert_eq!(Value::Decimal(2.5).display(), "2.5");
        assert_eq!(Value::Date("1990-02-31".into()).display(), "1990-02-31");
    }

    #[test]
    fn display_tri_state() {
        assert_eq!(Value::Tri(None).display(), "");
        assert_eq!(Value::Tri(Some(true)).display(), "yes");
        assert_eq!(Value::Tri(Some(false)).display(), "no");
    }

    #[test]
    fn display_lists_and_references() {
        let list = Value::List(vec!["Maria Sanchez".into(), "María Sánchez".into()]);
        assert_eq!(list.display(), "Maria Sanchez, María Sánchez");

        let refs = Value::References(vec![
            RefTarget::new(1, "Spanish"),
            RefTarget::new(2, "French"),
        ]);
        assert_eq!(refs.display(), "Spanish, French");
    }

    #[test]
    fn emptiness() {
        assert!(Value::Empty.is_empty());
        assert!(Value::Text(String::new()).is_empty());
        assert!(Value::Tri(None).is_empty());
        assert!(Value::List(Vec::new()).is_empty());
        assert!(!Value::Decimal(0.0).is_empty());
        assert!(!Value::Tri(Some(false)).is_empty());
    }

}
