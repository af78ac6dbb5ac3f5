//! Lookup results as returned by the registry: one record, a list, or nothing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Record = Map<String, Value>;

/// Result of a single registry lookup.
///
/// An empty result is a miss, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Lookup {
    #[default]
    Empty,
    One(Record),
    Many(Vec<Record>),
}

impl Lookup {
    /// Interpret a raw registry payload. Empty objects, empty lists, empty
    /// strings and nulls are all misses; non-object list items are skipped.
    pub fn from_value(value: Value) -> Lookup {
        match value {
            Value::Object(map) if map.is_empty() => Lookup::Empty,
            Value::Object(map) => Lookup::One(map),
            Value::Array(items) => {
                let records: Vec<Record> = items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Object(m) if !m.is_empty() => Some(m),
                        _ => None,
                    })
                    .collect();
                if records.is_empty() {
                    Lookup::Empty
                } else {
                    Lookup::Many(records)
                }
            }
            _ => Lookup::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Lookup::Empty)
    }

    /// First record, if any.
    pub fn first(&self) -> Option<&Record> {
        match self {
            Lookup::Empty => None,
            Lookup::One(r) => Some(r),
            Lookup::Many(rs) => rs.first(),
        }
    }

    /// All records as a list.
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Lookup::Empty => Vec::new(),
            Lookup::One(r) => vec![r],
            Lookup::Many(rs) => rs,
        }
    }

    /// A string field of the first record.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.first()?.get(name)?.as_str()
    }

    pub fn into_value(self) -> Value {
        match self {
            Lookup::Empty => Value::Object(Map::new()),
            Lookup::One(r) => Value::Object(r),
            Lookup::Many(rs) => Value::Array(rs.into_iter().map(Value::Object).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_payloads_are_misses() {
        assert!(Lookup::from_value(json!({})).is_empty());
        assert!(Lookup::from_value(json!([])).is_empty());
        assert!(Lookup::from_value(json!([{}])).is_empty());
        assert!(Lookup::from_value(json!("")).is_empty());
        assert!(Lookup::from_value(Value::Null).is_empty());
    }

    #[test]
    fn single_and_list_records() {
        let one = Lookup::from_value(json!({"公司名称": "上海航天汽车机电股份有限公司"}));
        assert_eq!(one.field("公司名称"), Some("上海航天汽车机电股份有限公司"));

        let many = Lookup::from_value(json!([{"案号": "a"}, 3, {"案号": "b"}]));
        assert_eq!(many.field("案号"), Some("a"));
        assert_eq!(many.into_records().len(), 2);
    }
}
