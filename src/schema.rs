//! Table schemas: an ordered list of typed columns.
//!
//! The first column is always the primary key (§3, §4.4 of SPEC_FULL.md).
//! The catalog persists a schema as a JSON *object* mapping column name to
//! type, and column order carries meaning (it fixes which column is the
//! primary key) — so `Schema`'s `Serialize`/`Deserialize` impls are written
//! by hand to preserve declared order through a round trip, rather than
//! going through a generic map type that may not.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
}

/// An ordered list of columns. Column 0 is the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema(pub Vec<ColumnDef>);

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Schema(columns)
    }

    pub fn primary_key_name(&self) -> Option<&str> {
        self.0.first().map(|c| c.name.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for col in &self.0 {
            map.serialize_entry(&col.name, &col.data_type)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SchemaVisitor;

        impl<'de> Visitor<'de> for SchemaVisitor {
            type Value = Schema;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of column name to column type")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Schema, A::Error> {
                let mut columns = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, data_type)) = map.next_entry::<String, DataType>()? {
                    columns.push(ColumnDef { name, data_type });
                }
                Ok(Schema(columns))
            }
        }

        deserializer.deserialize_map(SchemaVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_column_order() {
        let schema = Schema::new(vec![
            ColumnDef {
                name: "id".into(),
                data_type: DataType::Int,
            },
            ColumnDef {
                name: "name".into(),
                data_type: DataType::Text,
            },
            ColumnDef {
                name: "age".into(),
                data_type: DataType::Int,
            },
        ]);
        let json = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(schema, back);
        assert_eq!(back.primary_key_name(), Some("id"));
    }

    #[test]
    fn serializes_as_plain_json_object() {
        let schema = Schema::new(vec![ColumnDef {
            name: "id".into(),
            data_type: DataType::Int,
        }]);
        let json = serde_json::to_string(&schema).unwrap();
        assert_eq!(json, r#"{"id":"int"}"#);
    }
}
