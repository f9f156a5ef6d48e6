//! Schema descriptors and the merge of all inputs' descriptors into one output descriptor.
//!
//! A [`TableSchema`] lists identifier, feature and label columns with parallel type lists. The
//! [`SchemaRegistry`] concatenates the descriptors of every input in dataset order into a
//! [`MergedSchema`], which is later reconciled against the columns actually present in the
//! joined output.

use serde::{Deserialize, Serialize};

use crate::error::{JoinError, JoinResult};
use crate::types::{ColumnGroup, DataType, StorageType};

/// Column declarations of one table: names and declared types per group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, alias = "id_types")]
    pub id_types: Vec<DataType>,
    #[serde(default, alias = "feature_types")]
    pub feature_types: Vec<DataType>,
    #[serde(default, alias = "label_types")]
    pub label_types: Vec<DataType>,
}

/// Schema descriptor of the joined output, with storage-resolved type names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSchema {
    pub ids: Vec<String>,
    pub features: Vec<String>,
    pub labels: Vec<String>,
    pub id_types: Vec<String>,
    pub feature_types: Vec<String>,
    pub label_types: Vec<String>,
}

impl TableSchema {
    /// Check that every name list has a type list of the same length.
    pub fn validate(&self) -> JoinResult<()> {
        for (group, names, types) in [
            ("ids", self.ids.len(), self.id_types.len()),
            ("features", self.features.len(), self.feature_types.len()),
            ("labels", self.labels.len(), self.label_types.len()),
        ] {
            if names != types {
                return Err(JoinError::config(format!(
                    "schema lists {names} {group} but {types} {group} type(s)"
                )));
            }
        }
        Ok(())
    }

    /// Iterate `(name, type, group)` for every declared column, ids first, then features, then labels.
    pub fn columns(&self) -> impl Iterator<Item = (&str, DataType, ColumnGroup)> {
        let ids = self
            .ids
            .iter()
            .zip(&self.id_types)
            .map(|(n, t)| (n.as_str(), *t, ColumnGroup::Id));
        let features = self
            .features
            .iter()
            .zip(&self.feature_types)
            .map(|(n, t)| (n.as_str(), *t, ColumnGroup::Feature));
        let labels = self
            .labels
            .iter()
            .zip(&self.label_types)
            .map(|(n, t)| (n.as_str(), *t, ColumnGroup::Label));
        ids.chain(features).chain(labels)
    }

    /// Declared type and group of a column, if declared.
    pub fn lookup(&self, name: &str) -> Option<(DataType, ColumnGroup)> {
        self.columns()
            .find(|(n, _, _)| *n == name)
            .map(|(_, t, g)| (t, g))
    }

    /// Overwrite the declared type of a column. Returns `false` if the column is not declared.
    pub fn set_type(&mut self, name: &str, data_type: DataType) -> bool {
        let slot = if let Some(i) = self.ids.iter().position(|c| c == name) {
            self.id_types.get_mut(i)
        } else if let Some(i) = self.features.iter().position(|c| c == name) {
            self.feature_types.get_mut(i)
        } else if let Some(i) = self.labels.iter().position(|c| c == name) {
            self.label_types.get_mut(i)
        } else {
            None
        };
        match slot {
            Some(t) => {
                *t = data_type;
                true
            }
            None => false,
        }
    }
}

/// Ordered union of all inputs' declared columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedSchema {
    pub schema: TableSchema,
}

/// Merges input schema descriptors.
pub struct SchemaRegistry;

impl SchemaRegistry {
    /// Concatenate ids, features and labels (with their types) in dataset order.
    ///
    /// Fails if one column name is declared with two different storage types.
    pub fn merge<'a>(schemas: impl IntoIterator<Item = &'a TableSchema>) -> JoinResult<MergedSchema> {
        let mut merged = TableSchema::default();
        for schema in schemas {
            for (name, data_type, _) in schema.columns() {
                if let Some((seen, _)) = merged.lookup(name) {
                    if seen.storage() != data_type.storage() {
                        return Err(JoinError::schema(format!(
                            "column '{name}' is declared as both {seen} and {data_type}"
                        )));
                    }
                }
            }
            merged.ids.extend(schema.ids.iter().cloned());
            merged.features.extend(schema.features.iter().cloned());
            merged.labels.extend(schema.labels.iter().cloned());
            merged.id_types.extend(schema.id_types.iter().copied());
            merged.feature_types.extend(schema.feature_types.iter().copied());
            merged.label_types.extend(schema.label_types.iter().copied());
        }
        Ok(MergedSchema { schema: merged })
    }
}

impl MergedSchema {
    /// Build the output descriptor for the columns actually present in the output, in output order.
    ///
    /// Every output column must be declared, and every declared column must be present.
    pub fn reconcile(&self, output_columns: &[String]) -> JoinResult<OutputSchema> {
        let mut out = OutputSchema::default();
        for col in output_columns {
            let (data_type, group) = self
                .schema
                .lookup(col)
                .ok_or_else(|| JoinError::schema(format!("output column '{col}' not found in schema")))?;
            let resolved = resolved_name(data_type.storage());
            match group {
                ColumnGroup::Id => {
                    out.ids.push(col.clone());
                    out.id_types.push(resolved);
                }
                ColumnGroup::Feature => {
                    out.features.push(col.clone());
                    out.feature_types.push(resolved);
                }
                ColumnGroup::Label => {
                    out.labels.push(col.clone());
                    out.label_types.push(resolved);
                }
            }
        }

        if let Some((missing, _, _)) = self
            .schema
            .columns()
            .find(|(name, _, _)| !output_columns.iter().any(|c| c == *name))
        {
            return Err(JoinError::schema(format!(
                "declared column '{missing}' is absent from the output table"
            )));
        }
        Ok(out)
    }
}

fn resolved_name(storage: StorageType) -> String {
    storage.as_str().to_string()
}

#[cfg(test)]
mod tests {
    use super::{SchemaRegistry, TableSchema};
    use crate::types::DataType;

    fn schema(ids: &[&str], features: &[&str], id_type: DataType, feature_type: DataType) -> TableSchema {
        TableSchema {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            features: features.iter().map(|s| s.to_string()).collect(),
            labels: vec![],
            id_types: vec![id_type; ids.len()],
            feature_types: vec![feature_type; features.len()],
            label_types: vec![],
        }
    }

    #[test]
    fn merge_concatenates_groups_in_dataset_order() {
        let a = schema(&["ID"], &["AGE"], DataType::Int, DataType::Float);
        let b = schema(&["id"], &["age"], DataType::Str, DataType::Int32);
        let merged = SchemaRegistry::merge([&a, &b]).unwrap();

        assert_eq!(merged.schema.ids, vec!["ID", "id"]);
        assert_eq!(merged.schema.features, vec!["AGE", "age"]);
        assert_eq!(merged.schema.id_types, vec![DataType::Int, DataType::Str]);
        assert_eq!(merged.schema.feature_types, vec![DataType::Float, DataType::Int32]);

        let out = merged
            .reconcile(&["ID".into(), "AGE".into(), "id".into(), "age".into()])
            .unwrap();
        assert_eq!(out.ids, vec!["ID", "id"]);
        assert_eq!(out.id_types, vec!["int64", "str"]);
        assert_eq!(out.features, vec!["AGE", "age"]);
        assert_eq!(out.feature_types, vec!["float64", "int64"]);
        assert!(out.labels.is_empty());
    }

    #[test]
    fn merge_rejects_conflicting_types_for_same_name() {
        let a = schema(&["id"], &[], DataType::Int64, DataType::Str);
        let b = schema(&["id"], &[], DataType::Str, DataType::Str);
        let err = SchemaRegistry::merge([&a, &b]).unwrap_err();
        assert!(err.to_string().contains("column 'id' is declared as both int64 and str"));
    }

    #[test]
    fn merge_allows_same_name_with_equivalent_storage() {
        let a = schema(&["id"], &[], DataType::Int32, DataType::Str);
        let b = schema(&["id"], &[], DataType::Int64, DataType::Str);
        assert!(SchemaRegistry::merge([&a, &b]).is_ok());
    }

    #[test]
    fn reconcile_rejects_undeclared_and_missing_columns() {
        let a = schema(&["id"], &["x"], DataType::Int, DataType::Float);
        let merged = SchemaRegistry::merge([&a]).unwrap();

        let err = merged.reconcile(&["id".into(), "x".into(), "y".into()]).unwrap_err();
        assert!(err.to_string().contains("output column 'y' not found"));

        let err = merged.reconcile(&["id".into()]).unwrap_err();
        assert!(err.to_string().contains("declared column 'x' is absent"));
    }

    #[test]
    fn schema_json_accepts_snake_case_and_writes_camel_case() {
        let input = r#"{"ids":["id"],"features":[],"labels":[],"id_types":["int"],"feature_types":[],"label_types":[]}"#;
        let parsed: TableSchema = serde_json::from_str(input).unwrap();
        assert_eq!(parsed.id_types, vec![DataType::Int]);

        let written = serde_json::to_string(&parsed).unwrap();
        assert!(written.contains("\"idTypes\":[\"int\"]"));
    }

    #[test]
    fn set_type_updates_declared_type() {
        let mut a = schema(&["id"], &["x"], DataType::Str, DataType::Str);
        assert!(a.set_type("x", DataType::Float64));
        assert!(!a.set_type("missing", DataType::Float64));
        assert_eq!(a.lookup("x").map(|(t, _)| t), Some(DataType::Float64));
    }

    #[test]
    fn validate_rejects_mismatched_type_lists() {
        let mut a = schema(&["id"], &["x"], DataType::Str, DataType::Str);
        a.feature_types.clear();
        let err = a.validate().unwrap_err();
        assert!(err.to_string().contains("config error"));
    }
}
