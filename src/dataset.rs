//! The canonical join input model: [`Dataset`], [`JoinRequest`] and [`OutputSpec`].
//!
//! Configuration front-ends (see [`crate::config`]) convert into these types; the engine only ever
//! sees this model.

use std::path::{Path, PathBuf};

use crate::error::{JoinError, JoinResult};
use crate::ingestion::Dialect;
use crate::schema::TableSchema;

/// Minimum number of datasets in one join.
pub const MIN_DATASETS: usize = 2;
/// Maximum number of datasets in one join.
pub const MAX_DATASETS: usize = 10;

/// One party's table: file, declared columns and join key.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Delimited-text file with a header row.
    pub path: PathBuf,
    /// Declared columns. Key column types may be promoted by coercion.
    pub schema: TableSchema,
    /// Ordered join-key column names.
    pub key: Vec<String>,
    /// Delimiter layout; sniffed from the file unless set explicitly.
    pub dialect: Option<Dialect>,
}

impl Dataset {
    /// Create a dataset whose dialect is sniffed when the run starts.
    pub fn new(path: impl AsRef<Path>, schema: TableSchema, key: Vec<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            schema,
            key,
            dialect: None,
        }
    }

    /// Force a dialect instead of sniffing it.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }
}

/// Where the joined table and its schema descriptor are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub data_path: PathBuf,
    pub schema_path: PathBuf,
}

/// A fully resolved join job.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinRequest {
    pub datasets: Vec<Dataset>,
    pub output: OutputSpec,
}

impl JoinRequest {
    /// Validate everything that can be checked without touching the filesystem.
    ///
    /// - dataset count within `[2, 10]`
    /// - every schema descriptor is well formed
    /// - every join key has the arity of dataset 0's key
    /// - every key column is declared in its dataset's schema
    /// - a column name is declared by only one dataset, unless it is a key column named like dataset
    ///   0's key column at the same position (the output carries it once)
    pub fn validate(&self) -> JoinResult<()> {
        let n = self.datasets.len();
        if !(MIN_DATASETS..=MAX_DATASETS).contains(&n) {
            return Err(JoinError::config(format!(
                "join needs [{MIN_DATASETS},{MAX_DATASETS}] inputs, got {n}"
            )));
        }

        let expected = self.datasets[0].key.len();
        if expected == 0 {
            return Err(JoinError::config("dataset 0 declares an empty join key"));
        }
        for (i, ds) in self.datasets.iter().enumerate() {
            if ds.key.len() != expected {
                return Err(JoinError::JoinArity {
                    dataset: i,
                    expected,
                    actual: ds.key.len(),
                });
            }
        }

        for (i, ds) in self.datasets.iter().enumerate() {
            ds.schema.validate()?;
            for col in &ds.key {
                if ds.schema.lookup(col).is_none() {
                    return Err(JoinError::schema(format!(
                        "join key column '{col}' of dataset {i} is not declared in its schema"
                    )));
                }
            }
        }

        let shared_key = &self.datasets[0].key;
        for (i, ds) in self.datasets.iter().enumerate().skip(1) {
            for (name, _, _) in ds.schema.columns() {
                let collapsed = ds
                    .key
                    .iter()
                    .zip(shared_key)
                    .any(|(k, k0)| k == name && k0 == name);
                if collapsed {
                    continue;
                }
                if let Some(j) = self.datasets[..i]
                    .iter()
                    .position(|earlier| earlier.schema.lookup(name).is_some())
                {
                    return Err(JoinError::schema(format!(
                        "column '{name}' is declared by dataset {j} and dataset {i}"
                    )));
                }
            }
        }
        Ok(())
    }
}
