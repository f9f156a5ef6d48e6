//! JSON task configuration and its conversion into a [`JoinRequest`].
//!
//! Both `snake_case` and `camelCase` field names are accepted. Join keys come from each input's
//! `key` list, or from `params.psi_keys[i].keys` when an input has none.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::dataset::{Dataset, JoinRequest, OutputSpec};
use crate::error::{JoinError, JoinResult};
use crate::schema::TableSchema;

/// Component name accepted in `component_name`.
pub const COMPONENT_NAME: &str = "psi";

/// Top-level task configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    #[serde(default, alias = "componentName")]
    pub component_name: Option<String>,
    #[serde(default)]
    pub params: Option<TaskParams>,
    pub inputs: Vec<InputConfig>,
    pub outputs: Vec<OutputConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskParams {
    #[serde(default, alias = "psiKeys")]
    pub psi_keys: Vec<KeyList>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyList {
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    #[serde(alias = "dataPath")]
    pub data_path: PathBuf,
    pub schema: TableSchema,
    #[serde(default)]
    pub key: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(alias = "dataPath")]
    pub data_path: PathBuf,
    #[serde(alias = "dataSchemaPath")]
    pub data_schema_path: PathBuf,
}

/// Read and parse a task configuration file.
pub fn load_task_config(path: impl AsRef<Path>) -> JoinResult<TaskConfig> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    TaskConfig::from_json_str(&text)
        .map_err(|e| JoinError::config(format!("{}: {e}", path.display())))
}

impl TaskConfig {
    /// Parse a configuration document. Malformed JSON and unknown type names are config errors.
    pub fn from_json_str(text: &str) -> JoinResult<Self> {
        serde_json::from_str(text).map_err(|e| JoinError::config(format!("invalid task config: {e}")))
    }

    /// Convert into the engine's request model.
    pub fn into_request(self) -> JoinResult<JoinRequest> {
        if let Some(name) = &self.component_name {
            if name != COMPONENT_NAME {
                return Err(JoinError::config(format!(
                    "component_name must be '{COMPONENT_NAME}', got '{name}'"
                )));
            }
        }

        let mut outputs = self.outputs.into_iter();
        let output = match (outputs.next(), outputs.next()) {
            (Some(o), None) => OutputSpec {
                data_path: o.data_path,
                schema_path: o.data_schema_path,
            },
            _ => return Err(JoinError::config("exactly one output is required")),
        };

        let mut psi_keys = self.params.unwrap_or_default().psi_keys.into_iter();
        let mut datasets = Vec::with_capacity(self.inputs.len());
        for (i, input) in self.inputs.into_iter().enumerate() {
            let fallback = psi_keys.next().map(|k| k.keys);
            let key = input
                .key
                .or(fallback)
                .ok_or_else(|| JoinError::config(format!("input {i} has no join key")))?;
            datasets.push(Dataset::new(input.data_path, input.schema, key));
        }

        let request = JoinRequest { datasets, output };
        request.validate()?;
        Ok(request)
    }
}
