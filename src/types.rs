//! Core data model types shared by the join stages.
//!
//! Inputs declare a [`DataType`] per column; rows are parsed into [`Value`]s according to the
//! column's [`StorageType`] and collected into a [`Table`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Declared semantic type of a column, as written in schema descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    /// Unsized integer alias accepted on input.
    Int,
    Float16,
    Float32,
    Float64,
    /// Unsized float alias accepted on input.
    Float,
    Bool,
    Str,
}

impl DataType {
    /// Name as it appears in schema descriptors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Int => "int",
            Self::Float16 => "float16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Str => "str",
        }
    }

    /// Physical storage used for values of this type.
    pub fn storage(&self) -> StorageType {
        match self {
            Self::Int8
            | Self::Int16
            | Self::Int32
            | Self::Int64
            | Self::UInt8
            | Self::UInt16
            | Self::UInt32
            | Self::UInt64
            | Self::Int => StorageType::Int64,
            Self::Float16 | Self::Float32 | Self::Float64 | Self::Float => StorageType::Float64,
            Self::Bool => StorageType::Bool,
            Self::Str => StorageType::Utf8,
        }
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint8" => Self::UInt8,
            "uint16" => Self::UInt16,
            "uint32" => Self::UInt32,
            "uint64" => Self::UInt64,
            "int" => Self::Int,
            "float16" => Self::Float16,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            "float" => Self::Float,
            "bool" => Self::Bool,
            "str" => Self::Str,
            other => return Err(format!("unknown column type '{other}'")),
        })
    }
}

impl TryFrom<String> for DataType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical storage type a [`DataType`] resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// Opaque UTF-8 string.
    Utf8,
}

impl StorageType {
    /// Resolved type name written to output schema descriptors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::Utf8 => "str",
        }
    }
}

/// Which group of a schema descriptor a column belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnGroup {
    Id,
    Feature,
    Label,
}

/// A single typed value read from a delimited file.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// Render the value as an output cell.
    ///
    /// Floats always carry a decimal point or exponent (`1.0`, `1e20`); nulls and NaN render
    /// as an empty cell.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int64(v) => v.to_string(),
            Value::Float64(v) if v.is_nan() => String::new(),
            Value::Float64(v) => format!("{v:?}"),
            Value::Bool(v) => v.to_string(),
            Value::Utf8(s) => s.clone(),
        }
    }
}

/// In-memory table: a header, the resolved storage type of every column and row-major values.
///
/// Used for a single shard of a single dataset, and for the joined result of one shard.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Column names in file order.
    pub columns: Vec<String>,
    /// Storage type of each column, parallel to `columns`.
    pub types: Vec<StorageType>,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create a table from header, types and rows.
    pub fn new(columns: Vec<String>, types: Vec<StorageType>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            types,
            rows,
        }
    }

    /// Number of rows in the table.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{DataType, StorageType, Value};

    #[test]
    fn declared_types_resolve_to_storage() {
        assert_eq!(DataType::UInt16.storage(), StorageType::Int64);
        assert_eq!(DataType::Int.storage(), StorageType::Int64);
        assert_eq!(DataType::Float32.storage(), StorageType::Float64);
        assert_eq!(DataType::Bool.storage(), StorageType::Bool);
        assert_eq!(DataType::Str.storage(), StorageType::Utf8);
    }

    #[test]
    fn data_type_parses_and_rejects_unknown_names() {
        assert_eq!("float".parse::<DataType>(), Ok(DataType::Float));
        assert_eq!("uint64".parse::<DataType>(), Ok(DataType::UInt64));
        assert!("decimal".parse::<DataType>().is_err());
    }

    #[test]
    fn floats_render_with_decimal_point() {
        assert_eq!(Value::Float64(1.0).render(), "1.0");
        assert_eq!(Value::Float64(20000.0).render(), "20000.0");
        assert_eq!(Value::Float64(0.25).render(), "0.25");
        assert_eq!(Value::Float64(f64::NAN).render(), "");
        assert_eq!(Value::Int64(-3).render(), "-3");
        assert_eq!(Value::Null.render(), "");
    }
}
