use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Declared data type of an ontology key. Stored as a string for forward
/// compatibility; anything unrecognised maps to [`DataType::Unknown`] and
/// passes through coercion untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    Number,
    Number64,
    Float,
    Float64,
    Date,
    String,
    Boolean,
    Enumeration,
    File,
    List,
    Unknown,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Number => "number",
            DataType::Number64 => "number64",
            DataType::Float => "float",
            DataType::Float64 => "float64",
            DataType::Date => "date",
            DataType::String => "string",
            DataType::Boolean => "boolean",
            DataType::Enumeration => "enumeration",
            DataType::File => "file",
            DataType::List => "list",
            DataType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "number" => DataType::Number,
            "number64" => DataType::Number64,
            "float" => DataType::Float,
            "float64" => DataType::Float64,
            "date" => DataType::Date,
            "string" => DataType::String,
            "boolean" => DataType::Boolean,
            "enumeration" => DataType::Enumeration,
            "file" => DataType::File,
            "list" => DataType::List,
            _ => DataType::Unknown,
        })
    }
}

impl From<&str> for DataType {
    fn from(value: &str) -> Self {
        value.parse().unwrap_or(DataType::Unknown)
    }
}

impl From<String> for DataType {
    fn from(value: String) -> Self {
        DataType::from(value.as_str())
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.as_str().to_string()
    }
}

/// Which half of the ontology a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    Metatype,
    Relationship,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Metatype => "metatype",
            KeyKind::Relationship => "relationship",
        }
    }
}

impl From<&str> for KeyKind {
    fn from(value: &str) -> Self {
        match value {
            "relationship" => KeyKind::Relationship,
            _ => KeyKind::Metatype,
        }
    }
}

/// A typed property definition on a metatype or relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntologyKey {
    pub id: String,
    pub property_name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub required: bool,
}

impl OntologyKey {
    pub fn new(
        id: impl Into<String>,
        property_name: impl Into<String>,
        data_type: DataType,
        required: bool,
    ) -> Self {
        Self {
            id: id.into(),
            property_name: property_name.into(),
            data_type,
            required,
        }
    }
}
