use crate::core::{Column, OrmError, Result};
use crate::storage::ID_COLUMN;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
        .expect("identifier pattern is valid");
}

/// Rejects names that cannot be used as an entity or column name.
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(OrmError::Configuration(format!(
            "The {} name \"{}\" is not a valid identifier.",
            kind, name
        )))
    }
}

/// Raw behavior options as written in a schema file.
pub type BehaviorOptions = BTreeMap<String, serde_json::Value>;

/// A behavior attached to an entity, with its unvalidated options.
///
/// Serialized externally tagged: `{"sortable": {"new_position": "top"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorConfig {
    Sortable(BehaviorOptions),
}

impl BehaviorConfig {
    pub fn sortable() -> Self {
        Self::Sortable(BehaviorOptions::new())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sortable(_) => "sortable",
        }
    }

    /// Options flattened to strings; non-string JSON values keep their
    /// JSON spelling (`true`, `3`).
    pub fn string_options(&self) -> BTreeMap<String, String> {
        let Self::Sortable(options) = self;
        options
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect()
    }

    pub fn with_option(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        let Self::Sortable(options) = &mut self;
        options.insert(key.to_string(), value.into());
        self
    }
}

/// Declarative description of one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub behaviors: Vec<BehaviorConfig>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            behaviors: Vec::new(),
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn behavior(mut self, behavior: BehaviorConfig) -> Self {
        self.behaviors.push(behavior);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let schema: Self = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> Result<()> {
        validate_identifier("entity", &self.name)?;
        let mut seen = HashSet::new();
        for column in &self.columns {
            validate_identifier("column", &column.name)?;
            if column.name == ID_COLUMN {
                return Err(OrmError::Configuration(format!(
                    "Entity '{}' declares the implicit '{}' column.",
                    self.name, ID_COLUMN
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(OrmError::Configuration(format!(
                    "Entity '{}' declares column '{}' twice.",
                    self.name, column.name
                )));
            }
        }
        Ok(())
    }
}
