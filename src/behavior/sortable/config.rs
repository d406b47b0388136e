use crate::core::{OrmError, Result};
use crate::schema::validate_identifier;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Where a newly persisted entity is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NewPosition {
    /// Position 1; everything else shifts down.
    Top,
    /// One past the current maximum.
    #[default]
    Bottom,
}

impl FromStr for NewPosition {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            other => Err(OrmError::Configuration(format!(
                "The new_position \"{}\" is not valid.",
                other
            ))),
        }
    }
}

impl fmt::Display for NewPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => write!(f, "top"),
            Self::Bottom => write!(f, "bottom"),
        }
    }
}

/// Options of the sortable behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortableConfig {
    /// Name of the integer ordering column.
    pub column: String,
    pub new_position: NewPosition,
    /// Close the gap left by a removed entity.
    pub compact_on_delete: bool,
}

impl Default for SortableConfig {
    fn default() -> Self {
        Self {
            column: "position".to_string(),
            new_position: NewPosition::Bottom,
            compact_on_delete: false,
        }
    }
}

impl SortableConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, column: &str) -> Self {
        self.column = column.to_string();
        self
    }

    pub fn new_position(mut self, new_position: NewPosition) -> Self {
        self.new_position = new_position;
        self
    }

    pub fn compact_on_delete(mut self, enabled: bool) -> Self {
        self.compact_on_delete = enabled;
        self
    }

    /// Builds a config from raw string options, as found in a schema file.
    ///
    /// Recognized keys: `column`, `new_position`, `compact_on_delete`.
    pub fn from_options(options: &BTreeMap<String, String>) -> Result<Self> {
        let mut config = Self::default();
        for (key, value) in options {
            match key.as_str() {
                "column" => config.column = value.clone(),
                "new_position" => config.new_position = value.parse()?,
                "compact_on_delete" => {
                    config.compact_on_delete = value.parse().map_err(|_| {
                        OrmError::Configuration(format!(
                            "The compact_on_delete \"{}\" is not a boolean.",
                            value
                        ))
                    })?
                }
                other => {
                    return Err(OrmError::Configuration(format!(
                        "The option \"{}\" does not exist for the sortable behavior.",
                        other
                    )));
                }
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_identifier("column", &self.column)
    }
}
