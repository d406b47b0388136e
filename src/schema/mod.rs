//! Entity schema descriptions.
//!
//! A schema file is a JSON array of entities:
//!
//! ```json
//! [
//!   {
//!     "name": "Sortable",
//!     "columns": [{ "name": "title", "type": "text" }],
//!     "behaviors": [{ "sortable": { "new_position": "bottom" } }]
//!   }
//! ]
//! ```

pub mod definition;

pub use definition::{BehaviorConfig, BehaviorOptions, EntitySchema, validate_identifier};

use crate::core::Result;

/// Parses and validates a JSON array of entity schemas.
pub fn parse_schemas(json: &str) -> Result<Vec<EntitySchema>> {
    let schemas: Vec<EntitySchema> = serde_json::from_str(json)?;
    for schema in &schemas {
        schema.validate()?;
    }
    Ok(schemas)
}
