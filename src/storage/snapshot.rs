//! JSON snapshots of a whole store, written atomically.

use super::Catalog;
use crate::core::{OrmError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub created_at: u64,
    pub catalog: Catalog,
}

impl StoreSnapshot {
    pub fn new(catalog: Catalog) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            version: SNAPSHOT_VERSION,
            created_at,
            catalog,
        }
    }
}

/// Writes the catalog to `path`. The file is replaced in one rename, so a
/// crash mid-write never leaves a truncated snapshot behind.
pub fn save(path: &Path, catalog: &Catalog) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, &StoreSnapshot::new(catalog.clone()))?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| OrmError::Io(e.to_string()))?;
    tracing::debug!(path = %path.display(), tables = catalog.table_names().len(), "snapshot saved");
    Ok(())
}

/// Reads a snapshot written by [`save`]. A missing file yields an empty
/// catalog.
pub fn load(path: &Path) -> Result<Catalog> {
    if !path.exists() {
        return Ok(Catalog::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let snapshot: StoreSnapshot = serde_json::from_reader(reader)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(OrmError::Serialization(format!(
            "Unsupported snapshot version {} (expected {})",
            snapshot.version, SNAPSHOT_VERSION
        )));
    }
    Ok(snapshot.catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType, Value};
    use crate::storage::TableSchema;

    #[test]
    fn test_save_then_load_keeps_rows_and_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut catalog = Catalog::new();
        catalog
            .create_table(TableSchema::new(
                "Sortable",
                vec![Column::new("position", DataType::Integer)],
            ))
            .unwrap();
        let table = catalog.table_mut("Sortable").unwrap();
        table.insert(vec![Value::Null, Value::Integer(1)]).unwrap();
        table.insert(vec![Value::Null, Value::Integer(2)]).unwrap();
        table.delete(2);

        save(&path, &catalog).unwrap();
        let mut loaded = load(&path).unwrap();

        let table = loaded.table_mut("Sortable").unwrap();
        assert_eq!(table.row_count(), 1);
        // The sequence is not reused after a delete.
        assert_eq!(table.insert(vec![Value::Null, Value::Integer(2)]).unwrap(), 3);
    }

    #[test]
    fn test_missing_file_is_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = load(&dir.path().join("absent.json")).unwrap();
        assert!(catalog.table_names().is_empty());
    }
}
