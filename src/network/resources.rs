//! Data files shipped alongside the server, loaded at most once per process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Deserialize;

use super::wire::ByteCursor;
use crate::nbt::{self, Compound};

pub const ENTITY_IDENTIFIERS: &str = "entity_identifiers.dat";
pub const BLOCK_STATES: &str = "block_states.nbt";
pub const ITEM_ID_MAP: &str = "item_id_map.json";

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("failed to read {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("malformed NBT in {}: {source}", .path.display())]
    Nbt { path: PathBuf, source: fastnbt::error::Error },
    #[error("malformed JSON in {}: {source}", .path.display())]
    Json { path: PathBuf, source: serde_json::Error },
    #[error("{}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
}

/// One known block state and the legacy id it maps back to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlockState {
    pub name: String,
    pub states: Compound,
    pub legacy_id: i16,
}

#[derive(Deserialize)]
struct BlockStatesFile {
    states: Vec<BlockState>,
}

static RESOURCE_DIR: OnceLock<PathBuf> = OnceLock::new();
static ENTITY_IDENTIFIERS_BLOB: OnceLock<Vec<u8>> = OnceLock::new();
static BLOCK_STATE_LIST: OnceLock<Vec<BlockState>> = OnceLock::new();
static ITEM_IDS: OnceLock<BTreeMap<String, i16>> = OnceLock::new();

/// Points the loaders at `dir`. Only takes effect before the first load.
pub fn set_resource_dir(dir: impl Into<PathBuf>) -> bool {
    RESOURCE_DIR.set(dir.into()).is_ok()
}

pub fn resource_dir() -> &'static Path {
    RESOURCE_DIR.get_or_init(|| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/resources")))
}

/// Fills `cell` from `load` unless it is already populated. Failures leave it empty.
pub(crate) fn cached<T, E>(cell: &'static OnceLock<T>, load: impl FnOnce() -> Result<T, E>) -> Result<&'static T, E> {
    if let Some(v) = cell.get() {
        return Ok(v);
    }
    let v = load()?;
    Ok(cell.get_or_init(|| v))
}

fn read(path: &Path) -> Result<Vec<u8>, ResourceError> {
    log::debug!("loading {}", path.display());
    std::fs::read(path).map_err(|source| ResourceError::Io { path: path.to_owned(), source })
}

/// The vanilla entity identifier tag tree, checked but kept in its wire form.
pub fn load_entity_identifiers_from(dir: &Path) -> Result<Vec<u8>, ResourceError> {
    let path = dir.join(ENTITY_IDENTIFIERS);
    let blob = read(&path)?;
    let mut cur = ByteCursor::from(blob);
    nbt::read_compound_root(&mut cur).map_err(|e| ResourceError::Malformed { path: path.clone(), reason: e.to_string() })?;
    if !cur.is_exhausted() {
        let reason = format!("{} trailing bytes", cur.remaining());
        return Err(ResourceError::Malformed { path, reason });
    }
    Ok(cur.into_inner())
}

pub fn load_block_states_from(dir: &Path) -> Result<Vec<BlockState>, ResourceError> {
    let path = dir.join(BLOCK_STATES);
    let bytes = read(&path)?;
    let file: BlockStatesFile = fastnbt::from_bytes(&bytes).map_err(|source| ResourceError::Nbt { path, source })?;
    Ok(file.states)
}

pub fn load_item_id_map_from(dir: &Path) -> Result<BTreeMap<String, i16>, ResourceError> {
    let path = dir.join(ITEM_ID_MAP);
    let bytes = read(&path)?;
    serde_json::from_slice(&bytes).map_err(|source| ResourceError::Json { path, source })
}

pub fn entity_identifiers() -> Result<&'static [u8], ResourceError> {
    cached(&ENTITY_IDENTIFIERS_BLOB, || load_entity_identifiers_from(resource_dir())).map(Vec::as_slice)
}

pub fn block_states() -> Result<&'static [BlockState], ResourceError> {
    cached(&BLOCK_STATE_LIST, || load_block_states_from(resource_dir())).map(Vec::as_slice)
}

pub fn item_id_map() -> Result<&'static BTreeMap<String, i16>, ResourceError> {
    cached(&ITEM_IDS, || load_item_id_map_from(resource_dir()))
}

/// Loads everything up front so a broken install fails at startup.
pub fn warm() -> Result<(), ResourceError> {
    let blob = entity_identifiers()?;
    let blocks = block_states()?;
    let items = item_id_map()?;
    log::info!(
        "loaded resources from {}: {} byte entity table, {} block states, {} items",
        resource_dir().display(),
        blob.len(),
        blocks.len(),
        items.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundled() -> &'static Path {
        Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/resources"))
    }

    #[test]
    fn bundled_entity_identifiers_parse() {
        let blob = load_entity_identifiers_from(bundled()).unwrap();
        let root = nbt::read_compound_root(&mut ByteCursor::from(blob)).unwrap();
        match root.get("idlist") {
            Some(fastnbt::Value::List(ids)) => assert!(!ids.is_empty()),
            other => panic!("unexpected idlist {other:?}"),
        }
    }

    #[test]
    fn bundled_block_states_parse() {
        let states = load_block_states_from(bundled()).unwrap();
        assert_eq!(states[0].name, "minecraft:air");
        assert_eq!(states[0].legacy_id, 0);
        let granite = states.iter().find(|s| s.states.get("stone_type") == Some(&fastnbt::Value::String("granite".into())));
        assert_eq!(granite.map(|s| s.legacy_id), Some(1));
    }

    #[test]
    fn bundled_item_ids_parse() {
        let items = load_item_id_map_from(bundled()).unwrap();
        assert_eq!(items.get("minecraft:shield"), Some(&513));
    }

    #[test]
    fn missing_files_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_entity_identifiers_from(dir.path()), Err(ResourceError::Io { .. })));
        assert!(matches!(load_block_states_from(dir.path()), Err(ResourceError::Io { .. })));
        assert!(matches!(load_item_id_map_from(dir.path()), Err(ResourceError::Io { .. })));
    }

    #[test]
    fn malformed_files_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ENTITY_IDENTIFIERS), [10, 0, 1]).unwrap();
        std::fs::write(dir.path().join(BLOCK_STATES), [10, 0]).unwrap();
        std::fs::write(dir.path().join(ITEM_ID_MAP), "[1, 2").unwrap();
        assert!(matches!(load_entity_identifiers_from(dir.path()), Err(ResourceError::Malformed { .. })));
        assert!(matches!(load_block_states_from(dir.path()), Err(ResourceError::Nbt { .. })));
        assert!(matches!(load_item_id_map_from(dir.path()), Err(ResourceError::Json { .. })));
    }

    #[test]
    fn cache_populates_once() {
        static CELL: OnceLock<u32> = OnceLock::new();
        assert!(cached(&CELL, || Err(ResourceError::Malformed { path: "x".into(), reason: "no".into() })).is_err());
        assert_eq!(cached(&CELL, || Ok::<_, ResourceError>(1)).unwrap(), &1);
        assert_eq!(cached(&CELL, || Ok::<_, ResourceError>(2)).unwrap(), &1);
    }
}
