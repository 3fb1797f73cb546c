//! Loading pipeline: finds data files, deserializes them, resolves unit
//! inheritance and validates the result.
//!
//! A data directory holds up to three files, each in RON, JSON or TOML:
//!
//! | base name | contents                 | required |
//! |-----------|--------------------------|----------|
//! | `engine`  | [`EngineConfig`]         | no       |
//! | `board`   | [`BoardLayout`]          | no       |
//! | `units`   | list of [`UnitData`]     | yes      |

use autochess_core::agent::{AgentTemplate, StatBlock, TemplateError};
use autochess_core::board::BoardLayout;
use autochess_core::combat::Archetype;
use autochess_core::config::EngineConfig;
use autochess_core::engine::{CommandError, Engine};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::schema::UnitData;

pub const ENGINE_FILE: &str = "engine";
pub const BOARD_FILE: &str = "board";
pub const UNITS_FILE: &str = "units";

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: &'static str, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A unit extends a name that is not defined earlier in the file.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A unit resolved to stats the engine cannot simulate.
    #[error("invalid unit '{name}' in {file}: {source}")]
    InvalidTemplate {
        file: PathBuf,
        name: String,
        #[source]
        source: TemplateError,
    },

    #[error("invalid board layout in {file}: {detail}")]
    InvalidLayout { file: PathBuf, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for `{base_name}.ron`, `.toml` or `.json`.
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// more than one format exists for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if !candidate.exists() {
            continue;
        }
        if let Some(existing) = found {
            return Err(DataLoadError::ConflictingFormats {
                a: existing,
                b: candidate,
            });
        }
        found = Some(candidate);
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &'static str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name,
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, err: impl std::fmt::Display) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: err.to_string(),
    }
}

/// Read a file and deserialize it according to its format.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list from a file. TOML has no top-level arrays, so there
/// the list is read from the array of tables at `toml_key`. RON and JSON
/// files hold the list directly.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    if detect_format(path)? != Format::Toml {
        return deserialize_file(path);
    }

    let mut table: toml::Table = deserialize_file(path)?;
    let array = table
        .remove(toml_key)
        .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?;
    array
        .try_into()
        .map_err(|e: toml::de::Error| parse_error(path, e))
}

/// Deserialize an optional file, falling back to `T::default()` when it is
/// absent.
fn load_optional<T: DeserializeOwned + Default>(
    dir: &Path,
    base_name: &str,
) -> Result<(T, Option<PathBuf>), DataLoadError> {
    match find_data_file(dir, base_name)? {
        Some(path) => {
            let value = deserialize_file(&path)?;
            debug!(file = %path.display(), "loaded");
            Ok((value, Some(path)))
        }
        None => {
            debug!(base_name, "not found, using defaults");
            Ok((T::default(), None))
        }
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Return a `DuplicateName` error if `name` is already in the map.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Resolution
// ===========================================================================

/// Turn unit definitions into validated templates, in file order. A unit may
/// only extend a unit defined before it.
pub fn resolve_units(units: &[UnitData], file: &Path) -> Result<Vec<AgentTemplate>, DataLoadError> {
    let mut resolved: HashMap<String, AgentTemplate> = HashMap::with_capacity(units.len());
    let mut templates = Vec::with_capacity(units.len());
    let root = AgentTemplate::new("", Archetype::default(), StatBlock::default());

    for unit in units {
        check_duplicate(&resolved, &unit.name, file)?;
        let base = match &unit.extends {
            Some(parent) => resolve_name(&resolved, parent, file, "unit")?,
            None => &root,
        };

        let template = AgentTemplate::new(
            unit.name.clone(),
            unit.archetype.unwrap_or(base.archetype),
            unit.stats.apply(&base.stats),
        );
        template
            .validate()
            .map_err(|source| DataLoadError::InvalidTemplate {
                file: file.to_path_buf(),
                name: unit.name.clone(),
                source,
            })?;

        debug!(name = %template.name, extends = ?unit.extends, "unit resolved");
        resolved.insert(unit.name.clone(), template.clone());
        templates.push(template);
    }

    Ok(templates)
}

fn validate_layout(layout: &BoardLayout, file: &Path) -> Result<(), DataLoadError> {
    let detail = if layout.battle_columns == 0 || layout.battle_rows == 0 {
        "battle grid has no tiles"
    } else if !layout.spacing.is_finite() || layout.spacing <= 0.0 {
        "spacing must be positive"
    } else {
        return Ok(());
    };
    Err(DataLoadError::InvalidLayout {
        file: file.to_path_buf(),
        detail: detail.to_string(),
    })
}

// ===========================================================================
// Top-level loading
// ===========================================================================

/// Everything loaded from a data directory.
#[derive(Debug, Clone, PartialEq)]
pub struct GameData {
    pub config: EngineConfig,
    pub layout: BoardLayout,
    pub templates: Vec<AgentTemplate>,
}

impl GameData {
    /// A fresh engine on this board with every template registered, in file
    /// order.
    pub fn build_engine(&self) -> Result<Engine, CommandError> {
        let board = self.layout.build(self.config.adjacency_threshold);
        let mut engine = Engine::new(board, self.config.clone());
        for template in &self.templates {
            engine.register_template(template.clone())?;
        }
        Ok(engine)
    }
}

/// Load the engine config, board layout and units from `dir`.
pub fn load_game_data(dir: &Path) -> Result<GameData, DataLoadError> {
    info!(dir = %dir.display(), "loading game data");

    let (config, _) = load_optional::<EngineConfig>(dir, ENGINE_FILE)?;
    let (layout, layout_file) = load_optional::<BoardLayout>(dir, BOARD_FILE)?;
    validate_layout(&layout, layout_file.as_deref().unwrap_or(dir))?;

    let units_file = require_data_file(dir, UNITS_FILE)?;
    let units: Vec<UnitData> = deserialize_list(&units_file, UNITS_FILE)?;
    let templates = resolve_units(&units, &units_file)?;

    info!(units = templates.len(), "game data loaded");
    Ok(GameData {
        config,
        layout,
        templates,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
