//! Locating and loading the GIR files a namespace depends on

use super::GirReader;
use crate::ast::{Include, Model, NamespaceId};
use crate::error::{GirError, ScanError};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

const SYSTEM_GIR_DIR: &str = "/usr/share/gir-1.0";

/// Directories searched for `Name-Version.gir`, in priority order
///
/// `extra` comes first, then `GI_GIR_PATH`, then `gir-1.0` below every
/// `XDG_DATA_DIRS` entry, then the system directory.
pub fn gir_search_path(extra: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = extra.to_vec();
    if let Some(value) = env::var_os("GI_GIR_PATH") {
        paths.extend(env::split_paths(&value));
    }
    if let Some(value) = env::var_os("XDG_DATA_DIRS") {
        paths.extend(env::split_paths(&value).map(|dir| dir.join("gir-1.0")));
    }
    let system = PathBuf::from(SYSTEM_GIR_DIR);
    if !paths.contains(&system) {
        paths.push(system);
    }
    paths
}

/// First `Name-Version.gir` on the search path
pub fn find_include(include: &Include, search_path: &[PathBuf]) -> Result<PathBuf, ScanError> {
    let filename = include.gir_filename();
    search_path
        .iter()
        .map(|dir| dir.join(&filename))
        .find(|path| path.is_file())
        .ok_or_else(|| ScanError::IncludeNotFound(include.to_string(), search_path.to_vec()))
}

/// Load an include and, transitively, its own includes
///
/// Namespaces already in the model are skipped, so include cycles end.
pub fn load_include(model: &mut Model, include: &Include, search_path: &[PathBuf]) -> Result<(), ScanError> {
    if model.namespace_by_name(&include.name).is_some() {
        return Ok(());
    }
    let path = find_include(include, search_path)?;
    let id = load_file(model, &path)?;

    let nested: Vec<Include> = model.namespace(id).includes.iter().cloned().collect();
    for dependency in &nested {
        load_include(model, dependency, search_path)?;
    }
    Ok(())
}

/// Load one GIR file as an extra namespace
pub fn load_file(model: &mut Model, path: &Path) -> Result<NamespaceId, ScanError> {
    debug!(path = %path.display(), "loading include");
    let text = std::fs::read_to_string(path).map_err(|source| GirError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(GirReader::types_only().read_into(model, &text)?)
}
