//! Exportación de la metadata leída a un archivo JSON junto al original.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::operation::OperationResult;

use super::utils::parent_dir;

const EXPORT_SUFFIX: &str = "_metadata.json";

/// Ruta del JSON exportado: `<stem>_metadata.json` en `output_directory` o junto a `source`.
pub fn export_path(source: &Path, output_directory: Option<&Path>) -> PathBuf {
    let stem = source.file_stem().unwrap_or_default().to_string_lossy();
    let directory = match output_directory {
        Some(directory) if !directory.as_os_str().is_empty() => directory,
        _ => parent_dir(source),
    };
    directory.join(format!("{stem}{EXPORT_SUFFIX}"))
}

/// Serializa `metadata` como un objeto JSON de cadenas.
///
/// `serde_json` escapa comillas, barras invertidas y caracteres de control por igual
/// para todos los formatos.
pub(crate) fn write_metadata_json(
    source: &Path,
    output_directory: Option<&Path>,
    metadata: &BTreeMap<String, String>,
) -> Result<PathBuf> {
    if let Some(directory) = output_directory
        && !directory.as_os_str().is_empty()
    {
        fs::create_dir_all(directory)?;
    }

    let target = export_path(source, output_directory);
    let json = serde_json::to_string_pretty(metadata)?;
    fs::write(&target, json)?;

    info!(source = %source.display(), target = %target.display(), "metadata exportada");
    Ok(target)
}

/// Completa una lectura exitosa escribiendo su mapa en disco.
pub(crate) fn export_read_result(
    source: &Path,
    output_directory: Option<&Path>,
    read: OperationResult,
) -> Result<OperationResult> {
    if !read.success {
        return Ok(read);
    }

    let target = write_metadata_json(source, output_directory, &read.metadata)?;
    Ok(OperationResult::success(format!(
        "Metadata exportada a: {}",
        target.display()
    ))
    .with_warnings(read.warnings)
    .with_metadata(read.metadata))
}
