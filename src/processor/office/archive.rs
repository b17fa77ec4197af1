//! Lectura y reconstrucción del contenedor ZIP de los documentos OOXML.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::{ProcessorError, Result};
use crate::processor::utils::write_replacing;

/// Devuelve el contenido UTF-8 de una parte, o `None` si el archivo no la contiene.
pub(crate) fn extract_part(path: &Path, name: &str) -> Result<Option<String>> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(error) => return Err(error.into()),
    };

    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    let text = String::from_utf8(bytes).map_err(|e| {
        ProcessorError::Encoding(format!("La parte {name} no es UTF-8 válido: {e}"))
    })?;
    Ok(Some(match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }))
}

/// Disposición de una entrada del archivo original.
struct EntryLayout {
    name: String,
    relative: PathBuf,
    is_dir: bool,
    compression: CompressionMethod,
    unix_mode: Option<u32>,
    last_modified: Option<DateTime>,
    large_file: bool,
}

impl EntryLayout {
    fn options(&self) -> FileOptions<'static, ()> {
        let mut options = FileOptions::<'static, ()>::default()
            .compression_method(self.compression)
            .large_file(self.large_file);
        if let Some(mode) = self.unix_mode {
            options = options.unix_permissions(mode);
        }
        if let Some(time) = self.last_modified {
            options = options.last_modified_time(time);
        }
        options
    }
}

/// Sustituye las partes indicadas y conserva el resto de entradas byte a byte.
///
/// Solo se sustituyen partes que ya existen; el original no se modifica hasta que el
/// nuevo contenedor está completo.
pub(crate) fn replace_parts(path: &Path, parts: &[(&str, Vec<u8>)]) -> Result<()> {
    let workdir = tempfile::Builder::new().prefix("metawipe_").tempdir()?;
    let outcome = rebuild(path, parts, &workdir);

    let location = workdir.path().display().to_string();
    if let Err(error) = workdir.close() {
        warn!(%location, %error, "no se pudo eliminar el directorio de trabajo");
    }
    outcome
}

fn rebuild(path: &Path, parts: &[(&str, Vec<u8>)], workdir: &TempDir) -> Result<()> {
    let layout = extract_entries(path, parts, workdir)?;

    for (part, contents) in parts {
        let Some(entry) = layout.iter().find(|entry| entry.name == *part) else {
            continue;
        };
        let target = workdir.path().join(&entry.relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, contents)?;
    }

    debug!(
        path = %path.display(),
        entries = layout.len(),
        "entradas extraídas; empaquetando de nuevo"
    );

    write_replacing(path, |file| {
        let mut writer = ZipWriter::new(file);
        for entry in &layout {
            if entry.is_dir {
                writer.add_directory(entry.name.as_str(), entry.options())?;
                continue;
            }
            writer.start_file(entry.name.as_str(), entry.options())?;
            let mut input = File::open(workdir.path().join(&entry.relative))?;
            io::copy(&mut input, &mut writer)?;
        }
        writer.finish()?.flush()?;
        Ok(())
    })
}

/// Vuelca al directorio de trabajo todas las entradas salvo `parts` y devuelve su disposición.
///
/// El contenedor de origen queda cerrado al volver, antes de reemplazar el archivo.
fn extract_entries(
    path: &Path,
    parts: &[(&str, Vec<u8>)],
    workdir: &TempDir,
) -> Result<Vec<EntryLayout>> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut layout = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        let relative = entry.enclosed_name().ok_or_else(|| {
            ProcessorError::InvalidStructure(format!("Entrada con ruta insegura en el ZIP: {name}"))
        })?;

        let target = workdir.path().join(&relative);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
        } else if !parts.iter().any(|(part, _)| *part == name) {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut output = File::create(&target)?;
            io::copy(&mut entry, &mut output)?;
        }

        layout.push(EntryLayout {
            is_dir: entry.is_dir(),
            compression: entry.compression(),
            unix_mode: entry.unix_mode(),
            last_modified: entry.last_modified(),
            large_file: entry.size() > u32::MAX as u64,
            name,
            relative,
        });
    }
    Ok(layout)
}
