//! Utilidades compartidas por los procesadores: firmas y reemplazo seguro de archivos.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use crate::error::Result;

/// Devuelve el directorio que contiene `path`, usando `.` para rutas relativas sin padre.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Lee como máximo `len` bytes del inicio del archivo.
pub(crate) fn read_signature(path: &Path, len: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(len);
    File::open(path)?.take(len as u64).read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Escribe el nuevo contenido en un temporal junto a `path` y solo entonces lo renombra encima.
///
/// Si `write` falla el original no se toca y el temporal se elimina al salir.
pub(crate) fn write_replacing<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let mut staging = tempfile::Builder::new()
        .prefix(&format!(".{stem}_"))
        .suffix(".tmp")
        .tempfile_in(parent_dir(path))?;

    write(staging.as_file_mut())?;
    staging.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(staging.path(), metadata.permissions())?;
    }

    staging.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn failed_write_keeps_original() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let target = dir.path().join("original.bin");
        fs::write(&target, b"original")?;

        let outcome = write_replacing(&target, |file| {
            file.write_all(b"a medias")?;
            Err(crate::error::ProcessorError::Encoding("fallo simulado".into()))
        });

        assert!(outcome.is_err());
        assert_eq!(fs::read(&target)?, b"original");
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn successful_write_replaces_content() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let target = dir.path().join("original.bin");
        fs::write(&target, b"original")?;

        write_replacing(&target, |file| {
            file.write_all(b"nuevo")?;
            Ok(())
        })?;

        assert_eq!(fs::read(&target)?, b"nuevo");
        assert_eq!(read_signature(&target, 3)?, b"nue");
        assert_eq!(read_signature(&target, 64)?, b"nuevo");
        Ok(())
    }

    #[test]
    fn parent_of_bare_file_name_is_current_dir() {
        assert_eq!(parent_dir(Path::new("foto.jpg")), Path::new("."));
        assert_eq!(parent_dir(Path::new("a/foto.jpg")), Path::new("a"));
    }
}
