//! Punto de entrada de alto nivel: valida rutas, resuelve el procesador y ejecuta.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::ProcessorError;
use crate::file_properties::FileIdentity;
use crate::operation::{OperationRequest, OperationResult};
use crate::processor::ProcessorRegistry;

/// Extensiones con procesador registrado, en el orden en que se anuncian.
pub const SUPPORTED_EXTENSIONS: &[&str] =
    &[".pdf", ".jpg", ".jpeg", ".png", ".docx", ".xlsx", ".pptx"];

/// Orquestador de operaciones sobre uno o varios archivos.
///
/// Nunca devuelve errores: cada archivo produce exactamente un [`OperationResult`].
#[derive(Clone)]
pub struct MetaWiper {
    registry: ProcessorRegistry,
}

impl Default for MetaWiper {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaWiper {
    /// Orquestador con todos los formatos incluidos en el crate.
    pub fn new() -> Self {
        Self::with_registry(ProcessorRegistry::with_builtin_processors())
    }

    pub fn with_registry(registry: ProcessorRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    pub fn process_file(&self, path: &Path, request: &OperationRequest) -> OperationResult {
        if !path.exists() {
            return ProcessorError::NotFound(path.to_path_buf()).into();
        }

        let Some(resolved) = self.registry.resolve(path) else {
            let identity = FileIdentity::classify(path);
            debug!(path = %path.display(), extension = identity.extension(), "formato sin procesador");
            return ProcessorError::UnsupportedFormat(identity.extension().to_string()).into();
        };

        let mut processor = match resolved {
            Ok(processor) => processor,
            Err(error) => return error.into(),
        };

        let result = processor.execute(request);
        info!(
            path = %path.display(),
            format = processor.format_name(),
            operation = %request.kind,
            success = result.success,
            "operación completada"
        );
        result
    }

    /// Procesa cada ruta en orden; un fallo no detiene el lote.
    pub fn process_files<I, P>(&self, paths: I, request: &OperationRequest) -> Vec<OperationResult>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths
            .into_iter()
            .map(|path| self.process_file(path.as_ref(), request))
            .collect()
    }

    pub fn supported_extensions() -> &'static [&'static str] {
        SUPPORTED_EXTENSIONS
    }

    /// Acepta la extensión con o sin un único punto inicial y sin distinguir mayúsculas.
    pub fn type_supported(extension: &str) -> bool {
        let normalized = extension
            .strip_prefix('.')
            .unwrap_or(extension)
            .to_ascii_lowercase();
        !normalized.is_empty()
            && SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| supported[1..] == normalized)
    }

    /// Archivos con extensión admitida bajo `root`, ordenados.
    ///
    /// Sin `recursive` solo se examina el primer nivel. Un archivo se devuelve a sí mismo si
    /// su extensión es admitida.
    pub fn collect_candidate_files(root: &Path, recursive: bool) -> Vec<PathBuf> {
        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .max_depth(max_depth)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(error) => {
                    debug!(%error, "entrada ignorada al recorrer el directorio");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| Self::type_supported(&ext.to_string_lossy()))
            })
            .map(|entry| entry.into_path())
            .collect();

        files.sort();
        files.dedup();
        files
    }
}
