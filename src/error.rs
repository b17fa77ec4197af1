//! Taxonomía de errores que pueden producir los procesadores de metadata.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::operation::OperationKind;

/// Error interno de un procesador.
///
/// Nunca cruza la frontera pública: [`crate::processor::Processor::execute`]
/// lo convierte en un [`crate::operation::OperationResult`] fallido.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("El archivo no existe: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Formato de archivo no soportado: .{0}")]
    UnsupportedFormat(String),

    #[error("No se pudo cargar el documento {format}: {reason}")]
    Load { format: &'static str, reason: String },

    #[error("Estructura inválida: {0}")]
    InvalidStructure(String),

    #[error("La operación {operation} no está implementada para {format}")]
    OperationUnsupported {
        operation: OperationKind,
        format: &'static str,
    },

    #[error("Error de E/S: {0}")]
    Io(#[from] io::Error),

    #[error("Error en el contenedor ZIP: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Error procesando XML: {0}")]
    Xml(String),

    #[error("Error procesando PDF: {0}")]
    Pdf(String),

    #[error("Error procesando EXIF: {0}")]
    Exif(String),

    #[error("No se pudo codificar la metadata: {0}")]
    Encoding(String),

    #[error("No se pudo serializar JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProcessorError {
    pub(crate) fn load(format: &'static str, reason: impl ToString) -> Self {
        Self::Load {
            format,
            reason: reason.to_string(),
        }
    }
}

impl From<tempfile::PersistError> for ProcessorError {
    fn from(error: tempfile::PersistError) -> Self {
        Self::Io(error.error)
    }
}

impl From<xmltree::ParseError> for ProcessorError {
    fn from(error: xmltree::ParseError) -> Self {
        Self::Xml(error.to_string())
    }
}

impl From<lopdf::Error> for ProcessorError {
    fn from(error: lopdf::Error) -> Self {
        Self::Pdf(error.to_string())
    }
}

impl From<exif::Error> for ProcessorError {
    fn from(error: exif::Error) -> Self {
        Self::Exif(error.to_string())
    }
}

pub type Result<T, E = ProcessorError> = std::result::Result<T, E>;
