//! Procesadores de metadata por formato y el contrato común que los despacha.

pub mod export;
pub mod image;
pub mod office;
pub mod pdf;
mod pipeline;
pub mod registry;
mod utils;

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::operation::{OperationRequest, OperationResult};

pub use self::image::{ImageContainerKind, ImageProcessor};
pub use office::OfficeProcessor;
pub use pdf::PdfProcessor;
pub use registry::{ProcessorConstructor, ProcessorRegistry};

/// Capacidades que todo formato debe ofrecer.
///
/// No hay implementaciones por defecto: una operación sin soporte devuelve
/// [`crate::error::ProcessorError::OperationUnsupported`] de forma explícita.
pub trait MetadataHandler {
    /// Nombre corto del formato para mensajes (`PDF`, `JPEG`, `DOCX`...).
    fn format_name(&self) -> &'static str;

    fn path(&self) -> &Path;

    /// Validación estructural previa a cualquier operación.
    fn check_prerequisites(&self) -> Result<()>;

    fn read(&mut self) -> Result<OperationResult>;

    fn clean(&mut self) -> Result<OperationResult>;

    fn overwrite(&mut self, values: &BTreeMap<String, String>) -> Result<OperationResult>;

    fn export(&mut self, output_directory: Option<&Path>) -> Result<OperationResult>;

    fn restore(&mut self) -> Result<OperationResult>;
}

/// Conjunto cerrado de procesadores disponibles.
///
/// Cada instancia posee su documento ya cargado y se descarta tras usarse.
pub enum Processor {
    Pdf(PdfProcessor),
    Image(ImageProcessor),
    Office(OfficeProcessor),
}

impl Processor {
    fn handler_mut(&mut self) -> &mut dyn MetadataHandler {
        match self {
            Processor::Pdf(processor) => processor,
            Processor::Image(processor) => processor,
            Processor::Office(processor) => processor,
        }
    }

    fn handler(&self) -> &dyn MetadataHandler {
        match self {
            Processor::Pdf(processor) => processor,
            Processor::Image(processor) => processor,
            Processor::Office(processor) => processor,
        }
    }

    pub fn format_name(&self) -> &'static str {
        self.handler().format_name()
    }

    /// Valida el archivo y ejecuta exactamente una operación.
    pub fn execute(&mut self, request: &OperationRequest) -> OperationResult {
        pipeline::run(self.handler_mut(), request)
    }
}
