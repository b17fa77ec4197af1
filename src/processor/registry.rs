//! Registro de constructores de procesadores indexado por tipo mayor y menor.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::file_properties::{FileIdentity, MajorType, MinorType};

use super::{ImageContainerKind, ImageProcessor, OfficeProcessor, PdfProcessor, Processor};

/// Construye un procesador ya cargado para la ruta indicada.
pub type ProcessorConstructor = fn(&Path) -> Result<Processor>;

#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    constructors: HashMap<(MajorType, MinorType), ProcessorConstructor>,
}

impl ProcessorRegistry {
    /// Registro vacío; útil para pruebas o para componer formatos a mano.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra todos los formatos incluidos en el crate.
    ///
    /// Es la única rutina de arranque: nada se registra de forma implícita.
    pub fn with_builtin_processors() -> Self {
        let mut registry = Self::new();
        registry.register(MajorType::Pdf, MinorType::Unknown, open_pdf);
        registry.register(MajorType::Jpeg, MinorType::Unknown, open_jpeg);
        registry.register(MajorType::Png, MinorType::Unknown, open_png);
        registry.register(MajorType::Word, MinorType::Docx, open_office);
        registry.register(MajorType::Excel, MinorType::Xlsx, open_office);
        registry.register(MajorType::PowerPoint, MinorType::Pptx, open_office);
        registry
    }

    pub fn register(
        &mut self,
        major: MajorType,
        minor: MinorType,
        constructor: ProcessorConstructor,
    ) {
        self.constructors.insert((major, minor), constructor);
    }

    /// Busca el par exacto y, si no existe, el par `(major, Unknown)`.
    pub fn lookup(&self, major: MajorType, minor: MinorType) -> Option<ProcessorConstructor> {
        self.constructors
            .get(&(major, minor))
            .or_else(|| self.constructors.get(&(major, MinorType::Unknown)))
            .copied()
    }

    /// Clasifica `path` y construye su procesador.
    ///
    /// `None` indica un formato sin procesador; `Some(Err(_))` que el documento no se pudo cargar.
    pub fn resolve(&self, path: &Path) -> Option<Result<Processor>> {
        let identity = FileIdentity::classify(path);
        let constructor = self.lookup(identity.major(), identity.minor())?;
        debug!(
            path = %path.display(),
            major = ?identity.major(),
            minor = ?identity.minor(),
            "procesador resuelto"
        );
        Some(constructor(path))
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

fn open_pdf(path: &Path) -> Result<Processor> {
    PdfProcessor::open(path).map(Processor::Pdf)
}

fn open_jpeg(path: &Path) -> Result<Processor> {
    ImageProcessor::open(path, ImageContainerKind::Jpeg).map(Processor::Image)
}

fn open_png(path: &Path) -> Result<Processor> {
    ImageProcessor::open(path, ImageContainerKind::Png).map(Processor::Image)
}

fn open_office(path: &Path) -> Result<Processor> {
    OfficeProcessor::open(path).map(Processor::Office)
}
