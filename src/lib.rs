//! Clasificación de archivos y operaciones de metadata (leer, limpiar, sobrescribir,
//! exportar) sobre PDF, imágenes JPEG/PNG y documentos OOXML.

pub mod error;
pub mod file_properties;
pub mod operation;
pub mod processor;
pub mod wiper;

pub use error::{ProcessorError, Result};
pub use file_properties::{Category, FileIdentity, MajorType, MinorType};
pub use operation::{
    MetadataItem, OperationKind, OperationOptions, OperationRequest, OperationResult,
};
pub use processor::{Processor, ProcessorRegistry};
pub use wiper::MetaWiper;
