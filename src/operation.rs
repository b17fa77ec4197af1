//! Modelos compartidos para describir operaciones y sus resultados.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ProcessorError;

/// Operaciones disponibles sobre la metadata de un archivo.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Read,
    Clean,
    Overwrite,
    Export,
    Restore,
}

impl OperationKind {
    pub fn label(self) -> &'static str {
        match self {
            OperationKind::Read => "read",
            OperationKind::Clean => "clean",
            OperationKind::Overwrite => "overwrite",
            OperationKind::Export => "export",
            OperationKind::Restore => "restore",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "read" => Ok(OperationKind::Read),
            "clean" => Ok(OperationKind::Clean),
            "overwrite" => Ok(OperationKind::Overwrite),
            "export" => Ok(OperationKind::Export),
            "restore" => Ok(OperationKind::Restore),
            other => Err(format!("Operación no reconocida: {other}")),
        }
    }
}

/// Opciones que acompañan a una operación.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationOptions {
    /// Reservado: todavía no se usa para filtrar propiedades.
    pub selected_properties: Vec<String>,
    pub output_directory: Option<PathBuf>,
    pub overwrite_metadata: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationRequest {
    pub kind: OperationKind,
    #[serde(default)]
    pub options: OperationOptions,
}

impl OperationRequest {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            options: OperationOptions::default(),
        }
    }

    pub fn with_options(kind: OperationKind, options: OperationOptions) -> Self {
        Self { kind, options }
    }
}

/// Resultado estructurado de cualquier operación; nunca se lanza un error.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    pub warnings: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl OperationResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            warnings: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            warnings: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
}

impl From<ProcessorError> for OperationResult {
    fn from(error: ProcessorError) -> Self {
        OperationResult::failure(error.to_string())
    }
}

/// Entrada de metadata enriquecida para capas consumidoras (tablas, editores).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MetadataItem {
    pub key: String,
    pub value: String,
    pub editable: bool,
    pub removable: bool,
}

impl MetadataItem {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let synthetic = is_synthetic_key(&key);
        Self {
            key,
            value: value.into(),
            editable: !synthetic,
            removable: !synthetic,
        }
    }

    /// Convierte el mapa de un resultado en elementos ordenados por clave.
    pub fn from_result(result: &OperationResult) -> Vec<MetadataItem> {
        result
            .metadata
            .iter()
            .map(|(key, value)| MetadataItem::new(key.as_str(), value.as_str()))
            .collect()
    }
}

// Contadores y banderas calculados al leer, no propiedades reales del archivo.
fn is_synthetic_key(key: &str) -> bool {
    key.starts_with("Total.") || key == "HasXMPMetadata"
}
