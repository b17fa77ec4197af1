//! Metadata de documentos OOXML (DOCX, XLSX, PPTX) guardada en `docProps/`.

mod archive;
mod constants;
mod edit;
mod xml;


use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;
use xmltree::Element;

use crate::error::{ProcessorError, Result};
use crate::operation::{OperationKind, OperationResult};

use super::MetadataHandler;
use super::export::export_read_result;
use super::utils::read_signature;

use constants::{APP_KEY_PREFIX, APP_PART, CORE_KEY_PREFIX, CORE_PART, ZIP_LOCAL_HEADER};

pub struct OfficeProcessor {
    path: PathBuf,
    format: &'static str,
    core: Element,
    app: Option<Element>,
}

fn format_label(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("docx") => "DOCX",
        Some("xlsx") => "XLSX",
        Some("pptx") => "PPTX",
        _ => "OOXML",
    }
}

fn load_core(path: &Path) -> Result<Element> {
    let contents = archive::extract_part(path, CORE_PART)?.ok_or_else(|| {
        ProcessorError::InvalidStructure(format!("El documento no contiene {CORE_PART}"))
    })?;
    xml::parse_part(&contents)
}

fn load_app(path: &Path) -> Result<Option<Element>> {
    archive::extract_part(path, APP_PART)?
        .map(|contents| xml::parse_part(&contents))
        .transpose()
}

impl OfficeProcessor {
    pub fn open(path: &Path) -> Result<Self> {
        let format = format_label(path);
        let core = load_core(path).map_err(|e| ProcessorError::load(format, e))?;
        let app = load_app(path).map_err(|e| ProcessorError::load(format, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            format,
            core,
            app,
        })
    }

    fn collect_metadata(&self) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();
        let core_total = xml::collect_children(&self.core, CORE_KEY_PREFIX, &mut metadata);
        let app_total = self
            .app
            .as_ref()
            .map(|app| xml::collect_children(app, APP_KEY_PREFIX, &mut metadata))
            .unwrap_or(0);
        metadata.insert("Total.Core".to_string(), core_total.to_string());
        metadata.insert("Total.App".to_string(), app_total.to_string());
        metadata
    }

    /// Escribe las partes nuevas en el contenedor y solo después las adopta en memoria.
    fn store(&mut self, core: Element, app: Option<Element>) -> Result<()> {
        let mut parts = vec![(CORE_PART, xml::serialize_part(&core)?)];
        if let Some(app) = &app {
            parts.push((APP_PART, xml::serialize_part(app)?));
        }
        archive::replace_parts(&self.path, &parts)?;

        self.core = core;
        if app.is_some() {
            self.app = app;
        }
        Ok(())
    }
}

impl MetadataHandler for OfficeProcessor {
    fn format_name(&self) -> &'static str {
        self.format
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn check_prerequisites(&self) -> Result<()> {
        let header = read_signature(&self.path, ZIP_LOCAL_HEADER.len())?;
        if header.as_slice() != ZIP_LOCAL_HEADER {
            return Err(ProcessorError::InvalidStructure(format!(
                "El archivo no es un documento {} válido",
                self.format
            )));
        }
        load_core(&self.path).map(|_| ())
    }

    fn read(&mut self) -> Result<OperationResult> {
        Ok(OperationResult::success("Metadata leída correctamente")
            .with_metadata(self.collect_metadata()))
    }

    fn clean(&mut self) -> Result<OperationResult> {
        let core = xml::empty_core_properties()?;
        let app = match self.app {
            Some(_) => Some(xml::empty_app_properties()?),
            None => None,
        };
        self.store(core, app)?;

        info!(path = %self.path.display(), format = self.format, "metadata del documento eliminada");
        Ok(OperationResult::success("Metadata eliminada correctamente"))
    }

    fn overwrite(&mut self, values: &BTreeMap<String, String>) -> Result<OperationResult> {
        let documents = edit::build_documents(values, self.app.is_some())?;
        self.store(documents.core, documents.app)?;

        info!(path = %self.path.display(), format = self.format, "metadata del documento sobrescrita");
        Ok(OperationResult::success("Metadata sobrescrita correctamente")
            .with_warnings(documents.warnings))
    }

    fn export(&mut self, output_directory: Option<&Path>) -> Result<OperationResult> {
        let read = self.read()?;
        export_read_result(&self.path, output_directory, read)
    }

    fn restore(&mut self) -> Result<OperationResult> {
        Err(ProcessorError::OperationUnsupported {
            operation: OperationKind::Restore,
            format: self.format,
        })
    }
}
