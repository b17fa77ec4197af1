//! Metadata EXIF, IPTC y XMP de imágenes JPEG y PNG.

mod exif_block;
mod iptc;
mod jpeg;
mod overwrite;
mod png_chunks;
mod xmp;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ProcessorError, Result};
use crate::operation::{OperationKind, OperationResult};

use super::MetadataHandler;
use super::export::export_read_result;
use super::utils::{read_signature, write_replacing};

use jpeg::JpegImage;
use overwrite::OverwritePlan;
use png_chunks::{PNG_SIGNATURE, PngImage};

/// Contenedor de imagen que maneja el procesador.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageContainerKind {
    Jpeg,
    Png,
}

impl ImageContainerKind {
    fn format_name(self) -> &'static str {
        match self {
            ImageContainerKind::Jpeg => "JPEG",
            ImageContainerKind::Png => "PNG",
        }
    }
}

/// Bloques de metadata en bruto de una imagen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct MetadataBlocks {
    /// Bloque TIFF sin la cabecera `Exif\0\0`.
    pub(crate) exif: Option<Vec<u8>>,
    /// Datasets IPTC-IIM.
    pub(crate) iptc: Option<Vec<u8>>,
    pub(crate) xmp: Option<String>,
}

#[derive(Clone, Debug)]
enum ContainerImage {
    Jpeg(JpegImage),
    Png(PngImage),
}

impl ContainerImage {
    fn parse(kind: ImageContainerKind, bytes: &[u8]) -> Result<Self> {
        match kind {
            ImageContainerKind::Jpeg => JpegImage::parse(bytes).map(ContainerImage::Jpeg),
            ImageContainerKind::Png => PngImage::parse(bytes).map(ContainerImage::Png),
        }
    }

    fn metadata(&self) -> MetadataBlocks {
        match self {
            ContainerImage::Jpeg(image) => image.metadata(),
            ContainerImage::Png(image) => image.metadata(),
        }
    }

    fn replace_metadata(&mut self, blocks: &MetadataBlocks) -> Result<()> {
        match self {
            ContainerImage::Jpeg(image) => image.replace_metadata(blocks),
            ContainerImage::Png(image) => image.replace_metadata(blocks),
        }
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            ContainerImage::Jpeg(image) => image.encode(),
            ContainerImage::Png(image) => image.encode(),
        }
    }
}

pub struct ImageProcessor {
    path: PathBuf,
    kind: ImageContainerKind,
    image: ContainerImage,
}

impl ImageProcessor {
    pub fn open(path: &Path, kind: ImageContainerKind) -> Result<Self> {
        let image = fs::read(path)
            .map_err(ProcessorError::from)
            .and_then(|bytes| ContainerImage::parse(kind, &bytes))
            .map_err(|e| ProcessorError::load(kind.format_name(), e))?;
        Ok(Self {
            path: path.to_path_buf(),
            kind,
            image,
        })
    }

    fn collect_metadata(&self) -> (BTreeMap<String, String>, Vec<String>) {
        let blocks = self.image.metadata();
        let mut metadata = BTreeMap::new();
        let mut warnings = Vec::new();

        let mut exif_total = 0;
        if let Some(tiff) = &blocks.exif {
            match exif_block::read_entries(tiff) {
                Ok(entries) => {
                    exif_total = entries.len();
                    for (key, value) in entries {
                        metadata.insert(format!("EXIF.{key}"), value);
                    }
                }
                Err(error) => warnings.push(format!("Bloque EXIF ilegible: {error}")),
            }
        }

        let mut iptc_total = 0;
        if let Some(iim) = &blocks.iptc {
            match iptc::read_entries(iim) {
                Ok((entries, count)) => {
                    iptc_total = count;
                    for (key, value) in entries {
                        metadata.insert(format!("IPTC.{key}"), value);
                    }
                }
                Err(error) => warnings.push(format!("Bloque IPTC ilegible: {error}")),
            }
        }

        let mut xmp_total = 0;
        if let Some(packet) = &blocks.xmp {
            match xmp::read_entries(packet) {
                Ok(entries) => {
                    xmp_total = entries.len();
                    for (key, value) in entries {
                        metadata.insert(format!("XMP.{key}"), value);
                    }
                }
                Err(error) => warnings.push(format!("Paquete XMP ilegible: {error}")),
            }
        }

        metadata.insert("Total.EXIF".to_string(), exif_total.to_string());
        metadata.insert("Total.IPTC".to_string(), iptc_total.to_string());
        metadata.insert("Total.XMP".to_string(), xmp_total.to_string());
        (metadata, warnings)
    }

    /// Aplica los bloques sobre una copia y solo la adopta si se guardó en disco.
    fn store(&mut self, blocks: &MetadataBlocks) -> Result<()> {
        let mut updated = self.image.clone();
        updated.replace_metadata(blocks)?;
        let bytes = updated.encode();
        write_replacing(&self.path, |file| Ok(file.write_all(&bytes)?))?;
        self.image = updated;
        Ok(())
    }
}

impl MetadataHandler for ImageProcessor {
    fn format_name(&self) -> &'static str {
        self.kind.format_name()
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn check_prerequisites(&self) -> Result<()> {
        let valid = match self.kind {
            ImageContainerKind::Jpeg => infer::image::is_jpeg(&read_signature(&self.path, 3)?),
            ImageContainerKind::Png => {
                infer::image::is_png(&read_signature(&self.path, PNG_SIGNATURE.len())?)
            }
        };
        if valid {
            Ok(())
        } else {
            Err(ProcessorError::InvalidStructure(format!(
                "El archivo no es un {} válido",
                self.kind.format_name()
            )))
        }
    }

    fn read(&mut self) -> Result<OperationResult> {
        let (metadata, warnings) = self.collect_metadata();
        for warning in &warnings {
            warn!(path = %self.path.display(), %warning, "familia de metadata ignorada");
        }
        Ok(OperationResult::success("Metadata leída correctamente")
            .with_metadata(metadata)
            .with_warnings(warnings))
    }

    fn clean(&mut self) -> Result<OperationResult> {
        self.store(&MetadataBlocks::default())?;
        info!(path = %self.path.display(), format = self.kind.format_name(), "metadata de imagen eliminada");
        Ok(OperationResult::success("Metadata eliminada correctamente"))
    }

    fn overwrite(&mut self, values: &BTreeMap<String, String>) -> Result<OperationResult> {
        let plan = OverwritePlan::from_values(values, self.kind);
        let blocks = plan.encode()?;
        debug!(
            exif = blocks.exif.is_some(),
            iptc = blocks.iptc.is_some(),
            xmp = blocks.xmp.is_some(),
            "familias de metadata preparadas"
        );

        self.store(&blocks)?;
        info!(path = %self.path.display(), format = self.kind.format_name(), "metadata de imagen sobrescrita");
        Ok(OperationResult::success("Metadata sobrescrita correctamente")
            .with_warnings(plan.warnings))
    }

    fn export(&mut self, output_directory: Option<&Path>) -> Result<OperationResult> {
        let read = self.read()?;
        export_read_result(&self.path, output_directory, read)
    }

    fn restore(&mut self) -> Result<OperationResult> {
        Err(ProcessorError::OperationUnsupported {
            operation: OperationKind::Restore,
            format: self.kind.format_name(),
        })
    }
}
