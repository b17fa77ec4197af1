//! Metadata de PDFs almacenada en el diccionario Info del trailer.

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ProcessorError, Result};
use crate::operation::{OperationKind, OperationResult};

use super::MetadataHandler;
use super::export::export_read_result;
use super::utils::{read_signature, write_replacing};

const FORMAT: &str = "PDF";
const INFO_PREFIX: &str = "Info.";

pub struct PdfProcessor {
    path: PathBuf,
    document: Document,
}

enum InfoLocation {
    Indirect(ObjectId),
    Inline,
    Missing,
}

impl PdfProcessor {
    pub fn open(path: &Path) -> Result<Self> {
        let document = Document::load(path).map_err(|e| ProcessorError::load(FORMAT, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            document,
        })
    }

    fn info_dictionary(&self) -> Option<&Dictionary> {
        let info = self.document.trailer.get(b"Info").ok()?;
        deref_dictionary(&self.document, info)
    }

    fn info_location(&self) -> InfoLocation {
        match self.document.trailer.get(b"Info") {
            Ok(Object::Reference(id)) => InfoLocation::Indirect(*id),
            Ok(Object::Dictionary(_)) => InfoLocation::Inline,
            _ => InfoLocation::Missing,
        }
    }

    /// Devuelve el diccionario Info, creándolo como objeto indirecto si no existe.
    fn info_dictionary_mut(&mut self) -> Result<&mut Dictionary> {
        let id = match self.info_location() {
            InfoLocation::Inline => {
                return Ok(self.document.trailer.get_mut(b"Info")?.as_dict_mut()?);
            }
            InfoLocation::Indirect(id) => id,
            InfoLocation::Missing => {
                let id = self.document.add_object(Dictionary::new());
                self.document.trailer.set("Info", Object::Reference(id));
                id
            }
        };
        Ok(self.document.get_object_mut(id)?.as_dict_mut()?)
    }

    fn catalog_mut(&mut self) -> Result<&mut Dictionary> {
        let root = self.document.trailer.get(b"Root")?.as_reference()?;
        Ok(self.document.get_object_mut(root)?.as_dict_mut()?)
    }

    fn has_xmp_stream(&self) -> bool {
        let Ok(root) = self
            .document
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
        else {
            return false;
        };
        self.document
            .get_dictionary(root)
            .map(|catalog| catalog.has(b"Metadata"))
            .unwrap_or(false)
    }

    fn collect_metadata(&self) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();

        if let Some(info) = self.info_dictionary() {
            for (key, value) in info.iter() {
                let Some(text) = object_to_string(&self.document, value) else {
                    continue;
                };
                let name = String::from_utf8_lossy(key);
                let label = if name == "ModDate" {
                    "ModificationDate".to_string()
                } else {
                    name.into_owned()
                };
                metadata.insert(label, text);
            }
        }

        if self.has_xmp_stream() {
            metadata.insert("HasXMPMetadata".to_string(), "true".to_string());
        }

        metadata
    }

    fn save(&mut self) -> Result<()> {
        let document = &mut self.document;
        write_replacing(&self.path, |file| {
            document
                .save_to(file)
                .map_err(|err| ProcessorError::Pdf(err.to_string()))
        })
    }
}

impl MetadataHandler for PdfProcessor {
    fn format_name(&self) -> &'static str {
        FORMAT
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn check_prerequisites(&self) -> Result<()> {
        let header = read_signature(&self.path, 5)?;
        if infer::archive::is_pdf(&header) {
            Ok(())
        } else {
            Err(ProcessorError::InvalidStructure(
                "El archivo no es un PDF válido".to_string(),
            ))
        }
    }

    fn read(&mut self) -> Result<OperationResult> {
        Ok(OperationResult::success("Metadata leída correctamente")
            .with_metadata(self.collect_metadata()))
    }

    fn clean(&mut self) -> Result<OperationResult> {
        let removed_info = self.document.trailer.remove(b"Info").is_some();
        let removed_xmp = match self.catalog_mut() {
            Ok(catalog) => catalog.remove(b"Metadata").is_some(),
            Err(_) => false,
        };
        let pruned = self.document.prune_objects();
        debug!(
            removed_info,
            removed_xmp,
            pruned = pruned.len(),
            "diccionario Info y XMP eliminados"
        );

        self.save()?;
        info!(path = %self.path.display(), "metadata PDF eliminada");
        Ok(OperationResult::success("Metadata eliminada correctamente"))
    }

    fn overwrite(&mut self, values: &BTreeMap<String, String>) -> Result<OperationResult> {
        let updates: Vec<(Vec<u8>, &str)> = values
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .filter_map(|(key, value)| match info_key_for(key) {
                Some(info_key) => Some((info_key, value.as_str())),
                None => {
                    debug!(key = %key, "clave sin correspondencia en el diccionario Info");
                    None
                }
            })
            .collect();

        let info = self.info_dictionary_mut()?;
        for (key, value) in updates {
            info.set(key, text_string(value));
        }

        self.save()?;
        info!(path = %self.path.display(), "metadata PDF sobrescrita");
        Ok(OperationResult::success("Metadata sobrescrita correctamente"))
    }

    fn export(&mut self, output_directory: Option<&Path>) -> Result<OperationResult> {
        let read = self.read()?;
        export_read_result(&self.path, output_directory, read)
    }

    fn restore(&mut self) -> Result<OperationResult> {
        Err(ProcessorError::OperationUnsupported {
            operation: OperationKind::Restore,
            format: FORMAT,
        })
    }
}

/// Traduce una clave conocida o con prefijo `Info.` a la entrada del diccionario.
fn info_key_for(key: &str) -> Option<Vec<u8>> {
    let name = match key {
        "Title" | "Author" | "Subject" | "Keywords" | "Creator" | "Producer" => key,
        "DateCreated" | "CreationDate" => "CreationDate",
        "ModificationDate" | "ModDate" => "ModDate",
        _ => key.strip_prefix(INFO_PREFIX).filter(|name| !name.is_empty())?,
    };
    Some(name.as_bytes().to_vec())
}

/// Cadena de texto PDF: literal si es ASCII, UTF-16BE con BOM en otro caso.
fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::string_literal(value);
    }

    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(bytes).into_owned()
}

fn deref_dictionary<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Reference(reference) => doc.get_dictionary(*reference).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn object_to_string(doc: &Document, obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(decode_text_string(bytes).trim().to_string()),
        Object::Name(name) => Some(String::from_utf8_lossy(name).trim().to_string()),
        Object::Reference(reference) => doc
            .get_object(*reference)
            .ok()
            .and_then(|inner| object_to_string(doc, inner)),
        _ => None,
    }
}
