//! Clasificación de archivos a partir de su ruta y cálculo de su huella.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Valor usado cuando el contenido no se puede leer para calcular el hash.
pub const HASH_UNAVAILABLE: &str = "error";
const NO_EXTENSION: &str = "null";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Category {
    Unknown,
    Document,
    Image,
    Audio,
    Video,
    Archive,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum MajorType {
    Unknown,
    Pdf,
    Word,
    Excel,
    PowerPoint,
    Jpeg,
    Png,
    Mp3,
    Mp4,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum MinorType {
    Unknown,
    PdfA,
    Docx,
    Xlsx,
    Pptx,
    Jpeg,
}

/// Identidad de un archivo calculada una sola vez al construirla.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileIdentity {
    hash: String,
    path: PathBuf,
    name: String,
    extension: String,
    category: Category,
    major: MajorType,
    minor: MinorType,
}

impl FileIdentity {
    /// Clasifica `path`; nunca falla, los formatos desconocidos quedan como `Unknown`.
    pub fn classify(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let raw = path.to_string_lossy();
        let name = file_name(&raw).to_string();
        let extension = file_extension(&name);

        Self {
            hash: content_hash(path),
            path: path.to_path_buf(),
            category: category_for(&extension),
            major: major_for(&extension),
            minor: minor_for(&extension),
            name,
            extension,
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn major(&self) -> MajorType {
        self.major
    }

    pub fn minor(&self) -> MinorType {
        self.minor
    }
}

fn file_name(raw: &str) -> &str {
    match raw.rfind(['/', '\\']) {
        Some(index) => &raw[index + 1..],
        None => raw,
    }
}

fn file_extension(name: &str) -> String {
    match name.rfind('.') {
        Some(index) => name[index + 1..].to_lowercase(),
        None => NO_EXTENSION.to_string(),
    }
}

fn category_for(extension: &str) -> Category {
    match extension {
        "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "txt" => Category::Document,
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tiff" => Category::Image,
        "mp3" | "wav" | "ogg" | "flac" => Category::Audio,
        "mp4" | "avi" | "mkv" | "mov" => Category::Video,
        "zip" | "rar" | "7z" | "tar" | "gz" => Category::Archive,
        _ => Category::Unknown,
    }
}

fn major_for(extension: &str) -> MajorType {
    match extension {
        "pdf" => MajorType::Pdf,
        "doc" | "docx" => MajorType::Word,
        "xls" | "xlsx" => MajorType::Excel,
        "ppt" | "pptx" => MajorType::PowerPoint,
        "jpg" | "jpeg" => MajorType::Jpeg,
        "png" => MajorType::Png,
        "mp3" => MajorType::Mp3,
        "mp4" => MajorType::Mp4,
        _ => MajorType::Unknown,
    }
}

fn minor_for(extension: &str) -> MinorType {
    match extension {
        // Sin inspeccionar el contenido: todo PDF se etiqueta como PDF/A.
        // El registro solo despacha por (Pdf, Unknown), así que la distinción no se usa.
        "pdf" => MinorType::PdfA,
        "docx" => MinorType::Docx,
        "xlsx" => MinorType::Xlsx,
        "pptx" => MinorType::Pptx,
        _ => MinorType::Unknown,
    }
}

/// SHA-256 del contenido completo, o [`HASH_UNAVAILABLE`] si no se puede leer.
fn content_hash(path: &Path) -> String {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return HASH_UNAVAILABLE.to_string(),
    };

    let mut sha256 = Sha256::new();
    let mut buffer = [0_u8; 8192];
    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(bytes_read) => sha256.update(&buffer[..bytes_read]),
            Err(_) => return HASH_UNAVAILABLE.to_string(),
        }
    }

    format!("{:x}", sha256.finalize())
}
