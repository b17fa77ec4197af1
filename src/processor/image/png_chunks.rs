//! Lista de chunks de un PNG.

use crate::error::{ProcessorError, Result};

use super::MetadataBlocks;

pub(crate) const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const IHDR: [u8; 4] = *b"IHDR";
const IEND: [u8; 4] = *b"IEND";
const EXIF: [u8; 4] = *b"eXIf";
const TEXT: [u8; 4] = *b"tEXt";
const ZTXT: [u8; 4] = *b"zTXt";
const ITXT: [u8; 4] = *b"iTXt";

const XMP_KEYWORD: &[u8] = b"XML:com.adobe.xmp";
const EXIF_HEADER: &[u8] = b"Exif\0\0";

#[derive(Clone, Debug)]
struct Chunk {
    kind: [u8; 4],
    data: Vec<u8>,
}

impl Chunk {
    fn is_metadata(&self) -> bool {
        matches!(self.kind, EXIF | TEXT | ZTXT | ITXT)
    }

    fn crc(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.kind);
        hasher.update(&self.data);
        hasher.finalize()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct PngImage {
    chunks: Vec<Chunk>,
}

impl PngImage {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self> {
        if !bytes.starts_with(&PNG_SIGNATURE) {
            return Err(ProcessorError::InvalidStructure(
                "Falta la firma PNG".to_string(),
            ));
        }

        let mut chunks = Vec::new();
        let mut pos = PNG_SIGNATURE.len();
        while pos < bytes.len() {
            let header = bytes.get(pos..pos + 8).ok_or_else(|| {
                ProcessorError::InvalidStructure("Cabecera de chunk PNG truncada".to_string())
            })?;
            let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
            let kind = [header[4], header[5], header[6], header[7]];
            let data_start = pos + 8;
            let data = bytes
                .get(data_start..data_start + length)
                .filter(|_| data_start + length + 4 <= bytes.len())
                .ok_or_else(|| {
                    ProcessorError::InvalidStructure(format!(
                        "Chunk PNG {} truncado",
                        String::from_utf8_lossy(&kind)
                    ))
                })?;
            chunks.push(Chunk {
                kind,
                data: data.to_vec(),
            });
            pos = data_start + length + 4;
            if kind == IEND {
                break;
            }
        }

        if chunks.first().map(|chunk| chunk.kind) != Some(IHDR) {
            return Err(ProcessorError::InvalidStructure(
                "El PNG no comienza con IHDR".to_string(),
            ));
        }
        Ok(Self { chunks })
    }

    pub(crate) fn metadata(&self) -> MetadataBlocks {
        let mut blocks = MetadataBlocks::default();
        for chunk in &self.chunks {
            match chunk.kind {
                EXIF if blocks.exif.is_none() => {
                    let tiff = chunk.data.strip_prefix(EXIF_HEADER).unwrap_or(&chunk.data);
                    blocks.exif = Some(tiff.to_vec());
                }
                ITXT if blocks.xmp.is_none() => {
                    blocks.xmp = xmp_from_itxt(&chunk.data);
                }
                _ => {}
            }
        }
        blocks
    }

    /// Elimina `eXIf` y los chunks de texto e inserta los bloques indicados tras IHDR.
    ///
    /// PNG no tiene contenedor IPTC; el llamador descarta ese bloque antes.
    pub(crate) fn replace_metadata(&mut self, blocks: &MetadataBlocks) -> Result<()> {
        let mut inserted = Vec::new();
        if let Some(tiff) = &blocks.exif {
            inserted.push(Chunk {
                kind: EXIF,
                data: tiff.clone(),
            });
        }
        if let Some(packet) = &blocks.xmp {
            inserted.push(Chunk {
                kind: ITXT,
                data: xmp_itxt(packet),
            });
        }
        if let Some(chunk) = inserted
            .iter()
            .find(|chunk| chunk.data.len() > i32::MAX as usize)
        {
            return Err(ProcessorError::Encoding(format!(
                "El chunk {} supera el tamaño máximo de PNG",
                String::from_utf8_lossy(&chunk.kind)
            )));
        }

        self.chunks.retain(|chunk| !chunk.is_metadata());
        self.chunks.splice(1..1, inserted);
        Ok(())
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut output = PNG_SIGNATURE.to_vec();
        for chunk in &self.chunks {
            output.extend_from_slice(&(chunk.data.len() as u32).to_be_bytes());
            output.extend_from_slice(&chunk.kind);
            output.extend_from_slice(&chunk.data);
            output.extend_from_slice(&chunk.crc().to_be_bytes());
        }
        output
    }
}

/// Paquete XMP de un `iTXt` sin comprimir con la palabra clave de Adobe.
fn xmp_from_itxt(data: &[u8]) -> Option<String> {
    let rest = data.strip_prefix(XMP_KEYWORD)?.strip_prefix(&[0])?;
    let (&compressed, rest) = rest.split_first()?;
    if compressed != 0 {
        return None;
    }
    let rest = rest.get(1..)?;
    let language_end = rest.iter().position(|&b| b == 0)?;
    let rest = &rest[language_end + 1..];
    let translated_end = rest.iter().position(|&b| b == 0)?;
    Some(String::from_utf8_lossy(&rest[translated_end + 1..]).into_owned())
}

fn xmp_itxt(packet: &str) -> Vec<u8> {
    let mut data = XMP_KEYWORD.to_vec();
    // Separador, sin compresión, método 0, idioma vacío y palabra traducida vacía.
    data.extend_from_slice(&[0, 0, 0, 0, 0]);
    data.extend_from_slice(packet.as_bytes());
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let chunk = Chunk {
            kind: *kind,
            data: data.to_vec(),
        };
        let mut bytes = (data.len() as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(kind);
        bytes.extend_from_slice(data);
        bytes.extend_from_slice(&chunk.crc().to_be_bytes());
        bytes
    }

    fn sample(extra: &[Vec<u8>]) -> Vec<u8> {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend(chunk(b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0]));
        for raw in extra {
            bytes.extend_from_slice(raw);
        }
        bytes.extend(chunk(b"IDAT", &[0x78, 0x9C, 0x63, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01]));
        bytes.extend(chunk(b"IEND", &[]));
        bytes
    }

    #[test]
    fn parse_and_encode_are_lossless() -> Result<()> {
        let bytes = sample(&[chunk(b"tEXt", b"Comment\0hola")]);
        let image = PngImage::parse(&bytes)?;
        assert_eq!(image.chunks.len(), 4);
        assert_eq!(image.encode(), bytes);
        Ok(())
    }

    #[test]
    fn xmp_itxt_round_trips() {
        let data = xmp_itxt("<x:xmpmeta/>");
        assert_eq!(xmp_from_itxt(&data).as_deref(), Some("<x:xmpmeta/>"));
        assert!(xmp_from_itxt(b"Comment\0\0\0\0\0texto").is_none());
    }

    #[test]
    fn replace_drops_text_chunks_and_inserts_after_header() -> Result<()> {
        let bytes = sample(&[
            chunk(b"tEXt", b"Author\0alguien"),
            chunk(b"eXIf", b"MM\0*"),
            chunk(b"gAMA", &[0, 0, 0xB1, 0x8F]),
        ]);
        let mut image = PngImage::parse(&bytes)?;
        image.replace_metadata(&MetadataBlocks {
            exif: Some(b"II*\0".to_vec()),
            iptc: None,
            xmp: Some("<x:xmpmeta/>".to_string()),
        })?;

        let kinds: Vec<[u8; 4]> = image.chunks.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![*b"IHDR", *b"eXIf", *b"iTXt", *b"gAMA", *b"IDAT", *b"IEND"]
        );

        let reparsed = PngImage::parse(&image.encode())?;
        let blocks = reparsed.metadata();
        assert_eq!(blocks.exif.as_deref(), Some(&b"II*\0"[..]));
        assert_eq!(blocks.xmp.as_deref(), Some("<x:xmpmeta/>"));
        Ok(())
    }

    #[test]
    fn missing_header_chunk_is_rejected() {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend(chunk(b"IEND", &[]));
        assert!(matches!(
            PngImage::parse(&bytes),
            Err(ProcessorError::InvalidStructure(_))
        ));
    }
}
