//! Lista de segmentos de un JPEG hasta el inicio del escaneo.

use crate::error::{ProcessorError, Result};

use super::MetadataBlocks;
use super::iptc;

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const APP13: u8 = 0xED;
const COM: u8 = 0xFE;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const XMP_EXTENSION_HEADER: &[u8] = b"http://ns.adobe.com/xmp/extension/\0";

/// Carga útil máxima de un segmento con longitud (65535 menos los dos bytes de longitud).
pub(crate) const MAX_SEGMENT_PAYLOAD: usize = 65533;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Segment {
    marker: u8,
    payload: Vec<u8>,
}

impl Segment {
    fn is_metadata(&self) -> bool {
        match self.marker {
            APP1 => {
                self.payload.starts_with(EXIF_HEADER)
                    || self.payload.starts_with(XMP_HEADER)
                    || self.payload.starts_with(XMP_EXTENSION_HEADER)
            }
            APP13 => self.payload.starts_with(iptc::PHOTOSHOP_HEADER),
            COM => true,
            _ => false,
        }
    }
}

fn is_standalone(marker: u8) -> bool {
    matches!(marker, 0x01 | 0xD0..=0xD7)
}

/// JPEG separado en segmentos de cabecera y un resto opaco desde SOS.
#[derive(Clone, Debug)]
pub(crate) struct JpegImage {
    segments: Vec<Segment>,
    tail: Vec<u8>,
}

impl JpegImage {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self> {
        if !bytes.starts_with(&SOI) {
            return Err(ProcessorError::InvalidStructure(
                "Falta el marcador SOI del JPEG".to_string(),
            ));
        }

        let mut segments = Vec::new();
        let mut pos = SOI.len();
        loop {
            let start = pos;
            if bytes.get(pos) != Some(&0xFF) {
                return Err(ProcessorError::InvalidStructure(format!(
                    "Marcador JPEG esperado en el byte {pos}"
                )));
            }
            while bytes.get(pos) == Some(&0xFF) {
                pos += 1;
            }
            let Some(&marker) = bytes.get(pos) else {
                return Err(ProcessorError::InvalidStructure(
                    "JPEG truncado antes del escaneo".to_string(),
                ));
            };
            pos += 1;

            if marker == SOS || marker == EOI {
                return Ok(Self {
                    segments,
                    tail: bytes[start..].to_vec(),
                });
            }
            if is_standalone(marker) {
                segments.push(Segment {
                    marker,
                    payload: Vec::new(),
                });
                continue;
            }

            let length = bytes
                .get(pos..pos + 2)
                .map(|raw| u16::from_be_bytes([raw[0], raw[1]]) as usize)
                .filter(|length| *length >= 2 && pos + length <= bytes.len())
                .ok_or_else(|| {
                    ProcessorError::InvalidStructure(format!(
                        "Longitud inválida en el segmento 0xFF{marker:02X}"
                    ))
                })?;
            segments.push(Segment {
                marker,
                payload: bytes[pos + 2..pos + length].to_vec(),
            });
            pos += length;
        }
    }

    pub(crate) fn metadata(&self) -> MetadataBlocks {
        let mut blocks = MetadataBlocks::default();
        for segment in &self.segments {
            match segment.marker {
                APP1 if segment.payload.starts_with(EXIF_HEADER) && blocks.exif.is_none() => {
                    blocks.exif = Some(segment.payload[EXIF_HEADER.len()..].to_vec());
                }
                APP1 if segment.payload.starts_with(XMP_HEADER) && blocks.xmp.is_none() => {
                    let packet = &segment.payload[XMP_HEADER.len()..];
                    blocks.xmp = Some(String::from_utf8_lossy(packet).into_owned());
                }
                APP13 if blocks.iptc.is_none() => {
                    if let Some(resources) = segment.payload.strip_prefix(iptc::PHOTOSHOP_HEADER) {
                        blocks.iptc = iptc::find_iptc_resource(resources).map(<[u8]>::to_vec);
                    }
                }
                _ => {}
            }
        }
        blocks
    }

    /// Elimina EXIF, XMP, IPTC y comentarios e inserta los bloques indicados.
    ///
    /// Los bloques se colocan tras los segmentos APP0 iniciales (JFIF/JFXX).
    pub(crate) fn replace_metadata(&mut self, blocks: &MetadataBlocks) -> Result<()> {
        let mut inserted = Vec::new();
        if let Some(tiff) = &blocks.exif {
            inserted.push(Segment {
                marker: APP1,
                payload: [EXIF_HEADER, tiff.as_slice()].concat(),
            });
        }
        if let Some(packet) = &blocks.xmp {
            inserted.push(Segment {
                marker: APP1,
                payload: [XMP_HEADER, packet.as_bytes()].concat(),
            });
        }
        if let Some(iim) = &blocks.iptc {
            inserted.push(Segment {
                marker: APP13,
                payload: iptc::wrap_in_photoshop(iim),
            });
        }

        if let Some(oversized) = inserted
            .iter()
            .find(|segment| segment.payload.len() > MAX_SEGMENT_PAYLOAD)
        {
            return Err(ProcessorError::Encoding(format!(
                "El segmento 0xFF{:02X} ocupa {} bytes y el máximo es {}",
                oversized.marker,
                oversized.payload.len(),
                MAX_SEGMENT_PAYLOAD
            )));
        }

        self.segments.retain(|segment| !segment.is_metadata());
        let position = self
            .segments
            .iter()
            .position(|segment| segment.marker != APP0)
            .unwrap_or(self.segments.len());
        self.segments.splice(position..position, inserted);
        Ok(())
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(
            SOI.len()
                + self.tail.len()
                + self
                    .segments
                    .iter()
                    .map(|segment| segment.payload.len() + 4)
                    .sum::<usize>(),
        );
        output.extend_from_slice(&SOI);
        for segment in &self.segments {
            output.extend_from_slice(&[0xFF, segment.marker]);
            if is_standalone(segment.marker) {
                continue;
            }
            // La longitud ya se validó al analizar o al insertar.
            let length = (segment.payload.len() + 2) as u16;
            output.extend_from_slice(&length.to_be_bytes());
            output.extend_from_slice(&segment.payload);
        }
        output.extend_from_slice(&self.tail);
        output
    }
}
