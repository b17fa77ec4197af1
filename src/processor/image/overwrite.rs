use std::collections::BTreeMap;

use exif::Tag;
use tracing::debug;

use crate::error::Result;

use super::xmp::{self, XmpProperty};
use super::{ImageContainerKind, MetadataBlocks, exif_block, iptc};

const EXIF_PREFIX: &str = "EXIF.";
const IPTC_PREFIX: &str = "IPTC.";
const XMP_PREFIX: &str = "XMP.";

/// Valores de cada familia que sustituirán a la metadata actual.
#[derive(Debug, Default)]
pub(crate) struct OverwritePlan {
    exif: Vec<(Tag, String)>,
    iptc: Vec<(u8, String)>,
    xmp: Vec<XmpProperty>,
    pub(crate) warnings: Vec<String>,
}

impl OverwritePlan {
    pub(crate) fn from_values(values: &BTreeMap<String, String>, kind: ImageContainerKind) -> Self {
        let mut plan = Self::default();
        let supports_iptc = kind == ImageContainerKind::Jpeg;

        for (key, value) in values {
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                continue;
            }

            match key.as_str() {
                "Title" => {
                    plan.set_exif(Tag::ImageDescription, value);
                    plan.set_xmp(XmpProperty::new("dc", "title", value));
                    if supports_iptc {
                        plan.set_iptc(5, value);
                    }
                }
                "Author" | "Creator" => {
                    plan.set_exif(Tag::Artist, value);
                    plan.set_xmp(XmpProperty::new("dc", "creator", value));
                    if supports_iptc {
                        plan.set_iptc(80, value);
                    }
                }
                "Copyright" => {
                    plan.set_exif(Tag::Copyright, value);
                    plan.set_xmp(XmpProperty::new("dc", "rights", value));
                    if supports_iptc {
                        plan.set_iptc(116, value);
                    }
                }
                "DateCreated" => plan.set_exif(Tag::DateTime, value),
                "Software" => plan.set_exif(Tag::Software, value),
                "Description" => {
                    plan.set_xmp(XmpProperty::new("dc", "description", value));
                    if supports_iptc {
                        plan.set_iptc(120, value);
                    }
                }
                "Keywords" => {
                    plan.set_xmp(XmpProperty::new("dc", "subject", value));
                    if supports_iptc {
                        plan.set_iptc_keywords(value);
                    }
                }
                _ => plan.apply_prefixed(key, value, supports_iptc),
            }
        }
        plan
    }

    fn apply_prefixed(&mut self, key: &str, value: &str, supports_iptc: bool) {
        if let Some(name) = key.strip_prefix(EXIF_PREFIX) {
            match exif_block::writable_tag(name) {
                Some(tag) => self.set_exif(tag, value),
                None => debug!(key = %key, "etiqueta EXIF no escribible"),
            }
        } else if let Some(name) = key.strip_prefix(IPTC_PREFIX) {
            if !supports_iptc {
                self.warnings
                    .push(format!("PNG no admite IPTC; se omitió {key}"));
                return;
            }
            match iptc::dataset_for_key(name) {
                Some(number) => self.set_iptc(number, value),
                None => debug!(key = %key, "dataset IPTC desconocido"),
            }
        } else if let Some(name) = key.strip_prefix(XMP_PREFIX) {
            match XmpProperty::from_key(name, value) {
                Some(property) => self.set_xmp(property),
                None => debug!(key = %key, "propiedad XMP con prefijo desconocido"),
            }
        } else {
            debug!(key = %key, "clave sin correspondencia en la metadata de imagen");
        }
    }

    fn set_exif(&mut self, tag: Tag, value: &str) {
        self.exif.retain(|(existing, _)| *existing != tag);
        self.exif.push((tag, value.to_string()));
    }

    fn set_iptc(&mut self, number: u8, value: &str) {
        self.iptc.retain(|(existing, _)| *existing != number);
        self.iptc.push((number, value.to_string()));
    }

    fn set_iptc_keywords(&mut self, value: &str) {
        let keywords = iptc::application_dataset("Keywords").unwrap_or(25);
        self.iptc.retain(|(existing, _)| *existing != keywords);
        self.iptc.extend(
            value
                .split(',')
                .map(str::trim)
                .filter(|keyword| !keyword.is_empty())
                .map(|keyword| (keywords, keyword.to_string())),
        );
    }

    fn set_xmp(&mut self, property: XmpProperty) {
        self.xmp
            .retain(|existing| existing.prefix != property.prefix || existing.name != property.name);
        self.xmp.push(property);
    }

    /// Codifica cada familia; una familia sin valores no se escribe.
    pub(crate) fn encode(&self) -> Result<MetadataBlocks> {
        let exif = if self.exif.is_empty() {
            None
        } else {
            Some(exif_block::encode_ascii_fields(&self.exif)?)
        };
        let iptc = if self.iptc.is_empty() {
            None
        } else {
            Some(iptc::encode_application_record(&self.iptc)?)
        };
        Ok(MetadataBlocks {
            exif,
            iptc,
            xmp: (!self.xmp.is_empty()).then(|| xmp::build_packet(&self.xmp)),
        })
    }
}
