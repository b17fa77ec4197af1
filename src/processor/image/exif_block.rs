//! Lectura y escritura de bloques TIFF/EXIF con `kamadak-exif`.

use std::io::Cursor;

use exif::experimental::Writer;
use exif::{Context, Field, In, Reader, Tag, Value};

use crate::error::Result;

/// Etiquetas ASCII que se pueden escribir como `Exif.<Grupo>.<Nombre>`.
const WRITABLE_TAGS: &[(&str, Tag)] = &[
    ("Image", Tag::ImageDescription),
    ("Image", Tag::Make),
    ("Image", Tag::Model),
    ("Image", Tag::Software),
    ("Image", Tag::DateTime),
    ("Image", Tag::Artist),
    ("Image", Tag::Copyright),
    ("Photo", Tag::DateTimeOriginal),
    ("Photo", Tag::DateTimeDigitized),
    ("Photo", Tag::ImageUniqueID),
    ("Photo", Tag::CameraOwnerName),
    ("Photo", Tag::BodySerialNumber),
    ("Photo", Tag::LensMake),
    ("Photo", Tag::LensModel),
];

fn group_name(field: &Field) -> &'static str {
    match field.tag.context() {
        Context::Tiff if field.ifd_num == In::PRIMARY => "Image",
        Context::Tiff => "Thumbnail",
        Context::Exif => "Photo",
        Context::Gps => "GPSInfo",
        Context::Interop => "Iop",
        _ => "Unknown",
    }
}

fn tag_name(tag: Tag) -> String {
    if tag.description().is_some() {
        tag.to_string()
    } else {
        format!("0x{:04x}", tag.number())
    }
}

fn field_value(field: &Field) -> String {
    match &field.value {
        Value::Ascii(parts) => parts
            .iter()
            .map(|part| {
                String::from_utf8_lossy(part)
                    .trim_end_matches('\0')
                    .trim()
                    .to_string()
            })
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => field.display_value().to_string(),
    }
}

/// Campos de un bloque TIFF como pares `Exif.<Grupo>.<Etiqueta>` → valor.
pub(crate) fn read_entries(tiff: &[u8]) -> Result<Vec<(String, String)>> {
    let exif = Reader::new().read_raw(tiff.to_vec())?;
    Ok(exif
        .fields()
        .map(|field| {
            (
                format!("Exif.{}.{}", group_name(field), tag_name(field.tag)),
                field_value(field),
            )
        })
        .collect())
}

/// Etiqueta escribible para `Exif.<Grupo>.<Nombre>`.
pub(crate) fn writable_tag(key: &str) -> Option<Tag> {
    let (group, name) = key.strip_prefix("Exif.")?.split_once('.')?;
    WRITABLE_TAGS
        .iter()
        .find(|(candidate_group, tag)| *candidate_group == group && tag.to_string() == name)
        .map(|(_, tag)| *tag)
}

/// Codifica los valores ASCII indicados como un bloque TIFF big-endian.
pub(crate) fn encode_ascii_fields(values: &[(Tag, String)]) -> Result<Vec<u8>> {
    let fields: Vec<Field> = values
        .iter()
        .map(|(tag, value)| Field {
            tag: *tag,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![value.as_bytes().to_vec()]),
        })
        .collect();

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut output = Cursor::new(Vec::new());
    writer.write(&mut output, false)?;
    Ok(output.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_fields_read_back_with_group_names() -> Result<()> {
        let tiff = encode_ascii_fields(&[
            (Tag::Make, "Canon".to_string()),
            (Tag::Software, "Editor 1.0".to_string()),
            (Tag::DateTimeOriginal, "2024:01:02 03:04:05".to_string()),
        ])?;

        let entries = read_entries(&tiff)?;
        assert_eq!(entries.len(), 3);
        assert!(entries.contains(&("Exif.Image.Make".to_string(), "Canon".to_string())));
        assert!(entries.contains(&(
            "Exif.Image.Software".to_string(),
            "Editor 1.0".to_string()
        )));
        assert!(entries.contains(&(
            "Exif.Photo.DateTimeOriginal".to_string(),
            "2024:01:02 03:04:05".to_string()
        )));
        Ok(())
    }

    #[test]
    fn writable_tags_require_matching_group() {
        assert_eq!(writable_tag("Exif.Image.Make"), Some(Tag::Make));
        assert_eq!(writable_tag("Exif.Photo.LensModel"), Some(Tag::LensModel));
        assert_eq!(writable_tag("Exif.Photo.Make"), None);
        assert_eq!(writable_tag("Exif.Image.Orientation"), None);
        assert_eq!(writable_tag("Make"), None);
    }

    #[test]
    fn garbage_is_an_exif_error() {
        assert!(read_entries(b"no es tiff").is_err());
    }
}
