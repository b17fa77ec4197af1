use super::{ImageContainerKind, ImageProcessor};
use crate::error::ProcessorError;
use crate::operation::{OperationKind, OperationOptions, OperationRequest, OperationResult};
use exif::experimental::Writer;
use exif::{Field, In, Tag, Value};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn sample_pixels() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(16, 12, |x, y| {
        Rgb([(x * 15) as u8, (y * 20) as u8, ((x + y) * 7) as u8])
    }))
}

fn encode(format: ImageFormat) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut bytes = Vec::new();
    sample_pixels().write_to(&mut Cursor::new(&mut bytes), format)?;
    Ok(bytes)
}

fn sample_tiff() -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let ascii = |text: &str| Value::Ascii(vec![text.as_bytes().to_vec()]);
    let fields = [
        Field {
            tag: Tag::Make,
            ifd_num: In::PRIMARY,
            value: ascii("Canon"),
        },
        Field {
            tag: Tag::Model,
            ifd_num: In::PRIMARY,
            value: ascii("EOS 5D"),
        },
        Field {
            tag: Tag::DateTimeOriginal,
            ifd_num: In::PRIMARY,
            value: ascii("2024:03:01 10:20:30"),
        },
    ];
    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut output = Cursor::new(Vec::new());
    writer.write(&mut output, false)?;
    Ok(output.into_inner())
}

/// JPEG con un APP1 EXIF y un comentario justo después de SOI.
fn create_sample_jpeg(path: &Path) -> TestResult {
    let jpeg = encode(ImageFormat::Jpeg)?;
    let tiff = sample_tiff()?;

    let mut bytes = jpeg[..2].to_vec();
    let mut app1 = b"Exif\0\0".to_vec();
    app1.extend_from_slice(&tiff);
    bytes.extend_from_slice(&[0xFF, 0xE1]);
    bytes.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
    bytes.extend_from_slice(&app1);
    bytes.extend_from_slice(&[0xFF, 0xFE, 0x00, 0x0B]);
    bytes.extend_from_slice(b"Autor X");
    bytes.extend_from_slice(&[0, 0]);
    bytes.extend_from_slice(&jpeg[2..]);
    fs::write(path, bytes)?;
    Ok(())
}

fn png_chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut chunk = (data.len() as u32).to_be_bytes().to_vec();
    chunk.extend_from_slice(kind);
    chunk.extend_from_slice(data);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    chunk.extend_from_slice(&hasher.finalize().to_be_bytes());
    chunk
}

/// PNG con `eXIf` y `tEXt` insertados tras IHDR.
fn create_sample_png(path: &Path) -> TestResult {
    let mut encoded = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut encoded, 4, 4);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&[120; 4 * 4 * 3])?;
        writer.finish()?;
    }

    // Firma (8) + IHDR (4 + 4 + 13 + 4).
    let header_end = 8 + 25;
    let mut bytes = encoded[..header_end].to_vec();
    bytes.extend(png_chunk(b"eXIf", &sample_tiff()?));
    bytes.extend(png_chunk(b"tEXt", b"Author\0Autor Secreto"));
    bytes.extend_from_slice(&encoded[header_end..]);
    fs::write(path, bytes)?;
    Ok(())
}

fn run(
    path: &Path,
    kind: ImageContainerKind,
    request: &OperationRequest,
) -> Result<OperationResult, ProcessorError> {
    let mut processor = ImageProcessor::open(path, kind)?;
    Ok(crate::processor::pipeline::run(&mut processor, request))
}

fn read(path: &Path, kind: ImageContainerKind) -> Result<OperationResult, ProcessorError> {
    run(path, kind, &OperationRequest::new(OperationKind::Read))
}

fn overwrite_request(pairs: &[(&str, &str)]) -> OperationRequest {
    let overwrite_metadata: BTreeMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    OperationRequest::with_options(
        OperationKind::Overwrite,
        OperationOptions {
            overwrite_metadata,
            ..OperationOptions::default()
        },
    )
}

fn value<'a>(result: &'a OperationResult, key: &str) -> Option<&'a str> {
    result.metadata.get(key).map(String::as_str)
}

fn pixels(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    Ok(image::open(path)?.to_rgb8().into_raw())
}

#[test]
fn jpeg_read_flattens_exif_with_totals() -> TestResult {
    let dir = tempdir()?;
    let source = dir.path().join("foto.jpg");
    create_sample_jpeg(&source)?;

    let result = read(&source, ImageContainerKind::Jpeg)?;

    assert!(result.success, "{}", result.message);
    assert_eq!(value(&result, "EXIF.Exif.Image.Make"), Some("Canon"));
    assert_eq!(value(&result, "EXIF.Exif.Image.Model"), Some("EOS 5D"));
    assert_eq!(
        value(&result, "EXIF.Exif.Photo.DateTimeOriginal"),
        Some("2024:03:01 10:20:30")
    );
    assert_eq!(value(&result, "Total.EXIF"), Some("3"));
    assert_eq!(value(&result, "Total.IPTC"), Some("0"));
    assert_eq!(value(&result, "Total.XMP"), Some("0"));
    Ok(())
}

#[test]
fn jpeg_clean_strips_metadata_and_keeps_pixels() -> TestResult {
    let dir = tempdir()?;
    let source = dir.path().join("foto.jpg");
    create_sample_jpeg(&source)?;
    let before = pixels(&source)?;

    let cleaned = run(
        &source,
        ImageContainerKind::Jpeg,
        &OperationRequest::new(OperationKind::Clean),
    )?;
    assert!(cleaned.success, "{}", cleaned.message);

    let first = read(&source, ImageContainerKind::Jpeg)?;
    assert_eq!(value(&first, "Total.EXIF"), Some("0"));
    assert!(!first.metadata.contains_key("EXIF.Exif.Image.Make"));
    assert_eq!(pixels(&source)?, before);

    let raw = fs::read(&source)?;
    assert!(!raw.windows(5).any(|window| window == b"Canon"));
    assert!(!raw.windows(7).any(|window| window == b"Autor X"));

    let again = run(
        &source,
        ImageContainerKind::Jpeg,
        &OperationRequest::new(OperationKind::Clean),
    )?;
    assert!(again.success, "{}", again.message);
    assert_eq!(fs::read(&source)?, raw);
    Ok(())
}

#[test]
fn jpeg_overwrite_replaces_every_family() -> TestResult {
    let dir = tempdir()?;
    let source = dir.path().join("foto.jpg");
    create_sample_jpeg(&source)?;
    let before = pixels(&source)?;

    let result = run(
        &source,
        ImageContainerKind::Jpeg,
        &overwrite_request(&[
            ("Title", "Faro"),
            ("Author", "Ana Pérez"),
            ("Keywords", "mar, costa"),
            ("EXIF.Exif.Image.Make", "Nikon"),
            ("XMP.Xmp.xmp.CreatorTool", "Editor"),
        ]),
    )?;
    assert!(result.success, "{}", result.message);

    let read = read(&source, ImageContainerKind::Jpeg)?;
    assert_eq!(value(&read, "EXIF.Exif.Image.ImageDescription"), Some("Faro"));
    assert_eq!(value(&read, "EXIF.Exif.Image.Artist"), Some("Ana Pérez"));
    assert_eq!(value(&read, "EXIF.Exif.Image.Make"), Some("Nikon"));
    assert!(!read.metadata.contains_key("EXIF.Exif.Image.Model"));
    assert!(!read.metadata.contains_key("EXIF.Exif.Photo.DateTimeOriginal"));
    assert_eq!(value(&read, "Total.EXIF"), Some("3"));

    assert_eq!(value(&read, "XMP.Xmp.dc.title"), Some("Faro"));
    assert_eq!(value(&read, "XMP.Xmp.dc.creator"), Some("Ana Pérez"));
    assert_eq!(value(&read, "XMP.Xmp.dc.subject"), Some("mar, costa"));
    assert_eq!(value(&read, "XMP.Xmp.xmp.CreatorTool"), Some("Editor"));

    assert_eq!(value(&read, "IPTC.Iptc.Application2.ObjectName"), Some("Faro"));
    assert_eq!(value(&read, "IPTC.Iptc.Application2.Byline"), Some("Ana Pérez"));
    assert_eq!(value(&read, "IPTC.Iptc.Application2.Keywords"), Some("mar, costa"));
    assert_eq!(value(&read, "IPTC.Iptc.Envelope.CharacterSet"), Some("UTF-8"));

    assert_eq!(pixels(&source)?, before);
    Ok(())
}

#[test]
fn oversized_value_fails_before_touching_file() -> TestResult {
    let dir = tempdir()?;
    let source = dir.path().join("foto.jpg");
    create_sample_jpeg(&source)?;
    let original = fs::read(&source)?;

    let huge = "x".repeat(70_000);
    let result = run(
        &source,
        ImageContainerKind::Jpeg,
        &overwrite_request(&[("Description", huge.as_str())]),
    )?;

    assert!(!result.success);
    assert_eq!(fs::read(&source)?, original);
    assert_eq!(fs::read_dir(dir.path())?.count(), 1);
    Ok(())
}

#[test]
fn jpeg_export_writes_every_entry() -> TestResult {
    let dir = tempdir()?;
    let source = dir.path().join("foto.jpg");
    let output = dir.path().join("salida");
    create_sample_jpeg(&source)?;

    let request = OperationRequest::with_options(
        OperationKind::Export,
        OperationOptions {
            output_directory: Some(output.clone()),
            ..OperationOptions::default()
        },
    );
    let result = run(&source, ImageContainerKind::Jpeg, &request)?;
    assert!(result.success, "{}", result.message);

    let exported: BTreeMap<String, String> =
        serde_json::from_str(&fs::read_to_string(output.join("foto_metadata.json"))?)?;
    assert_eq!(exported.len(), 6);
    assert_eq!(exported.get("EXIF.Exif.Image.Make").map(String::as_str), Some("Canon"));
    assert_eq!(exported.get("Total.EXIF").map(String::as_str), Some("3"));
    Ok(())
}

#[test]
fn png_clean_removes_exif_and_text_chunks() -> TestResult {
    let dir = tempdir()?;
    let source = dir.path().join("captura.png");
    create_sample_png(&source)?;
    let before = pixels(&source)?;

    let initial = read(&source, ImageContainerKind::Png)?;
    assert_eq!(value(&initial, "EXIF.Exif.Image.Make"), Some("Canon"));
    assert_eq!(value(&initial, "Total.EXIF"), Some("3"));

    let cleaned = run(
        &source,
        ImageContainerKind::Png,
        &OperationRequest::new(OperationKind::Clean),
    )?;
    assert!(cleaned.success, "{}", cleaned.message);

    let raw = fs::read(&source)?;
    assert!(!raw.windows(4).any(|window| window == b"eXIf"));
    assert!(!raw.windows(4).any(|window| window == b"tEXt"));
    assert_eq!(pixels(&source)?, before);
    Ok(())
}

#[test]
fn png_overwrite_warns_about_iptc() -> TestResult {
    let dir = tempdir()?;
    let source = dir.path().join("captura.png");
    create_sample_png(&source)?;

    let result = run(
        &source,
        ImageContainerKind::Png,
        &overwrite_request(&[
            ("Title", "Captura"),
            ("IPTC.Iptc.Application2.City", "Quito"),
        ]),
    )?;
    assert!(result.success, "{}", result.message);
    assert_eq!(result.warnings.len(), 1);

    let read = read(&source, ImageContainerKind::Png)?;
    assert_eq!(value(&read, "EXIF.Exif.Image.ImageDescription"), Some("Captura"));
    assert_eq!(value(&read, "XMP.Xmp.dc.title"), Some("Captura"));
    assert_eq!(value(&read, "Total.IPTC"), Some("0"));
    assert!(!read.metadata.contains_key("EXIF.Exif.Image.Make"));
    Ok(())
}

#[test]
fn corrupted_signature_fails_without_changes() -> TestResult {
    let dir = tempdir()?;
    let source = dir.path().join("foto.jpg");
    create_sample_jpeg(&source)?;
    let mut processor = ImageProcessor::open(&source, ImageContainerKind::Jpeg)?;

    fs::write(&source, b"no es una imagen")?;
    let result = crate::processor::pipeline::run(
        &mut processor,
        &OperationRequest::new(OperationKind::Clean),
    );

    assert!(!result.success);
    assert!(result.message.contains("JPEG"));
    assert_eq!(fs::read(&source)?, b"no es una imagen");
    Ok(())
}

#[test]
fn png_prerequisite_checks_the_signature() -> TestResult {
    let dir = tempdir()?;
    let source = dir.path().join("captura.png");
    create_sample_png(&source)?;
    let mut processor = ImageProcessor::open(&source, ImageContainerKind::Png)?;

    let read = crate::processor::pipeline::run(
        &mut processor,
        &OperationRequest::new(OperationKind::Read),
    );
    assert!(read.success, "{}", read.message);

    fs::write(&source, b"GIF89a no es png")?;
    let result = crate::processor::pipeline::run(
        &mut processor,
        &OperationRequest::new(OperationKind::Clean),
    );
    assert!(!result.success);
    assert!(result.message.contains("PNG"));
    assert_eq!(fs::read(&source)?, b"GIF89a no es png");
    Ok(())
}

#[test]
fn restore_is_not_supported_and_bad_files_fail_to_load() -> TestResult {
    let dir = tempdir()?;
    let source = dir.path().join("captura.png");
    create_sample_png(&source)?;

    let result = run(
        &source,
        ImageContainerKind::Png,
        &OperationRequest::new(OperationKind::Restore),
    )?;
    assert!(!result.success);
    assert!(result.message.contains("restore"));

    let fake = dir.path().join("falsa.jpg");
    fs::write(&fake, b"texto plano")?;
    assert!(matches!(
        ImageProcessor::open(&fake, ImageContainerKind::Jpeg),
        Err(ProcessorError::Load { format: "JPEG", .. })
    ));
    Ok(())
}
