//! Registros IPTC-IIM y el recurso de Photoshop que los envuelve en JPEG.

use std::collections::BTreeMap;

use crate::error::{ProcessorError, Result};

pub(crate) const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
const RESOURCE_SIGNATURE: &[u8; 4] = b"8BIM";
const IPTC_RESOURCE_ID: u16 = 0x0404;
const TAG_MARKER: u8 = 0x1C;
const MAX_STANDARD_LENGTH: usize = 0x7FFF;

const ENVELOPE: u8 = 1;
const APPLICATION: u8 = 2;
const RECORD_VERSION: u8 = 0;
const CODED_CHARACTER_SET: u8 = 90;
const IIM_VERSION: u16 = 4;
/// Secuencia ISO 2022 que declara UTF-8.
const UTF8_DESIGNATION: &[u8] = b"\x1B%G";

const ENVELOPE_DATASETS: &[(u8, &str)] = &[
    (0, "ModelVersion"),
    (5, "Destination"),
    (20, "FileFormat"),
    (22, "FileVersion"),
    (30, "ServiceId"),
    (40, "EnvelopeNumber"),
    (50, "ProductId"),
    (60, "EnvelopePriority"),
    (70, "DateSent"),
    (80, "TimeSent"),
    (90, "CharacterSet"),
    (100, "UNO"),
    (120, "ARMId"),
    (122, "ARMVersion"),
];

const APPLICATION_DATASETS: &[(u8, &str)] = &[
    (0, "RecordVersion"),
    (3, "ObjectType"),
    (4, "ObjectAttribute"),
    (5, "ObjectName"),
    (7, "EditStatus"),
    (10, "Urgency"),
    (12, "Subject"),
    (15, "Category"),
    (20, "SuppCategory"),
    (22, "FixtureId"),
    (25, "Keywords"),
    (26, "LocationCode"),
    (27, "LocationName"),
    (30, "ReleaseDate"),
    (35, "ReleaseTime"),
    (37, "ExpirationDate"),
    (38, "ExpirationTime"),
    (40, "SpecialInstructions"),
    (42, "ActionAdvised"),
    (45, "ReferenceService"),
    (47, "ReferenceDate"),
    (50, "ReferenceNumber"),
    (55, "DateCreated"),
    (60, "TimeCreated"),
    (62, "DigitizationDate"),
    (63, "DigitizationTime"),
    (65, "Program"),
    (70, "ProgramVersion"),
    (75, "ObjectCycle"),
    (80, "Byline"),
    (85, "BylineTitle"),
    (90, "City"),
    (92, "SubLocation"),
    (95, "ProvinceState"),
    (100, "CountryCode"),
    (101, "CountryName"),
    (103, "TransmissionReference"),
    (105, "Headline"),
    (110, "Credit"),
    (115, "Source"),
    (116, "Copyright"),
    (118, "Contact"),
    (120, "Caption"),
    (122, "Writer"),
    (130, "ImageType"),
    (131, "ImageOrientation"),
    (135, "Language"),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Dataset {
    pub(crate) record: u8,
    pub(crate) number: u8,
    pub(crate) value: Vec<u8>,
}

fn record_name(record: u8) -> Option<&'static str> {
    match record {
        ENVELOPE => Some("Envelope"),
        APPLICATION => Some("Application2"),
        _ => None,
    }
}

fn record_table(record: u8) -> &'static [(u8, &'static str)] {
    match record {
        ENVELOPE => ENVELOPE_DATASETS,
        APPLICATION => APPLICATION_DATASETS,
        _ => &[],
    }
}

fn dataset_key(record: u8, number: u8) -> String {
    let record_label = record_name(record)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Record{record}"));
    let dataset_label = record_table(record)
        .iter()
        .find(|(candidate, _)| *candidate == number)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("0x{number:04x}"));
    format!("Iptc.{record_label}.{dataset_label}")
}

/// Dataset de texto del registro Application2 con ese nombre.
pub(crate) fn application_dataset(name: &str) -> Option<u8> {
    if name == "RecordVersion" {
        return None;
    }
    APPLICATION_DATASETS
        .iter()
        .find(|(_, candidate)| *candidate == name)
        .map(|(number, _)| *number)
}

/// Traduce `Iptc.Application2.<Nombre>` al número de dataset escribible.
pub(crate) fn dataset_for_key(key: &str) -> Option<u8> {
    application_dataset(key.strip_prefix("Iptc.Application2.")?)
}

pub(crate) fn parse_datasets(iim: &[u8]) -> Result<Vec<Dataset>> {
    let truncated = || ProcessorError::InvalidStructure("Registro IPTC truncado".to_string());

    let mut datasets = Vec::new();
    let mut pos = 0;
    while iim.get(pos) == Some(&TAG_MARKER) {
        let header = iim.get(pos + 1..pos + 5).ok_or_else(truncated)?;
        let (record, number) = (header[0], header[1]);
        let mut length = u16::from_be_bytes([header[2], header[3]]) as usize;
        pos += 5;

        if length & 0x8000 != 0 {
            let size = length & 0x7FFF;
            if size == 0 || size > 4 {
                return Err(ProcessorError::InvalidStructure(format!(
                    "Longitud extendida IPTC no admitida: {size} bytes"
                )));
            }
            let raw = iim.get(pos..pos + size).ok_or_else(truncated)?;
            length = raw.iter().fold(0usize, |acc, byte| (acc << 8) | *byte as usize);
            pos += size;
        }

        let value = iim.get(pos..pos + length).ok_or_else(truncated)?;
        datasets.push(Dataset {
            record,
            number,
            value: value.to_vec(),
        });
        pos += length;
    }
    Ok(datasets)
}

pub(crate) fn encode_datasets(datasets: &[Dataset]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    for dataset in datasets {
        if dataset.value.len() > MAX_STANDARD_LENGTH {
            return Err(ProcessorError::Encoding(format!(
                "El valor de {} supera {} bytes",
                dataset_key(dataset.record, dataset.number),
                MAX_STANDARD_LENGTH
            )));
        }
        output.extend_from_slice(&[TAG_MARKER, dataset.record, dataset.number]);
        output.extend_from_slice(&(dataset.value.len() as u16).to_be_bytes());
        output.extend_from_slice(&dataset.value);
    }
    Ok(output)
}

/// Registro Application2 con la versión IIM seguida de los datasets de texto indicados.
///
/// Si algún valor no es ASCII se antepone el dataset Envelope 1:90 declarando UTF-8.
pub(crate) fn encode_application_record(values: &[(u8, String)]) -> Result<Vec<u8>> {
    let mut datasets = Vec::with_capacity(values.len() + 2);
    if values.iter().any(|(_, value)| !value.is_ascii()) {
        datasets.push(Dataset {
            record: ENVELOPE,
            number: CODED_CHARACTER_SET,
            value: UTF8_DESIGNATION.to_vec(),
        });
    }
    datasets.push(Dataset {
        record: APPLICATION,
        number: RECORD_VERSION,
        value: IIM_VERSION.to_be_bytes().to_vec(),
    });
    datasets.extend(values.iter().map(|(number, value)| Dataset {
        record: APPLICATION,
        number: *number,
        value: value.as_bytes().to_vec(),
    }));
    encode_datasets(&datasets)
}

/// Entradas `Iptc.<Registro>.<Dataset>` con los valores repetidos unidos por comas.
pub(crate) fn read_entries(iim: &[u8]) -> Result<(BTreeMap<String, String>, usize)> {
    let datasets = parse_datasets(iim)?;
    let mut entries: BTreeMap<String, String> = BTreeMap::new();
    for dataset in &datasets {
        let key = dataset_key(dataset.record, dataset.number);
        let value = display_value(dataset);
        entries
            .entry(key)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    Ok((entries, datasets.len()))
}

fn display_value(dataset: &Dataset) -> String {
    if dataset.record == ENVELOPE
        && dataset.number == CODED_CHARACTER_SET
        && dataset.value == UTF8_DESIGNATION
    {
        return "UTF-8".to_string();
    }
    let is_version = dataset.number == 0 && dataset.value.len() == 2;
    if is_version {
        return u16::from_be_bytes([dataset.value[0], dataset.value[1]]).to_string();
    }
    String::from_utf8_lossy(&dataset.value)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

/// Busca el recurso IPTC (0x0404) en los bloques `8BIM` de un APP13 de Photoshop.
pub(crate) fn find_iptc_resource(resources: &[u8]) -> Option<&[u8]> {
    let mut pos = 0;
    while resources.get(pos..pos + 4)? == RESOURCE_SIGNATURE {
        let id = resources.get(pos + 4..pos + 6)?;
        let id = u16::from_be_bytes([id[0], id[1]]);
        pos += 6;

        let name_length = *resources.get(pos)? as usize;
        let name_total = (1 + name_length + 1) & !1;
        pos += name_total;

        let size = resources.get(pos..pos + 4)?;
        let size = u32::from_be_bytes([size[0], size[1], size[2], size[3]]) as usize;
        pos += 4;

        let data = resources.get(pos..pos + size)?;
        if id == IPTC_RESOURCE_ID {
            return Some(data);
        }
        pos += (size + 1) & !1;
    }
    None
}

/// Carga útil completa de un APP13 que solo contiene el recurso IPTC.
pub(crate) fn wrap_in_photoshop(iim: &[u8]) -> Vec<u8> {
    let mut payload = PHOTOSHOP_HEADER.to_vec();
    payload.extend_from_slice(RESOURCE_SIGNATURE);
    payload.extend_from_slice(&IPTC_RESOURCE_ID.to_be_bytes());
    payload.extend_from_slice(&[0, 0]);
    payload.extend_from_slice(&(iim.len() as u32).to_be_bytes());
    payload.extend_from_slice(iim);
    if iim.len() % 2 == 1 {
        payload.push(0);
    }
    payload
}
