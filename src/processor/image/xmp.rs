//! Paquetes XMP: aplanado de propiedades y generación de paquetes nuevos.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use xmltree::{Element, XMLNode};

use crate::error::{ProcessorError, Result};

const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

const NAMESPACES: &[(&str, &str)] = &[
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("xmp", "http://ns.adobe.com/xap/1.0/"),
    ("xmpRights", "http://ns.adobe.com/xap/1.0/rights/"),
    ("xmpMM", "http://ns.adobe.com/xap/1.0/mm/"),
    ("photoshop", "http://ns.adobe.com/photoshop/1.0/"),
    ("tiff", "http://ns.adobe.com/tiff/1.0/"),
    ("exif", "http://ns.adobe.com/exif/1.0/"),
    ("aux", "http://ns.adobe.com/exif/1.0/aux/"),
    ("pdf", "http://ns.adobe.com/pdf/1.3/"),
    ("Iptc4xmpCore", "http://iptc.org/std/Iptc4xmpCore/1.0/xmlns/"),
    ("lr", "http://ns.adobe.com/lightroom/1.0/"),
];

/// Prefijos de atributos abreviados habituales en `rdf:Description`.
const ATTRIBUTE_PREFIXES: &[(&str, &str)] = &[
    ("CreatorTool", "xmp"),
    ("CreateDate", "xmp"),
    ("ModifyDate", "xmp"),
    ("MetadataDate", "xmp"),
    ("Rating", "xmp"),
    ("Label", "xmp"),
    ("Nickname", "xmp"),
    ("DocumentID", "xmpMM"),
    ("InstanceID", "xmpMM"),
    ("OriginalDocumentID", "xmpMM"),
    ("Marked", "xmpRights"),
    ("WebStatement", "xmpRights"),
    ("ColorMode", "photoshop"),
    ("ICCProfile", "photoshop"),
    ("DateCreated", "photoshop"),
    ("AuthorsPosition", "photoshop"),
    ("Headline", "photoshop"),
    ("Credit", "photoshop"),
    ("Source", "photoshop"),
    ("City", "photoshop"),
    ("State", "photoshop"),
    ("Country", "photoshop"),
    ("CaptionWriter", "photoshop"),
    ("Instructions", "photoshop"),
    ("Orientation", "tiff"),
    ("XResolution", "tiff"),
    ("YResolution", "tiff"),
    ("ResolutionUnit", "tiff"),
    ("Make", "tiff"),
    ("Model", "tiff"),
    ("ImageWidth", "tiff"),
    ("ImageLength", "tiff"),
    ("PixelXDimension", "exif"),
    ("PixelYDimension", "exif"),
    ("ColorSpace", "exif"),
    ("DateTimeOriginal", "exif"),
    ("ExposureTime", "exif"),
    ("FNumber", "exif"),
    ("FocalLength", "exif"),
    ("Lens", "aux"),
    ("LensID", "aux"),
    ("SerialNumber", "aux"),
    ("Producer", "pdf"),
    ("PDFVersion", "pdf"),
    ("format", "dc"),
];

const UNKNOWN_PREFIX: &str = "unknown";
const ALT_PROPERTIES: &[&str] = &["title", "rights", "description"];

fn namespace_for(prefix: &str) -> Option<(&'static str, &'static str)> {
    NAMESPACES
        .iter()
        .find(|(candidate, _)| *candidate == prefix)
        .copied()
}

fn prefix_for_namespace(namespace: &str) -> Option<&'static str> {
    NAMESPACES
        .iter()
        .find(|(_, uri)| *uri == namespace)
        .map(|(prefix, _)| *prefix)
}

fn attribute_prefix(local_name: &str) -> &'static str {
    ATTRIBUTE_PREFIXES
        .iter()
        .find(|(name, _)| *name == local_name)
        .map(|(_, prefix)| *prefix)
        .unwrap_or(UNKNOWN_PREFIX)
}

fn extract_xmp_xml(packet: &str) -> Option<&str> {
    slice_between(packet, "<x:xmpmeta", "</x:xmpmeta>")
        .or_else(|| slice_between(packet, "<rdf:RDF", "</rdf:RDF>"))
}

fn slice_between<'a>(value: &'a str, start_tag: &str, end_tag: &str) -> Option<&'a str> {
    let start = value.find(start_tag)?;
    let end = value[start..].find(end_tag)?;
    Some(&value[start..start + end + end_tag.len()])
}

fn is_rdf(element: &Element, local_name: &str) -> bool {
    element.name == local_name
        && (element.namespace.as_deref() == Some(RDF_NS) || element.prefix.as_deref() == Some("rdf"))
}

fn child_elements(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(|node| match node {
        XMLNode::Element(child) => Some(child),
        _ => None,
    })
}

fn collect_descriptions<'a>(element: &'a Element, found: &mut Vec<&'a Element>) {
    if is_rdf(element, "Description") {
        found.push(element);
        return;
    }
    for child in child_elements(element) {
        collect_descriptions(child, found);
    }
}

fn element_text(element: &Element) -> String {
    let mut parts = Vec::new();
    collect_text_nodes(element, &mut parts);
    parts
        .into_iter()
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn collect_text_nodes(element: &Element, values: &mut Vec<String>) {
    for node in &element.children {
        match node {
            XMLNode::Text(text) | XMLNode::CData(text) => values.push(text.trim().to_string()),
            XMLNode::Element(child) => collect_text_nodes(child, values),
            _ => {}
        }
    }
}

fn language(element: &Element) -> Option<&str> {
    element
        .attributes
        .iter()
        .find(|(key, _)| *key == "lang" || *key == "xml:lang")
        .map(|(_, value)| value.as_str())
}

fn property_value(property: &Element) -> String {
    let Some(container) = child_elements(property)
        .find(|child| is_rdf(child, "Alt") || is_rdf(child, "Seq") || is_rdf(child, "Bag"))
    else {
        if let Some((_, resource)) = property
            .attributes
            .iter()
            .find(|(key, _)| *key == "resource" || *key == "rdf:resource")
        {
            return resource.clone();
        }
        return element_text(property);
    };

    let items: Vec<&Element> = child_elements(container)
        .filter(|child| is_rdf(child, "li"))
        .collect();
    if is_rdf(container, "Alt") {
        return items
            .iter()
            .find(|item| language(item) == Some("x-default"))
            .or_else(|| items.first())
            .map(|item| element_text(item))
            .unwrap_or_default();
    }
    items
        .iter()
        .map(|item| element_text(item))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn qualify_attribute(key: &str) -> Option<(String, String)> {
    let (prefix, local_name) = match key.split_once(':') {
        Some((prefix, local_name)) => (prefix.to_string(), local_name),
        None => (attribute_prefix(key).to_string(), key),
    };
    if matches!(prefix.as_str(), "rdf" | "xml" | "xmlns") || local_name == "about" {
        return None;
    }
    Some((prefix, local_name.to_string()))
}

/// Propiedades del paquete como `Xmp.<prefijo>.<nombre>` → valor.
pub(crate) fn read_entries(packet: &str) -> Result<BTreeMap<String, String>> {
    let xml = extract_xmp_xml(packet).ok_or_else(|| {
        ProcessorError::Xml("El paquete XMP no contiene x:xmpmeta ni rdf:RDF".to_string())
    })?;
    let root = Element::parse(xml.as_bytes())?;

    let mut descriptions = Vec::new();
    collect_descriptions(&root, &mut descriptions);

    let mut entries = BTreeMap::new();
    for description in descriptions {
        for (key, value) in &description.attributes {
            if let Some((prefix, name)) = qualify_attribute(key) {
                entries.insert(format!("Xmp.{prefix}.{name}"), value.trim().to_string());
            }
        }
        for property in child_elements(description) {
            let prefix = property
                .prefix
                .clone()
                .or_else(|| {
                    property
                        .namespace
                        .as_deref()
                        .and_then(prefix_for_namespace)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| UNKNOWN_PREFIX.to_string());
            entries.insert(
                format!("Xmp.{prefix}.{}", property.name),
                property_value(property),
            );
        }
    }
    Ok(entries)
}

/// Propiedad XMP escribible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct XmpProperty {
    pub(crate) prefix: &'static str,
    pub(crate) name: String,
    pub(crate) value: String,
}

impl XmpProperty {
    pub(crate) fn new(prefix: &'static str, name: &str, value: &str) -> Self {
        Self {
            prefix,
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// Propiedad para una clave `Xmp.<prefijo>.<nombre>` con prefijo conocido.
    pub(crate) fn from_key(key: &str, value: &str) -> Option<Self> {
        let (prefix, name) = key.strip_prefix("Xmp.")?.split_once('.')?;
        let (prefix, _) = namespace_for(prefix)?;
        let mut chars = name.chars();
        let valid = chars
            .next()
            .is_some_and(|first| first.is_alphabetic() || first == '_')
            && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-'));
        valid.then(|| Self::new(prefix, name, value))
    }

    fn write_to(&self, output: &mut String) {
        let name = format!("{}:{}", self.prefix, self.name);
        let value = escape(&self.value);
        let _ = if self.prefix == "dc" && ALT_PROPERTIES.contains(&self.name.as_str()) {
            write!(
                output,
                "<{name}><rdf:Alt><rdf:li xml:lang=\"x-default\">{value}</rdf:li></rdf:Alt></{name}>"
            )
        } else if self.prefix == "dc" && self.name == "creator" {
            write!(output, "<{name}><rdf:Seq><rdf:li>{value}</rdf:li></rdf:Seq></{name}>")
        } else if self.prefix == "dc" && self.name == "subject" {
            let items: String = self
                .value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| format!("<rdf:li>{}</rdf:li>", escape(item)))
                .collect();
            write!(output, "<{name}><rdf:Bag>{items}</rdf:Bag></{name}>")
        } else {
            write!(output, "<{name}>{value}</{name}>")
        };
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Paquete XMP completo (con `xpacket`) que contiene solo las propiedades dadas.
pub(crate) fn build_packet(properties: &[XmpProperty]) -> String {
    let mut prefixes: Vec<&'static str> = properties.iter().map(|p| p.prefix).collect();
    prefixes.sort_unstable();
    prefixes.dedup();

    let mut packet = String::from(
        "<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\
         <x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\
         <rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\
         <rdf:Description rdf:about=\"\"",
    );
    for prefix in prefixes {
        if let Some((prefix, uri)) = namespace_for(prefix) {
            let _ = write!(packet, " xmlns:{prefix}=\"{uri}\"");
        }
    }
    packet.push('>');
    for property in properties {
        property.write_to(&mut packet);
    }
    packet.push_str("</rdf:Description></rdf:RDF></x:xmpmeta><?xpacket end=\"w\"?>");
    packet
}
