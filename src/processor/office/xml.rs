use std::collections::BTreeMap;
use std::io::Cursor;

use xmltree::{Element, EmitterConfig, XMLNode};

use crate::error::{ProcessorError, Result};

use super::constants::{
    APP_NS, APP_PROPERTIES_EMPTY, CORE_PROPERTIES_EMPTY, CP_NS, DC_NS, DCTERMS_NS, W3CDTF_TYPE,
};

/// Describe la información necesaria para localizar un nodo en el XML de propiedades.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FieldSpec<'a> {
    pub(crate) prefix: Option<&'a str>,
    pub(crate) local_name: &'a str,
    pub(crate) namespace: Option<&'a str>,
}

impl<'a> FieldSpec<'a> {
    const fn core(prefix: &'a str, local_name: &'a str, namespace: &'a str) -> Self {
        Self {
            prefix: Some(prefix),
            local_name,
            namespace: Some(namespace),
        }
    }

    const fn app(local_name: &'a str) -> Self {
        Self {
            prefix: None,
            local_name,
            namespace: Some(APP_NS),
        }
    }
}

/// Campo de `core.xml` para una clave conocida (`Title`, `Author`...).
pub(crate) fn core_field_spec(key: &str) -> Option<FieldSpec<'static>> {
    match key {
        "Title" => Some(FieldSpec::core("dc", "title", DC_NS)),
        "Subject" => Some(FieldSpec::core("dc", "subject", DC_NS)),
        "Author" | "Creator" => Some(FieldSpec::core("dc", "creator", DC_NS)),
        "Description" => Some(FieldSpec::core("dc", "description", DC_NS)),
        "Keywords" => Some(FieldSpec::core("cp", "keywords", CP_NS)),
        "Category" => Some(FieldSpec::core("cp", "category", CP_NS)),
        "LastModifiedBy" => Some(FieldSpec::core("cp", "lastModifiedBy", CP_NS)),
        _ => None,
    }
}

/// Campo de `app.xml` para una clave conocida (`Application`, `Company`, `Manager`).
pub(crate) fn app_field_spec(key: &str) -> Option<FieldSpec<'static>> {
    match key {
        "Application" => Some(FieldSpec::app("Application")),
        "Company" => Some(FieldSpec::app("Company")),
        "Manager" => Some(FieldSpec::app("Manager")),
        _ => None,
    }
}

fn core_prefix_namespace(prefix: &str) -> Option<&'static str> {
    match prefix {
        "cp" => Some(CP_NS),
        "dc" => Some(DC_NS),
        "dcterms" => Some(DCTERMS_NS),
        _ => None,
    }
}

fn canonical_core_prefix(local_name: &str) -> &'static str {
    match local_name {
        "title" | "subject" | "creator" | "description" | "language" | "identifier" => "dc",
        "created" | "modified" => "dcterms",
        _ => "cp",
    }
}

/// Campo de `core.xml` para el sufijo de una clave `Core.<nombre>`.
///
/// `prefijo:local` conserva el prefijo si es conocido; sin prefijo se usa el espacio de
/// nombres canónico del elemento y, si no lo hay, el de `cp`.
pub(crate) fn verbatim_core_spec(name: &str) -> Option<FieldSpec<'_>> {
    let (prefix, local_name) = match name.split_once(':') {
        Some((prefix, local_name)) => {
            let namespace = core_prefix_namespace(prefix)?;
            let prefix = match namespace {
                CP_NS => "cp",
                DC_NS => "dc",
                _ => "dcterms",
            };
            (prefix, local_name)
        }
        None => (canonical_core_prefix(name), name),
    };
    if !is_xml_name(local_name) {
        return None;
    }
    let namespace = core_prefix_namespace(prefix)?;
    Some(FieldSpec {
        prefix: Some(prefix),
        local_name,
        namespace: Some(namespace),
    })
}

/// Campo de `app.xml` para el sufijo de una clave `App.<nombre>`.
pub(crate) fn verbatim_app_spec(name: &str) -> Option<FieldSpec<'_>> {
    is_xml_name(name).then(|| FieldSpec::app(name))
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

pub(crate) fn parse_part(contents: &str) -> Result<Element> {
    let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
    Ok(Element::parse(Cursor::new(contents.as_bytes()))?)
}

pub(crate) fn empty_core_properties() -> Result<Element> {
    parse_part(CORE_PROPERTIES_EMPTY)
}

pub(crate) fn empty_app_properties() -> Result<Element> {
    parse_part(APP_PROPERTIES_EMPTY)
}

pub(crate) fn serialize_part(root: &Element) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let mut config = EmitterConfig::new();
    config.perform_indent = false;
    config.write_document_declaration = true;
    root.write_with_config(&mut output, config)
        .map_err(|e| ProcessorError::Xml(format!("Error escribiendo XML de metadata: {}", e)))?;
    Ok(output)
}

/// Hijos directos de la raíz como `<prefijo>.<nombre local>` → texto.
pub(crate) fn collect_children(
    root: &Element,
    key_prefix: &str,
    metadata: &mut BTreeMap<String, String>,
) -> usize {
    let mut count = 0;
    for node in &root.children {
        if let XMLNode::Element(child) = node {
            count += 1;
            metadata.insert(
                format!("{key_prefix}{}", child.name),
                element_text_content(child),
            );
        }
    }
    count
}

/// Inserta o sustituye el contenido de un elemento de metadata.
pub(crate) fn apply_update_to_element(
    root: &mut Element,
    spec: FieldSpec<'_>,
    new_value: &str,
) -> bool {
    for node in root.children.iter_mut() {
        if let XMLNode::Element(child) = node
            && element_matches(child, &spec)
        {
            return set_element_text(child, new_value);
        }
    }

    let mut new_child = Element::new(spec.local_name);
    if let Some(prefix) = spec.prefix {
        new_child.prefix = Some(prefix.to_string());
    }
    if let Some(namespace) = spec.namespace {
        new_child.namespace = Some(namespace.to_string());
    }
    if spec.namespace == Some(DCTERMS_NS) {
        new_child
            .attributes
            .insert("xsi:type".to_string(), W3CDTF_TYPE.to_string());
    }
    if !new_value.is_empty() {
        new_child
            .children
            .push(XMLNode::Text(new_value.to_string()));
    }
    root.children.push(XMLNode::Element(new_child));
    true
}

pub(crate) fn has_element(root: &Element, spec: &FieldSpec<'_>) -> bool {
    root.children
        .iter()
        .any(|node| matches!(node, XMLNode::Element(child) if element_matches(child, spec)))
}

/// Comprueba si un elemento coincide con la especificación de búsqueda.
pub(crate) fn element_matches(element: &Element, spec: &FieldSpec<'_>) -> bool {
    if element.name != spec.local_name {
        return false;
    }

    match (spec.namespace, element.namespace.as_deref()) {
        (Some(expected), Some(actual)) => expected == actual,
        (Some(_), None) => false,
        (None, _) => true,
    }
}

/// Sustituye el texto de un elemento si difiere del valor actual.
pub(crate) fn set_element_text(element: &mut Element, new_value: &str) -> bool {
    if element_text_content(element) == new_value {
        return false;
    }

    element
        .children
        .retain(|node| !matches!(node, XMLNode::Text(_)));

    if !new_value.is_empty() {
        element.children.push(XMLNode::Text(new_value.to_string()));
    }

    true
}

/// Devuelve el texto plano contenido dentro de un elemento.
pub(crate) fn element_text_content(element: &Element) -> String {
    let mut content = String::new();
    for node in &element.children {
        match node {
            XMLNode::Text(text) | XMLNode::CData(text) => content.push_str(text),
            _ => {}
        }
    }
    content.trim().to_string()
}
