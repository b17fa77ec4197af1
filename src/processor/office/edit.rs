use std::collections::BTreeMap;

use chrono::Utc;
use tracing::debug;
use xmltree::Element;

use crate::error::Result;

use super::constants::{APP_KEY_PREFIX, CORE_KEY_PREFIX, DCTERMS_NS, TIMESTAMP_FORMAT};
use super::xml::{
    FieldSpec, app_field_spec, apply_update_to_element, core_field_spec, empty_app_properties,
    empty_core_properties, has_element, verbatim_app_spec, verbatim_core_spec,
};

/// Documentos de propiedades generados para una sobrescritura.
pub(crate) struct PropertyDocuments {
    pub(crate) core: Element,
    pub(crate) app: Option<Element>,
    pub(crate) warnings: Vec<String>,
}

enum Target<'a> {
    Core(FieldSpec<'a>),
    App(FieldSpec<'a>),
}

fn target_for(key: &str) -> Option<Target<'_>> {
    if let Some(spec) = core_field_spec(key) {
        return Some(Target::Core(spec));
    }
    if let Some(spec) = app_field_spec(key) {
        return Some(Target::App(spec));
    }
    if let Some(name) = key.strip_prefix(CORE_KEY_PREFIX) {
        return verbatim_core_spec(name).map(Target::Core);
    }
    if let Some(name) = key.strip_prefix(APP_KEY_PREFIX) {
        return verbatim_app_spec(name).map(Target::App);
    }
    None
}

/// Construye `core.xml` y, si `with_app`, `app.xml` a partir de los valores solicitados.
pub(crate) fn build_documents(
    values: &BTreeMap<String, String>,
    with_app: bool,
) -> Result<PropertyDocuments> {
    let mut core = empty_core_properties()?;
    let mut app = if with_app {
        Some(empty_app_properties()?)
    } else {
        None
    };
    let mut warnings = Vec::new();

    for (key, value) in values {
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }

        match target_for(key) {
            Some(Target::Core(spec)) => {
                apply_update_to_element(&mut core, spec, value);
            }
            Some(Target::App(spec)) => match app.as_mut() {
                Some(app) => {
                    apply_update_to_element(app, spec, value);
                }
                None => warnings.push(format!(
                    "El documento no contiene docProps/app.xml; se omitió {key}"
                )),
            },
            None => {
                debug!(key = %key, "clave sin correspondencia en las propiedades del documento");
            }
        }
    }

    let timestamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
    for local_name in ["created", "modified"] {
        let spec = FieldSpec {
            prefix: Some("dcterms"),
            local_name,
            namespace: Some(DCTERMS_NS),
        };
        if !has_element(&core, &spec) {
            apply_update_to_element(&mut core, spec, &timestamp);
        }
    }

    Ok(PropertyDocuments {
        core,
        app,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::office::xml::collect_children;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn known_and_verbatim_keys_land_in_their_parts() -> Result<()> {
        let documents = build_documents(
            &values(&[
                ("Title", "Informe"),
                ("Author", "Ana"),
                ("Company", "ACME"),
                ("Core.revision", "3"),
                ("App.Template", "Normal.dotm"),
                ("Core.foo:bar", "ignorada"),
                ("Subject", ""),
                ("Desconocida", "x"),
            ]),
            true,
        )?;

        let mut core = BTreeMap::new();
        collect_children(&documents.core, "Core.", &mut core);
        assert_eq!(core.get("Core.title").map(String::as_str), Some("Informe"));
        assert_eq!(core.get("Core.creator").map(String::as_str), Some("Ana"));
        assert_eq!(core.get("Core.revision").map(String::as_str), Some("3"));
        assert!(core.contains_key("Core.created"));
        assert!(core.contains_key("Core.modified"));
        assert!(!core.contains_key("Core.subject"));
        assert!(!core.contains_key("Core.bar"));

        let mut app = BTreeMap::new();
        let app_root = documents.app.as_ref().expect("app.xml");
        collect_children(app_root, "App.", &mut app);
        assert_eq!(app.get("App.Company").map(String::as_str), Some("ACME"));
        assert_eq!(app.get("App.Template").map(String::as_str), Some("Normal.dotm"));
        assert!(documents.warnings.is_empty());
        Ok(())
    }

    #[test]
    fn supplied_timestamps_are_kept() -> Result<()> {
        let documents = build_documents(
            &values(&[("Core.dcterms:created", "2020-01-01T00:00:00Z")]),
            false,
        )?;

        let mut core = BTreeMap::new();
        collect_children(&documents.core, "Core.", &mut core);
        assert_eq!(
            core.get("Core.created").map(String::as_str),
            Some("2020-01-01T00:00:00Z")
        );
        assert_ne!(
            core.get("Core.modified").map(String::as_str),
            Some("2020-01-01T00:00:00Z")
        );
        Ok(())
    }

    #[test]
    fn app_keys_without_app_part_produce_warning() -> Result<()> {
        let documents = build_documents(&values(&[("Company", "ACME")]), false)?;
        assert!(documents.app.is_none());
        assert_eq!(documents.warnings.len(), 1);
        assert!(documents.warnings[0].contains("Company"));
        Ok(())
    }
}
