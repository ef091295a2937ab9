//! Queryable construction from OData `$metadata`.
//!
//! Reads the EDMX document with `quick-xml`, collects entity types with
//! their properties and key refs, then joins them against the entity
//! container's entity sets. Restrictions are applied last so excluded sets
//! and properties never become queryables.

use crate::error::{Error, Result};
use crate::generator::GeneratorConfig;
use crate::property::{EntityProperty, PropertyKind};
use crate::queryable::{EntitySet, Queryable};
use crate::restrictions::Restrictions;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct RawEntityType {
    properties: Vec<EntityProperty>,
    key_refs: Vec<String>,
}

fn attr(element: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    let Some(attribute) = element
        .try_get_attribute(name)
        .map_err(|e| Error::Metadata(e.to_string()))?
    else {
        return Ok(None);
    };
    let value = attribute
        .unescape_value()
        .map_err(|e| Error::Metadata(e.to_string()))?;
    Ok(Some(value.into_owned()))
}

fn required_attr(element: &BytesStart<'_>, name: &str, context: &str) -> Result<String> {
    attr(element, name)?
        .ok_or_else(|| Error::Metadata(format!("{context} is missing the {name} attribute")))
}

/// Strips the schema namespace from a qualified type name.
fn local_type_name(qualified: &str) -> &str {
    qualified.rsplit_once('.').map_or(qualified, |(_, n)| n)
}

/// Builds the queryable list from an EDMX `$metadata` document.
///
/// # Errors
///
/// Returns an error when the document is not well-formed XML or required
/// attributes are missing. A metadata document without entity sets is an
/// error as well: there is nothing to fuzz.
pub fn build_queryables(
    metadata_xml: &str,
    restrictions: Option<&Restrictions>,
    config: &GeneratorConfig,
) -> Result<Vec<Queryable>> {
    let mut reader = Reader::from_str(metadata_xml);

    let mut entity_types: HashMap<String, RawEntityType> = HashMap::new();
    let mut entity_sets: Vec<(String, String)> = Vec::new();
    let mut current_type: Option<String> = None;
    let mut in_key = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => match e.local_name().as_ref() {
                b"EntityType" => {
                    let name = required_attr(&e, "Name", "EntityType")?;
                    entity_types.entry(name.clone()).or_default();
                    current_type = Some(name);
                }
                b"Key" => in_key = true,
                b"PropertyRef" => {
                    if in_key {
                        if let (Some(type_name), Some(prop)) =
                            (current_type.as_ref(), attr(&e, "Name")?)
                        {
                            if let Some(raw) = entity_types.get_mut(type_name) {
                                raw.key_refs.push(prop);
                            }
                        }
                    }
                }
                b"Property" => {
                    if let Some(type_name) = current_type.as_ref() {
                        let name = required_attr(&e, "Name", "Property")?;
                        let edm_type = required_attr(&e, "Type", "Property")?;
                        let max_length = attr(&e, "MaxLength")?.and_then(|m| m.parse().ok());
                        let kind = PropertyKind::from_edm(&edm_type, max_length);
                        if kind == PropertyKind::Other {
                            debug!("property {name} has unsupported type {edm_type}");
                        }
                        if let Some(raw) = entity_types.get_mut(type_name) {
                            raw.properties.push(EntityProperty::new(name, kind));
                        }
                    }
                }
                b"EntitySet" => {
                    let name = required_attr(&e, "Name", "EntitySet")?;
                    let entity_type = required_attr(&e, "EntityType", "EntitySet")?;
                    entity_sets.push((name, local_type_name(&entity_type).to_string()));
                }
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"EntityType" => current_type = None,
                b"Key" => in_key = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::Metadata(format!(
                    "invalid XML at offset {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }

    if entity_sets.is_empty() {
        return Err(Error::Metadata(
            "metadata declares no entity sets".to_string(),
        ));
    }

    let mut queryables = Vec::new();
    for (set_name, type_name) in entity_sets {
        if let Some(r) = restrictions {
            if !r.allows_entity_set(&set_name) {
                info!("entity set {set_name} excluded by restrictions");
                continue;
            }
        }
        let Some(raw) = entity_types.get(&type_name) else {
            warn!("entity set {set_name} references unknown type {type_name}");
            continue;
        };

        let mut set = EntitySet::new(&set_name, &type_name);
        for property in &raw.properties {
            if let Some(r) = restrictions {
                if !r.allows_property(&set_name, &property.name) {
                    continue;
                }
            }
            let mut property = property.clone();
            property.is_key = raw.key_refs.iter().any(|k| k == &property.name);
            set = set.with_property(property);
        }
        queryables.push(Queryable::new(set, config.clone()));
    }

    info!("built {} queryables from metadata", queryables.len());
    Ok(queryables)
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx xmlns:edmx="http://schemas.microsoft.com/ado/2007/06/edmx" Version="1.0">
  <edmx:DataServices>
    <Schema xmlns="http://schemas.microsoft.com/ado/2008/09/edm" Namespace="Demo">
      <EntityType Name="Customer">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Guid" Nullable="false"/>
        <Property Name="Name" Type="Edm.String" MaxLength="40"/>
        <Property Name="Rating" Type="Edm.Int32"/>
        <Property Name="Photo" Type="Edm.Binary"/>
      </EntityType>
      <EntityType Name="Order">
        <Key><PropertyRef Name="OrderId"/></Key>
        <Property Name="OrderId" Type="Edm.Int64" Nullable="false"/>
        <Property Name="Created" Type="Edm.DateTime"/>
      </EntityType>
      <EntityContainer Name="DemoEntities" m:IsDefaultEntityContainer="true"
          xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
        <EntitySet Name="Customers" EntityType="Demo.Customer"/>
        <EntitySet Name="Orders" EntityType="Demo.Order"/>
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

    #[test]
    fn builds_queryables_with_keys_and_kinds() {
        let queryables =
            build_queryables(METADATA, None, &GeneratorConfig::default()).unwrap();
        assert_eq!(queryables.len(), 2);

        let customers = &queryables[0];
        assert_eq!(customers.name(), "Customers");
        let set = customers.entity_set();
        assert_eq!(set.properties.len(), 4);
        assert!(set.properties[0].is_key);
        assert_eq!(
            set.properties[1].kind,
            PropertyKind::Str {
                max_length: Some(40)
            }
        );
        assert_eq!(set.properties[3].kind, PropertyKind::Other);
        assert_eq!(set.filterable_properties().len(), 3);
    }

    #[test]
    fn restrictions_drop_sets_and_properties() {
        let restrictions: Restrictions = serde_yaml::from_str(
            "exclude_entity_sets: [Orders]\nexclude_properties:\n  Customers: [Photo, Rating]\n",
        )
        .unwrap();
        let queryables =
            build_queryables(METADATA, Some(&restrictions), &GeneratorConfig::default()).unwrap();
        assert_eq!(queryables.len(), 1);
        assert_eq!(queryables[0].name(), "Customers");
        assert_eq!(queryables[0].entity_set().properties.len(), 2);
    }

    #[test]
    fn empty_container_is_an_error() {
        let xml = r#"<Schema xmlns="x"><EntityType Name="T"/></Schema>"#;
        assert!(build_queryables(xml, None, &GeneratorConfig::default()).is_err());
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(build_queryables("<Edmx></Wrong>", None, &GeneratorConfig::default()).is_err());
    }
}
