use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// JSON-Schema-like document produced for every resolved type.
///
/// `$ref` holds a bare registry id; converting it into pointer syntax is left
/// to the consumer (see [`Schema::map_refs`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format for primitive types (e.g., "int32", "int64", "float", "double")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Properties for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Schema>>,
    /// Required field names for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Per-position schemas for tuples
    #[serde(rename = "prefixItems", skip_serializing_if = "Option::is_none")]
    pub prefix_items: Option<Vec<Schema>>,
    #[serde(rename = "minItems", skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(rename = "maxItems", skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_json::Value>>,
    #[serde(rename = "oneOf", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Schema>>,
    #[serde(rename = "allOf", skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// Reference to another schema
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<Schema>),
}

/// Tag property of a discriminated union.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discriminator {
    #[serde(rename = "propertyName")]
    pub property_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<IndexMap<String, String>>,
}

impl Schema {
    pub fn typed(schema_type: &str) -> Self {
        Schema {
            schema_type: Some(schema_type.to_string()),
            ..Default::default()
        }
    }

    pub fn reference(id: impl Into<String>) -> Self {
        Schema {
            reference: Some(id.into()),
            ..Default::default()
        }
    }

    /// Object schema built from ordered properties and a required list.
    pub fn object(properties: IndexMap<String, Schema>, required: Vec<String>, closed: bool) -> Self {
        Schema {
            schema_type: Some("object".to_string()),
            properties: Some(properties),
            required: if required.is_empty() { None } else { Some(required) },
            additional_properties: if closed {
                Some(AdditionalProperties::Allowed(false))
            } else {
                None
            },
            ..Default::default()
        }
    }

    pub fn array(items: Schema) -> Self {
        Schema {
            schema_type: Some("array".to_string()),
            items: Some(Box::new(items)),
            ..Default::default()
        }
    }

    /// Bare registry id when this schema is nothing but a `$ref`.
    pub fn ref_id(&self) -> Option<&str> {
        let only_ref = Schema {
            reference: self.reference.clone(),
            ..Default::default()
        };
        if self.reference.is_some() && *self == only_ref {
            self.reference.as_deref()
        } else {
            None
        }
    }

    /// Inner schema of a `{oneOf: [x], nullable: true}` wrapper.
    pub fn unwrap_nullable(&self) -> Option<&Schema> {
        match self.one_of.as_deref() {
            Some([inner]) if self.nullable == Some(true) => {
                let wrapper = Schema {
                    one_of: self.one_of.clone(),
                    nullable: Some(true),
                    ..Default::default()
                };
                (*self == wrapper).then_some(inner)
            }
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        self.schema_type.as_deref() == Some("object") && self.properties.is_some()
    }

    /// Single literal value held by a one-element `enum`.
    pub fn single_literal(&self) -> Option<&serde_json::Value> {
        match self.enum_values.as_deref() {
            Some([value]) => Some(value),
            _ => None,
        }
    }

    /// Copy with property order, `required` order and nested schemas
    /// normalized so structurally equal schemas compare and serialize equal.
    pub fn canonical(&self) -> Schema {
        let mut schema = self.clone();
        if let Some(properties) = schema.properties.as_mut() {
            let mut sorted: IndexMap<String, Schema> = properties
                .iter()
                .map(|(name, property)| (name.clone(), property.canonical()))
                .collect();
            sorted.sort_keys();
            *properties = sorted;
        }
        if let Some(required) = schema.required.as_mut() {
            required.sort();
            required.dedup();
        }
        if let Some(AdditionalProperties::Schema(inner)) = schema.additional_properties.as_mut() {
            **inner = inner.canonical();
        }
        if let Some(items) = schema.items.as_mut() {
            **items = items.canonical();
        }
        for list in [
            schema.prefix_items.as_mut(),
            schema.one_of.as_mut(),
            schema.all_of.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            for entry in list.iter_mut() {
                *entry = entry.canonical();
            }
        }
        if let Some(discriminator) = schema.discriminator.as_mut() {
            if let Some(mapping) = discriminator.mapping.as_mut() {
                mapping.sort_keys();
            }
        }
        schema
    }

    /// Stable textual identity of the canonical form.
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(&self.canonical()).unwrap_or_default()
    }

    /// Whether `id` is referenced anywhere inside this schema.
    pub fn references(&self, id: &str) -> bool {
        let mut found = false;
        self.visit(&mut |schema| {
            if schema.reference.as_deref() == Some(id) {
                found = true;
            }
        });
        found
    }

    /// Every id this schema points at, discriminator mapping targets included.
    pub fn ref_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        self.visit(&mut |schema| {
            if let Some(reference) = &schema.reference {
                ids.push(reference.clone());
            }
            if let Some(mapping) = schema.discriminator.as_ref().and_then(|d| d.mapping.as_ref()) {
                ids.extend(mapping.values().cloned());
            }
        });
        ids
    }

    /// Rewrite every `$ref` (and discriminator mapping target) in place.
    pub fn map_refs(&mut self, f: &dyn Fn(&str) -> String) {
        if let Some(reference) = self.reference.as_mut() {
            *reference = f(reference);
        }
        if let Some(mapping) = self
            .discriminator
            .as_mut()
            .and_then(|d| d.mapping.as_mut())
        {
            for target in mapping.values_mut() {
                *target = f(target);
            }
        }
        self.for_each_child_mut(&mut |child| child.map_refs(f));
    }

    fn visit(&self, f: &mut dyn FnMut(&Schema)) {
        f(self);
        if let Some(properties) = &self.properties {
            for property in properties.values() {
                property.visit(f);
            }
        }
        if let Some(AdditionalProperties::Schema(inner)) = &self.additional_properties {
            inner.visit(f);
        }
        if let Some(items) = &self.items {
            items.visit(f);
        }
        for list in [&self.prefix_items, &self.one_of, &self.all_of].into_iter().flatten() {
            for entry in list {
                entry.visit(f);
            }
        }
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Schema)) {
        if let Some(properties) = self.properties.as_mut() {
            for property in properties.values_mut() {
                f(property);
            }
        }
        if let Some(AdditionalProperties::Schema(inner)) = self.additional_properties.as_mut() {
            f(inner);
        }
        if let Some(items) = self.items.as_mut() {
            f(items);
        }
        for list in [
            self.prefix_items.as_mut(),
            self.one_of.as_mut(),
            self.all_of.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            for entry in list.iter_mut() {
                f(entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(entries: &[(&str, Schema)]) -> IndexMap<String, Schema> {
        entries
            .iter()
            .map(|(name, schema)| (name.to_string(), schema.clone()))
            .collect()
    }

    #[test]
    fn test_fingerprint_ignores_property_and_required_order() {
        let a = Schema::object(
            props(&[("id", Schema::typed("integer")), ("name", Schema::typed("string"))]),
            vec!["id".into(), "name".into()],
            false,
        );
        let b = Schema::object(
            props(&[("name", Schema::typed("string")), ("id", Schema::typed("integer"))]),
            vec!["name".into(), "id".into()],
            false,
        );
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_sees_required_difference() {
        let a = Schema::object(props(&[("id", Schema::typed("integer"))]), vec!["id".into()], false);
        let b = Schema::object(props(&[("id", Schema::typed("integer"))]), vec![], false);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_serialized_shape() {
        let schema = Schema::object(
            props(&[("name", Schema::typed("string"))]),
            vec!["name".into()],
            true,
        );
        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({
                "type": "object",
                "properties": { "name": { "type": "string" } },
                "required": ["name"],
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn test_ref_id_only_for_bare_refs() {
        assert_eq!(Schema::reference("User").ref_id(), Some("User"));
        let mut decorated = Schema::reference("User");
        decorated.nullable = Some(true);
        assert_eq!(decorated.ref_id(), None);
        assert_eq!(Schema::typed("string").ref_id(), None);

        let wrapper = Schema {
            one_of: Some(vec![Schema::reference("User")]),
            nullable: Some(true),
            ..Default::default()
        };
        assert_eq!(wrapper.unwrap_nullable(), Some(&Schema::reference("User")));
        assert_eq!(decorated.unwrap_nullable(), None);
    }

    #[test]
    fn test_references_and_map_refs() {
        let mut schema = Schema::object(
            props(&[("next", Schema::reference("Node")), ("tags", Schema::array(Schema::reference("Tag")))]),
            vec![],
            false,
        );
        assert!(schema.references("Node"));
        assert!(schema.references("Tag"));
        assert!(!schema.references("User"));
        assert_eq!(schema.ref_ids(), vec!["Node", "Tag"]);

        schema.map_refs(&|id| format!("#/components/schemas/{}", id));
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["properties"]["next"]["$ref"], "#/components/schemas/Node");
        assert_eq!(value["properties"]["tags"]["items"]["$ref"], "#/components/schemas/Tag");
    }
}
