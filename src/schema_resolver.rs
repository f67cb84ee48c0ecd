//! Converts [`TypeNode`]s into schemas, registering named declarations.
//!
//! Named declarations and generic instantiations are registered once per
//! run and referenced with `$ref`. The id is reserved *before* the body is
//! resolved, so a member pointing back at the declaration being resolved gets
//! a `$ref` to the placeholder instead of recursing forever.

use crate::error::{Error, Result, SourceLocation};
use crate::schema::{AdditionalProperties, Discriminator, Schema};
use crate::schema_registry::SchemaRegistry;
use crate::type_node::{DeclId, Literal, ObjectType, PrimitiveKind, TypeCatalog, TypeNode};
use heck::ToUpperCamelCase;
use indexmap::IndexMap;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// How deep generic instantiations may nest before resolution gives up.
pub const MAX_GENERIC_DEPTH: usize = 32;

/// Coarse shape of a type, used for positional parameter binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Structured,
}

/// Structural identity of a named type: the declaration plus the canonical
/// fingerprints of its type arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IdentityKey {
    decl: DeclId,
    args: Vec<String>,
}

/// Schema resolver - turns type nodes into schemas backed by a registry
pub struct SchemaResolver<'a> {
    catalog: &'a TypeCatalog,
    registry: SchemaRegistry,
    /// Identity -> registry id, including reserved placeholders.
    identities: HashMap<IdentityKey, String>,
    /// Type parameter bindings of the declaration bodies being resolved.
    scopes: Vec<HashMap<String, Schema>>,
    generic_depth: usize,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(catalog: &'a TypeCatalog) -> Self {
        debug!("Initializing SchemaResolver over {} declarations", catalog.declarations().len());
        Self {
            catalog,
            registry: SchemaRegistry::new(),
            identities: HashMap::new(),
            scopes: Vec::new(),
            generic_depth: 0,
        }
    }

    pub fn catalog(&self) -> &'a TypeCatalog {
        self.catalog
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> SchemaRegistry {
        self.registry
    }

    /// Resolve `node`, written at `origin`, into an inline schema or a `$ref`.
    pub fn resolve(&mut self, node: &TypeNode, origin: &SourceLocation) -> Result<Schema> {
        match node {
            TypeNode::Primitive(kind) => Ok(primitive_to_schema(kind)),
            TypeNode::Object(object) => self.resolve_object(object, origin),
            TypeNode::Map(value) => {
                let value = self.resolve(value, origin)?;
                Ok(Schema {
                    schema_type: Some("object".to_string()),
                    additional_properties: Some(AdditionalProperties::Schema(Box::new(value))),
                    ..Default::default()
                })
            }
            TypeNode::Array(element) => Ok(Schema::array(self.resolve(element, origin)?)),
            TypeNode::Tuple(elements) => {
                let mut prefix_items = Vec::with_capacity(elements.len());
                for element in elements {
                    prefix_items.push(self.resolve(element, origin)?);
                }
                Ok(Schema {
                    schema_type: Some("array".to_string()),
                    min_items: Some(prefix_items.len()),
                    max_items: Some(prefix_items.len()),
                    prefix_items: Some(prefix_items),
                    ..Default::default()
                })
            }
            TypeNode::Union(variants) => self.resolve_union(variants, origin),
            TypeNode::Intersection(members) => self.resolve_intersection(members, origin),
            TypeNode::Enum(literals) => Ok(enum_schema(literals)),
            TypeNode::Literal(literal) => Ok(enum_schema(std::slice::from_ref(literal))),
            TypeNode::Reference(name) => self.resolve_named(name, &[], origin),
            TypeNode::Generic { base, args } => self.resolve_named(base, args, origin),
            TypeNode::TypeParameter(name) => {
                self.bound(name).ok_or_else(|| Error::UnboundTypeParameter {
                    location: origin.clone(),
                    name: name.clone(),
                })
            }
            TypeNode::Callable => Err(Error::unsupported(
                origin,
                "function types cannot be represented as data",
            )),
        }
    }

    /// Whether `node` is object-like (or a collection) rather than a scalar.
    pub fn shape_of(&self, node: &TypeNode, unit: &Path) -> Shape {
        let mut visiting = HashSet::new();
        if self.is_structured(node, unit, &mut visiting) {
            Shape::Structured
        } else {
            Shape::Scalar
        }
    }

    fn is_structured(&self, node: &TypeNode, unit: &Path, visiting: &mut HashSet<DeclId>) -> bool {
        match node {
            TypeNode::Object(_)
            | TypeNode::Map(_)
            | TypeNode::Array(_)
            | TypeNode::Tuple(_)
            | TypeNode::Intersection(_) => true,
            TypeNode::Union(variants) => variants
                .iter()
                .any(|variant| self.is_structured(variant, unit, visiting)),
            TypeNode::Reference(name) | TypeNode::Generic { base: name, .. } => {
                let Some(id) = self.catalog.lookup(name, unit) else {
                    return false;
                };
                if !visiting.insert(id) {
                    return true;
                }
                let declaration = self.catalog.get(id);
                self.is_structured(&declaration.body, &declaration.location.unit, visiting)
            }
            TypeNode::Primitive(_)
            | TypeNode::Enum(_)
            | TypeNode::Literal(_)
            | TypeNode::TypeParameter(_)
            | TypeNode::Callable => false,
        }
    }

    /// The object schema behind `schema`, following one `$ref` into the
    /// registry. `None` when it is not an object or still being resolved.
    pub fn object_view<'s>(&'s self, schema: &'s Schema) -> Option<&'s Schema> {
        let target = match schema.ref_id() {
            Some(id) => self.registry.get(id)?,
            None => schema,
        };
        if target.is_object() {
            Some(target)
        } else {
            None
        }
    }

    fn bound(&self, name: &str) -> Option<Schema> {
        self.scopes.last().and_then(|scope| scope.get(name)).cloned()
    }

    fn resolve_object(&mut self, object: &ObjectType, origin: &SourceLocation) -> Result<Schema> {
        let mut properties = IndexMap::new();
        let mut required = Vec::new();

        for (name, member) in &object.properties {
            let schema = self.resolve(&member.node, origin)?;
            if member.required {
                required.push(name.clone());
            }
            properties.insert(name.clone(), schema);
        }

        Ok(Schema::object(properties, required, object.closed))
    }

    fn resolve_named(
        &mut self,
        name: &str,
        args: &[TypeNode],
        origin: &SourceLocation,
    ) -> Result<Schema> {
        if args.is_empty() {
            if let Some(bound) = self.bound(name) {
                return Ok(bound);
            }
        }

        let catalog = self.catalog;
        let decl_id = catalog
            .lookup(name, &origin.unit)
            .ok_or_else(|| Error::UnresolvedReference {
                location: origin.clone(),
                name: name.to_string(),
            })?;
        let declaration = catalog.get(decl_id);

        if declaration.type_params.len() != args.len() {
            if args.is_empty() {
                return Err(Error::UnboundTypeParameter {
                    location: origin.clone(),
                    name: declaration.type_params[0].clone(),
                });
            }
            return Err(Error::unsupported(
                origin,
                format!(
                    "`{}` expects {} type argument(s), found {}",
                    name,
                    declaration.type_params.len(),
                    args.len()
                ),
            ));
        }

        let mut arg_schemas = Vec::with_capacity(args.len());
        for arg in args {
            arg_schemas.push(self.resolve(arg, origin)?);
        }

        let key = IdentityKey {
            decl: decl_id,
            args: arg_schemas.iter().map(Schema::fingerprint).collect(),
        };
        if let Some(id) = self.identities.get(&key) {
            debug!("Type {} already registered as {}", name, id);
            return Ok(Schema::reference(id.clone()));
        }

        let is_generic = !args.is_empty();
        if is_generic && self.generic_depth >= MAX_GENERIC_DEPTH {
            return Err(Error::RecursionLimit {
                location: origin.clone(),
                base: name.to_string(),
                limit: MAX_GENERIC_DEPTH,
            });
        }

        let mut schema_name = declaration.schema_name().to_string();
        for arg in &arg_schemas {
            schema_name.push('_');
            schema_name.push_str(&schema_display_name(arg));
        }
        let explicit = declaration.external_id.is_some() && !is_generic;

        let id = self.registry.reserve(&schema_name, explicit);
        self.identities.insert(key.clone(), id.clone());
        debug!("Resolving declaration {} as {}", name, id);

        let scope: HashMap<String, Schema> = declaration
            .type_params
            .iter()
            .cloned()
            .zip(arg_schemas)
            .collect();
        self.scopes.push(scope);
        if is_generic {
            self.generic_depth += 1;
        }
        let body = self.resolve(&declaration.body, &declaration.location);
        if is_generic {
            self.generic_depth -= 1;
        }
        self.scopes.pop();

        let body = match body {
            Ok(body) => body,
            Err(err) => {
                self.identities.remove(&key);
                self.registry.release(&id);
                return Err(err);
            }
        };

        let final_id = self.registry.fill(&id, body, &declaration.location)?;
        if final_id != id {
            self.identities.insert(key, final_id.clone());
        }
        Ok(Schema::reference(final_id))
    }

    fn resolve_union(&mut self, variants: &[TypeNode], origin: &SourceLocation) -> Result<Schema> {
        let mut flat = Vec::new();
        flatten_union(variants, &mut flat);

        let nullable = flat.iter().any(|variant| variant.is_null_like());
        let rest: Vec<&TypeNode> = flat.into_iter().filter(|v| !v.is_null_like()).collect();

        let mut schema = if rest.is_empty() {
            return Ok(Schema::typed("null"));
        } else if let Some(literals) = same_kind_literals(&rest) {
            enum_schema(&literals)
        } else if let [single] = rest.as_slice() {
            self.resolve(single, origin)?
        } else {
            let mut alternatives: Vec<Schema> = Vec::with_capacity(rest.len());
            let mut seen = HashSet::new();
            for variant in rest {
                let schema = self.resolve(variant, origin)?;
                if seen.insert(schema.fingerprint()) {
                    alternatives.push(schema);
                }
            }
            if alternatives.len() == 1 {
                alternatives.remove(0)
            } else {
                let discriminator = self.discriminate(&alternatives);
                Schema {
                    one_of: Some(alternatives),
                    discriminator,
                    ..Default::default()
                }
            }
        };

        if nullable {
            schema = mark_nullable(schema);
        }
        Ok(schema)
    }

    /// Find a required property whose single literal value differs in every
    /// alternative.
    fn discriminate(&self, alternatives: &[Schema]) -> Option<Discriminator> {
        let objects: Vec<&Schema> = alternatives
            .iter()
            .map(|alternative| self.object_view(alternative))
            .collect::<Option<Vec<_>>>()?;
        let candidates = objects.first()?.properties.as_ref()?;

        'candidates: for property in candidates.keys() {
            let mut seen: Vec<&serde_json::Value> = Vec::new();
            let mut mapping = IndexMap::new();

            for (alternative, object) in alternatives.iter().zip(&objects) {
                let required = object
                    .required
                    .as_ref()
                    .is_some_and(|required| required.contains(property));
                let value = object
                    .properties
                    .as_ref()
                    .and_then(|properties| properties.get(property))
                    .and_then(Schema::single_literal);
                let (true, Some(value)) = (required, value) else {
                    continue 'candidates;
                };
                if seen.contains(&value) {
                    continue 'candidates;
                }
                seen.push(value);
                if let Some(id) = alternative.ref_id() {
                    mapping.insert(literal_key(value), id.to_string());
                }
            }

            debug!("Union discriminated by property {}", property);
            return Some(Discriminator {
                property_name: property.clone(),
                mapping: if mapping.len() == alternatives.len() {
                    Some(mapping)
                } else {
                    None
                },
            });
        }
        None
    }

    fn resolve_intersection(
        &mut self,
        members: &[TypeNode],
        origin: &SourceLocation,
    ) -> Result<Schema> {
        let mut parts = Vec::with_capacity(members.len());
        for member in members {
            parts.push(self.resolve(member, origin)?);
        }
        if let [single] = parts.as_slice() {
            return Ok(single.clone());
        }
        if let Some(merged) = self.merge_objects(&parts) {
            return Ok(merged);
        }
        Ok(Schema {
            all_of: Some(parts),
            ..Default::default()
        })
    }

    fn merge_objects(&self, parts: &[Schema]) -> Option<Schema> {
        let mut properties: IndexMap<String, Schema> = IndexMap::new();
        let mut required: Vec<String> = Vec::new();

        for part in parts {
            let object = self.object_view(part)?;
            if object.nullable == Some(true) {
                return None;
            }
            for (name, schema) in object.properties.as_ref()? {
                match properties.get(name) {
                    Some(existing) if existing != schema => return None,
                    Some(_) => {}
                    None => {
                        properties.insert(name.clone(), schema.clone());
                    }
                }
            }
            for name in object.required.iter().flatten() {
                if !required.contains(name) {
                    required.push(name.clone());
                }
            }
        }

        Some(Schema::object(properties, required, false))
    }
}

/// Convert a primitive kind to a schema
fn primitive_to_schema(kind: &PrimitiveKind) -> Schema {
    Schema {
        schema_type: kind.schema_type().map(str::to_string),
        format: kind.format().map(str::to_string),
        ..Default::default()
    }
}

fn enum_schema(literals: &[Literal]) -> Schema {
    let first_type = literals.first().map(Literal::schema_type);
    let homogeneous = literals.iter().all(|l| Some(l.schema_type()) == first_type);
    Schema {
        schema_type: if homogeneous {
            first_type.map(str::to_string)
        } else {
            None
        },
        enum_values: Some(literals.iter().map(Literal::to_json).collect()),
        ..Default::default()
    }
}

fn mark_nullable(mut schema: Schema) -> Schema {
    if schema.reference.is_some() {
        return Schema {
            one_of: Some(vec![schema]),
            nullable: Some(true),
            ..Default::default()
        };
    }
    schema.nullable = Some(true);
    schema
}

fn flatten_union<'n>(variants: &'n [TypeNode], out: &mut Vec<&'n TypeNode>) {
    for variant in variants {
        match variant {
            TypeNode::Union(inner) => flatten_union(inner, out),
            other => out.push(other),
        }
    }
}

/// Literal values when every variant is a literal (or literal enum) of one kind.
fn same_kind_literals(variants: &[&TypeNode]) -> Option<Vec<Literal>> {
    let mut literals = Vec::new();
    for variant in variants {
        match variant {
            TypeNode::Literal(literal) => literals.push(literal.clone()),
            TypeNode::Enum(values) => literals.extend(values.iter().cloned()),
            _ => return None,
        }
    }
    let first = literals.first()?.schema_type();
    if literals.iter().all(|l| l.schema_type() == first) {
        let mut unique: Vec<Literal> = Vec::with_capacity(literals.len());
        for literal in literals {
            if !unique.contains(&literal) {
                unique.push(literal);
            }
        }
        Some(unique)
    } else {
        None
    }
}

fn literal_key(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Name fragment for a type argument inside a generic instantiation id.
fn schema_display_name(schema: &Schema) -> String {
    if let Some(id) = schema.ref_id() {
        return id.to_string();
    }
    match schema.schema_type.as_deref() {
        Some("array") => match &schema.items {
            Some(items) => format!("Array_{}", schema_display_name(items)),
            None => "Array".to_string(),
        },
        Some(other) if !other.is_empty() => other.to_upper_camel_case(),
        _ => "Any".to_string(),
    }
}
