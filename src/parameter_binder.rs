//! Decides where each handler parameter is read from.
//!
//! Precedence is provider alias, then explicit source marker, then
//! positional heuristics. Every binding also contributes to the route's
//! `params`, `querystring`, `headers` or `body` schema.

use crate::error::{Error, Result, SourceLocation};
use crate::extractor::{HandlerParam, HttpVerb, RawTarget, RouteSchema, SourceMarker};
use crate::provider_registry::ProviderRegistry;
use crate::schema::Schema;
use crate::schema_resolver::{SchemaResolver, Shape};
use crate::type_node::TypeNode;
use indexmap::IndexMap;
use log::debug;
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterSource {
    Body,
    Query,
    Param,
    Header,
    Provider,
    Raw,
}

/// Request field a parameter value is taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Body,
    /// The whole query string object.
    Query,
    QueryField(String),
    /// The whole path parameter object.
    Params,
    PathParam(String),
    /// Every header at once.
    Headers,
    Header(String),
    Provider(String),
    Request,
    Reply,
    Socket,
}

impl fmt::Display for Extraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extraction::Body => write!(f, "body"),
            Extraction::Query => write!(f, "query"),
            Extraction::QueryField(name) => write!(f, "query.{}", name),
            Extraction::Params => write!(f, "params"),
            Extraction::PathParam(name) => write!(f, "params.{}", name),
            Extraction::Headers => write!(f, "headers"),
            Extraction::Header(name) => write!(f, "headers.{}", name),
            Extraction::Provider(alias) => write!(f, "provider:{}", alias),
            Extraction::Request => write!(f, "request"),
            Extraction::Reply => write!(f, "reply"),
            Extraction::Socket => write!(f, "socket"),
        }
    }
}

impl Serialize for Extraction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Request field plus the schema that governs it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionRule {
    pub field: Extraction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// Provider step a parameter is produced by.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderBinding {
    pub alias: String,
    pub target: String,
    pub may_abort: bool,
    pub dependencies: Vec<ParameterDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
    pub source: ParameterSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub type_node: TypeNode,
    pub extraction: ExtractionRule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderBinding>,
}

/// Result of binding every parameter of one handler.
#[derive(Debug)]
pub struct BoundParameters {
    pub parameters: Vec<ParameterDescriptor>,
    pub schema: RouteSchemaBuilder,
    pub short_circuits: bool,
}

/// Properties collected for one request location.
#[derive(Debug, Default)]
struct ObjectAccumulator {
    properties: IndexMap<String, Schema>,
    required: Vec<String>,
}

impl ObjectAccumulator {
    fn insert(
        &mut self,
        label: &str,
        name: &str,
        schema: Schema,
        required: bool,
        location: &SourceLocation,
    ) -> Result<()> {
        if self.properties.contains_key(name) {
            return Err(Error::route(
                location,
                format!("duplicate {} parameter `{}`", label, name),
            ));
        }
        if required {
            self.required.push(name.to_string());
        }
        self.properties.insert(name.to_string(), schema);
        Ok(())
    }

    fn merge(
        &mut self,
        label: &str,
        object: &Schema,
        rename: fn(&str) -> String,
        location: &SourceLocation,
    ) -> Result<()> {
        let required = object.required.clone().unwrap_or_default();
        for (name, schema) in object.properties.iter().flatten() {
            let is_required = required.contains(name);
            self.insert(label, &rename(name), schema.clone(), is_required, location)?;
        }
        Ok(())
    }

    fn into_schema(self, closed: bool) -> Option<Schema> {
        if self.properties.is_empty() {
            None
        } else {
            Some(Schema::object(self.properties, self.required, closed))
        }
    }
}

/// Accumulates the request schemas of one route.
#[derive(Debug, Default)]
pub struct RouteSchemaBuilder {
    params: ObjectAccumulator,
    query: ObjectAccumulator,
    headers: ObjectAccumulator,
    body: Option<Schema>,
}

impl RouteSchemaBuilder {
    /// Names of every path parameter bound so far.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.properties.keys().map(String::as_str)
    }

    fn set_body(&mut self, schema: Schema, location: &SourceLocation) -> Result<()> {
        if self.body.is_some() {
            return Err(Error::route(location, "a route accepts at most one body"));
        }
        self.body = Some(schema);
        Ok(())
    }

    pub fn finish(self, response: Schema) -> RouteSchema {
        RouteSchema {
            params: self.params.into_schema(true),
            querystring: self.query.into_schema(true),
            body: self.body,
            headers: self.headers.into_schema(false),
            response,
        }
    }
}

/// Header field name as it appears on the wire.
pub fn header_name(name: &str) -> String {
    name.to_lowercase().replace('_', "-")
}

fn keep_name(name: &str) -> String {
    name.to_string()
}

struct BindState {
    schema: RouteSchemaBuilder,
    positional_structured: Option<String>,
    /// Provider aliases currently being bound, outermost first.
    chain: Vec<String>,
    short_circuits: bool,
}

/// Binds handler parameters to request sources.
pub struct ParameterBinder<'p> {
    providers: &'p ProviderRegistry,
}

impl<'p> ParameterBinder<'p> {
    pub fn new(providers: &'p ProviderRegistry) -> Self {
        Self { providers }
    }

    pub fn bind(
        &self,
        params: &[HandlerParam],
        verb: HttpVerb,
        path_tokens: &[String],
        resolver: &mut SchemaResolver<'_>,
    ) -> Result<BoundParameters> {
        let mut state = BindState {
            schema: RouteSchemaBuilder::default(),
            positional_structured: None,
            chain: Vec::new(),
            short_circuits: false,
        };

        let mut parameters = Vec::with_capacity(params.len());
        for param in params {
            parameters.push(self.bind_one(param, verb, path_tokens, resolver, &mut state)?);
        }

        Ok(BoundParameters {
            parameters,
            schema: state.schema,
            short_circuits: state.short_circuits,
        })
    }

    fn bind_one(
        &self,
        param: &HandlerParam,
        verb: HttpVerb,
        path_tokens: &[String],
        resolver: &mut SchemaResolver<'_>,
        state: &mut BindState,
    ) -> Result<ParameterDescriptor> {
        if let Some(provider) = self.providers.get(&param.name) {
            if state.chain.contains(&provider.alias) {
                let mut cycle = state.chain.join(" -> ");
                cycle.push_str(" -> ");
                cycle.push_str(&provider.alias);
                return Err(Error::route(
                    &param.location,
                    format!("provider cycle: {}", cycle),
                ));
            }
            if let Some(output) = &provider.output {
                if output != &param.node {
                    return Err(Error::route(
                        &param.location,
                        format!(
                            "provider `{}` produces `{}` but parameter `{}` is declared as `{}`",
                            provider.alias,
                            output.display_name(),
                            param.name,
                            param.node.display_name()
                        ),
                    ));
                }
            }

            debug!("Binding {} to provider {}", param.name, provider.alias);
            state.chain.push(provider.alias.clone());
            let mut dependencies = Vec::with_capacity(provider.parameters.len());
            for dependency in &provider.parameters {
                match self.bind_one(dependency, verb, path_tokens, resolver, state) {
                    Ok(descriptor) => dependencies.push(descriptor),
                    Err(err) => {
                        state.chain.pop();
                        return Err(err);
                    }
                }
            }
            state.chain.pop();
            state.short_circuits |= provider.may_abort;

            return Ok(ParameterDescriptor {
                source: ParameterSource::Provider,
                name: Some(param.name.clone()),
                type_node: param.node.clone(),
                extraction: ExtractionRule {
                    field: Extraction::Provider(provider.alias.clone()),
                    schema: None,
                },
                provider: Some(ProviderBinding {
                    alias: provider.alias.clone(),
                    target: provider.target.clone(),
                    may_abort: provider.may_abort,
                    dependencies,
                }),
            });
        }

        if let Some(marker) = &param.marker {
            return self.bind_marked(param, marker, verb, resolver, state);
        }

        self.bind_positional(param, verb, path_tokens, resolver, state)
    }

    fn bind_marked(
        &self,
        param: &HandlerParam,
        marker: &SourceMarker,
        verb: HttpVerb,
        resolver: &mut SchemaResolver<'_>,
        state: &mut BindState,
    ) -> Result<ParameterDescriptor> {
        let location = &param.location;

        if let SourceMarker::Raw(target) = marker {
            return bind_raw(param, *target, verb);
        }

        let structured = resolver.shape_of(&param.node, &location.unit) == Shape::Structured;
        let schema = resolver.resolve(&param.node, location)?;

        match marker {
            SourceMarker::Path if structured => {
                let object = object_of(resolver, &schema, "path", param)?;
                state.schema.params.merge("path", &object, keep_name, location)?;
                Ok(descriptor(param, ParameterSource::Param, Extraction::Params, Some(schema)))
            }
            SourceMarker::Path => {
                state
                    .schema
                    .params
                    .insert("path", &param.name, schema.clone(), true, location)?;
                let field = Extraction::PathParam(param.name.clone());
                Ok(descriptor(param, ParameterSource::Param, field, Some(schema)))
            }
            SourceMarker::Query if structured => self.bind_query_object(param, schema, resolver, state),
            SourceMarker::Query => self.bind_query_field(param, schema, state),
            SourceMarker::Header if structured => {
                let object = object_of(resolver, &schema, "header", param)?;
                state.schema.headers.merge("header", &object, header_name, location)?;
                Ok(descriptor(param, ParameterSource::Header, Extraction::Headers, Some(schema)))
            }
            SourceMarker::Header => {
                let name = header_name(&param.name);
                let required = schema.nullable != Some(true);
                state
                    .schema
                    .headers
                    .insert("header", &name, schema.clone(), required, location)?;
                Ok(descriptor(param, ParameterSource::Header, Extraction::Header(name), Some(schema)))
            }
            SourceMarker::Body => {
                state.schema.set_body(schema.clone(), location)?;
                Ok(descriptor(param, ParameterSource::Body, Extraction::Body, Some(schema)))
            }
            SourceMarker::Raw(target) => bind_raw(param, *target, verb),
        }
    }

    fn bind_positional(
        &self,
        param: &HandlerParam,
        verb: HttpVerb,
        path_tokens: &[String],
        resolver: &mut SchemaResolver<'_>,
        state: &mut BindState,
    ) -> Result<ParameterDescriptor> {
        let location = &param.location;
        let shape = resolver.shape_of(&param.node, &location.unit);
        let schema = resolver.resolve(&param.node, location)?;

        match shape {
            Shape::Scalar if path_tokens.iter().any(|token| token == &param.name) => {
                debug!("Binding {} to path parameter", param.name);
                state
                    .schema
                    .params
                    .insert("path", &param.name, schema.clone(), true, location)?;
                let field = Extraction::PathParam(param.name.clone());
                Ok(descriptor(param, ParameterSource::Param, field, Some(schema)))
            }
            Shape::Scalar => self.bind_query_field(param, schema, state),
            Shape::Structured => {
                if let Some(first) = &state.positional_structured {
                    return Err(Error::route(
                        location,
                        format!(
                            "cannot tell where `{}` comes from: `{}` already took the positional \
                             body/query slot; mark it with a wrapper type or doc tag",
                            param.name, first
                        ),
                    ));
                }
                state.positional_structured = Some(param.name.clone());

                if verb.has_body() {
                    debug!("Binding {} to request body", param.name);
                    state.schema.set_body(schema.clone(), location)?;
                    Ok(descriptor(param, ParameterSource::Body, Extraction::Body, Some(schema)))
                } else {
                    debug!("Binding {} to query object", param.name);
                    self.bind_query_object(param, schema, resolver, state)
                }
            }
        }
    }

    fn bind_query_object(
        &self,
        param: &HandlerParam,
        schema: Schema,
        resolver: &SchemaResolver<'_>,
        state: &mut BindState,
    ) -> Result<ParameterDescriptor> {
        let object = object_of(resolver, &schema, "query", param)?;
        state
            .schema
            .query
            .merge("query", &object, keep_name, &param.location)?;
        Ok(descriptor(param, ParameterSource::Query, Extraction::Query, Some(schema)))
    }

    fn bind_query_field(
        &self,
        param: &HandlerParam,
        schema: Schema,
        state: &mut BindState,
    ) -> Result<ParameterDescriptor> {
        let required = schema.nullable != Some(true);
        state
            .schema
            .query
            .insert("query", &param.name, schema.clone(), required, &param.location)?;
        let field = Extraction::QueryField(param.name.clone());
        Ok(descriptor(param, ParameterSource::Query, field, Some(schema)))
    }
}

fn bind_raw(param: &HandlerParam, target: RawTarget, verb: HttpVerb) -> Result<ParameterDescriptor> {
    if target == RawTarget::Socket && verb != HttpVerb::Ws {
        return Err(Error::route(
            &param.location,
            format!(
                "socket parameter `{}` is only valid on websocket handlers",
                param.name
            ),
        ));
    }
    let field = match target {
        RawTarget::Request => Extraction::Request,
        RawTarget::Reply => Extraction::Reply,
        RawTarget::Socket => Extraction::Socket,
    };
    Ok(descriptor(param, ParameterSource::Raw, field, None))
}

fn descriptor(
    param: &HandlerParam,
    source: ParameterSource,
    field: Extraction,
    schema: Option<Schema>,
) -> ParameterDescriptor {
    ParameterDescriptor {
        source,
        name: Some(param.name.clone()),
        type_node: param.node.clone(),
        extraction: ExtractionRule { field, schema },
        provider: None,
    }
}

/// The object schema a structured parameter expands into.
///
/// A nullable parameter contributes its properties as optional.
fn object_of(
    resolver: &SchemaResolver<'_>,
    schema: &Schema,
    label: &str,
    param: &HandlerParam,
) -> Result<Schema> {
    let (target, optional) = match schema.unwrap_nullable() {
        Some(inner) => (inner, true),
        None => (schema, schema.nullable == Some(true)),
    };
    let mut object = resolver.object_view(target).cloned().ok_or_else(|| {
        Error::route(
            &param.location,
            format!(
                "{} parameter `{}` must be an object type, found `{}`",
                label,
                param.name,
                param.node.display_name()
            ),
        )
    })?;
    if optional {
        object.required = None;
    }
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider_registry::ProviderDefinition;
    use crate::type_node::{Declaration, Member, ObjectType, PrimitiveKind, TypeCatalog};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn here() -> SourceLocation {
        SourceLocation::new("src/routes/users/[id].rs", 3, 0)
    }

    fn param(name: &str, node: TypeNode) -> HandlerParam {
        HandlerParam::new(name, node, here())
    }

    fn tokens(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn catalog() -> TypeCatalog {
        let mut catalog = TypeCatalog::new();
        catalog.add(Declaration::new(
            "Filter",
            TypeNode::Object(
                ObjectType::new()
                    .with("page", Member::required(TypeNode::Primitive(PrimitiveKind::U32)))
                    .with("search", Member::optional(TypeNode::string())),
            ),
            SourceLocation::new("src/models.rs", 1, 0),
        ));
        catalog.add(Declaration::new(
            "NewUser",
            TypeNode::Object(ObjectType::new().with("name", Member::required(TypeNode::string()))),
            SourceLocation::new("src/models.rs", 8, 0),
        ));
        catalog
    }

    #[test]
    fn test_scalar_matching_path_token_is_param() {
        let catalog = catalog();
        let mut resolver = SchemaResolver::new(&catalog);
        let providers = ProviderRegistry::new();
        let binder = ParameterBinder::new(&providers);

        let bound = binder
            .bind(
                &[param("id", TypeNode::string()), param("verbose", TypeNode::Primitive(PrimitiveKind::Bool))],
                HttpVerb::Get,
                &tokens(&["id"]),
                &mut resolver,
            )
            .unwrap();

        assert_eq!(bound.parameters[0].source, ParameterSource::Param);
        assert_eq!(bound.parameters[0].extraction.field.to_string(), "params.id");
        assert_eq!(bound.parameters[1].source, ParameterSource::Query);
        assert_eq!(bound.parameters[1].extraction.field.to_string(), "query.verbose");

        let schema = bound.schema.finish(Schema::typed("null"));
        assert_eq!(
            serde_json::to_value(schema.params.unwrap()).unwrap(),
            json!({
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "required": ["id"],
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn test_structured_parameter_follows_verb() {
        let catalog = catalog();
        let providers = ProviderRegistry::new();
        let binder = ParameterBinder::new(&providers);

        let mut resolver = SchemaResolver::new(&catalog);
        let post = binder
            .bind(&[param("user", TypeNode::reference("NewUser"))], HttpVerb::Post, &[], &mut resolver)
            .unwrap();
        assert_eq!(post.parameters[0].source, ParameterSource::Body);
        let schema = post.schema.finish(Schema::typed("null"));
        assert_eq!(schema.body, Some(Schema::reference("NewUser")));

        let mut resolver = SchemaResolver::new(&catalog);
        let get = binder
            .bind(&[param("filter", TypeNode::reference("Filter"))], HttpVerb::Get, &[], &mut resolver)
            .unwrap();
        assert_eq!(get.parameters[0].source, ParameterSource::Query);
        let schema = get.schema.finish(Schema::typed("null"));
        assert_eq!(
            serde_json::to_value(schema.querystring.unwrap()).unwrap(),
            json!({
                "type": "object",
                "properties": {
                    "page": {"type": "integer", "format": "int32"},
                    "search": {"type": "string"}
                },
                "required": ["page"],
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn test_second_positional_structured_parameter_is_rejected() {
        let catalog = catalog();
        let mut resolver = SchemaResolver::new(&catalog);
        let providers = ProviderRegistry::new();
        let binder = ParameterBinder::new(&providers);

        let err = binder
            .bind(
                &[
                    param("user", TypeNode::reference("NewUser")),
                    param("filter", TypeNode::reference("Filter")),
                ],
                HttpVerb::Post,
                &[],
                &mut resolver,
            )
            .unwrap_err();
        assert!(matches!(err, Error::RouteValidation { .. }));
        assert!(err.to_string().contains("filter"));
    }

    #[test]
    fn test_markers_override_heuristics() {
        let catalog = catalog();
        let mut resolver = SchemaResolver::new(&catalog);
        let providers = ProviderRegistry::new();
        let binder = ParameterBinder::new(&providers);

        let bound = binder
            .bind(
                &[
                    param("filter", TypeNode::reference("Filter")).with_marker(SourceMarker::Query),
                    param("user", TypeNode::reference("NewUser")).with_marker(SourceMarker::Body),
                    param("X_Request_Id", TypeNode::string()).with_marker(SourceMarker::Header),
                ],
                HttpVerb::Put,
                &[],
                &mut resolver,
            )
            .unwrap();

        let sources: Vec<ParameterSource> = bound.parameters.iter().map(|p| p.source).collect();
        assert_eq!(
            sources,
            vec![ParameterSource::Query, ParameterSource::Body, ParameterSource::Header]
        );
        assert_eq!(bound.parameters[2].extraction.field.to_string(), "headers.x-request-id");

        let schema = bound.schema.finish(Schema::typed("null"));
        let headers = serde_json::to_value(schema.headers.unwrap()).unwrap();
        assert_eq!(headers["properties"]["x-request-id"], json!({"type": "string"}));
        assert!(headers.get("additionalProperties").is_none());
    }

    #[test]
    fn test_two_bodies_are_rejected() {
        let catalog = catalog();
        let mut resolver = SchemaResolver::new(&catalog);
        let providers = ProviderRegistry::new();
        let binder = ParameterBinder::new(&providers);

        let err = binder
            .bind(
                &[
                    param("a", TypeNode::reference("NewUser")).with_marker(SourceMarker::Body),
                    param("b", TypeNode::string()).with_marker(SourceMarker::Body),
                ],
                HttpVerb::Post,
                &[],
                &mut resolver,
            )
            .unwrap_err();
        assert!(err.to_string().contains("at most one body"));
    }

    #[test]
    fn test_socket_outside_websocket_handler() {
        let catalog = TypeCatalog::new();
        let mut resolver = SchemaResolver::new(&catalog);
        let providers = ProviderRegistry::new();
        let binder = ParameterBinder::new(&providers);
        let socket = param("socket", TypeNode::any()).with_marker(SourceMarker::Raw(RawTarget::Socket));

        let err = binder
            .bind(std::slice::from_ref(&socket), HttpVerb::Get, &[], &mut resolver)
            .unwrap_err();
        assert!(err.to_string().contains("only valid on websocket handlers"));

        let bound = binder.bind(&[socket], HttpVerb::Ws, &[], &mut resolver).unwrap();
        assert_eq!(bound.parameters[0].source, ParameterSource::Raw);
        assert_eq!(bound.parameters[0].extraction.field, Extraction::Socket);
    }

    #[test]
    fn test_provider_chain_binds_dependencies() {
        let catalog = TypeCatalog::new();
        let mut resolver = SchemaResolver::new(&catalog);
        let mut providers = ProviderRegistry::new();
        providers.register(
            ProviderDefinition::new("session", "src/providers/session.rs::provide", here())
                .with_parameters(vec![param("token", TypeNode::string()).with_marker(SourceMarker::Header)])
                .with_output(TypeNode::reference("Session"))
                .aborting(),
        );
        providers.register(
            ProviderDefinition::new("user", "src/providers/user.rs::provide", here())
                .with_parameters(vec![param("session", TypeNode::reference("Session"))]),
        );
        let binder = ParameterBinder::new(&providers);

        let bound = binder
            .bind(&[param("user", TypeNode::reference("User"))], HttpVerb::Get, &[], &mut resolver)
            .unwrap();

        assert!(bound.short_circuits);
        let user = bound.parameters[0].provider.as_ref().unwrap();
        assert!(!user.may_abort);
        let session = user.dependencies[0].provider.as_ref().unwrap();
        assert!(session.may_abort);
        assert_eq!(session.dependencies[0].extraction.field.to_string(), "headers.token");
    }

    #[test]
    fn test_provider_cycle() {
        let catalog = TypeCatalog::new();
        let mut resolver = SchemaResolver::new(&catalog);
        let mut providers = ProviderRegistry::new();
        providers.register(
            ProviderDefinition::new("a", "a.rs::provide", here())
                .with_parameters(vec![param("b", TypeNode::any())]),
        );
        providers.register(
            ProviderDefinition::new("b", "b.rs::provide", here())
                .with_parameters(vec![param("a", TypeNode::any())]),
        );
        let binder = ParameterBinder::new(&providers);

        let err = binder
            .bind(&[param("a", TypeNode::any())], HttpVerb::Get, &[], &mut resolver)
            .unwrap_err();
        assert!(err.to_string().contains("provider cycle: a -> b -> a"));
    }

    #[test]
    fn test_provider_output_must_match_parameter_type() {
        let catalog = TypeCatalog::new();
        let mut resolver = SchemaResolver::new(&catalog);
        let mut providers = ProviderRegistry::new();
        providers.register(
            ProviderDefinition::new("db", "db.rs::provide", here()).with_output(TypeNode::reference("Pool")),
        );
        let binder = ParameterBinder::new(&providers);

        let err = binder
            .bind(&[param("db", TypeNode::reference("Connection"))], HttpVerb::Get, &[], &mut resolver)
            .unwrap_err();
        assert!(err.to_string().contains("produces `Pool`"));
    }

    #[test]
    fn test_nullable_scalar_query_is_optional() {
        let catalog = TypeCatalog::new();
        let mut resolver = SchemaResolver::new(&catalog);
        let providers = ProviderRegistry::new();
        let binder = ParameterBinder::new(&providers);

        let bound = binder
            .bind(
                &[param("cursor", TypeNode::nullable(TypeNode::string()))],
                HttpVerb::Get,
                &[],
                &mut resolver,
            )
            .unwrap();
        let schema = bound.schema.finish(Schema::typed("null"));
        assert!(schema.querystring.unwrap().required.is_none());
    }

    #[test]
    fn test_optional_object_parameter_spreads_optional_fields() {
        let catalog = catalog();
        let providers = ProviderRegistry::new();
        let binder = ParameterBinder::new(&providers);

        let mut resolver = SchemaResolver::new(&catalog);
        let bound = binder
            .bind(
                &[param("filter", TypeNode::nullable(TypeNode::reference("Filter")))],
                HttpVerb::Get,
                &[],
                &mut resolver,
            )
            .unwrap();
        assert_eq!(bound.parameters[0].source, ParameterSource::Query);
        let schema = bound.schema.finish(Schema::typed("null"));
        assert_eq!(
            serde_json::to_value(schema.querystring.unwrap()).unwrap(),
            json!({
                "type": "object",
                "properties": {
                    "page": {"type": "integer", "format": "int32"},
                    "search": {"type": "string"}
                },
                "additionalProperties": false
            })
        );

        let mut resolver = SchemaResolver::new(&catalog);
        let bound = binder
            .bind(
                &[param("meta", TypeNode::nullable(TypeNode::reference("NewUser")))
                    .with_marker(SourceMarker::Header)],
                HttpVerb::Get,
                &[],
                &mut resolver,
            )
            .unwrap();
        assert_eq!(bound.parameters[0].source, ParameterSource::Header);
        let schema = bound.schema.finish(Schema::typed("null"));
        let headers = serde_json::to_value(schema.headers.unwrap()).unwrap();
        assert_eq!(headers["properties"]["name"], json!({"type": "string"}));
        assert!(headers.get("required").is_none());
    }
}
