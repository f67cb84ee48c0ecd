//! Turns controller units into route descriptors.
//!
//! A controller unit is one source file under the routes directory. Its
//! exported functions named after an HTTP verb (`get`, `post`, `put`,
//! `delete`, `patch`) or `ws` are handlers; the URL comes from the file path
//! (see [`url::UrlRules`]) and every parameter is bound by the
//! [`ParameterBinder`].
//!
//! # Example
//!
//! ```no_run
//! use openapi_from_controllers::extractor::{ControllerUnit, HandlerDecl, RouteExtractor, UrlRules};
//! use openapi_from_controllers::provider_registry::ProviderRegistry;
//! use openapi_from_controllers::schema_resolver::SchemaResolver;
//! use openapi_from_controllers::type_node::TypeCatalog;
//! use openapi_from_controllers::error::SourceLocation;
//!
//! let rules = UrlRules::new(".", "(?:.*src)?/?(?:routes/?)").unwrap();
//! let providers = ProviderRegistry::new();
//! let catalog = TypeCatalog::new();
//! let mut resolver = SchemaResolver::new(&catalog);
//!
//! let unit = ControllerUnit::new(
//!     "src/routes/index.rs",
//!     vec![HandlerDecl::new("get", SourceLocation::new("src/routes/index.rs", 1, 0))],
//! );
//! let extracted = RouteExtractor::new(rules, &providers).extract(&unit, &mut resolver).unwrap();
//! println!("Found {} routes", extracted.routes.len());
//! ```

pub mod url;

pub use url::{path_tokens, UrlRules};

use crate::error::{Error, Result, SourceLocation};
use crate::parameter_binder::{ParameterBinder, ParameterDescriptor, ProviderBinding};
use crate::provider_registry::ProviderRegistry;
use crate::schema::Schema;
use crate::schema_resolver::SchemaResolver;
use crate::type_node::TypeNode;
use log::debug;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

/// Handler verbs recognized from export names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    /// Websocket upgrade, served over `GET`.
    Ws,
}

impl HttpVerb {
    /// Parse an export name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "get" => Some(HttpVerb::Get),
            "post" => Some(HttpVerb::Post),
            "put" => Some(HttpVerb::Put),
            "delete" => Some(HttpVerb::Delete),
            "patch" => Some(HttpVerb::Patch),
            "ws" => Some(HttpVerb::Ws),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "get",
            HttpVerb::Post => "post",
            HttpVerb::Put => "put",
            HttpVerb::Delete => "delete",
            HttpVerb::Patch => "patch",
            HttpVerb::Ws => "ws",
        }
    }

    /// HTTP method the route is served with.
    pub fn method(&self) -> &'static str {
        match self {
            HttpVerb::Get | HttpVerb::Ws => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Patch => "PATCH",
        }
    }

    /// Whether an unmarked structured parameter is read from the body.
    pub fn has_body(&self) -> bool {
        matches!(
            self,
            HttpVerb::Post | HttpVerb::Put | HttpVerb::Patch | HttpVerb::Delete
        )
    }

    pub fn kind(&self) -> RouteKind {
        match self {
            HttpVerb::Ws => RouteKind::Websocket,
            _ => RouteKind::Rest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Rest,
    Websocket,
}

/// Framework objects a parameter can receive untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTarget {
    Request,
    Reply,
    Socket,
}

/// Explicit request source recorded with a parameter declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMarker {
    Path,
    Query,
    Body,
    Header,
    Raw(RawTarget),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandlerParam {
    pub name: String,
    pub node: TypeNode,
    pub marker: Option<SourceMarker>,
    pub location: SourceLocation,
}

impl HandlerParam {
    pub fn new(name: impl Into<String>, node: TypeNode, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            node,
            marker: None,
            location,
        }
    }

    pub fn with_marker(mut self, marker: SourceMarker) -> Self {
        self.marker = Some(marker);
        self
    }
}

/// An exported function of a controller unit.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerDecl {
    pub export_name: String,
    pub params: Vec<HandlerParam>,
    pub response: TypeNode,
    /// Explicit operation id from an `@operationId` doc tag.
    pub operation_id: Option<String>,
    pub description: Option<String>,
    pub location: SourceLocation,
}

impl HandlerDecl {
    /// Handler with no parameters that returns nothing.
    pub fn new(export_name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            export_name: export_name.into(),
            params: Vec::new(),
            response: TypeNode::null(),
            operation_id: None,
            description: None,
            location,
        }
    }

    pub fn with_params(mut self, params: Vec<HandlerParam>) -> Self {
        self.params = params;
        self
    }

    pub fn with_response(mut self, response: TypeNode) -> Self {
        self.response = response;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerUnit {
    pub path: PathBuf,
    pub handlers: Vec<HandlerDecl>,
}

impl ControllerUnit {
    pub fn new(path: impl Into<PathBuf>, handlers: Vec<HandlerDecl>) -> Self {
        Self {
            path: path.into(),
            handlers,
        }
    }
}

/// Request and response schemas of one route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub querystring: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Schema>,
    pub response: Schema,
}

/// Complete information about a single endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDescriptor {
    pub kind: RouteKind,
    pub method: String,
    pub url: String,
    pub operation_id: String,
    pub controller_name: String,
    /// Export name of the handler inside its unit.
    pub controller_method: String,
    pub controller_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Vec<ParameterDescriptor>,
    pub schema: RouteSchema,
    /// Some provider in the chain can end the request early.
    pub short_circuits: bool,
}

impl RouteDescriptor {
    /// Provider steps in execution order: dependencies before dependents,
    /// parameters in declaration order.
    pub fn provider_steps(&self) -> Vec<&ProviderBinding> {
        fn collect<'a>(parameters: &'a [ParameterDescriptor], out: &mut Vec<&'a ProviderBinding>) {
            for parameter in parameters {
                if let Some(provider) = &parameter.provider {
                    collect(&provider.dependencies, out);
                    out.push(provider);
                }
            }
        }

        let mut steps = Vec::new();
        collect(&self.parameters, &mut steps);
        steps
    }
}

/// Routes of one unit plus the diagnostics of handlers that failed.
#[derive(Debug, Default)]
pub struct UnitRoutes {
    pub routes: Vec<RouteDescriptor>,
    pub diagnostics: Vec<Error>,
}

pub struct RouteExtractor<'p> {
    rules: UrlRules,
    binder: ParameterBinder<'p>,
}

impl<'p> RouteExtractor<'p> {
    pub fn new(rules: UrlRules, providers: &'p ProviderRegistry) -> Self {
        Self {
            rules,
            binder: ParameterBinder::new(providers),
        }
    }

    pub fn rules(&self) -> &UrlRules {
        &self.rules
    }

    /// Extract every route of `unit`.
    ///
    /// Invalid handlers are reported in [`UnitRoutes::diagnostics`]; `Err`
    /// is returned only for fatal errors.
    pub fn extract(&self, unit: &ControllerUnit, resolver: &mut SchemaResolver<'_>) -> Result<UnitRoutes> {
        let url = self.rules.url(&unit.path);
        let controller_name = self.rules.controller_name(&unit.path);
        let controller_path = self.rules.relative_path(&unit.path);
        let tokens = path_tokens(&url);
        debug!("Extracting {} as {} ({})", unit.path.display(), url, controller_name);

        let mut extracted = UnitRoutes::default();
        let mut operation_ids: HashSet<String> = HashSet::new();

        for handler in &unit.handlers {
            let Some(verb) = HttpVerb::parse(&handler.export_name) else {
                debug!(
                    "Ignoring export {} in {}: not a verb",
                    handler.export_name,
                    unit.path.display()
                );
                continue;
            };

            let operation_id = match &handler.operation_id {
                Some(explicit) => explicit.clone(),
                None => {
                    let base = format!(
                        "{}{}",
                        verb.as_str(),
                        controller_name.trim_end_matches("Controller")
                    );
                    let mut candidate = base.clone();
                    let mut suffix = 2;
                    while operation_ids.contains(&candidate) {
                        candidate = format!("{}{}", base, suffix);
                        suffix += 1;
                    }
                    candidate
                }
            };
            operation_ids.insert(operation_id.clone());

            let route = Route {
                verb,
                url: &url,
                tokens: &tokens,
                controller_name: &controller_name,
                controller_path: &controller_path,
                operation_id,
            };
            match self.build_route(handler, route, resolver) {
                Ok(descriptor) => {
                    debug!("Found route: {} {}", descriptor.method, descriptor.url);
                    extracted.routes.push(descriptor);
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    debug!("Handler {} rejected: {}", handler.export_name, err);
                    extracted.diagnostics.push(err);
                }
            }
        }

        Ok(extracted)
    }

    fn build_route(
        &self,
        handler: &HandlerDecl,
        route: Route<'_>,
        resolver: &mut SchemaResolver<'_>,
    ) -> Result<RouteDescriptor> {
        let bound = self
            .binder
            .bind(&handler.params, route.verb, route.tokens, resolver)?;

        for token in route.tokens {
            if !bound.schema.param_names().any(|name| name == token) {
                return Err(Error::route(
                    &handler.location,
                    format!(
                        "url `{}` declares `:{}` but no parameter binds it",
                        route.url, token
                    ),
                ));
            }
        }
        if let Some(stray) = bound
            .schema
            .param_names()
            .find(|name| !route.tokens.iter().any(|token| token == name))
        {
            return Err(Error::route(
                &handler.location,
                format!(
                    "parameter `{}` is read from the path but `{}` has no `:{}` segment",
                    stray, route.url, stray
                ),
            ));
        }

        let response = resolver.resolve(&handler.response, &handler.location)?;

        Ok(RouteDescriptor {
            kind: route.verb.kind(),
            method: route.verb.method().to_string(),
            url: route.url.to_string(),
            operation_id: route.operation_id,
            controller_name: route.controller_name.to_string(),
            controller_method: handler.export_name.clone(),
            controller_path: route.controller_path.to_string(),
            description: handler.description.clone(),
            parameters: bound.parameters,
            schema: bound.schema.finish(response),
            short_circuits: bound.short_circuits,
        })
    }
}

/// Per-handler routing facts shared by every handler of a unit.
struct Route<'u> {
    verb: HttpVerb,
    url: &'u str,
    tokens: &'u [String],
    controller_name: &'u str,
    controller_path: &'u str,
    operation_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter_binder::ParameterSource;
    use crate::provider_registry::{drive_providers, ProviderDefinition, ProviderOutcome};
    use crate::type_node::{Declaration, Member, ObjectType, PrimitiveKind, TypeCatalog};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const PREFIX: &str = "(?:.*src)?/?(?:routes/?)";

    fn at(unit: &str, line: usize) -> SourceLocation {
        SourceLocation::new(unit, line, 0)
    }

    fn extractor(providers: &ProviderRegistry) -> RouteExtractor<'_> {
        RouteExtractor::new(UrlRules::new(".", PREFIX).unwrap(), providers)
    }

    #[test]
    fn test_http_verb_parse() {
        assert_eq!(HttpVerb::parse("GET"), Some(HttpVerb::Get));
        assert_eq!(HttpVerb::parse("Post"), Some(HttpVerb::Post));
        assert_eq!(HttpVerb::parse("ws"), Some(HttpVerb::Ws));
        assert_eq!(HttpVerb::parse("helper"), None);
        assert_eq!(HttpVerb::Ws.method(), "GET");
        assert!(HttpVerb::Delete.has_body());
        assert!(!HttpVerb::Get.has_body());
    }

    #[test]
    fn test_post_index_route() {
        let unit_path = "src/routes/index.rs";
        let mut catalog = TypeCatalog::new();
        catalog.add(Declaration::new(
            "Complex",
            TypeNode::Object(ObjectType::new().with("a", Member::required(TypeNode::string()))),
            at(unit_path, 1),
        ));
        let mut resolver = SchemaResolver::new(&catalog);
        let providers = ProviderRegistry::new();

        let unit = ControllerUnit::new(
            unit_path,
            vec![HandlerDecl::new("post", at(unit_path, 5))
                .with_params(vec![HandlerParam::new("body", TypeNode::reference("Complex"), at(unit_path, 5))])
                .with_response(TypeNode::Primitive(PrimitiveKind::F64))],
        );

        let extracted = extractor(&providers).extract(&unit, &mut resolver).unwrap();
        assert!(extracted.diagnostics.is_empty());
        let route = &extracted.routes[0];

        assert_eq!(route.kind, RouteKind::Rest);
        assert_eq!(route.url, "/");
        assert_eq!(route.method, "POST");
        assert_eq!(route.operation_id, "postIndex");
        assert_eq!(route.controller_name, "IndexController");
        assert_eq!(route.controller_path, "src/routes/index.rs");
        assert_eq!(route.parameters[0].source, ParameterSource::Body);
        assert_eq!(
            serde_json::to_value(&route.schema).unwrap(),
            json!({
                "body": {"$ref": "Complex"},
                "response": {"type": "number", "format": "double"}
            })
        );
    }

    #[test]
    fn test_non_verb_exports_are_ignored() {
        let catalog = TypeCatalog::new();
        let mut resolver = SchemaResolver::new(&catalog);
        let providers = ProviderRegistry::new();
        let unit = ControllerUnit::new(
            "src/routes/index.rs",
            vec![
                HandlerDecl::new("helper", at("src/routes/index.rs", 1)),
                HandlerDecl::new("get", at("src/routes/index.rs", 4)),
            ],
        );

        let extracted = extractor(&providers).extract(&unit, &mut resolver).unwrap();
        assert_eq!(extracted.routes.len(), 1);
        assert_eq!(extracted.routes[0].controller_method, "get");
    }

    #[test]
    fn test_path_token_without_parameter_is_rejected() {
        let unit_path = "src/routes/users/[name].rs";
        let catalog = TypeCatalog::new();
        let mut resolver = SchemaResolver::new(&catalog);
        let providers = ProviderRegistry::new();
        let unit = ControllerUnit::new(
            unit_path,
            vec![
                HandlerDecl::new("get", at(unit_path, 1))
                    .with_params(vec![HandlerParam::new("name", TypeNode::string(), at(unit_path, 1))]),
                HandlerDecl::new("delete", at(unit_path, 6)),
            ],
        );

        let extracted = extractor(&providers).extract(&unit, &mut resolver).unwrap();
        assert_eq!(extracted.routes.len(), 1);
        assert_eq!(extracted.routes[0].url, "/users/:name");
        assert_eq!(extracted.diagnostics.len(), 1);
        let message = extracted.diagnostics[0].to_string();
        assert!(message.contains("declares `:name`"), "{}", message);
        assert_eq!(extracted.diagnostics[0].location(), Some(&at(unit_path, 6)));
    }

    #[test]
    fn test_path_marker_without_token_is_rejected() {
        let unit_path = "src/routes/users.rs";
        let catalog = TypeCatalog::new();
        let mut resolver = SchemaResolver::new(&catalog);
        let providers = ProviderRegistry::new();
        let unit = ControllerUnit::new(
            unit_path,
            vec![HandlerDecl::new("get", at(unit_path, 1)).with_params(vec![
                HandlerParam::new("slug", TypeNode::string(), at(unit_path, 1)).with_marker(SourceMarker::Path),
            ])],
        );

        let extracted = extractor(&providers).extract(&unit, &mut resolver).unwrap();
        assert!(extracted.routes.is_empty());
        assert!(extracted.diagnostics[0].to_string().contains("no `:slug` segment"));
    }

    #[test]
    fn test_operation_ids() {
        let unit_path = "src/routes/reports.rs";
        let catalog = TypeCatalog::new();
        let mut resolver = SchemaResolver::new(&catalog);
        let providers = ProviderRegistry::new();
        let mut tagged = HandlerDecl::new("post", at(unit_path, 5));
        tagged.operation_id = Some("createReport".to_string());
        let unit = ControllerUnit::new(
            unit_path,
            vec![
                HandlerDecl::new("get", at(unit_path, 1)),
                HandlerDecl::new("GET", at(unit_path, 3)),
                tagged,
            ],
        );

        let extracted = extractor(&providers).extract(&unit, &mut resolver).unwrap();
        let ids: Vec<&str> = extracted.routes.iter().map(|r| r.operation_id.as_str()).collect();
        assert_eq!(ids, vec!["getReports", "getReports2", "createReport"]);
    }

    #[test]
    fn test_websocket_handler() {
        let unit_path = "src/routes/chat.rs";
        let catalog = TypeCatalog::new();
        let mut resolver = SchemaResolver::new(&catalog);
        let providers = ProviderRegistry::new();
        let unit = ControllerUnit::new(
            unit_path,
            vec![HandlerDecl::new("ws", at(unit_path, 1)).with_params(vec![
                HandlerParam::new("socket", TypeNode::any(), at(unit_path, 1))
                    .with_marker(SourceMarker::Raw(RawTarget::Socket)),
            ])],
        );

        let extracted = extractor(&providers).extract(&unit, &mut resolver).unwrap();
        let route = &extracted.routes[0];
        assert_eq!(route.kind, RouteKind::Websocket);
        assert_eq!(route.method, "GET");
        assert_eq!(route.operation_id, "wsChat");
    }

    #[test]
    fn test_provider_steps_and_driver() {
        let unit_path = "src/routes/me.rs";
        let catalog = TypeCatalog::new();
        let mut resolver = SchemaResolver::new(&catalog);
        let mut providers = ProviderRegistry::new();
        providers.register(
            ProviderDefinition::new("session", "src/providers/session.rs::provide", at("src/providers/session.rs", 1))
                .aborting(),
        );
        providers.register(
            ProviderDefinition::new("user", "src/providers/user.rs::provide", at("src/providers/user.rs", 1))
                .with_parameters(vec![HandlerParam::new("session", TypeNode::any(), at("src/providers/user.rs", 1))]),
        );
        let unit = ControllerUnit::new(
            unit_path,
            vec![HandlerDecl::new("get", at(unit_path, 1))
                .with_params(vec![HandlerParam::new("user", TypeNode::any(), at(unit_path, 1))])],
        );

        let extracted = extractor(&providers).extract(&unit, &mut resolver).unwrap();
        let route = &extracted.routes[0];
        assert!(route.short_circuits);

        let steps: Vec<&str> = route.provider_steps().iter().map(|s| s.alias.as_str()).collect();
        assert_eq!(steps, vec!["session", "user"]);

        let mut ran = Vec::new();
        let outcome = drive_providers(route, |step| {
            ran.push(step.alias.clone());
            if step.may_abort {
                ProviderOutcome::<()>::Aborted
            } else {
                ProviderOutcome::Continue(())
            }
        });
        assert!(outcome.is_aborted());
        assert_eq!(ran, vec!["session".to_string()]);

        let outcome = drive_providers(route, |step| ProviderOutcome::Continue(step.alias.clone()));
        assert_eq!(
            outcome,
            ProviderOutcome::Continue(vec!["session".to_string(), "user".to_string()])
        );
    }
}
