use crate::config::OpenApiConfig;
use crate::extractor::{RouteDescriptor, RouteKind};
use crate::generator::GenerationOutput;
use crate::schema::Schema;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

const COMPONENT_PREFIX: &str = "#/components/schemas/";
const JSON_MEDIA_TYPE: &str = "application/json";

/// OpenAPI document builder
pub struct OpenApiBuilder {
    info: Info,
    paths: IndexMap<String, PathItem>,
}

/// OpenAPI Info object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI PathItem object - all operations for a single path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
}

/// OpenAPI Operation object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "operationId")]
    pub operation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Parameter>>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: IndexMap<String, Response>,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Parameter location (path, query, header)
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    pub schema: Schema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    pub required: bool,
    pub content: IndexMap<String, MediaType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<IndexMap<String, MediaType>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Components {
    pub schemas: IndexMap<String, Schema>,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    pub paths: IndexMap<String, PathItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

/// Copy of `schema` with bare registry ids turned into component pointers.
fn component_refs(schema: &Schema) -> Schema {
    let mut schema = schema.clone();
    schema.map_refs(&|id| format!("{}{}", COMPONENT_PREFIX, id));
    schema
}

fn json_content(schema: &Schema) -> IndexMap<String, MediaType> {
    let mut content = IndexMap::new();
    content.insert(
        JSON_MEDIA_TYPE.to_string(),
        MediaType {
            schema: component_refs(schema),
        },
    );
    content
}

/// One parameter per property of an object schema.
fn parameters_of(schema: Option<&Schema>, location: &str, always_required: bool) -> Vec<Parameter> {
    let Some(schema) = schema else {
        return Vec::new();
    };
    let required = schema.required.as_deref().unwrap_or_default();
    schema
        .properties
        .iter()
        .flatten()
        .map(|(name, property)| Parameter {
            name: name.clone(),
            location: location.to_string(),
            required: always_required || required.contains(name),
            schema: component_refs(property),
        })
        .collect()
}

impl OpenApiBuilder {
    pub fn new() -> Self {
        debug!("Initializing OpenApiBuilder");
        let defaults = OpenApiConfig::default();
        Self {
            info: Info {
                title: defaults.title,
                version: defaults.version,
                description: None,
            },
            paths: IndexMap::new(),
        }
    }

    pub fn with_info(mut self, title: String, version: String, description: Option<String>) -> Self {
        self.info = Info {
            title,
            version,
            description,
        };
        self
    }

    /// Add a route to the document. Websocket routes have no OpenAPI form
    /// and are skipped.
    pub fn add_route(&mut self, route: &RouteDescriptor) {
        if route.kind == RouteKind::Websocket {
            debug!("Skipping websocket route {}", route.url);
            return;
        }
        debug!("Adding route: {} {}", route.method, route.url);

        let openapi_path = Self::convert_path_format(&route.url);
        let schema = &route.schema;

        let mut parameters = parameters_of(schema.params.as_ref(), "path", true);
        parameters.extend(parameters_of(schema.querystring.as_ref(), "query", false));
        parameters.extend(parameters_of(schema.headers.as_ref(), "header", false));

        let request_body = schema.body.as_ref().map(|body| RequestBody {
            required: body.nullable != Some(true),
            content: json_content(body),
        });

        let response = if schema.response.schema_type.as_deref() == Some("null") {
            Response {
                description: "Successful response".to_string(),
                content: None,
            }
        } else {
            Response {
                description: "Successful response".to_string(),
                content: Some(json_content(&schema.response)),
            }
        };
        let mut responses = IndexMap::new();
        responses.insert("200".to_string(), response);

        let operation = Operation {
            summary: Some(format!("{} {}", route.method, route.url)),
            description: route.description.clone(),
            operation_id: route.operation_id.clone(),
            parameters: if parameters.is_empty() { None } else { Some(parameters) },
            request_body,
            responses,
        };

        let path_item = self.paths.entry(openapi_path).or_default();
        match route.method.as_str() {
            "GET" => path_item.get = Some(operation),
            "POST" => path_item.post = Some(operation),
            "PUT" => path_item.put = Some(operation),
            "DELETE" => path_item.delete = Some(operation),
            "PATCH" => path_item.patch = Some(operation),
            other => debug!("Ignoring unsupported method {}", other),
        }
    }

    /// Convert `:param` segments to OpenAPI `{param}` form
    fn convert_path_format(path: &str) -> String {
        path.split('/')
            .map(|part| match part.strip_prefix(':') {
                Some(name) => format!("{{{}}}", name),
                None => part.to_string(),
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Build the final document, taking components from the registry entries.
    pub fn build(self, output: &GenerationOutput) -> OpenApiDocument {
        debug!("Building final OpenAPI document");

        let schemas: IndexMap<String, Schema> = output
            .schemas
            .iter()
            .map(|entry| (entry.id.clone(), component_refs(&entry.schema)))
            .collect();
        let components = if schemas.is_empty() {
            None
        } else {
            Some(Components { schemas })
        };

        OpenApiDocument {
            openapi: "3.0.3".to_string(),
            info: self.info,
            paths: self.paths,
            components,
        }
    }

    /// Document for a whole generation run.
    pub fn from_output(output: &GenerationOutput, config: &OpenApiConfig) -> OpenApiDocument {
        let mut builder = Self::new().with_info(
            config.title.clone(),
            config.version.clone(),
            config.description.clone(),
        );
        for route in &output.routes {
            builder.add_route(route);
        }
        builder.build(output)
    }
}

impl Default for OpenApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}
