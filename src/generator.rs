//! One complete generation run over a set of controller units.

use crate::error::{Diagnostics, Error};
use crate::extractor::{ControllerUnit, RouteDescriptor, RouteExtractor, UrlRules};
use crate::provider_registry::ProviderRegistry;
use crate::schema_registry::SchemaRegistryEntry;
use crate::schema_resolver::SchemaResolver;
use crate::type_node::TypeCatalog;
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;

/// Routes and registered schemas of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutput {
    pub routes: Vec<RouteDescriptor>,
    pub schemas: Vec<SchemaRegistryEntry>,
}

pub struct Generator<'a> {
    catalog: &'a TypeCatalog,
    providers: &'a ProviderRegistry,
    rules: UrlRules,
}

impl<'a> Generator<'a> {
    pub fn new(catalog: &'a TypeCatalog, providers: &'a ProviderRegistry, rules: UrlRules) -> Self {
        Self {
            catalog,
            providers,
            rules,
        }
    }

    /// Extract every route of `units` and collect the schemas they reference.
    ///
    /// Units are processed in path order whatever order they are given in,
    /// so ids and output are stable. Any diagnostic fails the whole run.
    pub fn run(&self, units: &[ControllerUnit]) -> Result<GenerationOutput, Diagnostics> {
        let mut ordered: Vec<&ControllerUnit> = units.iter().collect();
        ordered.sort_by(|a, b| a.path.cmp(&b.path));

        let mut resolver = SchemaResolver::new(self.catalog);
        let extractor = RouteExtractor::new(self.rules.clone(), self.providers);
        let mut diagnostics = Diagnostics::default();
        let mut routes: Vec<RouteDescriptor> = Vec::new();
        let mut operation_owners: HashMap<String, String> = HashMap::new();

        for unit in ordered {
            let extracted = match extractor.extract(unit, &mut resolver) {
                Ok(extracted) => extracted,
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    diagnostics.push(err);
                    continue;
                }
            };
            for err in extracted.diagnostics {
                diagnostics.push(err);
            }

            for route in extracted.routes {
                if let Some(owner) = operation_owners.get(&route.operation_id) {
                    let location = unit
                        .handlers
                        .iter()
                        .find(|handler| handler.export_name == route.controller_method)
                        .map(|handler| handler.location.clone())
                        .unwrap_or_else(|| crate::error::SourceLocation::unit(&unit.path));
                    diagnostics.push(Error::route(
                        &location,
                        format!(
                            "operationId `{}` is already used by {}",
                            route.operation_id, owner
                        ),
                    ));
                    continue;
                }
                operation_owners.insert(route.operation_id.clone(), route.controller_path.clone());
                debug!("Accepted route {} {}", route.method, route.url);
                routes.push(route);
            }
        }

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        let schemas = resolver.into_registry().into_entries();
        info!(
            "Generated {} routes and {} schemas",
            routes.len(),
            schemas.len()
        );
        Ok(GenerationOutput { routes, schemas })
    }
}
