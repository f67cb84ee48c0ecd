//! Named parameter providers and the reference driver that runs them.
//!
//! A provider is a function that turns request data into a value a handler
//! parameter receives. Providers are looked up by alias (the parameter name)
//! and may themselves declare parameters, so chains nest arbitrarily.

use crate::error::SourceLocation;
use crate::extractor::{HandlerParam, RouteDescriptor};
use crate::parameter_binder::ProviderBinding;
use crate::type_node::TypeNode;
use indexmap::IndexMap;
use log::debug;

/// Everything known about one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderDefinition {
    pub alias: String,
    /// Opaque reference to the provider implementation, never interpreted here.
    pub target: String,
    pub parameters: Vec<HandlerParam>,
    /// Type the provider yields, when declared.
    pub output: Option<TypeNode>,
    /// The provider can end the request before the handler runs.
    pub may_abort: bool,
    pub location: SourceLocation,
}

impl ProviderDefinition {
    pub fn new(alias: impl Into<String>, target: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            alias: alias.into(),
            target: target.into(),
            parameters: Vec::new(),
            output: None,
            may_abort: false,
            location,
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<HandlerParam>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_output(mut self, output: TypeNode) -> Self {
        self.output = Some(output);
        self
    }

    pub fn aborting(mut self) -> Self {
        self.may_abort = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: IndexMap<String, ProviderDefinition>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider, replacing any earlier one with the same alias.
    pub fn register(&mut self, definition: ProviderDefinition) {
        debug!(
            "Registering provider {} -> {}",
            definition.alias, definition.target
        );
        self.providers.insert(definition.alias.clone(), definition);
    }

    pub fn get(&self, alias: &str) -> Option<&ProviderDefinition> {
        self.providers.get(alias)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Result of one provider step: keep going with a value, or stop the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome<T> {
    Continue(T),
    Aborted,
}

impl<T> ProviderOutcome<T> {
    pub fn is_aborted(&self) -> bool {
        matches!(self, ProviderOutcome::Aborted)
    }
}

/// Run every provider step of `route` in order, dependencies first.
///
/// Stops at the first [`ProviderOutcome::Aborted`]; the handler must only be
/// invoked when this returns `Continue`.
pub fn drive_providers<T, F>(route: &RouteDescriptor, mut run: F) -> ProviderOutcome<Vec<T>>
where
    F: FnMut(&ProviderBinding) -> ProviderOutcome<T>,
{
    let mut values = Vec::new();
    for step in route.provider_steps() {
        match run(step) {
            ProviderOutcome::Continue(value) => values.push(value),
            ProviderOutcome::Aborted => {
                debug!(
                    "Provider {} aborted {} {}",
                    step.alias, route.method, route.url
                );
                return ProviderOutcome::Aborted;
            }
        }
    }
    ProviderOutcome::Continue(values)
}
