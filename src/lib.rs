//! Route descriptors and deduplicated JSON schemas from file-based controllers.
//!
//! Every `.rs` file under the routes directory is a controller unit. Its
//! path becomes a URL (`src/routes/users/[id].rs` -> `/users/:id`) and its
//! public functions named after HTTP verbs become routes. Handler parameters
//! are bound to path, query, header, body or provider sources, and every type
//! they mention is resolved into a JSON schema stored once in a registry.
//!
//! # Architecture
//!
//! The core works on an in-memory model and does no I/O:
//!
//! 1. [`type_node`] - language-agnostic type model and declaration catalog
//! 2. [`schema_resolver`] - turns type nodes into schemas
//! 3. [`schema_registry`] - named schemas with structural deduplication
//! 4. [`parameter_binder`] - decides where each handler parameter comes from
//! 5. [`provider_registry`] - named parameter providers
//! 6. [`extractor`] - builds route descriptors for a controller unit
//! 7. [`generator`] - one all-or-nothing run over every unit
//!
//! Around it, the Rust adapter reads a project from disk:
//!
//! - [`config`] - `controllers.json` / YAML configuration
//! - [`scanner`] and [`parser`] - find and parse source files
//! - [`source`] - lower `syn` items into the model
//! - [`project`] - ties the adapter together
//! - [`serializer`] and [`openapi_builder`] - write the results
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_controllers::{config::Config, project::Project, serializer::serialize_json};
//! use std::path::Path;
//!
//! let config = Config::load(Path::new("controllers.json")).unwrap();
//! let project = Project::load(Path::new("."), &config).unwrap();
//! match project.generate() {
//!     Ok(output) => println!("{}", serialize_json(&output).unwrap()),
//!     Err(diagnostics) => eprintln!("{}", diagnostics),
//! }
//! ```
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod generator;
pub mod openapi_builder;
pub mod parameter_binder;
pub mod parser;
pub mod project;
pub mod provider_registry;
pub mod scanner;
pub mod schema;
pub mod schema_registry;
pub mod schema_resolver;
pub mod serializer;
pub mod source;
pub mod type_node;
