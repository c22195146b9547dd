// Library exports for the binary, integration tests and benchmarks

// ===== Resolution engine =====
pub mod alerts;
pub mod listeners;
pub mod loaders;
pub mod mock;
pub mod variant_handlers;

// ===== Server instance =====
pub mod admin_api;
pub mod config;
pub mod core;
pub mod error;
pub mod files;
pub mod metrics;
pub mod plugins;
pub mod response;
pub mod server;

pub use crate::core::{MocksServer, MocksServerBuilder};
pub use alerts::Alerts;
pub use config::{MocksConfig, Options};
pub use error::{ConfigError, MockError, ServerError};
pub use mock::Mock;
pub use plugins::{Plugin, PluginContext};
pub use variant_handlers::{MockRequest, VariantHandler, VariantResponder};
