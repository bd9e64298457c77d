mod config;
mod context;
mod controller;
mod error;
pub mod resources;
mod runtime;
mod writer;

pub use config::ControllerConfig;
pub use context::Context;
pub use controller::ServiceHandler;
pub use error::{Error, Result};
pub use runtime::start_service_controller;
pub use writer::{KubeWriter, ResourceWriter, ServiceWriter};

pub const CONTROLLER_NAME: &str = "service-controller";
