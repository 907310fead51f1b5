// Robot hub console: a client for monitoring and tele-operating robots
// through a robot hub backend.

pub mod api;
pub mod backoff;
pub mod config;
pub mod demo;
pub mod error;
pub mod metrics;
pub mod mjpeg;
pub mod model;
pub mod overlay;
pub mod pointcloud;
pub mod session;
pub mod status;
pub mod views;

pub use api::HubClient;
pub use config::Config;
pub use error::{HubError, HubResult};
pub use session::{DetailSession, SessionOptions};
