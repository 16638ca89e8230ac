//! artnet-node library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.

pub mod config;
pub mod dispatch;
pub mod net;
pub mod node;
pub mod registry;
pub mod sender;

pub use config::{load_config, save_config, AppConfig, ConfigError};
pub use dispatch::{Dispatcher, DmxConsumer};
pub use net::retry::RetryPolicy;
pub use node::{ArtNetNode, DmxReceiver, NodeConfig, NodeError};
pub use registry::{BindingRegistry, ControllerRegistry, PortBinding};
pub use sender::{DmxSender, SenderOptions};
