//! Host-facing shell of the cloud-storage file-manager plugin.
//!
//! [`CloudFsPlugin`] receives the host's synchronous calls, routes them by
//! virtual path level and hands content operations to the account sessions
//! of `wsvfs-core`. The crate also carries the plugin configuration file,
//! file logging, and a terminal [`ConsoleUi`] for running without the
//! host's dialogs.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use wsvfs_plugin::{CloudFsPlugin, ConsoleUi, NoHostProgress, PluginConfig, init_logging};
//!
//! let config = PluginConfig::load()?;
//! init_logging(&config.logging)?;
//! let plugin = CloudFsPlugin::new(backend, Arc::new(ConsoleUi::new()), Arc::new(NoHostProgress), config);
//! for entry in plugin.list("/") {
//!     println!("{}", entry.name);
//! }
//! ```

pub mod config;
pub mod console;
pub mod host;
pub mod listing;
pub mod logging;
pub mod plugin;

pub use config::{ConfigError, ListingConfig, LoggingConfig, PluginConfig, PluginSection};
pub use console::ConsoleUi;
pub use host::{CopyFlags, HostOperation, HostProgress, NoHostProgress, Phase};
pub use listing::{ADD_ACCOUNT_ENTRY, BulkMode, Listing, PLACEHOLDER_ENTRY};
pub use logging::init_logging;
pub use plugin::CloudFsPlugin;
