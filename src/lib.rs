//! # kb_light_statsd
//!
//! A Linux daemon that turns a tri-zone laptop keyboard backlight into a
//! system load indicator and fades it out while the session is idle.
//!
//! ## Features
//!
//! - **Load colours**: CPU, memory and GPU load shown as green, yellow or red
//!   on a configured zone
//! - **Idle dimming**: brightness steps down with logind's idle hint, then the
//!   backlight switches off; activity restores it
//! - **D-Bus Interface**: read-only status and a stop method on the session bus
//!
//! ## Architecture
//!
//! - [`Controller`](controller::Controller) - single owner of the backlight
//! - [`DimSequencer`](dim::DimSequencer) - cancellable fade-out task
//! - [`StatsSampler`](stats::StatsSampler) - metric to zone colour mapping
//! - [`SystemCoordinator`](coordinator::SystemCoordinator) - service lifecycle
//! - [`EventBus`](event::EventBus) - inter-service communication
//!
//! ## Example
//!
//! ```no_run
//! use kb_light_statsd::{application::Application, config::ConfigManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config_manager = ConfigManager::load(None).await?;
//!     Application::builder()
//!         .with_config_manager(config_manager)
//!         .build()
//!         .await?
//!         .run()
//!         .await
//! }
//! ```

pub mod app_context;
pub mod application;
pub mod backlight;
pub mod cli;
pub mod color;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod device;
pub mod dim;
pub mod event;
pub mod idle;
pub mod idle_sources;
pub mod interface;
pub mod metric_providers;
pub mod metrics;
pub mod providers;
pub mod stats;
pub mod task_manager;
