//! Providers that build the application state and start the services.

pub mod app_state;
pub mod dbus;
pub mod idle;
pub mod stats;
pub mod traits;

pub use app_state::AppStateProvider;
pub use dbus::DBusServiceProvider;
pub use idle::IdleServiceProvider;
pub use stats::StatsServiceProvider;
pub use traits::{AsyncProvider, ServiceProvider};
