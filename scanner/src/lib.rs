pub mod config;
pub mod discovery;
pub mod error;
pub mod registry;
pub mod transport;

// Re-export key types for easier access
pub use config::{Configuration, DiscoveryMode, SearchType};
pub use discovery::{discover_devices, discover_devices_with_timeout, DiscoveryStats, Scanner};
pub use error::{ConfigurationError, Result, ScanError};
pub use registry::DeviceRegistry;
pub use transport::device::DeviceDescription;
