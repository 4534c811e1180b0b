pub mod catalog;
pub mod export;
pub mod registry;
pub mod uploads;

// Re-export commonly used items
pub use catalog::{resolve_install, CatalogError, InstallRequest, Software, CATALOG};
pub use export::{all_export_filename, export_all_csv, export_host_csv, host_export_filename, ExportError};
pub use registry::{HostGuard, HostRegistry, RegistryError};
pub use uploads::store_upload;
