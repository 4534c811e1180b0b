// Form handling utilities
pub mod url_encoding;

// Upload utilities
pub mod filename;

// Re-export all utilities for convenient access
pub use filename::sanitize_filename;
pub use url_encoding::{first_value, parse_urlencoded_body};
