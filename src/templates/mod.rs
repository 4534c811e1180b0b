// Base template trait for inheritance
pub mod base_template;
pub use base_template::{BaseTemplate, PageGlobals};

// Individual template files
pub mod index_template;
pub mod log_template;
pub mod software_template;
pub mod upload_template;

pub use index_template::IndexTemplate;
pub use log_template::LogTemplate;
pub use software_template::SoftwareTemplate;
pub use upload_template::UploadTemplate;
