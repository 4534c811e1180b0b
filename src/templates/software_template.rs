use askama::Template;

use crate::services::Software;

#[derive(Template)]
#[template(path = "software.html")]
pub struct SoftwareTemplate {
    pub flash_messages: Vec<String>,
    pub has_flash_messages: bool,
    pub version: &'static str,
    pub addresses: Vec<String>,
    pub catalog: &'static [Software],
    pub package_manager: &'static str,
}

crate::impl_base_template!(SoftwareTemplate);
