use askama::Template;

/// Plain-text batch narrative.
#[derive(Template)]
#[template(path = "logs.html")]
pub struct LogTemplate {
    pub flash_messages: Vec<String>,
    pub has_flash_messages: bool,
    pub version: &'static str,
    pub title: String,
    pub address: String,
    pub log: String,
    pub failed: bool,
}

crate::impl_base_template!(LogTemplate);
