use askama::Template;

use crate::models::HostView;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub flash_messages: Vec<String>,
    pub has_flash_messages: bool,
    pub version: &'static str,
    pub hosts: Vec<HostView>,
    pub account_total: usize,
}

crate::impl_base_template!(IndexTemplate);
