use askama::Template;

/// Create or delete upload form, for either sheet format.
#[derive(Template)]
#[template(path = "upload.html")]
pub struct UploadTemplate {
    pub flash_messages: Vec<String>,
    pub has_flash_messages: bool,
    pub version: &'static str,
    pub title: &'static str,
    pub action: &'static str,
    pub accept: &'static str,
    pub format_label: &'static str,
    pub deleting: bool,
    /// Default for the credential column selector; ignored when deleting.
    pub credential: &'static str,
    pub addresses: Vec<String>,
}

crate::impl_base_template!(UploadTemplate);
