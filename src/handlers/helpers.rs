use std::collections::HashMap;

use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::AppState;
use crate::provision::batch::BatchReport;
use crate::templates::{BaseTemplate, LogTemplate, PageGlobals};

/// `?msg=` carried by redirects back to the index.
#[derive(Deserialize, Debug, Default)]
pub struct FlashQuery {
    pub msg: Option<String>,
}

impl FlashQuery {
    pub fn globals(self) -> PageGlobals {
        PageGlobals::new(self.msg)
    }
}

pub fn render_template<T: askama::Template + BaseTemplate>(t: T) -> Response {
    match t.render() {
        Ok(body) => Html(body).into_response(),
        Err(e) => {
            tracing::error!(%e, flash = t.has_flash_messages(), "Template render error");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

pub fn redirect_with_msg(path: &str, msg: &str) -> Redirect {
    Redirect::to(&format!("{}?msg={}", path, urlencoding::encode(msg)))
}

pub fn host_addresses(state: &AppState) -> Vec<String> {
    state.registry.snapshot().into_keys().collect()
}

/// A multipart upload: the text fields and the one file.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
    }
}

pub async fn read_upload(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    let mut saw_file = false;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Upload(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        if let Some(file_name) = field.file_name() {
            form.file_name = file_name.to_string();
            form.bytes = field.bytes().await.map_err(|e| AppError::Upload(e.to_string()))?.to_vec();
            saw_file = true;
        } else {
            let value = field.text().await.map_err(|e| AppError::Upload(e.to_string()))?;
            form.fields.insert(name, value);
        }
    }
    if !saw_file {
        return Err(AppError::Upload("no file was uploaded".to_string()));
    }
    Ok(form)
}

/// Render a batch narrative. A registry that could not be saved turns the
/// page into a 500 so the failure is not mistaken for success.
pub fn render_report(report: BatchReport) -> Response {
    let status = if report.persist_error.is_some() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    let globals = PageGlobals::new(None);
    let page = LogTemplate {
        flash_messages: globals.flash_messages,
        has_flash_messages: globals.has_flash_messages,
        version: globals.version,
        title: report.kind.title().to_string(),
        address: report.address.clone(),
        failed: report.remote.is_failure() || report.persist_error.is_some(),
        log: report.log,
    };
    let response = render_template(page);
    if response.status() == StatusCode::OK {
        (status, response).into_response()
    } else {
        response
    }
}
