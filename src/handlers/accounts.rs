use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Multipart, Query, State};
use axum::response::{IntoResponse, Response};

use crate::error::AppError;
use crate::models::AppState;
use crate::provision::batch::{run_batch, BatchKind};
use crate::provision::rows::{extract_rows, RowShape, SheetFormat};
use crate::provision::script::CredentialColumn;
use crate::services::store_upload;
use crate::templates::UploadTemplate;
use crate::utils::{first_value, parse_urlencoded_body};

use super::helpers::{host_addresses, read_upload, redirect_with_msg, render_report, render_template, FlashQuery};

const CSV_ACCEPT: &str = ".csv,text/csv";
const WORKBOOK_ACCEPT: &str = ".xlsx,.xlsm,.xlsb,.xls,.ods";

fn upload_page(state: &AppState, flash: FlashQuery, format: SheetFormat, deleting: bool) -> Response {
    let (title, action) = match (format, deleting) {
        (SheetFormat::Delimited, false) => ("Create users from CSV", "/create-users"),
        (SheetFormat::Workbook, false) => ("Create users from Excel", "/create-users-excel"),
        (SheetFormat::Delimited, true) => ("Delete users from CSV", "/delete-users"),
        (SheetFormat::Workbook, true) => ("Delete users from Excel", "/delete-users-excel"),
    };
    let accept = match format {
        SheetFormat::Delimited => CSV_ACCEPT,
        SheetFormat::Workbook => WORKBOOK_ACCEPT,
    };
    let credential = match default_credential(format) {
        CredentialColumn::Password => "password",
        CredentialColumn::RollNumber => "roll",
    };
    let globals = flash.globals();
    render_template(UploadTemplate {
        flash_messages: globals.flash_messages,
        has_flash_messages: globals.has_flash_messages,
        version: globals.version,
        title,
        action,
        accept,
        format_label: format.label(),
        deleting,
        credential,
        addresses: host_addresses(state),
    })
}

/// Delimited sheets carry passwords, workbooks carry roll numbers.
fn default_credential(format: SheetFormat) -> CredentialColumn {
    match format {
        SheetFormat::Delimited => CredentialColumn::Password,
        SheetFormat::Workbook => CredentialColumn::RollNumber,
    }
}

pub async fn upload_csv_get(State(state): State<AppState>, Query(flash): Query<FlashQuery>) -> Response {
    upload_page(&state, flash, SheetFormat::Delimited, false)
}

pub async fn upload_excel_get(State(state): State<AppState>, Query(flash): Query<FlashQuery>) -> Response {
    upload_page(&state, flash, SheetFormat::Workbook, false)
}

pub async fn delete_csv_get(State(state): State<AppState>, Query(flash): Query<FlashQuery>) -> Response {
    upload_page(&state, flash, SheetFormat::Delimited, true)
}

pub async fn delete_excel_get(State(state): State<AppState>, Query(flash): Query<FlashQuery>) -> Response {
    upload_page(&state, flash, SheetFormat::Workbook, true)
}

pub async fn create_users(State(state): State<AppState>, multipart: Multipart) -> Result<Response, AppError> {
    run_sheet_batch(state, multipart, SheetFormat::Delimited, BatchKind::Create).await
}

pub async fn create_users_excel(State(state): State<AppState>, multipart: Multipart) -> Result<Response, AppError> {
    run_sheet_batch(state, multipart, SheetFormat::Workbook, BatchKind::Create).await
}

pub async fn delete_users(State(state): State<AppState>, multipart: Multipart) -> Result<Response, AppError> {
    run_sheet_batch(state, multipart, SheetFormat::Delimited, BatchKind::DeleteSheet).await
}

pub async fn delete_users_excel(State(state): State<AppState>, multipart: Multipart) -> Result<Response, AppError> {
    run_sheet_batch(state, multipart, SheetFormat::Workbook, BatchKind::DeleteSheet).await
}

/// Shared body of the four upload endpoints. `route_format` only picks the
/// credential default; the sheet itself is sniffed.
async fn run_sheet_batch(
    state: AppState,
    multipart: Multipart,
    route_format: SheetFormat,
    kind: BatchKind,
) -> Result<Response, AppError> {
    let upload = read_upload(multipart).await?;
    let address = upload
        .field("ip")
        .or_else(|| upload.field("server_ip"))
        .ok_or_else(|| AppError::bad_request("Server IP is required"))?
        .to_string();
    if !state.registry.contains(&address) {
        return Err(AppError::bad_request("❌ IP not found in records"));
    }
    let credential = upload
        .field("credential")
        .and_then(CredentialColumn::from_str)
        .unwrap_or_else(|| default_credential(route_format));

    store_upload(&state.settings.upload_dir, &upload.file_name, &upload.bytes)
        .await
        .map_err(AppError::Storage)?;

    let format = SheetFormat::detect(&upload.file_name, &upload.bytes);
    let shape = if kind == BatchKind::Create { RowShape::CREATE } else { RowShape::DELETE };
    let rows = extract_rows(upload.bytes, format, shape)?;
    tracing::info!(address = %address, format = format.label(), kind = kind.label(), "Processing uploaded sheet");

    let report = run_batch(&state.registry, state.shell.as_ref(), &state.settings, &address, kind, |_, builder| {
        if kind == BatchKind::Create {
            builder.add_create_rows(rows, credential);
        } else {
            builder.add_delete_rows(rows);
        }
    })
    .await?;
    Ok(render_report(report))
}

fn form_address(form: &HashMap<String, Vec<String>>) -> Result<String, AppError> {
    first_value(form, "ip")
        .or_else(|| first_value(form, "server_ip"))
        .map(str::to_string)
        .ok_or_else(|| AppError::bad_request("Server IP is required"))
}

pub async fn delete_user(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let form = parse_urlencoded_body(&body);
    let username = first_value(&form, "username")
        .ok_or_else(|| AppError::bad_request("❌ Username is required"))?
        .to_string();
    let address = form_address(&form)?;

    let report = run_batch(
        &state.registry,
        state.shell.as_ref(),
        &state.settings,
        &address,
        BatchKind::DeleteSingle,
        |_, builder| builder.add_delete_names(&[username]),
    )
    .await?;
    Ok(render_report(report))
}

pub async fn delete_selected(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let form = parse_urlencoded_body(&body);
    let address = form_address(&form)?;
    if !state.registry.contains(&address) {
        return Err(AppError::NotFound("Server not found".to_string()));
    }
    let selected: Vec<String> = form
        .get("selected_users")
        .map(|v| v.iter().filter(|s| !s.trim().is_empty()).cloned().collect())
        .unwrap_or_default();
    if selected.is_empty() {
        return Ok(redirect_with_msg("/", "No users selected").into_response());
    }

    let report = run_batch(
        &state.registry,
        state.shell.as_ref(),
        &state.settings,
        &address,
        BatchKind::DeleteSelected,
        |_, builder| builder.add_delete_names(&selected),
    )
    .await?;
    Ok(render_report(report))
}

pub async fn delete_all(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let form = parse_urlencoded_body(&body);
    let address = form_address(&form)?;
    let host = state
        .registry
        .get(&address)
        .ok_or_else(|| AppError::NotFound("Server not found".to_string()))?;
    if host.accounts.is_empty() {
        return Ok(redirect_with_msg("/", "No users to delete").into_response());
    }

    // The roster is read again under the host lock; this early check only
    // decides between a redirect and a batch.
    let report = run_batch(
        &state.registry,
        state.shell.as_ref(),
        &state.settings,
        &address,
        BatchKind::DeleteAll,
        |host, builder| builder.delete_roster(host),
    )
    .await?;
    Ok(render_report(report))
}
