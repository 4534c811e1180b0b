use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::response::Response;

use crate::error::AppError;
use crate::models::AppState;
use crate::provision::batch::{run_batch, BatchKind};
use crate::services::{resolve_install, InstallRequest, CATALOG};
use crate::templates::SoftwareTemplate;
use crate::utils::{first_value, parse_urlencoded_body};

use super::helpers::{host_addresses, render_report, render_template, FlashQuery};

pub async fn software_get(State(state): State<AppState>, Query(flash): Query<FlashQuery>) -> Response {
    let globals = flash.globals();
    render_template(SoftwareTemplate {
        flash_messages: globals.flash_messages,
        has_flash_messages: globals.has_flash_messages,
        version: globals.version,
        addresses: host_addresses(&state),
        catalog: CATALOG,
        package_manager: state.settings.package_manager.as_str(),
    })
}

pub async fn install_software(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let form = parse_urlencoded_body(&body);
    let address = first_value(&form, "server_ip")
        .or_else(|| first_value(&form, "ip"))
        .ok_or_else(|| AppError::bad_request("Server IP is required"))?
        .to_string();
    if !state.registry.contains(&address) {
        return Err(AppError::NotFound("Server not found".to_string()));
    }

    let request = InstallRequest::from_form(
        first_value(&form, "software_type").unwrap_or(""),
        first_value(&form, "common_software"),
        first_value(&form, "custom_software"),
    )?;
    let operation = resolve_install(&request)?;
    tracing::info!(address = %address, ?request, "Installing software");

    let report = run_batch(
        &state.registry,
        state.shell.as_ref(),
        &state.settings,
        &address,
        BatchKind::Install,
        |_, builder| builder.push(operation),
    )
    .await?;
    Ok(render_report(report))
}
