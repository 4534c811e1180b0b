//! One batch, end to end, against one host.

use std::fmt::Write as _;

use crate::config::Settings;
use crate::models::HostRecord;
use crate::services::registry::HostRegistry;

use super::executor::{RemoteShell, RemoteTarget};
use super::script::{ScriptBuilder, ScriptPlan};

/// Which kind of request produced the batch. Drives the log narrative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchKind {
    Create,
    DeleteSheet,
    DeleteSingle,
    DeleteSelected,
    DeleteAll,
    Install,
}

impl BatchKind {
    pub fn label(&self) -> &'static str {
        match self {
            BatchKind::Create => "create accounts",
            BatchKind::DeleteSheet => "delete accounts from sheet",
            BatchKind::DeleteSingle => "delete account",
            BatchKind::DeleteSelected => "delete selected accounts",
            BatchKind::DeleteAll => "delete all accounts",
            BatchKind::Install => "install software",
        }
    }

    /// Heading for the rendered log page.
    pub fn title(&self) -> &'static str {
        match self {
            BatchKind::Create => "User Creation Log",
            BatchKind::DeleteSheet => "User Deletion Log",
            BatchKind::DeleteSingle => "Delete User",
            BatchKind::DeleteSelected => "Delete Selected Users",
            BatchKind::DeleteAll => "Delete All Users",
            BatchKind::Install => "Software Installation Log",
        }
    }
}

/// What happened on the remote side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteStatus {
    /// Nothing valid to run, so no session was opened.
    Skipped,
    /// The shell ran; a non-zero status only says the last line failed.
    Completed { exit_status: Option<i32> },
    /// Connection, authentication, session or deadline failure.
    Failed(String),
}

impl RemoteStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, RemoteStatus::Failed(_))
            || matches!(self, RemoteStatus::Completed { exit_status: Some(code) } if *code != 0)
    }
}

/// Result of one batch.
///
/// `intended` lists the usernames the script targeted. The roster has already
/// been reconciled against that set, whatever `remote` says: it reflects
/// intended, not confirmed, remote state.
#[derive(Clone, Debug)]
pub struct BatchReport {
    pub address: String,
    pub kind: BatchKind,
    pub log: String,
    pub intended: Vec<String>,
    pub statements: usize,
    pub rejected: usize,
    pub remote: RemoteStatus,
    pub roster_size: usize,
    pub persist_error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("❌ IP not found in records: {0}")]
    UnknownHost(String),
}

/// Run one batch against `address`.
///
/// The host stays locked from plan to persist, so two batches against the
/// same host never interleave. `fill` populates the script builder from the
/// locked host record.
pub async fn run_batch<F>(
    registry: &HostRegistry,
    shell: &dyn RemoteShell,
    settings: &Settings,
    address: &str,
    kind: BatchKind,
    fill: F,
) -> Result<BatchReport, BatchError>
where
    F: FnOnce(&HostRecord, &mut ScriptBuilder<'_>),
{
    let unknown = || BatchError::UnknownHost(address.to_string());
    let guard = registry.lock_host(address).await.map_err(|_| unknown())?;
    let host = registry.get(address).ok_or_else(unknown)?;

    let plan = {
        let mut builder = ScriptBuilder::new(&host.root_password, settings.package_manager);
        fill(&host, &mut builder);
        builder.finish()
    };

    let mut log = String::new();
    for d in &plan.diagnostics {
        let _ = writeln!(log, "{}", d);
    }
    write_preamble(&mut log, kind, address, &plan, settings);

    let remote = if plan.is_empty() {
        if kind != BatchKind::Install {
            log.push_str("⚠️ No valid user entries found.\n");
        }
        RemoteStatus::Skipped
    } else {
        let target = RemoteTarget {
            address: address.to_string(),
            port: settings.ssh_port,
            username: host.root_username.clone(),
            secret: host.root_password.clone(),
        };
        match shell.run_script(&target, &plan.script).await {
            Ok(output) => {
                write_outcome(&mut log, kind, None, output.exit_status);
                log.push_str(&output.transcript);
                if !output.transcript.is_empty() && !output.transcript.ends_with('\n') {
                    log.push('\n');
                }
                RemoteStatus::Completed {
                    exit_status: output.exit_status,
                }
            }
            Err(e) => {
                tracing::warn!(address, %e, kind = kind.label(), "Remote batch failed");
                write_outcome(&mut log, kind, Some(&e.to_string()), None);
                RemoteStatus::Failed(e.to_string())
            }
        }
    };

    let roster = super::reconcile::reconcile(&host.accounts, &plan.intent);
    let roster_size = roster.len();
    let persist_error = if plan.intent.is_empty() {
        None
    } else {
        match registry.replace_accounts(&guard, roster).await {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(address, %e, "Failed to persist host registry");
                let _ = writeln!(log, "❌ Failed to save host records: {}", e);
                Some(e.to_string())
            }
        }
    };

    if kind == BatchKind::DeleteAll && persist_error.is_none() {
        let _ = writeln!(log, "\n✅ All users have been deleted from server {}", address);
    }

    let report = BatchReport {
        address: address.to_string(),
        kind,
        log,
        intended: plan.intent.usernames(),
        statements: plan.statement_count(),
        rejected: plan.diagnostics.len(),
        remote,
        roster_size,
        persist_error,
    };
    tracing::info!(
        address,
        kind = report.kind.label(),
        statements = report.statements,
        rejected = report.rejected,
        roster = report.roster_size,
        "Batch complete"
    );
    Ok(report)
}

fn write_preamble(log: &mut String, kind: BatchKind, address: &str, plan: &ScriptPlan, settings: &Settings) {
    let targets = plan.intent.usernames();
    match kind {
        BatchKind::DeleteSelected => {
            let _ = writeln!(log, "🗑️ Deleting {} selected users from {}\n", targets.len(), address);
        }
        BatchKind::DeleteAll | BatchKind::DeleteSheet if !targets.is_empty() => {
            if kind == BatchKind::DeleteAll {
                let _ = writeln!(log, "🗑️ Deleting ALL {} users from server {}\n", targets.len(), address);
            } else {
                let _ = writeln!(log, "🗑️ Deleting {} users from server {}\n", targets.len(), address);
            }
            log.push_str("Users being deleted:\n");
            for name in &targets {
                let _ = writeln!(log, "- {}", name);
            }
            log.push_str("\nExecution Log:\n");
        }
        BatchKind::Install => {
            log.push_str("📦 Software Installation Log\n\n");
            let _ = writeln!(log, "Server: {}", address);
            for op in &plan.operations {
                let _ = writeln!(log, "Command: {}", op.describe(settings.package_manager));
            }
            log.push('\n');
        }
        _ => {}
    }
}

fn write_outcome(log: &mut String, kind: BatchKind, error: Option<&str>, exit_status: Option<i32>) {
    match (kind, error) {
        (BatchKind::Install, Some(e)) => {
            let _ = writeln!(log, "❌ Installation failed: {}\n", e);
        }
        (BatchKind::Install, None) => {
            match exit_status {
                Some(code) if code != 0 => {
                    let _ = writeln!(log, "❌ Installation failed: exit status {}\n", code);
                }
                _ => log.push_str("✅ Installation command executed successfully\n\n"),
            }
            log.push_str("Output:\n");
        }
        (_, Some(e)) => {
            let _ = writeln!(log, "❌ Remote script execution failed: {}", e);
        }
        (_, None) => {
            if let Some(code) = exit_status.filter(|c| *c != 0) {
                let _ = writeln!(log, "❌ Remote script execution failed: exit status {}", code);
            }
        }
    }
}
