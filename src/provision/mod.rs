//! Batch remote-provisioning pipeline.
//!
//! upload bytes → [`rows`] → [`script`] → [`executor`] → [`reconcile`], driven
//! end to end by [`batch::run_batch`] while the target host is locked.

pub mod batch;
pub mod diagnostics;
pub mod executor;
pub mod reconcile;
pub mod rows;
pub mod script;

pub use batch::{run_batch, BatchKind, BatchReport, RemoteStatus};
pub use diagnostics::{Diagnostic, RejectReason};
pub use executor::{ExecError, RemoteOutput, RemoteShell, RemoteTarget, SshShell};
pub use reconcile::{reconcile, Intent};
pub use rows::{extract_rows, ExtractError, RawRow, RowShape, RowStream, SheetFormat};
pub use script::{CredentialColumn, Operation, PackageManager, ScriptBuilder, ScriptPlan};
