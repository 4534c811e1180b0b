//! Rendering typed provisioning operations into a POSIX shell batch script.
//!
//! Every statement is one line, is independent of the lines around it and
//! tolerates the "already exists" / "not found" outcomes, so a failing line
//! never stops the ones after it and a batch can be re-run.

use crate::models::{Account, HostRecord};

use super::diagnostics::{Diagnostic, RejectReason};
use super::reconcile::Intent;
use super::rows::RawRow;

/// Substrings removed from free-text package names before use.
pub const PACKAGE_DENYLIST: &[&str] = &[
    ";", "&&", "||", "|", ">", "<", "$", "`", "\"", "'", "(", ")", "{", "}", "[", "]", "\n", "\r",
];

const MAX_USERNAME_LEN: usize = 32;

/// Wrap a value in single quotes, escaping embedded quotes as `'\''`.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Strip shell metacharacters and keep the first whitespace-delimited token.
/// Returns an empty string when nothing survives.
pub fn sanitize_package_name(name: &str) -> String {
    let mut result = name.to_string();
    for pattern in PACKAGE_DENYLIST {
        result = result.replace(pattern, "");
    }
    result.split_whitespace().next().unwrap_or("").to_string()
}

/// Trim and replace embedded spaces with underscores.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().replace(' ', "_")
}

/// Login names may only hold ASCII letters, digits, `.`, `_` and `-`, and may
/// not start with `-` (it would be read as an option).
pub fn is_login_safe(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= MAX_USERNAME_LEN
        && !username.starts_with('-')
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Package manager used by install statements on the remote host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackageManager {
    Apk,
    Apt,
    Dnf,
}

impl PackageManager {
    pub fn from_str(s: &str) -> Option<PackageManager> {
        match s.trim().to_lowercase().as_str() {
            "apk" => Some(PackageManager::Apk),
            "apt" | "apt-get" => Some(PackageManager::Apt),
            "dnf" | "yum" => Some(PackageManager::Dnf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManager::Apk => "apk",
            PackageManager::Apt => "apt",
            PackageManager::Dnf => "dnf",
        }
    }

    pub fn update_command(&self) -> &'static str {
        match self {
            PackageManager::Apk => "apk update",
            PackageManager::Apt => "apt-get update",
            PackageManager::Dnf => "dnf makecache",
        }
    }

    pub fn install_command(&self, packages: &[String]) -> String {
        let list = packages.join(" ");
        match self {
            PackageManager::Apk => format!("apk add {}", list),
            PackageManager::Apt => format!("apt-get install -y {}", list),
            PackageManager::Dnf => format!("dnf install -y {}", list),
        }
    }
}

/// What the second column of a create sheet holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialColumn {
    /// The password itself.
    Password,
    /// A roll number; the password becomes `<name>@<roll>`.
    RollNumber,
}

impl CredentialColumn {
    pub fn from_str(s: &str) -> Option<CredentialColumn> {
        match s.trim().to_lowercase().as_str() {
            "password" => Some(CredentialColumn::Password),
            "roll" | "roll-number" | "roll_number" | "rollno" => Some(CredentialColumn::RollNumber),
            _ => None,
        }
    }
}

/// One provisioning step. Each renders to exactly one shell line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    CreateAccount { username: String, password: String },
    DeleteAccount { username: String },
    InstallPackage { packages: Vec<String> },
}

impl Operation {
    pub fn render(&self, admin_secret: &str, package_manager: PackageManager) -> String {
        match self {
            Operation::CreateAccount { username, password } => format!(
                "{} 2>/dev/null || echo {}; printf '%s\\n' {} | sudo -S chpasswd",
                sudo(admin_secret, &format!("useradd -m -s /bin/bash {}", shell_quote(username))),
                shell_quote(&format!("User {} already exists", username)),
                shell_quote(&format!("{}:{}", username, password)),
            ),
            Operation::DeleteAccount { username } => format!(
                "{} 2>/dev/null || echo {}",
                sudo(admin_secret, &format!("userdel -r {}", shell_quote(username))),
                shell_quote(&format!("User {} not found or already deleted", username)),
            ),
            Operation::InstallPackage { packages } => format!(
                "{} && {}",
                sudo(admin_secret, package_manager.update_command()),
                sudo(admin_secret, &package_manager.install_command(packages)),
            ),
        }
    }

    /// Short, secret-free description used in execution logs.
    pub fn describe(&self, package_manager: PackageManager) -> String {
        match self {
            Operation::CreateAccount { username, .. } => format!("create {}", username),
            Operation::DeleteAccount { username } => format!("delete {}", username),
            Operation::InstallPackage { packages } => package_manager.install_command(packages),
        }
    }
}

/// `printf '%s\n'` passes the value through unchanged; `echo` may expand
/// backslash escapes (dash does).
fn sudo(admin_secret: &str, command: &str) -> String {
    format!("printf '%s\\n' {} | sudo -S {}", shell_quote(admin_secret), command)
}

/// Values fed to `chpasswd` or `sudo -S` are read one per line.
pub fn is_single_line(value: &str) -> bool {
    !value.contains(['\n', '\r', '\0'])
}

/// Validate a create row into an [`Operation::CreateAccount`].
pub fn create_from_row(row: &RawRow, credential: CredentialColumn) -> Result<Operation, Diagnostic> {
    let name = row.field(0).trim();
    let second = row.field(1).trim();
    if name.is_empty() || second.is_empty() {
        return Err(Diagnostic::new(row.row, RejectReason::EmptyFields, row.fields.clone()));
    }
    let username = normalize_username(name);
    if !is_login_safe(&username) {
        return Err(Diagnostic::new(row.row, RejectReason::InvalidUsername(username), row.fields.clone()));
    }
    let password = match credential {
        CredentialColumn::Password => second.to_string(),
        CredentialColumn::RollNumber => format!("{}@{}", name, second),
    };
    if !is_single_line(&password) {
        return Err(Diagnostic::new(row.row, RejectReason::MultiLinePassword(username), row.fields.clone()));
    }
    Ok(Operation::CreateAccount { username, password })
}

/// Validate a delete row into an [`Operation::DeleteAccount`].
pub fn delete_from_row(row: &RawRow) -> Result<Operation, Diagnostic> {
    delete_from_name(row.row, row.field(0), &row.fields)
}

fn delete_from_name(row: usize, raw: &str, fields: &[String]) -> Result<Operation, Diagnostic> {
    let username = normalize_username(raw);
    if username.is_empty() {
        return Err(Diagnostic::new(row, RejectReason::EmptyUsername, fields.to_vec()));
    }
    if !is_login_safe(&username) {
        return Err(Diagnostic::new(row, RejectReason::InvalidUsername(username), fields.to_vec()));
    }
    Ok(Operation::DeleteAccount { username })
}

/// Output of a [`ScriptBuilder`]: the script, what went into it and what was left out.
#[derive(Clone, Debug)]
pub struct ScriptPlan {
    pub script: String,
    pub operations: Vec<Operation>,
    pub diagnostics: Vec<Diagnostic>,
    pub intent: Intent,
}

impl ScriptPlan {
    pub fn statement_count(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Accumulates operations and rejections for one batch against one host.
pub struct ScriptBuilder<'a> {
    admin_secret: &'a str,
    package_manager: PackageManager,
    lines: Vec<String>,
    operations: Vec<Operation>,
    diagnostics: Vec<Diagnostic>,
    intent: Intent,
}

impl<'a> ScriptBuilder<'a> {
    pub fn new(admin_secret: &'a str, package_manager: PackageManager) -> Self {
        ScriptBuilder {
            admin_secret,
            package_manager,
            lines: vec![],
            operations: vec![],
            diagnostics: vec![],
            intent: Intent::default(),
        }
    }

    pub fn push(&mut self, op: Operation) {
        match &op {
            Operation::CreateAccount { username, password } => {
                self.intent.added.push(Account::new(username.clone(), password.clone()));
            }
            Operation::DeleteAccount { username } => self.intent.removed.push(username.clone()),
            Operation::InstallPackage { .. } => {}
        }
        self.lines.push(op.render(self.admin_secret, self.package_manager));
        self.operations.push(op);
    }

    pub fn reject(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn push_or_reject(&mut self, result: Result<Operation, Diagnostic>) {
        match result {
            Ok(op) => self.push(op),
            Err(d) => self.reject(d),
        }
    }

    pub fn add_create_rows<I>(&mut self, rows: I, credential: CredentialColumn)
    where
        I: IntoIterator<Item = Result<RawRow, Diagnostic>>,
    {
        for row in rows {
            let result = row.and_then(|r| create_from_row(&r, credential));
            self.push_or_reject(result);
        }
    }

    pub fn add_delete_rows<I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = Result<RawRow, Diagnostic>>,
    {
        for row in rows {
            let result = row.and_then(|r| delete_from_row(&r));
            self.push_or_reject(result);
        }
    }

    /// Delete usernames picked directly (single or multi-select). The position
    /// in `names` stands in for the row number.
    pub fn add_delete_names(&mut self, names: &[String]) {
        for (idx, name) in names.iter().enumerate() {
            let result = delete_from_name(idx + 1, name, std::slice::from_ref(name));
            self.push_or_reject(result);
        }
    }

    /// Delete every account on the roster and clear it afterwards.
    pub fn delete_roster(&mut self, host: &HostRecord) {
        for account in &host.accounts {
            self.push(Operation::DeleteAccount {
                username: account.username.clone(),
            });
        }
        self.intent.clear = true;
    }

    pub fn finish(self) -> ScriptPlan {
        let mut script = self.lines.join("\n");
        if !script.is_empty() {
            script.push('\n');
        }
        ScriptPlan {
            script,
            operations: self.operations,
            diagnostics: self.diagnostics,
            intent: self.intent,
        }
    }
}
