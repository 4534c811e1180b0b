use thiserror::Error;

use crate::provision::script::{sanitize_package_name, Operation};

/// One allow-listed software bundle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Software {
    pub name: &'static str,
    pub description: &'static str,
    pub packages: &'static [&'static str],
}

impl Software {
    pub fn package_list(&self) -> String {
        self.packages.join(" ")
    }
}

pub const CATALOG: &[Software] = &[
    Software { name: "nginx", description: "Web server", packages: &["nginx"] },
    Software { name: "python3", description: "Python programming language", packages: &["python3"] },
    Software { name: "nodejs", description: "JavaScript runtime", packages: &["nodejs", "npm"] },
    Software { name: "git", description: "Version control system", packages: &["git"] },
    Software { name: "docker", description: "Container platform", packages: &["docker"] },
    Software { name: "postgresql", description: "SQL database", packages: &["postgresql"] },
    Software { name: "mysql", description: "MySQL database", packages: &["mysql", "mysql-client"] },
    Software { name: "vim", description: "Text editor", packages: &["vim"] },
    Software { name: "curl", description: "Command line tool for transferring data", packages: &["curl"] },
    Software { name: "wget", description: "Command line tool for retrieving files", packages: &["wget"] },
];

pub fn find(name: &str) -> Option<&'static Software> {
    CATALOG.iter().find(|s| s.name == name)
}

/// What the operator asked to install.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstallRequest {
    /// An entry of [`CATALOG`] by name.
    Catalog(String),
    /// A free-text package name; sanitized before use.
    Custom(String),
}

impl InstallRequest {
    /// Build from the `software_type` / `common_software` / `custom_software` form trio.
    pub fn from_form(kind: &str, common: Option<&str>, custom: Option<&str>) -> Result<Self, CatalogError> {
        match kind.trim() {
            "common" => Ok(InstallRequest::Catalog(common.unwrap_or("").trim().to_string())),
            "custom" => {
                let custom = custom.unwrap_or("").trim();
                if custom.is_empty() {
                    return Err(CatalogError::MissingCustom);
                }
                Ok(InstallRequest::Custom(custom.to_string()))
            }
            other => Err(CatalogError::InvalidKind(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Selected software not found: {0}")]
    UnknownSoftware(String),

    #[error("Custom software name is required")]
    MissingCustom,

    #[error("Package name {0:?} has nothing left after sanitization")]
    EmptyAfterSanitize(String),

    #[error("Invalid software type: {0:?}")]
    InvalidKind(String),

    #[error("Package name {0:?} must not start with '-'")]
    OptionLikeName(String),
}

/// Turn a request into the install operation it allows.
pub fn resolve_install(request: &InstallRequest) -> Result<Operation, CatalogError> {
    match request {
        InstallRequest::Catalog(name) => {
            let software = find(name).ok_or_else(|| CatalogError::UnknownSoftware(name.clone()))?;
            Ok(Operation::InstallPackage {
                packages: software.packages.iter().map(|p| p.to_string()).collect(),
            })
        }
        InstallRequest::Custom(raw) => {
            let package = sanitize_package_name(raw);
            if package.is_empty() {
                return Err(CatalogError::EmptyAfterSanitize(raw.clone()));
            }
            if package.starts_with('-') {
                return Err(CatalogError::OptionLikeName(package));
            }
            Ok(Operation::InstallPackage { packages: vec![package] })
        }
    }
}
