use std::fmt;

/// Why a row was left out of the script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
    TooFewColumns { expected: usize, found: usize },
    Malformed(String),
    EmptyFields,
    EmptyUsername,
    InvalidUsername(String),
    /// Password holds a line break or NUL, which would split the statement.
    MultiLinePassword(String),
}

/// One rejected row. Rows are numbered from 1 with the header as row 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub row: usize,
    pub reason: RejectReason,
    pub fields: Vec<String>,
}

impl Diagnostic {
    pub fn new(row: usize, reason: RejectReason, fields: Vec<String>) -> Self {
        Diagnostic { row, reason, fields }
    }

    pub fn too_few_columns(row: usize, expected: usize, fields: Vec<String>) -> Self {
        let found = fields.len();
        Diagnostic::new(row, RejectReason::TooFewColumns { expected, found }, fields)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            RejectReason::TooFewColumns { expected, found } => write!(
                f,
                "❌ Skipped invalid row {}: {:?} (expected {} columns, found {})",
                self.row, self.fields, expected, found
            ),
            RejectReason::Malformed(e) => {
                write!(f, "❌ Skipped invalid row {}: {}", self.row, e)
            }
            RejectReason::EmptyFields => {
                write!(f, "❌ Skipped empty fields in row {}: {:?}", self.row, self.fields)
            }
            RejectReason::EmptyUsername => {
                write!(f, "❌ Skipped empty username in row {}", self.row)
            }
            RejectReason::InvalidUsername(name) => write!(
                f,
                "❌ Skipped row {}: username {:?} contains characters not allowed in a login name",
                self.row, name
            ),
            RejectReason::MultiLinePassword(name) => write!(
                f,
                "❌ Skipped row {}: password for {:?} contains a line break",
                self.row, name
            ),
        }
    }
}
