//! Positional fields of a raw line.
//!
//! Every procedure emits lines whose fields are separated by a fixed
//! delimiter. Field positions are the contract: position N always carries the
//! same attribute for a given procedure. [`LineFormat`] records the delimiter
//! and error position for a procedure; [`Fields`] gives typed access to the
//! split line.

use serde::{Deserialize, Serialize};

use crate::RecordParseError;

/// The resource kinds, each with its own line schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Admission applications and their checklists.
    Admission,
    /// Financial aid tracking requirements.
    FinancialAid,
    /// Registration holds.
    Holds,
    /// Indexed documents.
    Document,
}

impl ResourceKind {
    /// The default line format of the kind's procedures.
    pub fn default_format(&self) -> LineFormat {
        let error_position = match self {
            ResourceKind::Admission => 21,
            ResourceKind::FinancialAid => 14,
            ResourceKind::Holds => 17,
            ResourceKind::Document => 16,
        };
        LineFormat::new(DEFAULT_DELIMITER, error_position)
    }
}

/// The historical field delimiter.
pub const DEFAULT_DELIMITER: &str = ";";

/// Separator between reasons inside an error field.
pub const REASON_SEPARATOR: char = '|';

/// Delimiter and error position of one procedure's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineFormat {
    /// Field delimiter; may be more than one character.
    pub delimiter: String,
    /// Position of the error signal in the first line.
    pub error_position: usize,
}

impl LineFormat {
    /// Creates a format.
    pub fn new(delimiter: impl Into<String>, error_position: usize) -> Self {
        Self {
            delimiter: delimiter.into(),
            error_position,
        }
    }

    /// Splits `line` into its fields.
    pub fn fields<'a>(&self, line: &'a str) -> Fields<'a> {
        Fields::split(line, &self.delimiter)
    }
}

/// The line format of every resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFormats {
    admission: LineFormat,
    financial_aid: LineFormat,
    holds: LineFormat,
    document: LineFormat,
}

impl LineFormats {
    /// The format for `kind`.
    pub fn get(&self, kind: ResourceKind) -> &LineFormat {
        match kind {
            ResourceKind::Admission => &self.admission,
            ResourceKind::FinancialAid => &self.financial_aid,
            ResourceKind::Holds => &self.holds,
            ResourceKind::Document => &self.document,
        }
    }

    /// Replaces the format for `kind`.
    pub fn set(&mut self, kind: ResourceKind, format: LineFormat) {
        match kind {
            ResourceKind::Admission => self.admission = format,
            ResourceKind::FinancialAid => self.financial_aid = format,
            ResourceKind::Holds => self.holds = format,
            ResourceKind::Document => self.document = format,
        }
    }
}

impl Default for LineFormats {
    fn default() -> Self {
        Self {
            admission: ResourceKind::Admission.default_format(),
            financial_aid: ResourceKind::FinancialAid.default_format(),
            holds: ResourceKind::Holds.default_format(),
            document: ResourceKind::Document.default_format(),
        }
    }
}

/// The positional fields of one line.
///
/// Positions past the end of the line are absent rather than errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fields<'a> {
    values: Vec<&'a str>,
}

impl<'a> Fields<'a> {
    /// Splits `line` on `delimiter`.
    pub fn split(line: &'a str, delimiter: &str) -> Self {
        let values = if delimiter.is_empty() {
            vec![line]
        } else {
            line.split(delimiter).collect()
        };
        Self { values }
    }

    /// Number of fields present.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the line had no fields at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw field, `None` when absent or empty.
    pub fn get(&self, position: usize) -> Option<&'a str> {
        self.values
            .get(position)
            .copied()
            .filter(|value| !value.is_empty())
    }

    /// The field as owned text.
    pub fn text(&self, position: usize) -> Option<String> {
        self.get(position).map(str::to_string)
    }

    /// `true` only when the field is exactly `"Y"`.
    pub fn flag(&self, position: usize) -> bool {
        self.get(position) == Some("Y")
    }

    /// A key field that must be present.
    pub fn required(
        &self,
        position: usize,
        field: &'static str,
    ) -> Result<&'a str, RecordParseError> {
        self.get(position)
            .ok_or(RecordParseError::MissingField { field, position })
    }

    /// An integer field; absent is `None`, non-numeric is an error.
    pub fn integer(
        &self,
        position: usize,
        field: &'static str,
    ) -> Result<Option<i64>, RecordParseError> {
        self.get(position)
            .map(|value| {
                value
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| RecordParseError::InvalidNumber {
                        field,
                        value: value.to_string(),
                    })
            })
            .transpose()
    }

    /// A floating-point field; absent is `None`, non-numeric is an error.
    pub fn number(
        &self,
        position: usize,
        field: &'static str,
    ) -> Result<Option<f64>, RecordParseError> {
        self.get(position)
            .map(|value| match value.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(n),
                _ => Err(RecordParseError::InvalidNumber {
                    field,
                    value: value.to_string(),
                }),
            })
            .transpose()
    }
}
