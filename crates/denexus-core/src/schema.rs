//! Source schema map: which table to read for each incident dataset and
//! which of its columns become document text, identifier and metadata.

use serde::{Deserialize, Serialize};

/// Name of the column that, when listed, holds an explicit row identifier.
pub const ID_COLUMN: &str = "id";

/// Suffix appended to a source name to form its table file name.
pub const TABLE_SUFFIX: &str = "_cleaned.csv";

/// One source dataset and the columns projected out of its table.
///
/// The first column is always the content column. A later column named
/// [`ID_COLUMN`] is the row identifier; any other column is metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSchema {
    pub name: String,
    pub columns: Vec<String>,
}

impl SourceSchema {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn content_column(&self) -> Option<&str> {
        self.columns.first().map(String::as_str)
    }

    /// The explicit identifier column, if configured.
    pub fn id_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .skip(1)
            .map(String::as_str)
            .find(|c| *c == ID_COLUMN)
    }

    /// Columns carried as metadata: everything after the content column except the id.
    pub fn metadata_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .skip(1)
            .map(String::as_str)
            .filter(|c| *c != ID_COLUMN)
    }

    /// `<NAME>_cleaned.csv`
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, TABLE_SUFFIX)
    }
}

/// The incident-report corpus shipped with DeNexus.
pub fn default_sources() -> Vec<SourceSchema> {
    vec![
        SourceSchema::new("CISSM", ["event_description"]),
        SourceSchema::new("HACKMAGEDDON", ["Description"]),
        SourceSchema::new("ICSSTRIVE", ["description"]),
        SourceSchema::new("KONBRIEFING", ["description"]),
        SourceSchema::new("TISAFE", ["attack_details", "id"]),
        SourceSchema::new("WATERFALL", ["incident_summary", "id"]),
    ]
}
