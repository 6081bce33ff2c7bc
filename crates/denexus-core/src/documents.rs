//! Reading the incident-report tables and normalizing each row into a [`Document`].
//!
//! Every source has its own table layout; the [`SourceSchema`] says which
//! columns to project. Rows with an empty content cell are skipped.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::schema::{SourceSchema, TABLE_SUFFIX};

/// Row identifier: the table's own `id` cell, or the row position when the
/// source has no id column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentId {
    Row(usize),
    Key(String),
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Row(n) => write!(f, "{n}"),
            DocumentId::Key(k) => f.write_str(k),
        }
    }
}

/// The atomic retrievable unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Content column value. Never empty.
    pub text: String,
    /// Name of the source dataset.
    pub source: String,
    pub id: DocumentId,
    /// Further configured columns, keyed by column name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Document {
    pub fn new(text: impl Into<String>, source: impl Into<String>, id: DocumentId) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            id,
            extra: BTreeMap::new(),
        }
    }
}

/// A `*_cleaned.csv` table found in the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFile {
    /// Source name derived from the file name (`CISSM` for `CISSM_cleaned.csv`).
    pub source: String,
    pub path: PathBuf,
}

/// Loads every configured source from `data_dir`, in schema order.
///
/// Fails on the first missing table or column; a partial corpus is never returned.
pub fn load_documents(
    sources: &[SourceSchema],
    data_dir: &Path,
) -> Result<Vec<Document>, DataLoadError> {
    let mut documents = Vec::new();
    for schema in sources {
        let before = documents.len();
        let skipped = load_source(schema, data_dir, &mut documents)?;
        tracing::info!(
            source = %schema.name,
            loaded = documents.len() - before,
            skipped,
            "loaded source table"
        );
    }
    Ok(documents)
}

/// Appends the rows of one source to `out`. Returns the number of skipped rows.
fn load_source(
    schema: &SourceSchema,
    data_dir: &Path,
    out: &mut Vec<Document>,
) -> Result<usize, DataLoadError> {
    let content_column = schema
        .content_column()
        .ok_or_else(|| DataLoadError::EmptySchema(schema.name.clone()))?;
    let path = data_dir.join(schema.file_name());
    if !path.is_file() {
        return Err(DataLoadError::MissingTable(path));
    }

    let csv_err = |source| DataLoadError::Csv {
        path: path.clone(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(false)
        .from_path(&path)
        .map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();

    let position = |column: &str| {
        headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| DataLoadError::MissingColumn {
                source_name: schema.name.clone(),
                column: column.to_string(),
                path: path.clone(),
            })
    };
    let content_at = position(content_column)?;
    let id_at = schema.id_column().map(position).transpose()?;
    let extra_at = schema
        .metadata_columns()
        .map(|c| position(c).map(|i| (c.to_string(), i)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut skipped = 0;
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let text = record.get(content_at).unwrap_or_default();
        if text.trim().is_empty() {
            skipped += 1;
            continue;
        }
        let id = match id_at.map(|i| record.get(i).unwrap_or_default().trim()) {
            Some("") => {
                tracing::debug!(source = %schema.name, row, "empty id cell, using row position");
                DocumentId::Row(row)
            }
            Some(key) => DocumentId::Key(key.to_string()),
            None => DocumentId::Row(row),
        };
        let mut doc = Document::new(text, schema.name.as_str(), id);
        for (column, i) in &extra_at {
            doc.extra
                .insert(column.clone(), record.get(*i).unwrap_or_default().to_string());
        }
        out.push(doc);
    }
    if skipped > 0 {
        tracing::debug!(source = %schema.name, skipped, "skipped rows with empty content");
    }
    Ok(skipped)
}

/// Lists the `*_cleaned.csv` tables directly under `data_dir`, sorted by source name.
pub fn scan_tables(data_dir: &Path) -> Result<Vec<TableFile>, DataLoadError> {
    if !data_dir.is_dir() {
        return Err(DataLoadError::NotADirectory(data_dir.to_path_buf()));
    }
    let mut tables = Vec::new();
    for entry in WalkDir::new(data_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| DataLoadError::Walk(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        // dotfiles and non-UTF-8 names are never tables
        let Some(name) = entry.file_name().to_str().filter(|n| !n.starts_with('.')) else {
            continue;
        };
        if let Some(source) = name.strip_suffix(TABLE_SUFFIX) {
            if !source.is_empty() {
                tables.push(TableFile {
                    source: source.to_string(),
                    path: entry.path().to_path_buf(),
                });
            }
        }
    }
    tables.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(tables)
}

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("source table not found: {0}")]
    MissingTable(PathBuf),
    #[error("column {column:?} of source {source_name} not found in {path}")]
    MissingColumn {
        source_name: String,
        column: String,
        path: PathBuf,
    },
    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("source {0} has no columns configured")]
    EmptySchema(String),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("walk error: {0}")]
    Walk(String),
}
