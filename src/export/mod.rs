//! Pure transform of an in-memory bundle into a downloadable file.

mod csv_format;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::aggregator::Snapshot;
use crate::behavior::UserActionRecord;
use crate::error::ExportError;
use crate::errors::ErrorRecord;
use crate::network::NetworkRequestRecord;
use crate::performance::PerformanceMetrics;
use crate::resource::ResourceTimingRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    Performance,
    Resources,
    Network,
    Behavior,
    Errors,
    Snapshots,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Performance => "performance",
            DataType::Resources => "resources",
            DataType::Network => "network",
            DataType::Behavior => "behavior",
            DataType::Errors => "errors",
            DataType::Snapshots => "snapshots",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExportFormat {
    Json,
    Csv,
    Excel,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xlsx",
        }
    }
}

/// Data selected for export. Absent sections were not requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportBundle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<Vec<PerformanceMetrics>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<ResourceTimingRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<Vec<NetworkRequestRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavior: Option<Vec<UserActionRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshots: Option<Vec<Snapshot>>,
}

impl ExportBundle {
    /// Requested sections, in declaration order.
    pub fn data_types(&self) -> Vec<DataType> {
        let mut types = Vec::new();
        if self.performance.is_some() {
            types.push(DataType::Performance);
        }
        if self.resources.is_some() {
            types.push(DataType::Resources);
        }
        if self.network.is_some() {
            types.push(DataType::Network);
        }
        if self.behavior.is_some() {
            types.push(DataType::Behavior);
        }
        if self.errors.is_some() {
            types.push(DataType::Errors);
        }
        if self.snapshots.is_some() {
            types.push(DataType::Snapshots);
        }
        types
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub content: Vec<u8>,
}

/// `monitoring_<types>_<yyyyMMdd_HHmmss>.<ext>`
pub fn export_filename(types: &[DataType], format: ExportFormat, at: NaiveDateTime) -> String {
    let joined = types.iter().map(|t| t.as_str()).collect::<Vec<_>>().join("-");
    format!(
        "monitoring_{}_{}.{}",
        joined,
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

pub fn export(bundle: &ExportBundle, format: ExportFormat, at: NaiveDateTime) -> Result<ExportFile, ExportError> {
    let types = bundle.data_types();
    if types.is_empty() {
        return Err(ExportError::Empty);
    }

    let (content_type, content) = match format {
        ExportFormat::Json => ("application/json", serde_json::to_vec_pretty(bundle)?),
        ExportFormat::Csv => ("text/csv", csv_format::to_csv(bundle)?),
        ExportFormat::Excel => return Err(ExportError::Unsupported("Excel")),
    };

    Ok(ExportFile {
        filename: export_filename(&types, format, at),
        content_type,
        content,
    })
}
