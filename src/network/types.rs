use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::transport::HttpResponse;
use crate::error::TransportError;

/// One logical outbound call, across all of its retry attempts.
///
/// Invariant: once `end_time` is set the record is terminal and no method
/// mutates it again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequestRecord {
    pub id: String,
    pub sequence: u64,
    pub url: String,
    pub method: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub duration_ms: Option<f64>,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub retry_count: u32,
}

impl NetworkRequestRecord {
    pub fn new(sequence: u64, method: &str, url: &str, start_time: i64) -> Self {
        Self {
            id: format!("{}-{}-{}", method, url, start_time),
            sequence,
            url: url.to_string(),
            method: method.to_string(),
            start_time,
            end_time: None,
            duration_ms: None,
            status: None,
            error: None,
            retry_count: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn is_success(&self) -> bool {
        self.is_terminal() && self.error.is_none() && self.status.is_some_and(|s| s < 400)
    }

    pub fn is_error(&self) -> bool {
        self.is_terminal() && !self.is_success()
    }

    /// Returns `false` if the record is already terminal.
    pub(crate) fn record_retry(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.retry_count += 1;
        true
    }

    /// Seals the record with the final outcome. Returns `false` if it was
    /// already terminal.
    pub(crate) fn complete(
        &mut self,
        duration_ms: f64,
        outcome: &Result<HttpResponse, TransportError>,
    ) -> bool {
        if self.is_terminal() {
            return false;
        }
        match outcome {
            Ok(response) => self.status = Some(response.status),
            Err(e) => self.error = Some(e.to_string()),
        }
        self.duration_ms = Some(duration_ms);
        self.end_time = Some(self.start_time + duration_ms.round() as i64);
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub total_requests: u64,
    pub pending_requests: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub error_rate: f64,
    pub average_response_time_ms: f64,
    pub slow_requests: u64,
    pub total_retries: u64,
    pub status_codes: BTreeMap<u16, u64>,
}

pub fn compute_stats(records: &[NetworkRequestRecord], slow_threshold_ms: f64) -> NetworkStats {
    let mut stats = NetworkStats {
        total_requests: records.len() as u64,
        ..NetworkStats::default()
    };

    let mut terminal = 0u64;
    let mut total_duration = 0.0;

    for record in records {
        stats.total_retries += record.retry_count as u64;

        if !record.is_terminal() {
            stats.pending_requests += 1;
            continue;
        }
        terminal += 1;

        if record.is_success() {
            stats.success_count += 1;
        } else {
            stats.error_count += 1;
        }
        if let Some(status) = record.status {
            *stats.status_codes.entry(status).or_insert(0) += 1;
        }
        let duration = record.duration_ms.unwrap_or_default();
        total_duration += duration;
        if duration > slow_threshold_ms {
            stats.slow_requests += 1;
        }
    }

    if terminal > 0 {
        stats.average_response_time_ms = total_duration / terminal as f64;
        stats.error_rate = stats.error_count as f64 / terminal as f64;
    }

    stats
}
