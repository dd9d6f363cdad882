use super::types::ResourceStats;
use crate::config::ResourceConfig;

const TOTAL_PAYLOAD_LIMIT: u64 = 5 * 1024 * 1024;
const SLOW_AVERAGE_DURATION_MS: f64 = 1000.0;
const COMPRESSION_RATIO_LIMIT: f64 = 4.0;

/// Static optimization rules over aggregated resource stats.
pub fn generate_suggestions(stats: &ResourceStats, config: &ResourceConfig) -> Vec<String> {
    let mut suggestions = Vec::new();

    if stats.total_size > TOTAL_PAYLOAD_LIMIT {
        suggestions.push(format!(
            "Total resource payload is {:.1}MB; consider code splitting and lazy loading",
            stats.total_size as f64 / (1024.0 * 1024.0)
        ));
    }

    for (kind, type_stats) in &stats.by_type {
        let threshold = config.size_threshold(kind);
        if type_stats.average_size > threshold as f64 {
            suggestions.push(format!(
                "Average {} size is {:.0}KB, above the {:.0}KB threshold; minify or split these resources",
                kind,
                type_stats.average_size / 1024.0,
                threshold as f64 / 1024.0
            ));
        }

        if type_stats.total_encoded_size > 0 {
            let ratio = type_stats.total_decoded_size as f64 / type_stats.total_encoded_size as f64;
            if ratio > COMPRESSION_RATIO_LIMIT {
                suggestions.push(format!(
                    "{} resources have a {:.1}x decoded/encoded ratio; review compression settings for them",
                    kind, ratio
                ));
            }
        }
    }

    if stats.average_duration > SLOW_AVERAGE_DURATION_MS {
        suggestions.push(format!(
            "Average resource load time is {:.0}ms; consider a CDN or preloading critical resources",
            stats.average_duration
        ));
    }

    suggestions
}
