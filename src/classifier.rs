//! Mapping of a normalized target status to a numeric code and a bounded
//! error category.
//!
//! The category vocabulary is closed so the `category` label can never grow
//! beyond `ErrorCategory::ALL.len()` values per target.

use std::fmt;

use crate::source::NormalizedMetric;

/// Status code exported for healthy targets.
pub const STATUS_OK: u16 = 0;
/// Status code exported when no HTTP code could be recognised.
pub const STATUS_GENERIC: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Healthy,
    Http5xx,
    Http404,
    Http403,
    Timeout,
    Unknown,
    Other,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 7] = [
        ErrorCategory::Healthy,
        ErrorCategory::Http5xx,
        ErrorCategory::Http404,
        ErrorCategory::Http403,
        ErrorCategory::Timeout,
        ErrorCategory::Unknown,
        ErrorCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Healthy => "OK",
            ErrorCategory::Http5xx => "http_5xx",
            ErrorCategory::Http404 => "http_404",
            ErrorCategory::Http403 => "http_403",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Unknown => "unknown",
            ErrorCategory::Other => "other",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status_code: u16,
    pub category: ErrorCategory,
}

impl Classification {
    const fn new(status_code: u16, category: ErrorCategory) -> Self {
        Self {
            status_code,
            category,
        }
    }
}

/// First match wins: 500, 404, 403, then timeout, then unknown/other.
pub fn classify(metric: &NormalizedMetric) -> Classification {
    classify_parts(metric.health, metric.info_msg.as_deref())
}

/// Same as [`classify`] on the two inputs it actually reads.
pub fn classify_parts(health: u8, info_msg: Option<&str>) -> Classification {
    if health == 0 {
        return Classification::new(STATUS_OK, ErrorCategory::Healthy);
    }

    let Some(info) = info_msg else {
        return Classification::new(STATUS_GENERIC, ErrorCategory::Unknown);
    };

    if info.contains("500") {
        Classification::new(500, ErrorCategory::Http5xx)
    } else if info.contains("404") {
        Classification::new(404, ErrorCategory::Http404)
    } else if info.contains("403") {
        Classification::new(403, ErrorCategory::Http403)
    } else if info.to_lowercase().contains("timeout") {
        Classification::new(STATUS_GENERIC, ErrorCategory::Timeout)
    } else {
        Classification::new(STATUS_GENERIC, ErrorCategory::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_ignores_info() {
        let c = classify_parts(0, Some("HTTP 500 earlier"));
        assert_eq!(c, Classification::new(0, ErrorCategory::Healthy));
        assert_eq!(c.category.as_str(), "OK");
    }

    #[test]
    fn test_http_codes() {
        assert_eq!(
            classify_parts(1, Some("Server returned 500 Internal Server Error")),
            Classification::new(500, ErrorCategory::Http5xx)
        );
        assert_eq!(
            classify_parts(1, Some("404 Not Found")),
            Classification::new(404, ErrorCategory::Http404)
        );
        assert_eq!(
            classify_parts(1, Some("403 Forbidden")),
            Classification::new(403, ErrorCategory::Http403)
        );
    }

    #[test]
    fn test_first_match_wins() {
        // 500 is checked before 404 and before timeout.
        assert_eq!(
            classify_parts(1, Some("timeout after 404 then 500")).category,
            ErrorCategory::Http5xx
        );
        assert_eq!(
            classify_parts(1, Some("Timeout fetching 403 page")).category,
            ErrorCategory::Http403
        );
    }

    #[test]
    fn test_timeout_is_case_insensitive() {
        assert_eq!(
            classify_parts(1, Some("Timeout occurred")),
            Classification::new(1, ErrorCategory::Timeout)
        );
        assert_eq!(
            classify_parts(1, Some("connection TIMEOUT")).category,
            ErrorCategory::Timeout
        );
    }

    #[test]
    fn test_absent_and_unrecognised_info() {
        assert_eq!(
            classify_parts(1, None),
            Classification::new(1, ErrorCategory::Unknown)
        );
        assert_eq!(
            classify_parts(1, Some("weird")),
            Classification::new(1, ErrorCategory::Other)
        );
    }

    #[test]
    fn test_deterministic() {
        for info in [None, Some("500"), Some("Timeout"), Some("weird")] {
            assert_eq!(classify_parts(1, info), classify_parts(1, info));
        }
    }

    #[test]
    fn test_category_labels_are_unique() {
        let mut labels: Vec<&str> = ErrorCategory::ALL.iter().map(|c| c.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), ErrorCategory::ALL.len());
    }
}
