//! Construction-time configuration errors.

use thiserror::Error;

/// Errors that can occur while validating an [`crate::AnalyticsConfig`].
///
/// These are the only errors the core ever surfaces. Runtime mutation paths (stale events,
/// duplicate idempotency keys, unknown keys) are reported as plain booleans, never as `Result`,
/// per the façade contract.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// `window_seconds` was zero or negative.
    #[error("window_seconds must be positive, got {0}")]
    NonPositiveWindow(i64),

    /// `bucket_size` was zero, negative, or did not evenly divide `window_seconds`.
    #[error("bucket_size ({bucket_size}) must be positive and evenly divide window_seconds ({window_seconds})")]
    InvalidBucketSize { bucket_size: i64, window_seconds: i64 },

    /// `cms_depth` or `cms_width` was zero.
    #[error("cms_depth and cms_width must both be positive, got depth={depth} width={width}")]
    InvalidCmsShape { depth: usize, width: usize },

    /// `hll_precision` fell outside the supported `[4, 16]` range.
    #[error("hll_precision must be between 4 and 16, got {0}")]
    InvalidHllPrecision(u8),

    /// `top_k_capacity` was zero.
    #[error("top_k_capacity must be positive")]
    NonPositiveTopK,

    /// `num_stripes` was zero or not a power of two.
    #[error("num_stripes must be a positive power of two, got {0}")]
    NotPowerOfTwoStripes(usize),

    /// `max_lateness_seconds` was negative.
    #[error("max_lateness_seconds must be non-negative, got {0}")]
    NegativeLateness(i64),
}
