//! Immutable, construction-time-validated configuration for an [`crate::Analytics`] façade.

use crate::error::ConfigError;

/// Configuration for an [`crate::Analytics`] instance.
///
/// All fields are fixed at construction. Downstream shape (number of ring buckets, CMS table
/// size, HLL register count, shard stripe count) is derived from this struct once and never
/// changes for the lifetime of the façade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsConfig {
    /// Trailing window size, in seconds, that queries observe by default.
    pub window_seconds: i64,
    /// Width, in seconds, of a single ring/sketch bucket. Must divide `window_seconds`.
    pub bucket_size: i64,
    /// Number of independent hash rows in the Count-Min Sketch.
    pub cms_depth: usize,
    /// Number of columns per Count-Min Sketch row.
    pub cms_width: usize,
    /// HyperLogLog precision; register count is `2^hll_precision`.
    pub hll_precision: u8,
    /// Capacity of the bounded top-K tracker.
    pub top_k_capacity: usize,
    /// Number of lock stripes in the sharded key-lock map. Must be a power of two.
    pub num_stripes: usize,
    /// Events older than `observed_time - max_lateness_seconds` are dropped.
    pub max_lateness_seconds: i64,
    /// Capacity of the optional per-op idempotency cache.
    pub dedup_cache_size: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        AnalyticsConfig {
            window_seconds: 86_400,
            bucket_size: 10,
            cms_depth: 5,
            cms_width: 1024,
            hll_precision: 14,
            top_k_capacity: 100,
            num_stripes: 128,
            max_lateness_seconds: 86_400,
            dedup_cache_size: 100_000,
        }
    }
}

impl AnalyticsConfig {
    /// Starts from the production-tuned defaults above.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `window_seconds`, returning `self` for chaining.
    pub fn with_window_seconds(mut self, window_seconds: i64) -> Self {
        self.window_seconds = window_seconds;
        self
    }

    /// Sets `bucket_size`, returning `self` for chaining.
    pub fn with_bucket_size(mut self, bucket_size: i64) -> Self {
        self.bucket_size = bucket_size;
        self
    }

    /// Sets `cms_depth` and `cms_width`, returning `self` for chaining.
    pub fn with_cms_shape(mut self, depth: usize, width: usize) -> Self {
        self.cms_depth = depth;
        self.cms_width = width;
        self
    }

    /// Sets `hll_precision`, returning `self` for chaining.
    pub fn with_hll_precision(mut self, precision: u8) -> Self {
        self.hll_precision = precision;
        self
    }

    /// Sets `top_k_capacity`, returning `self` for chaining.
    pub fn with_top_k_capacity(mut self, capacity: usize) -> Self {
        self.top_k_capacity = capacity;
        self
    }

    /// Sets `num_stripes`, returning `self` for chaining.
    pub fn with_num_stripes(mut self, num_stripes: usize) -> Self {
        self.num_stripes = num_stripes;
        self
    }

    /// Sets `max_lateness_seconds`, returning `self` for chaining.
    pub fn with_max_lateness_seconds(mut self, max_lateness_seconds: i64) -> Self {
        self.max_lateness_seconds = max_lateness_seconds;
        self
    }

    /// Sets `dedup_cache_size`, returning `self` for chaining.
    pub fn with_dedup_cache_size(mut self, dedup_cache_size: usize) -> Self {
        self.dedup_cache_size = dedup_cache_size;
        self
    }

    /// Number of ring buckets: `ceil(window_seconds / bucket_size) + 1`.
    ///
    /// The extra slot ensures a query landing exactly on the right edge of the window still
    /// observes a full window's worth of buckets.
    pub fn num_buckets(&self) -> usize {
        let divided = (self.window_seconds + self.bucket_size - 1) / self.bucket_size;
        divided as usize + 1
    }

    /// Validates all fields, returning the config unchanged on success.
    pub fn build(self) -> Result<Self, ConfigError> {
        if self.window_seconds <= 0 {
            return Err(ConfigError::NonPositiveWindow(self.window_seconds));
        }
        if self.bucket_size <= 0 || self.window_seconds % self.bucket_size != 0 {
            return Err(ConfigError::InvalidBucketSize {
                bucket_size: self.bucket_size,
                window_seconds: self.window_seconds,
            });
        }
        if self.cms_depth == 0 || self.cms_width == 0 {
            return Err(ConfigError::InvalidCmsShape { depth: self.cms_depth, width: self.cms_width });
        }
        if !(4..=16).contains(&self.hll_precision) {
            return Err(ConfigError::InvalidHllPrecision(self.hll_precision));
        }
        if self.top_k_capacity == 0 {
            return Err(ConfigError::NonPositiveTopK);
        }
        if self.num_stripes == 0 || !self.num_stripes.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwoStripes(self.num_stripes));
        }
        if self.max_lateness_seconds < 0 {
            return Err(ConfigError::NegativeLateness(self.max_lateness_seconds));
        }
        Ok(self)
    }
}
