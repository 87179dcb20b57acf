use std::time::Duration;

/// Scheduling and retry policy for the mutation batcher, loaded from
/// environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Quiet period after the last edit before a flush. Reset by every edit.
    pub batch_interval: Duration,
    /// Upper bound on how long an edit may wait under continuous editing.
    /// Not reset by further edits.
    pub max_delay: Duration,
    /// Maximum entries per `send_batch` call.
    pub chunk_size: usize,
    /// Automatic retries before giving up on a batch.
    pub max_retries: u32,
    /// First retry delay; doubles on each consecutive failure.
    pub initial_backoff: Duration,
    /// How long an unload waits for its best-effort flush.
    pub unload_grace: Duration,
    /// Commands the batcher channel holds before `enqueue` reports `QueueFull`.
    pub queue_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_interval: Duration::from_millis(5_000),
            max_delay: Duration::from_millis(30_000),
            chunk_size: 50,
            max_retries: 3,
            initial_backoff: Duration::from_millis(1_000),
            unload_grace: Duration::from_millis(1_000),
            queue_capacity: 1_000,
        }
    }
}

impl SyncConfig {
    /// Load config from environment variables, falling back to defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_interval: env_millis("CORKBOARD_BATCH_INTERVAL_MS")
                .unwrap_or(defaults.batch_interval),
            max_delay: env_millis("CORKBOARD_MAX_DELAY_MS").unwrap_or(defaults.max_delay),
            chunk_size: env_parse("CORKBOARD_CHUNK_SIZE")
                .unwrap_or(defaults.chunk_size)
                .max(1),
            max_retries: env_parse("CORKBOARD_MAX_RETRIES").unwrap_or(defaults.max_retries),
            initial_backoff: env_millis("CORKBOARD_INITIAL_BACKOFF_MS")
                .unwrap_or(defaults.initial_backoff),
            unload_grace: env_millis("CORKBOARD_UNLOAD_GRACE_MS")
                .unwrap_or(defaults.unload_grace),
            queue_capacity: env_parse("CORKBOARD_QUEUE_CAPACITY")
                .unwrap_or(defaults.queue_capacity)
                .max(1),
        }
    }
}

/// Interaction tuning for the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasConfig {
    /// Pointer distance (px) within which a dragged end snaps onto a card edge.
    pub snap_radius: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self { snap_radius: 30.0 }
    }
}

impl CanvasConfig {
    pub fn from_env() -> Self {
        Self {
            snap_radius: env_parse::<f64>("CORKBOARD_SNAP_RADIUS")
                .filter(|r| r.is_finite() && *r >= 0.0)
                .unwrap_or(30.0),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}
