/// Pipeline-internal knobs, separate from the service-wide `AppConfig` so
/// tests can tighten retry timing without touching global settings.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub tuning: IngestionTuning,
}

#[derive(Debug, Clone)]
pub struct IngestionTuning {
    pub retry_base_delay_secs: u64,
    pub retry_max_delay_secs: u64,
    /// Attempts past this exponent stop growing the backoff.
    pub retry_backoff_cap_exponent: u32,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            tuning: IngestionTuning {
                retry_base_delay_secs: 5,
                retry_max_delay_secs: 300,
                retry_backoff_cap_exponent: 5,
            },
        }
    }
}
