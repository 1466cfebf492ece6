use serde::{Deserialize, Serialize};

/// Auto-retry tuning. Mirrors `RetrySettings` in `settings_manager.py`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            base_delay_ms: 2000,
            max_delay_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff for the given attempt (1-indexed), capped at
    /// `max_delay_ms`.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let shift = attempt.saturating_sub(1).min(32);
        let delay = self.base_delay_ms.saturating_mul(1u64 << shift);
        delay.min(self.max_delay_ms)
    }
}

/// Auto-compaction tuning. Mirrors `CompactionSettings`/
/// `DEFAULT_COMPACTION_SETTINGS` in `compaction.py`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionPolicy {
    pub enabled: bool,
    pub reserve_tokens: u64,
    pub keep_recent_tokens: u64,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            reserve_tokens: 16_384,
            keep_recent_tokens: 20_000,
        }
    }
}

/// Everything a [`crate::controller::SessionController`] needs beyond what
/// it's handed directly (model catalog, session manager, tools). Plain,
/// `serde`-derived data — nothing here reads a config file itself; that's
/// an external-loader concern (§1 Non-goals).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub retry: RetryPolicy,
    pub compaction: CompactionPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_ms(1), 2000);
        assert_eq!(policy.delay_ms(2), 4000);
        assert_eq!(policy.delay_ms(3), 8000);
        assert_eq!(policy.delay_ms(20), 60_000);
    }
}
