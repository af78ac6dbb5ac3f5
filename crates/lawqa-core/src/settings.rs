//! Pipeline tunables shared by the host pipeline and the batch driver.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Batch-level exit code: the completion service reported exhausted billing.
pub const BALANCE_DEPLETION_EXIT_CODE: i32 = 2;
/// Batch-level exit code: the batch wall-clock limit expired.
pub const TIME_LIMIT_EXIT_CODE: i32 = 3;

/// Per-question pipeline settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Wall-clock budget for the whole question pipeline.
    pub question_budget: Duration,
    /// Budget for the degraded-answer path once `question_budget` expires.
    pub fallback_budget: Duration,
    /// Pause between pipeline stages, for external rate limits.
    pub stage_delay: Duration,
    /// Execution attempts per task: one initial run plus repairs.
    pub max_execution_attempts: u32,
    /// Fresh syntheses allowed when generated code is structurally broken.
    pub synthesis_attempts: u32,
    /// Attempts for each completion or lookup call.
    pub service_attempts: u32,
    pub service_base_delay: Duration,
    /// `max_tokens` for code synthesis and repair completions.
    pub code_max_tokens: u32,
    /// Upper bound on standardized-name variants requested per mention.
    pub max_name_variants: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            question_budget: Duration::from_secs(280),
            fallback_budget: Duration::from_secs(280),
            stage_delay: Duration::from_secs(3),
            max_execution_attempts: 4,
            synthesis_attempts: 3,
            service_attempts: 3,
            service_base_delay: Duration::from_secs(1),
            code_max_tokens: 3072,
            max_name_variants: 5,
        }
    }
}

impl Settings {
    /// Settings with no waiting anywhere, for tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            stage_delay: Duration::ZERO,
            service_base_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Retry policy for external calls with the given retryable predicate.
    pub fn service_retry<E: std::error::Error + 'static>(
        &self,
        retryable: fn(&E) -> bool,
    ) -> RetryPolicy<E> {
        RetryPolicy::new(self.service_attempts, self.service_base_delay, retryable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment() {
        let s = Settings::default();
        assert_eq!(s.question_budget, Duration::from_secs(280));
        assert_eq!(s.max_execution_attempts, 4);
        assert_eq!(s.stage_delay, Duration::from_secs(3));
    }

    #[test]
    fn immediate_has_no_delays() {
        let s = Settings::immediate();
        assert!(s.stage_delay.is_zero());
        assert!(s.service_base_delay.is_zero());
        assert_eq!(s.service_attempts, 3);
    }
}
