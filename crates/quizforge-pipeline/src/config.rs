//! Pipeline configuration.

use std::time::Duration;

/// Tunable knobs for one orchestrator instance. Defaults match the values
/// the stages were calibrated against; override with the `with_*` builders.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Questions the blueprint aims for.
    pub target_question_count: usize,
    /// Minimum fraction of the target that must survive generation before
    /// the run is considered a failure.
    pub min_generated_fraction: f64,
    /// Jaccard similarity at or above which two stems count as duplicates.
    pub dedup_similarity_threshold: f64,
    /// Mastery below this marks a knowledge point as weak.
    pub mastery_threshold: f64,
    /// Maximum targeted-regeneration rounds during quality review.
    pub coverage_rounds_max: usize,
    /// Knowledge points kept after weighting (highest weight first).
    pub max_knowledge_points: usize,
    /// Per-call deadline for language-model requests.
    pub llm_timeout: Duration,
    /// Per-call deadline for knowledge-source queries.
    pub knowledge_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_question_count: 10,
            min_generated_fraction: 0.5,
            dedup_similarity_threshold: 0.85,
            mastery_threshold: 0.6,
            coverage_rounds_max: 2,
            max_knowledge_points: 20,
            llm_timeout: Duration::from_secs(60),
            knowledge_timeout: Duration::from_secs(30),
        }
    }
}

impl PipelineConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_target_question_count(mut self, count: usize) -> Self {
        self.target_question_count = count;
        self
    }

    #[must_use]
    pub fn with_min_generated_fraction(mut self, fraction: f64) -> Self {
        self.min_generated_fraction = fraction;
        self
    }

    #[must_use]
    pub fn with_dedup_similarity_threshold(mut self, threshold: f64) -> Self {
        self.dedup_similarity_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_mastery_threshold(mut self, threshold: f64) -> Self {
        self.mastery_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_coverage_rounds_max(mut self, rounds: usize) -> Self {
        self.coverage_rounds_max = rounds;
        self
    }

    #[must_use]
    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_knowledge_timeout(mut self, timeout: Duration) -> Self {
        self.knowledge_timeout = timeout;
        self
    }

    /// Smallest acceptable bank size after generation.
    #[must_use]
    pub fn min_generated_count(&self) -> usize {
        let min = (self.target_question_count as f64 * self.min_generated_fraction).ceil();
        (min as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let config = PipelineConfig::new()
            .with_target_question_count(20)
            .with_mastery_threshold(0.5);
        assert_eq!(config.target_question_count, 20);
        assert!((config.mastery_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.coverage_rounds_max, 2);
    }

    #[test]
    fn min_generated_count_rounds_up() {
        let config = PipelineConfig::new().with_target_question_count(7);
        // ceil(7 * 0.5) = 4
        assert_eq!(config.min_generated_count(), 4);

        let config = PipelineConfig::new()
            .with_target_question_count(1)
            .with_min_generated_fraction(0.1);
        assert_eq!(config.min_generated_count(), 1);
    }
}
