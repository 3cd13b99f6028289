//! Request/limit computation from an instance's samples
//!
//! Requests are sized on the most common value among high-utilization
//! samples (those at or above the request percentile of a reference
//! dimension), after quantization. Limits are sized on peaks with a buffer.

use super::policy::{RecommendationPolicy, MEMORY_ROUNDING_STEP};
use super::stats;
use crate::models::{Dimension, Recommendation, Sample};

/// Computes one instance's current recommendation
#[derive(Debug, Clone)]
pub struct RecommendationAlgorithm {
    policy: RecommendationPolicy,
}

impl RecommendationAlgorithm {
    pub fn new(policy: RecommendationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RecommendationPolicy {
        &self.policy
    }

    /// Compute all four fields. No samples yields an unknown recommendation.
    pub fn recommend(&self, samples: &[Sample]) -> Recommendation {
        if samples.is_empty() {
            return Recommendation::UNKNOWN;
        }

        let rss_request =
            self.memory_requests(samples, self.policy.memory_selection, Dimension::Rss);

        Recommendation {
            cpu_request: self.cpu_requests(samples),
            cpu_limit: self.cpu_limit(samples),
            rss_request,
            rss_limit: self.memory_limit(samples, rss_request),
        }
    }

    /// Peak CPU times the buffer factor, rounded half-up to one decimal.
    ///
    /// Never below the observed peak: when rounding would drop under it, the
    /// peak rounded up to one decimal is used instead.
    pub fn cpu_limit(&self, samples: &[Sample]) -> Option<f64> {
        let peak = stats::max(&values(samples, Dimension::Cpu))?;
        let limit = stats::round_half_up(peak * self.policy.cpu_buffer_factor, 1)
            .max(stats::ceil_to_decimals(peak, 1));
        Some(limit.max(self.policy.min_cpu_limit))
    }

    /// Mode of the high-utilization CPU values, each rounded up to one decimal
    pub fn cpu_requests(&self, samples: &[Sample]) -> Option<f64> {
        if !self.policy.cpu_requests_enforceable {
            return None;
        }
        let quantized: Vec<f64> = self
            .select_upper(samples, Dimension::Cpu)
            .map(|s| stats::ceil_to_decimals(s.cpu, 1))
            .collect();

        let request = stats::mode(&quantized)?;
        Some(request.max(self.policy.min_cpu_request))
    }

    /// Mode of `target` values, rounded up to a multiple of 5, over the
    /// samples in the upper percentile of `reference`.
    pub fn memory_requests(
        &self,
        samples: &[Sample],
        reference: Dimension,
        target: Dimension,
    ) -> Option<f64> {
        let quantized: Vec<f64> = self
            .select_upper(samples, reference)
            .map(|s| stats::ceil_to_multiple(s.value(target), MEMORY_ROUNDING_STEP))
            .collect();

        stats::mode(&quantized)
    }

    /// The larger of requests plus the largest spike (floored) and peak RSS
    /// times the buffer factor
    pub fn memory_limit(&self, samples: &[Sample], memory_requests: Option<f64>) -> Option<f64> {
        let rss = values(samples, Dimension::Rss);
        let buffered_peak = stats::max(&rss)? * self.policy.memory_buffer_factor;

        let limit = match memory_requests {
            Some(requests) => {
                let spike = stats::largest_spike(&rss).max(self.policy.spike_floor);
                (requests + spike).max(buffered_peak)
            }
            None => buffered_peak,
        };
        Some(limit)
    }

    /// Samples whose `reference` value reaches the request percentile
    fn select_upper<'a>(
        &self,
        samples: &'a [Sample],
        reference: Dimension,
    ) -> impl Iterator<Item = &'a Sample> + 'a {
        let threshold = stats::percentile(&values(samples, reference), self.policy.request_percentile)
            .unwrap_or(f64::INFINITY);

        samples
            .iter()
            .filter(move |s| s.value(reference) >= threshold)
    }
}

impl Default for RecommendationAlgorithm {
    fn default() -> Self {
        Self::new(RecommendationPolicy::default())
    }
}

fn values(samples: &[Sample], dimension: Dimension) -> Vec<f64> {
    samples.iter().map(|s| s.value(dimension)).collect()
}
