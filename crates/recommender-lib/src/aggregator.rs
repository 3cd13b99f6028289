//! Combining instance recommendations into one per application

use crate::models::{Recommendation, RecommendationField};

/// One instance's input to the aggregate
#[derive(Debug, Clone, Copy)]
pub struct InstanceContribution {
    pub sample_count: usize,
    pub recommendation: Recommendation,
}

/// Sample-count-weighted average of each field.
///
/// Instances without samples, or without a value for a field, carry no
/// weight for that field. A field nobody contributes to stays unknown.
pub fn weighted_average(contributions: &[InstanceContribution]) -> Recommendation {
    let mut aggregate = Recommendation::UNKNOWN;

    for field in RecommendationField::ALL {
        let (weighted_sum, total_weight) = contributions
            .iter()
            .filter(|c| c.sample_count > 0)
            .filter_map(|c| c.recommendation.get(field).map(|v| (v, c.sample_count as f64)))
            .fold((0.0, 0.0), |(sum, weight), (value, count)| {
                (sum + value * count, weight + count)
            });

        if total_weight > 0.0 {
            aggregate.set(field, weighted_sum / total_weight);
        }
    }

    aggregate
}
