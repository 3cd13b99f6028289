//! High-water-mark merging of recommendations
//!
//! Published recommendations never decrease: each field of the watermark is
//! the maximum of every value observed for it. Unknown values never win over
//! known ones.

use crate::models::{Recommendation, RecommendationField};

/// Field-wise maximum of `watermark` and `fresh`, ignoring unknown and
/// invalid values
pub fn merge(watermark: &Recommendation, fresh: &Recommendation) -> Recommendation {
    let mut merged = *watermark;
    for field in RecommendationField::ALL {
        if let Some(value) = fresh.get(field) {
            let keep_old = merged.get(field).map(|old| old >= value).unwrap_or(false);
            if !keep_old {
                merged.set(field, value);
            }
        }
    }
    merged
}

/// Seed a watermark from the last values published before a restart.
///
/// Each field is replayed independently; fields missing from `history`, or
/// carrying unusable values, leave the watermark untouched.
pub fn recover(watermark: &Recommendation, history: &Recommendation) -> Recommendation {
    merge(watermark, history)
}

/// Fields in which `next` is higher than, or newly known compared to, `previous`
pub fn raised_fields(previous: &Recommendation, next: &Recommendation) -> Vec<RecommendationField> {
    RecommendationField::ALL
        .into_iter()
        .filter(|f| match (previous.get(*f), next.get(*f)) {
            (None, Some(_)) => true,
            (Some(old), Some(new)) => new > old,
            _ => false,
        })
        .collect()
}

/// Element-wise maximum of two fresh recommendations
pub fn elementwise_max(a: &Recommendation, b: &Recommendation) -> Recommendation {
    merge(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(cpu_req: Option<f64>, cpu_lim: Option<f64>, rss_req: Option<f64>, rss_lim: Option<f64>) -> Recommendation {
        Recommendation {
            cpu_request: cpu_req,
            cpu_limit: cpu_lim,
            rss_request: rss_req,
            rss_limit: rss_lim,
        }
    }

    #[test]
    fn test_merge_takes_maximum() {
        let old = rec(Some(1.0), Some(2.0), Some(100.0), Some(200.0));
        let new = rec(Some(0.5), Some(2.5), Some(150.0), Some(180.0));

        let merged = merge(&old, &new);
        assert_eq!(merged, rec(Some(1.0), Some(2.5), Some(150.0), Some(200.0)));
    }

    #[test]
    fn test_known_value_beats_unknown() {
        let old = rec(None, Some(2.0), None, None);
        let new = rec(Some(0.3), None, None, Some(50.0));

        let merged = merge(&old, &new);
        assert_eq!(merged, rec(Some(0.3), Some(2.0), None, Some(50.0)));
    }

    #[test]
    fn test_merge_is_monotonic() {
        let watermark = rec(Some(1.0), Some(1.2), Some(300.0), Some(400.0));
        let fresh = [
            rec(Some(0.1), Some(0.2), Some(10.0), Some(20.0)),
            Recommendation::UNKNOWN,
            rec(Some(5.0), None, Some(500.0), None),
        ];

        for r in &fresh {
            let merged = merge(&watermark, r);
            for field in RecommendationField::ALL {
                if let Some(old) = watermark.get(field) {
                    assert!(merged.get(field).unwrap() >= old);
                }
            }
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let watermark = rec(Some(1.0), None, Some(300.0), Some(400.0));
        let fresh = rec(Some(2.0), Some(1.5), Some(100.0), None);

        let once = merge(&watermark, &fresh);
        let twice = merge(&once, &fresh);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sequential_merge_equals_merge_of_maximum() {
        let w = rec(Some(1.0), None, Some(300.0), Some(320.0));
        let r1 = rec(Some(0.5), Some(2.0), None, Some(400.0));
        let r2 = rec(Some(1.5), Some(1.0), Some(250.0), None);

        let sequential = merge(&merge(&w, &r1), &r2);
        let combined = merge(&w, &elementwise_max(&r1, &r2));
        assert_eq!(sequential, combined);
    }

    #[test]
    fn test_recover_replays_fields_independently() {
        let history = rec(Some(0.8), None, Some(256.0), Some(-1.0));
        let recovered = recover(&Recommendation::UNKNOWN, &history);

        assert_eq!(recovered.cpu_request, Some(0.8));
        assert_eq!(recovered.cpu_limit, None);
        assert_eq!(recovered.rss_request, Some(256.0));
        // negative history values are ignored rather than stored
        assert_eq!(recovered.rss_limit, None);
    }

    #[test]
    fn test_raised_fields() {
        let previous = rec(Some(1.0), None, Some(100.0), Some(100.0));
        let next = rec(Some(1.0), Some(2.0), Some(120.0), Some(100.0));

        assert_eq!(
            raised_fields(&previous, &next),
            vec![RecommendationField::CpuLimit, RecommendationField::RssRequest]
        );
    }
}
