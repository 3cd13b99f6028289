//! Heap sizing from collected runtime samples

use super::gc_policy::GcPolicy;
use super::heap_model::HeapModel;
use crate::analysis::stats;
use crate::models::{format_memory, RuntimeRecommendation};
use std::collections::BTreeMap;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Heap and non-heap sizing for one GC policy, in MiB
#[derive(Debug, Clone, PartialEq)]
pub struct HeapRecommendation {
    pub gc_policy: GcPolicy,
    pub heap_mib: f64,
    pub non_heap_mib: f64,
    pub capped: bool,
}

impl HeapRecommendation {
    pub fn to_view(&self) -> RuntimeRecommendation {
        RuntimeRecommendation {
            gc_policy: self.gc_policy,
            heap: format_memory(self.heap_mib),
            non_heap: format_memory(self.non_heap_mib),
            capped: self.capped,
        }
    }
}

/// Mean total heap/non-heap size over `samples`.
///
/// When the mean heap exceeds `memory_request_mib` it is capped at
/// `cap_ratio * memory_request_mib`. Returns `None` without samples.
pub fn recommend_heap<'a>(
    samples: impl IntoIterator<Item = &'a HeapModel>,
    memory_request_mib: Option<f64>,
    cap_ratio: f64,
) -> Option<HeapRecommendation> {
    let mut samples = samples.into_iter().peekable();
    let gc_policy = samples.peek()?.policy();

    let (heap, non_heap): (Vec<f64>, Vec<f64>) = samples
        .map(|m| {
            (
                m.total_heap_size() / BYTES_PER_MIB,
                m.total_non_heap_size() / BYTES_PER_MIB,
            )
        })
        .unzip();

    let mut heap_mib = stats::mean(&heap)?;
    let non_heap_mib = stats::mean(&non_heap)?;
    let mut capped = false;

    if let Some(request) = memory_request_mib {
        if heap_mib > request {
            heap_mib = request * cap_ratio;
            capped = true;
        }
    }

    Some(HeapRecommendation {
        gc_policy,
        heap_mib,
        non_heap_mib,
        capped,
    })
}

/// Group samples by GC policy and recommend each group
pub fn recommend_by_policy<'a>(
    samples: impl IntoIterator<Item = &'a HeapModel>,
    memory_request_mib: Option<f64>,
    cap_ratio: f64,
) -> Vec<HeapRecommendation> {
    let mut groups: BTreeMap<GcPolicy, Vec<&HeapModel>> = BTreeMap::new();
    for model in samples {
        groups.entry(model.policy()).or_default().push(model);
    }

    groups
        .into_values()
        .filter_map(|group| recommend_heap(group, memory_request_mib, cap_ratio))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gencon_sample(heap_mib: f64, non_heap_mib: f64) -> HeapModel {
        let mut model = HeapModel::new(GcPolicy::Gencon);
        model
            .set_heap("tenured-SOA", heap_mib * BYTES_PER_MIB)
            .unwrap();
        model
            .set_non_heap("miscellaneous", non_heap_mib * BYTES_PER_MIB)
            .unwrap();
        model
    }

    #[test]
    fn test_mean_of_total_sizes() {
        let samples = vec![gencon_sample(100.0, 20.0), gencon_sample(200.0, 40.0)];
        let rec = recommend_heap(&samples, Some(1024.0), 0.7).unwrap();

        assert_eq!(rec.gc_policy, GcPolicy::Gencon);
        assert!((rec.heap_mib - 150.0).abs() < 1e-9);
        assert!((rec.non_heap_mib - 30.0).abs() < 1e-9);
        assert!(!rec.capped);
    }

    #[test]
    fn test_heap_capped_when_exceeding_request() {
        let samples = vec![gencon_sample(600.0, 10.0)];
        let rec = recommend_heap(&samples, Some(500.0), 0.7).unwrap();

        assert!(rec.capped);
        assert!((rec.heap_mib - 350.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_cap_without_request() {
        let samples = vec![gencon_sample(600.0, 10.0)];
        let rec = recommend_heap(&samples, None, 0.7).unwrap();
        assert!(!rec.capped);
        assert!((rec.heap_mib - 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_samples() {
        let samples: Vec<HeapModel> = Vec::new();
        assert!(recommend_heap(&samples, Some(100.0), 0.7).is_none());
    }

    #[test]
    fn test_grouped_by_policy() {
        let mut nogc = HeapModel::new(GcPolicy::Nogc);
        nogc.set_heap("tenured", 64.0 * BYTES_PER_MIB).unwrap();
        let samples = vec![gencon_sample(100.0, 10.0), nogc];

        let recs = recommend_by_policy(&samples, None, 0.7);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].gc_policy, GcPolicy::Gencon);
        assert_eq!(recs[1].gc_policy, GcPolicy::Nogc);
        assert!((recs[1].heap_mib - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_view_formatting() {
        let rec = HeapRecommendation {
            gc_policy: GcPolicy::Balanced,
            heap_mib: 350.0,
            non_heap_mib: 42.5,
            capped: true,
        };
        let view = rec.to_view();
        assert_eq!(view.heap, "350M");
        assert_eq!(view.non_heap, "42.5M");
    }
}
