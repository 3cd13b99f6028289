//! JVM runtime heap model
//!
//! The GC policy of an instance is fixed when it is discovered and decides
//! which heap regions exist. Non-heap regions are shared by all policies.

mod gc_policy;
mod heap_model;
mod recommend;

pub use gc_policy::{GcPolicy, NON_HEAP_REGIONS};
pub use heap_model::HeapModel;
pub use recommend::{recommend_by_policy, recommend_heap, HeapRecommendation};
