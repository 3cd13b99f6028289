//! GC policies and the heap regions each one owns

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const GENCON_REGIONS: &[&str] = &[
    "tenured-LOA",
    "tenured-SOA",
    "nursery-survivor",
    "nursery-allocate",
];

const BALANCED_REGIONS: &[&str] = &[
    "balanced-old",
    "balanced-eden",
    "balanced-survivor",
    "balanced-reserved",
];

const NOGC_REGIONS: &[&str] = &["tenured"];

const METRONOME_REGIONS: &[&str] = &["JavaHeap"];

/// Non-heap regions, the same under every policy
pub const NON_HEAP_REGIONS: &[&str] = &[
    "miscellaneous",
    "class storage",
    "JIT code cache",
    "JIT data cache",
];

/// Garbage collection policy of a monitored JVM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GcPolicy {
    Gencon,
    Balanced,
    Nogc,
    Metronome,
}

impl GcPolicy {
    pub const ALL: [GcPolicy; 4] = [
        GcPolicy::Gencon,
        GcPolicy::Balanced,
        GcPolicy::Nogc,
        GcPolicy::Metronome,
    ];

    /// Heap region names valid under this policy
    pub fn heap_regions(&self) -> &'static [&'static str] {
        match self {
            GcPolicy::Gencon => GENCON_REGIONS,
            GcPolicy::Balanced => BALANCED_REGIONS,
            GcPolicy::Nogc => NOGC_REGIONS,
            GcPolicy::Metronome => METRONOME_REGIONS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GcPolicy::Gencon => "gencon",
            GcPolicy::Balanced => "balanced",
            GcPolicy::Nogc => "nogc",
            GcPolicy::Metronome => "metronome",
        }
    }
}

impl fmt::Display for GcPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GcPolicy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GcPolicy::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::UnknownGcPolicy(s.to_string()))
    }
}
