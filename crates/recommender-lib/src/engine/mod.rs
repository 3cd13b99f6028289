//! Recommendation engine context
//!
//! The [`Engine`] owns every instance's samples and recommendations and the
//! per-application published values. It is created once at startup and
//! shared as `Arc<Engine>` between the collection loop (the only writer of
//! instance state) and the API handlers (readers).

mod instance;

use crate::aggregator::{self, InstanceContribution};
use crate::analysis::{RecommendationAlgorithm, RecommendationPolicy};
use crate::error::{EngineError, Result};
use crate::models::{
    ApplicationRecommendation, ApplicationSummary, DiscoveredInstance, Generated, InstanceKey,
    InstanceStatus, InstanceView, Recommendation, RecommendationField, Sample,
};
use crate::runtime::{self, HeapModel, HeapRecommendation};
use crate::watermark;
use dashmap::DashMap;
use instance::{InstanceState, RuntimeState};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

/// Outcome of reconciling the registry with a discovery listing
#[derive(Debug, Default)]
pub struct DiscoverySummary {
    /// Instances seen for the first time
    pub new_instances: Vec<InstanceKey>,
    /// Applications with no published or recovered values yet
    pub new_applications: Vec<String>,
    /// Instances no longer reported by discovery
    pub terminated: Vec<InstanceKey>,
}

/// Outcome of one recomputation cycle
#[derive(Debug, Default)]
pub struct CycleReport {
    pub recomputed: usize,
    pub failed: Vec<(InstanceKey, String)>,
    /// Published value of every application after the cycle
    pub published: Vec<(String, Recommendation)>,
}

/// Recommendation engine context
pub struct Engine {
    algorithm: RecommendationAlgorithm,
    instances: DashMap<InstanceKey, InstanceState>,
    applications: DashMap<String, BTreeSet<InstanceKey>>,
    /// Application-level watermark exposed through the API
    published: DashMap<String, Recommendation>,
    /// Values recovered from the metrics store, used to seed new instances
    recovered: DashMap<String, Recommendation>,
}

impl Engine {
    pub fn new(policy: RecommendationPolicy) -> Self {
        Self {
            algorithm: RecommendationAlgorithm::new(policy),
            instances: DashMap::new(),
            applications: DashMap::new(),
            published: DashMap::new(),
            recovered: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &RecommendationPolicy {
        self.algorithm.policy()
    }

    /// Reconcile with the instances discovery currently reports.
    ///
    /// Unknown instances are registered, known ones take the reported status
    /// and application, and instances missing from the listing are marked
    /// terminated (never removed).
    pub fn sync_discovery(&self, discovered: &[DiscoveredInstance]) -> DiscoverySummary {
        let mut summary = DiscoverySummary::default();
        let mut seen = HashSet::with_capacity(discovered.len());

        for instance in discovered {
            seen.insert(instance.key.clone());
            let is_new_application = !self.applications.contains_key(&instance.application)
                && !self.published.contains_key(&instance.application)
                && !self.recovered.contains_key(&instance.application);

            let previous_application = match self.instances.get_mut(&instance.key) {
                Some(mut state) => {
                    state.status = instance.status;
                    for field in RecommendationField::ALL {
                        if state.original.get(field).is_none() {
                            state.original.set_opt(field, instance.original.get(field));
                        }
                    }
                    if state.application != instance.application {
                        let old = std::mem::replace(&mut state.application, instance.application.clone());
                        Some(old)
                    } else {
                        None
                    }
                }
                None => {
                    let seed = self.recovered.get(&instance.application).map(|r| *r);
                    self.instances.insert(
                        instance.key.clone(),
                        InstanceState::from_discovery(instance, seed.as_ref()),
                    );
                    debug!(instance = %instance.key, application = %instance.application, "Registered instance");
                    summary.new_instances.push(instance.key.clone());
                    None
                }
            };

            if let Some(old) = previous_application {
                info!(instance = %instance.key, from = %old, to = %instance.application, "Instance moved application");
                self.remove_from_application(&old, &instance.key);
            }

            self.applications
                .entry(instance.application.clone())
                .or_default()
                .insert(instance.key.clone());

            if is_new_application && !summary.new_applications.contains(&instance.application) {
                summary.new_applications.push(instance.application.clone());
            }
        }

        for mut entry in self.instances.iter_mut() {
            if !seen.contains(entry.key()) && entry.status != InstanceStatus::Terminated {
                entry.status = InstanceStatus::Terminated;
                summary.terminated.push(entry.key().clone());
            }
        }

        summary
    }

    fn remove_from_application(&self, application: &str, key: &InstanceKey) {
        let now_empty = match self.applications.get_mut(application) {
            Some(mut members) => {
                members.remove(key);
                members.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.applications.remove(application);
        }
    }

    /// Append a sample for an instance.
    ///
    /// Returns `Ok(false)` when the sample was discarded as idle.
    pub fn record_sample(&self, key: &InstanceKey, sample: Sample) -> Result<bool> {
        if !sample.is_finite() {
            return Err(EngineError::InvalidSample(key.clone()));
        }
        let mut state = self
            .instances
            .get_mut(key)
            .ok_or_else(|| EngineError::UnknownInstance(key.clone()))?;

        if sample.cpu < self.policy().idle_cpu_threshold {
            return Ok(false);
        }
        state.store.append(sample);
        Ok(true)
    }

    /// Append a runtime heap sample for an instance.
    ///
    /// The first heap sample fixes the policy of an instance discovered
    /// without one; later samples must match it.
    pub fn record_heap_sample(&self, key: &InstanceKey, model: HeapModel) -> Result<()> {
        let mut state = self
            .instances
            .get_mut(key)
            .ok_or_else(|| EngineError::UnknownInstance(key.clone()))?;

        let runtime = state.runtime.get_or_insert_with(|| RuntimeState {
            policy: model.policy(),
            samples: Vec::new(),
        });
        if runtime.policy != model.policy() {
            return Err(EngineError::PolicyMismatch {
                instance: key.clone(),
                expected: runtime.policy,
                actual: model.policy(),
            });
        }
        runtime.samples.push(model);
        Ok(())
    }

    /// Replay the last values published for `application` before a restart.
    ///
    /// Seeds the application's published value, every known instance of it,
    /// and instances discovered later.
    pub fn recover(&self, application: &str, history: &Recommendation) {
        {
            let mut seed = self.recovered.entry(application.to_string()).or_default();
            *seed = watermark::recover(&seed, history);
        }
        {
            let mut published = self.published.entry(application.to_string()).or_default();
            *published = watermark::recover(&published, history);
        }

        let members: Vec<InstanceKey> = self
            .applications
            .get(application)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default();
        for key in members {
            if let Some(mut state) = self.instances.get_mut(&key) {
                state.watermark = watermark::recover(&state.watermark, history);
            }
        }
    }

    /// Recompute one instance and merge the result into its watermark
    pub fn recompute_instance(&self, key: &InstanceKey) -> Result<Recommendation> {
        let snapshot = self
            .instances
            .get(key)
            .ok_or_else(|| EngineError::UnknownInstance(key.clone()))?
            .store
            .snapshot();

        if !snapshot.iter().all(Sample::is_finite) {
            return Err(EngineError::InvalidSample(key.clone()));
        }

        let fresh = self.algorithm.recommend(&snapshot);

        let mut state = self
            .instances
            .get_mut(key)
            .ok_or_else(|| EngineError::UnknownInstance(key.clone()))?;
        Ok(state.apply(fresh))
    }

    /// Recompute every live instance, then every application.
    ///
    /// A failing instance is logged and skipped; it never stops the cycle.
    pub fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let keys: Vec<InstanceKey> = self
            .instances
            .iter()
            .filter(|e| e.status != InstanceStatus::Terminated)
            .map(|e| e.key().clone())
            .collect();

        for key in keys {
            match self.recompute_instance(&key) {
                Ok(_) => report.recomputed += 1,
                Err(e) => {
                    warn!(instance = %key, error = %e, "Recommendation failed for instance");
                    report.failed.push((key, e.to_string()));
                }
            }
        }

        let names: Vec<String> = self.applications.iter().map(|e| e.key().clone()).collect();
        for name in names {
            if let Some(published) = self.publish_application(&name) {
                report.published.push((name, published));
            }
        }
        report.published.sort_by(|a, b| a.0.cmp(&b.0));

        report
    }

    /// Aggregate an application's instance watermarks and fold the result
    /// into its published value
    fn publish_application(&self, application: &str) -> Option<Recommendation> {
        let contributions = self.contributions(application)?;
        let aggregate = aggregator::weighted_average(&contributions);

        let mut published = self.published.entry(application.to_string()).or_default();
        *published = watermark::merge(&published, &aggregate);
        Some(*published)
    }

    fn contributions(&self, application: &str) -> Option<Vec<InstanceContribution>> {
        let members = self.members(application)?;
        Some(
            members
                .iter()
                .filter_map(|key| self.instances.get(key))
                .map(|state| InstanceContribution {
                    sample_count: state.store.len(),
                    recommendation: state.watermark,
                })
                .collect(),
        )
    }

    fn members(&self, application: &str) -> Option<Vec<InstanceKey>> {
        self.applications
            .get(application)
            .map(|m| m.iter().cloned().collect())
    }

    fn is_known_application(&self, application: &str) -> bool {
        self.applications.contains_key(application) || self.published.contains_key(application)
    }

    /// Sample-count-weighted average of the application's instance
    /// watermarks, without touching the published value
    pub fn aggregate(&self, application: &str) -> Result<Recommendation> {
        let contributions = self
            .contributions(application)
            .ok_or_else(|| EngineError::UnknownApplication(application.to_string()))?;
        Ok(aggregator::weighted_average(&contributions))
    }

    /// Published (never decreasing) value of an application
    pub fn published(&self, application: &str) -> Result<Recommendation> {
        if !self.is_known_application(application) {
            return Err(EngineError::UnknownApplication(application.to_string()));
        }
        Ok(self
            .published
            .get(application)
            .map(|r| *r)
            .unwrap_or(Recommendation::UNKNOWN))
    }

    /// Heap sizing per GC policy for an application's runtime samples
    pub fn heap_recommendations(&self, application: &str) -> Result<Vec<HeapRecommendation>> {
        let published = self.published(application)?;
        let members = self.members(application).unwrap_or_default();

        let samples: Vec<HeapModel> = members
            .iter()
            .filter_map(|key| self.instances.get(key))
            .filter_map(|state| state.runtime.as_ref().map(|r| r.samples.clone()))
            .flatten()
            .collect();

        Ok(runtime::recommend_by_policy(
            &samples,
            published.rss_request,
            self.policy().heap_cap_ratio,
        ))
    }

    /// Recommendation API payload for one application
    pub fn application_recommendation(&self, application: &str) -> Result<ApplicationRecommendation> {
        let published = self.published(application)?;
        let mut view = ApplicationRecommendation::new(application, &published);
        view.runtime = self
            .heap_recommendations(application)?
            .iter()
            .map(HeapRecommendation::to_view)
            .collect();
        Ok(view)
    }

    /// Recommendation API payload for every application worth showing.
    ///
    /// Applications whose instances are all terminated and which never had
    /// a recommendation are left out.
    pub fn recommendations(&self) -> Vec<ApplicationRecommendation> {
        self.application_names()
            .into_iter()
            .filter(|name| {
                let has_values = self
                    .published
                    .get(name)
                    .map(|r| !r.is_unknown())
                    .unwrap_or(false);
                has_values || self.application_status(name) != InstanceStatus::Terminated
            })
            .filter_map(|name| self.application_recommendation(&name).ok())
            .collect()
    }

    /// Listing API payload
    pub fn list_applications(&self) -> Vec<ApplicationSummary> {
        self.application_names()
            .into_iter()
            .map(|name| {
                let generated = match self.published.get(&name) {
                    Some(r) if !r.is_unknown() => Generated::Yes,
                    _ => Generated::No,
                };
                ApplicationSummary {
                    status: self.application_status(&name),
                    recommendations_generated: generated,
                    application_name: name,
                }
            })
            .collect()
    }

    /// Most active status among the application's instances
    fn application_status(&self, application: &str) -> InstanceStatus {
        self.members(application)
            .unwrap_or_default()
            .iter()
            .filter_map(|key| self.instances.get(key).map(|s| s.status))
            .min()
            .unwrap_or(InstanceStatus::Terminated)
    }

    fn application_names(&self) -> Vec<String> {
        let names: BTreeSet<String> = self
            .applications
            .iter()
            .map(|e| e.key().clone())
            .chain(self.published.iter().map(|e| e.key().clone()))
            .collect();
        names.into_iter().collect()
    }

    pub fn instance(&self, key: &InstanceKey) -> Option<InstanceView> {
        self.instances.get(key).map(|s| s.view())
    }

    pub fn application_instances(&self, application: &str) -> Result<Vec<InstanceView>> {
        let members = self
            .members(application)
            .ok_or_else(|| EngineError::UnknownApplication(application.to_string()))?;
        Ok(members
            .iter()
            .filter_map(|key| self.instance(key))
            .collect())
    }

    /// Number of instances not yet terminated
    pub fn active_instance_count(&self) -> usize {
        self.instances
            .iter()
            .filter(|e| e.status != InstanceStatus::Terminated)
            .count()
    }

    pub fn application_count(&self) -> usize {
        self.application_names().len()
    }
}
