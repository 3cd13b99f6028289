//! Prometheus transport
//!
//! Every measurement is one instant query against `/api/v1/query`. Queries
//! are PromQL templates with `{namespace}`, `{pod}`, `{application}`,
//! `{field}` and `{lookback}` placeholders, so the metric names of a
//! particular cluster can be swapped through configuration.

use super::discovery::DiscoveryBuilder;
use super::{HistorySource, MetricsSource};
use crate::error::EngineError;
use crate::models::{DiscoveredInstance, InstanceKey, Recommendation, RecommendationField, Sample};
use crate::observability::PUBLISHED_RECOMMENDATION_METRIC;
use crate::runtime::{GcPolicy, HeapModel};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// PromQL templates used by [`PrometheusSource`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryTemplates {
    /// One series per pod and phase, labels `namespace`, `pod`, `phase`
    pub pods: String,
    /// Labels `namespace`, `pod`, `gc_policy`
    pub gc_policy: String,
    /// Labels `namespace`, `pod`, `resource` (cpu or memory)
    pub requests: String,
    pub limits: String,
    /// CPU cores in use
    pub cpu: String,
    /// Resident set size in bytes
    pub rss: String,
    /// Network bytes per second
    pub network: String,
    /// One series per heap region, region name in label `region`, bytes
    pub heap: String,
    pub non_heap: String,
    /// Highest published value of one application field
    pub history: String,
}

impl Default for QueryTemplates {
    fn default() -> Self {
        Self {
            pods: "kube_pod_status_phase == 1".to_string(),
            gc_policy: "max by (namespace, pod, gc_policy) (jvm_gc_policy_info)".to_string(),
            requests: "max by (namespace, pod, resource) (kube_pod_container_resource_requests)"
                .to_string(),
            limits: "max by (namespace, pod, resource) (kube_pod_container_resource_limits)"
                .to_string(),
            cpu: r#"sum(rate(container_cpu_usage_seconds_total{namespace="{namespace}",pod="{pod}",container!=""}[1m]))"#
                .to_string(),
            rss: r#"sum(container_memory_rss{namespace="{namespace}",pod="{pod}",container!=""})"#
                .to_string(),
            network: r#"sum(rate(container_network_receive_bytes_total{namespace="{namespace}",pod="{pod}"}[1m]))"#
                .to_string(),
            heap: r#"max by (region) (jvm_memory_used_bytes{namespace="{namespace}",pod="{pod}",area="heap"})"#
                .to_string(),
            non_heap: r#"max by (region) (jvm_memory_used_bytes{namespace="{namespace}",pod="{pod}",area="nonheap"})"#
                .to_string(),
            history: format!(
                r#"max(max_over_time({}{{application="{{application}}",field="{{field}}"}}[{{lookback}}]))"#,
                PUBLISHED_RECOMMENDATION_METRIC
            ),
        }
    }
}

/// Fill `{placeholder}` slots of a template
fn render(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |query, (name, value)| {
        query.replace(&format!("{{{}}}", name), value)
    })
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: Vec<VectorSample>,
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    #[serde(default)]
    metric: HashMap<String, String>,
    /// `[unix timestamp, "value"]`
    value: (f64, String),
}

impl VectorSample {
    fn number(&self) -> Option<f64> {
        self.value.1.parse::<f64>().ok()
    }

    fn label(&self, name: &str) -> Option<&str> {
        self.metric.get(name).map(String::as_str)
    }

    fn instance_key(&self) -> Option<InstanceKey> {
        Some(InstanceKey::new(self.label("namespace")?, self.label("pod")?))
    }
}

/// [`MetricsSource`] and [`HistorySource`] backed by Prometheus
pub struct PrometheusSource {
    client: Client,
    base_url: Url,
    templates: QueryTemplates,
    lookback: String,
}

impl PrometheusSource {
    pub fn new(base_url: &str, templates: QueryTemplates, lookback: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid Prometheus URL")?;

        Ok(Self {
            client,
            base_url,
            templates,
            lookback: lookback.into(),
        })
    }

    /// Run an instant query and return its vector result
    async fn query(&self, promql: &str) -> Result<Vec<VectorSample>> {
        let url = self
            .base_url
            .join("api/v1/query")
            .context("Invalid query path")?;

        debug!(query = %promql, "Querying Prometheus");

        let response = self
            .client
            .get(url)
            .query(&[("query", promql)])
            .send()
            .await
            .map_err(EngineError::from)
            .context("Failed to send query")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Transport(format!("Prometheus error ({}): {}", status, body)).into());
        }

        let body: QueryResponse = response
            .json()
            .await
            .context("Failed to parse query response")?;

        if body.status != "success" {
            return Err(EngineError::Transport(
                body.error.unwrap_or_else(|| "query failed".to_string()),
            )
            .into());
        }

        match body.data {
            Some(data) if data.result_type == "vector" => Ok(data.result),
            Some(data) => Err(EngineError::Transport(format!(
                "Unexpected result type: {}",
                data.result_type
            ))
            .into()),
            None => Ok(Vec::new()),
        }
    }

    /// Single scalar value of a query; `None` on an empty result
    async fn query_value(&self, promql: &str) -> Result<Option<f64>> {
        Ok(self.query(promql).await?.first().and_then(VectorSample::number))
    }

    async fn collect_originals(
        &self,
        builder: &mut DiscoveryBuilder,
        template: &str,
        cpu_field: RecommendationField,
        memory_field: RecommendationField,
    ) -> Result<()> {
        for row in self.query(template).await? {
            let (Some(key), Some(value)) = (row.instance_key(), row.number()) else {
                continue;
            };
            match row.label("resource") {
                Some("cpu") => {
                    builder.original(key, cpu_field, value);
                }
                Some("memory") => {
                    builder.original(key, memory_field, value / BYTES_PER_MIB);
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn fill_regions(
        &self,
        template: &str,
        instance: &InstanceKey,
        model: &mut HeapModel,
        heap: bool,
    ) -> Result<usize> {
        let query = render(
            template,
            &[("namespace", instance.namespace.as_str()), ("pod", instance.name.as_str())],
        );
        let mut filled = 0;
        for row in self.query(&query).await? {
            let (Some(region), Some(bytes)) = (row.label("region"), row.number()) else {
                continue;
            };
            let result = if heap {
                model.set_heap(region, bytes)
            } else {
                model.set_non_heap(region, bytes)
            };
            match result {
                Ok(()) => filled += 1,
                Err(e) => debug!(instance = %instance, error = %e, "Skipping region"),
            }
        }
        Ok(filled)
    }
}

#[async_trait]
impl MetricsSource for PrometheusSource {
    async fn discover(&self) -> Result<Vec<DiscoveredInstance>> {
        let mut builder = DiscoveryBuilder::new();

        for row in self.query(&self.templates.pods).await? {
            if let Some(key) = row.instance_key() {
                let phase = row.label("phase").unwrap_or("Unknown").to_string();
                builder.pod(key, phase);
            }
        }

        for row in self.query(&self.templates.gc_policy).await? {
            if let (Some(key), Some(policy)) = (row.instance_key(), row.label("gc_policy")) {
                builder.gc_policy(key, policy);
            }
        }

        self.collect_originals(
            &mut builder,
            &self.templates.requests,
            RecommendationField::CpuRequest,
            RecommendationField::RssRequest,
        )
        .await?;
        self.collect_originals(
            &mut builder,
            &self.templates.limits,
            RecommendationField::CpuLimit,
            RecommendationField::RssLimit,
        )
        .await?;

        Ok(builder.build())
    }

    async fn sample(&self, instance: &InstanceKey) -> Result<Option<Sample>> {
        let labels = [("namespace", instance.namespace.as_str()), ("pod", instance.name.as_str())];

        let cpu = self.query_value(&render(&self.templates.cpu, &labels)).await?;
        let rss = self.query_value(&render(&self.templates.rss, &labels)).await?;
        let network = self
            .query_value(&render(&self.templates.network, &labels))
            .await?
            .unwrap_or(0.0);

        Ok(match (cpu, rss) {
            (Some(cpu), Some(rss_bytes)) => Some(Sample::new(cpu, rss_bytes / BYTES_PER_MIB, network)),
            _ => None,
        })
    }

    async fn heap_sample(
        &self,
        instance: &InstanceKey,
        policy: GcPolicy,
    ) -> Result<Option<HeapModel>> {
        let mut model = HeapModel::new(policy);
        let heap = self
            .fill_regions(&self.templates.heap, instance, &mut model, true)
            .await?;
        let non_heap = self
            .fill_regions(&self.templates.non_heap, instance, &mut model, false)
            .await?;

        Ok((heap + non_heap > 0).then_some(model))
    }
}

#[async_trait]
impl HistorySource for PrometheusSource {
    async fn last_published(&self, application: &str) -> Result<Recommendation> {
        let mut history = Recommendation::UNKNOWN;

        for field in RecommendationField::ALL {
            let query = render(
                &self.templates.history,
                &[
                    ("application", application),
                    ("field", field.as_str()),
                    ("lookback", self.lookback.as_str()),
                ],
            );
            if let Some(value) = self.query_value(&query).await? {
                if !history.set(field, value) {
                    return Err(EngineError::MalformedHistory {
                        application: application.to_string(),
                        reason: format!("{} = {}", field, value),
                    }
                    .into());
                }
            }
        }

        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InstanceStatus;
    use mockito::Matcher;

    fn vector(results: &str) -> String {
        format!(
            r#"{{"status":"success","data":{{"resultType":"vector","result":[{}]}}}}"#,
            results
        )
    }

    fn series(labels: &str, value: &str) -> String {
        format!(r#"{{"metric":{{{}}},"value":[1700000000.0,"{}"]}}"#, labels, value)
    }

    fn templates() -> QueryTemplates {
        QueryTemplates {
            pods: "pods".to_string(),
            gc_policy: "gc".to_string(),
            requests: "requests".to_string(),
            limits: "limits".to_string(),
            cpu: "cpu {namespace}/{pod}".to_string(),
            rss: "rss {namespace}/{pod}".to_string(),
            network: "net {namespace}/{pod}".to_string(),
            heap: "heap {pod}".to_string(),
            non_heap: "nonheap {pod}".to_string(),
            history: "history {application} {field} {lookback}".to_string(),
        }
    }

    #[test]
    fn test_render_placeholders() {
        let query = render(
            "x{namespace=\"{namespace}\",pod=\"{pod}\"}",
            &[("namespace", "shop"), ("pod", "web-1")],
        );
        assert_eq!(query, "x{namespace=\"shop\",pod=\"web-1\"}");
    }

    #[test]
    fn test_default_history_template() {
        let query = render(
            &QueryTemplates::default().history,
            &[("application", "petclinic"), ("field", "cpu_limit"), ("lookback", "30d")],
        );
        assert_eq!(
            query,
            r#"max(max_over_time(recommender_published_recommendation{application="petclinic",field="cpu_limit"}[30d]))"#
        );
    }

    #[tokio::test]
    async fn test_sample_converts_rss_to_mib() {
        let mut server = mockito::Server::new_async().await;
        let cpu = server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded("query".into(), "cpu shop/web-1".into()))
            .with_body(vector(&series("", "0.25")))
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded("query".into(), "rss shop/web-1".into()))
            .with_body(vector(&series("", "209715200")))
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded("query".into(), "net shop/web-1".into()))
            .with_body(vector(""))
            .create_async()
            .await;

        let source = PrometheusSource::new(&server.url(), templates(), "30d").unwrap();
        let sample = source
            .sample(&InstanceKey::new("shop", "web-1"))
            .await
            .unwrap()
            .unwrap();

        cpu.assert_async().await;
        assert_eq!(sample.cpu, 0.25);
        assert_eq!(sample.rss, 200.0);
        assert_eq!(sample.network, 0.0);
    }

    #[tokio::test]
    async fn test_sample_missing_dimension_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_body(vector(""))
            .create_async()
            .await;

        let source = PrometheusSource::new(&server.url(), templates(), "30d").unwrap();
        let sample = source.sample(&InstanceKey::new("shop", "web-1")).await.unwrap();
        assert!(sample.is_none());
    }

    #[tokio::test]
    async fn test_discover_joins_queries() {
        let mut server = mockito::Server::new_async().await;
        let pod_labels = r#""namespace":"shop","pod":"web-6f7c9d8b4d-abcde""#;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded("query".into(), "pods".into()))
            .with_body(vector(&series(&format!(r#"{},"phase":"Running""#, pod_labels), "1")))
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded("query".into(), "gc".into()))
            .with_body(vector(&series(&format!(r#"{},"gc_policy":"balanced""#, pod_labels), "1")))
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded("query".into(), "requests".into()))
            .with_body(vector(&format!(
                "{},{}",
                series(&format!(r#"{},"resource":"cpu""#, pod_labels), "0.5"),
                series(&format!(r#"{},"resource":"memory""#, pod_labels), "268435456")
            )))
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded("query".into(), "limits".into()))
            .with_body(vector(""))
            .create_async()
            .await;

        let source = PrometheusSource::new(&server.url(), templates(), "30d").unwrap();
        let instances = source.discover().await.unwrap();

        assert_eq!(instances.len(), 1);
        let web = &instances[0];
        assert_eq!(web.application, "web");
        assert_eq!(web.status, InstanceStatus::Running);
        assert_eq!(web.gc_policy, Some(GcPolicy::Balanced));
        assert_eq!(web.original.cpu_request, Some(0.5));
        assert_eq!(web.original.rss_request, Some(256.0));
        assert_eq!(web.original.cpu_limit, None);
    }

    #[tokio::test]
    async fn test_heap_sample_skips_foreign_regions() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded("query".into(), "heap jvm-1".into()))
            .with_body(vector(&format!(
                "{},{}",
                series(r#""region":"tenured-SOA""#, "1048576"),
                series(r#""region":"balanced-old""#, "999")
            )))
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded("query".into(), "nonheap jvm-1".into()))
            .with_body(vector(&series(r#""region":"class storage""#, "2048")))
            .create_async()
            .await;

        let source = PrometheusSource::new(&server.url(), templates(), "30d").unwrap();
        let model = source
            .heap_sample(&InstanceKey::new("shop", "jvm-1"), GcPolicy::Gencon)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(model.total_heap_size(), 1048576.0);
        assert_eq!(model.total_non_heap_size(), 2048.0);
    }

    #[tokio::test]
    async fn test_heap_sample_skips_nan_regions() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded("query".into(), "heap jvm-2".into()))
            .with_body(vector(&format!(
                "{},{}",
                series(r#""region":"tenured-SOA""#, "NaN"),
                series(r#""region":"tenured-LOA""#, "4096")
            )))
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded("query".into(), "nonheap jvm-2".into()))
            .with_body(vector(&series(r#""region":"JIT code cache""#, "+Inf")))
            .create_async()
            .await;

        let source = PrometheusSource::new(&server.url(), templates(), "30d").unwrap();
        let model = source
            .heap_sample(&InstanceKey::new("shop", "jvm-2"), GcPolicy::Gencon)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(model.total_heap_size(), 4096.0);
        assert_eq!(model.total_non_heap_size(), 0.0);
    }

    #[tokio::test]
    async fn test_last_published_reads_each_field() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded(
                "query".into(),
                "history petclinic cpu_limit 7d".into(),
            ))
            .with_body(vector(&series("", "1.5")))
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded(
                "query".into(),
                "history petclinic rss_limit 7d".into(),
            ))
            .with_body(vector(&series("", "-1")))
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_body(vector(""))
            .create_async()
            .await;

        let source = PrometheusSource::new(&server.url(), templates(), "7d").unwrap();
        let err = source.last_published("petclinic").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::MalformedHistory { .. })
        ));
    }

    #[tokio::test]
    async fn test_last_published_empty_history() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_body(vector(""))
            .create_async()
            .await;

        let source = PrometheusSource::new(&server.url(), templates(), "30d").unwrap();
        let history = source.last_published("fresh").await.unwrap();
        assert!(history.is_unknown());
    }

    #[tokio::test]
    async fn test_query_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let source = PrometheusSource::new(&server.url(), templates(), "30d").unwrap();
        let err = source.discover().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::Transport(_))
        ));
    }
}
