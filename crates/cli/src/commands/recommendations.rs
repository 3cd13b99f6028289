//! `rsz get recommendations`

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, ApplicationRecommendation};
use crate::output::{format_cpu, format_memory, print_items, OutputFormat};

/// Row for the recommendations table
#[derive(Tabled)]
struct RecommendationRow {
    #[tabled(rename = "Application")]
    application: String,
    #[tabled(rename = "CPU Req")]
    cpu_request: String,
    #[tabled(rename = "CPU Lim")]
    cpu_limit: String,
    #[tabled(rename = "Mem Req")]
    memory_request: String,
    #[tabled(rename = "Mem Lim")]
    memory_limit: String,
    #[tabled(rename = "Heap")]
    heap: String,
}

impl From<&ApplicationRecommendation> for RecommendationRow {
    fn from(rec: &ApplicationRecommendation) -> Self {
        let heap = rec
            .runtime
            .iter()
            .map(|r| {
                let capped = if r.capped { " (capped)" } else { "" };
                format!("{}: {} + {}{}", r.gc_policy, r.heap, r.non_heap, capped)
            })
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            application: rec.application_name.clone(),
            cpu_request: format_cpu(rec.resources.requests.cpu),
            cpu_limit: format_cpu(rec.resources.limits.cpu),
            memory_request: format_memory(rec.resources.requests.memory.as_deref()),
            memory_limit: format_memory(rec.resources.limits.memory.as_deref()),
            heap: if heap.is_empty() { "-".to_string() } else { heap },
        }
    }
}

pub async fn get_recommendations(
    client: &ApiClient,
    application: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let recs = client.recommendations(application.as_deref()).await?;
    let rows: Vec<RecommendationRow> = recs.iter().map(RecommendationRow::from).collect();

    print_items(&recs, rows, format);
    Ok(())
}
