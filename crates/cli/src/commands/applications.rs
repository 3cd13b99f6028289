//! `rsz get applications`

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, ApplicationSummary};
use crate::output::{color_status, print_items, OutputFormat};

#[derive(Tabled)]
struct ApplicationRow {
    #[tabled(rename = "Application")]
    application: String,
    #[tabled(rename = "Recommendations")]
    generated: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Keep applications whose status matches, case-insensitively
fn filter_by_status(apps: Vec<ApplicationSummary>, status: Option<&str>) -> Vec<ApplicationSummary> {
    match status {
        Some(wanted) => apps
            .into_iter()
            .filter(|a| a.status.eq_ignore_ascii_case(wanted))
            .collect(),
        None => apps,
    }
}

pub async fn get_applications(
    client: &ApiClient,
    status: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let apps = filter_by_status(client.applications().await?, status.as_deref());

    let rows: Vec<ApplicationRow> = apps
        .iter()
        .map(|a| ApplicationRow {
            application: a.application_name.clone(),
            generated: color_status(&a.recommendations_generated),
            status: color_status(&a.status),
        })
        .collect();

    print_items(&apps, rows, format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(name: &str, status: &str) -> ApplicationSummary {
        ApplicationSummary {
            application_name: name.to_string(),
            recommendations_generated: "yes".to_string(),
            status: status.to_string(),
        }
    }

    #[test]
    fn test_filter_by_status() {
        let apps = vec![summary("a", "running"), summary("b", "idle"), summary("c", "Running")];

        let running = filter_by_status(apps.clone(), Some("running"));
        assert_eq!(running.len(), 2);
        assert_eq!(filter_by_status(apps, None).len(), 3);
    }
}
