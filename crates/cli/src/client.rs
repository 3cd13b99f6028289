//! API client for the recommender service

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// API client for the recommender service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// GET a path with optional query parameters
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let mut url = self.base_url.join(path).context("Invalid path")?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, message);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Recommendations for every application, or for one
    pub async fn recommendations(&self, application: Option<&str>) -> Result<Vec<ApplicationRecommendation>> {
        match application {
            Some(name) => self.get("recommendations", &[("application_name", name)]).await,
            None => self.get("recommendations", &[]).await,
        }
    }

    pub async fn applications(&self) -> Result<Vec<ApplicationSummary>> {
        self.get("listApplications", &[]).await
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Quantities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resources {
    #[serde(default)]
    pub requests: Quantities,
    #[serde(default)]
    pub limits: Quantities,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeRecommendation {
    pub gc_policy: String,
    pub heap: String,
    pub non_heap: String,
    #[serde(default)]
    pub capped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRecommendation {
    pub application_name: String,
    pub resources: Resources,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runtime: Vec<RuntimeRecommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationSummary {
    pub application_name: String,
    pub recommendations_generated: String,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_recommendations_for_one_application() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/recommendations")
            .match_query(Matcher::UrlEncoded(
                "application_name".into(),
                "petclinic".into(),
            ))
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"application_name":"petclinic","resources":{"requests":{"memory":"150M","cpu":1.0},"limits":{"memory":"200M","cpu":1.1}},"runtime":[{"gc_policy":"gencon","heap":"105M","non_heap":"40M","capped":true}]}]"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let recs = client.recommendations(Some("petclinic")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].resources.limits.memory.as_deref(), Some("200M"));
        assert_eq!(recs[0].resources.requests.cpu, Some(1.0));
        assert_eq!(recs[0].runtime[0].gc_policy, "gencon");
        assert!(recs[0].runtime[0].capped);
    }

    #[tokio::test]
    async fn test_missing_fields_deserialize_as_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/recommendations")
            .with_body(r#"[{"application_name":"acmeair","resources":{"requests":{},"limits":{}}}]"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let recs = client.recommendations(None).await.unwrap();

        assert_eq!(recs[0].resources.requests.cpu, None);
        assert_eq!(recs[0].resources.limits.memory, None);
        assert!(recs[0].runtime.is_empty());
    }

    #[tokio::test]
    async fn test_api_error_surfaces_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/recommendations")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":"No such application: missing"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.recommendations(Some("missing")).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("404"));
        assert!(message.contains("No such application: missing"));
    }

    #[tokio::test]
    async fn test_list_applications() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/listApplications")
            .with_body(
                r#"[{"application_name":"petclinic","recommendations_generated":"yes","status":"running"}]"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let apps = client.applications().await.unwrap();

        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].recommendations_generated, "yes");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
