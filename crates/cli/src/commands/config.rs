//! `rsz config`

use anyhow::Result;

use crate::client::ApiClient;
use crate::config::Config;
use crate::output::{print_info, print_success};

/// Persist the API endpoint after checking it parses
pub fn set_api_url(config: &mut Config, api_url: String) -> Result<()> {
    ApiClient::new(&api_url)?;
    config.api_url = Some(api_url);
    let path = config.save()?;
    print_success(&format!("Saved API URL to {}", path.display()));
    Ok(())
}

pub fn show(config: &Config, effective_url: &str) {
    print_info(&format!("API URL: {}", effective_url));
    match &config.api_url {
        Some(url) => print_info(&format!("Configured in file: {}", url)),
        None => print_info("No API URL in config file"),
    }
}
