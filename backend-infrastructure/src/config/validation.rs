use anyhow::{anyhow, Result};
use reqwest::Url;

pub fn validate_non_empty(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} must not be empty", name));
    }
    Ok(())
}

pub fn validate_http_url(name: &str, value: &str) -> Result<()> {
    let url = Url::parse(value.trim()).map_err(|err| anyhow!("invalid {}: {}", name, err))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!("{} must use http or https", name));
    }
    if url.host_str().is_none() {
        return Err(anyhow!("{} has no host", name));
    }
    Ok(())
}
