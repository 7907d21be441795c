//! GitHub tag listing lookup for the firmware sources

use log::info;
use serde::Deserialize;

use crate::install::error::ReleaseLookupError;

/// One entry of the `/tags` listing
#[derive(Deserialize, Debug)]
pub struct GitHubTag {
    pub name: String,
}

/// Fetch the tag listing and return the newest tag's name (the first entry)
pub async fn latest_tag(
    client: &reqwest::Client,
    api_url: &str,
) -> Result<String, ReleaseLookupError> {
    let response = client
        .get(api_url)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ReleaseLookupError::Status(response.status()));
    }

    let body = response.bytes().await?;
    let tags: Vec<GitHubTag> = serde_json::from_slice(&body)?;

    tags.into_iter()
        .next()
        .map(|tag| tag.name)
        .filter(|name| !name.is_empty())
        .ok_or(ReleaseLookupError::NoTags)
}

/// Resolve the archive URL of the newest firmware tag
pub async fn latest_archive_url(
    client: &reqwest::Client,
    api_url: &str,
    archive_base: &str,
) -> Result<String, ReleaseLookupError> {
    let tag = latest_tag(client, api_url).await?;
    let url = archive_url(archive_base, &tag);
    info!("Found latest firmware tag {tag}: {url}");
    Ok(url)
}

pub fn archive_url(archive_base: &str, tag: &str) -> String {
    format!("{archive_base}{tag}.zip")
}
