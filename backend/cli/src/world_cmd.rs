//! CLI World Command
//!
//! Pretty-prints the world, or one entity, from a running server.

use anyhow::Result;

use crate::api;

pub async fn run(url: &str, entity: Option<&str>) -> Result<()> {
    let body = match entity {
        Some(name) => api::fetch_json(url, &["entity", name]).await?,
        None => api::fetch_json(url, &["world"]).await?,
    };
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
