//! CLI Status Command
//!
//! Queries `/api/health` on a running server.

use anyhow::Result;

use crate::api;

pub async fn run(url: &str) -> Result<()> {
    match api::fetch_json(url, &["api", "health"]).await {
        Ok(body) => {
            println!("worldsync at {url}");
            println!("  status:   {}", body["status"].as_str().unwrap_or("unknown"));
            println!("  version:  {}", body["version"].as_str().unwrap_or("unknown"));
            println!("  sessions: {}", body["sessions"]);
            println!("  entities: {}", body["entities"]);
            println!("  uptime:   {}s", body["uptime_seconds"]);
        }
        Err(e) => {
            println!("worldsync is not reachable at {url}: {e:#}");
        }
    }
    Ok(())
}
