/*
 * Responsibility
 * - tokio runtime entry point
 * - delegate to app::run() (no logic here)
 */
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    auth_gateway::app::run().await
}
