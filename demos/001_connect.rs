//! Connection and session demonstration.
//!
//! Demonstrates:
//! - Connecting to a browser endpoint
//! - Root-level commands
//! - Discovering and attaching to a page target
//! - Session-scoped commands and events
//!
//! Usage:
//!   cargo run --example 001_connect -- --url ws://127.0.0.1:9222/devtools/browser/<id>
//!   cargo run --example 001_connect -- --no-wait
//!   cargo run --example 001_connect -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde_json::json;

use cdp_wire::{Connection, Error, Result, TargetId};
use common::Args;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== 001: Connect ===\n");

    println!("[Setup] Connecting to {}...", args.url);
    let connection = Connection::builder()
        .url(&args.url)
        .connect_timeout(Duration::from_secs(10))
        .connect()
        .await?;
    println!("        ✓ Connected\n");

    let version = connection.send("Browser.getVersion", json!({})).await?;
    println!(
        "[1] Browser: {}",
        version["product"].as_str().unwrap_or("unknown")
    );

    let target_id = match args.target {
        Some(target) => TargetId::new(target),
        None => first_page(&connection).await?,
    };
    println!("[2] Attaching to target {target_id}...");

    let session = connection.create_session(target_id).await?;
    println!("    ✓ Session {}\n", session.session_id());

    session.on("Page.loadEventFired", |_| println!("    [event] load fired"));
    session.send("Page.enable", json!({})).await?;
    session
        .send("Page.navigate", json!({ "url": "https://example.com" }))
        .await?;

    let title = session
        .send_with_timeout(
            "Runtime.evaluate",
            json!({ "expression": "document.title", "returnByValue": true }),
            Duration::from_secs(5),
        )
        .await?;
    println!("[3] Title: {}", title["result"]["value"]);

    common::wait_for_exit(args.no_wait).await;

    println!("\n[Cleanup] Detaching...");
    session.detach().await?;
    connection.dispose();
    println!("          ✓ Done");

    Ok(())
}

async fn first_page(connection: &Connection) -> Result<TargetId> {
    let targets = connection.send("Target.getTargets", json!({})).await?;
    targets["targetInfos"]
        .as_array()
        .into_iter()
        .flatten()
        .find(|info| info["type"] == "page")
        .and_then(|info| info["targetId"].as_str())
        .map(TargetId::new)
        .ok_or_else(|| Error::invalid_argument("No page target found; pass --target <id>"))
}

