//! Network interception demonstration.
//!
//! Demonstrates:
//! - Tracking requests and responses on a page session
//! - Blocking requests by resource type
//! - Fulfilling requests with a synthetic response
//! - Redirect chains and response bodies
//!
//! Usage:
//!   cargo run --example 002_network_intercept -- --url ws://127.0.0.1:9222/devtools/browser/<id> --target <page-id>
//!   cargo run --example 002_network_intercept -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::json;

use cdp_wire::{
    Connection, ContinueOverrides, Error, ErrorReason, FulfillResponse, NetworkEvent,
    NetworkManager, Request, Result, TargetId,
};
use common::Args;

// ============================================================================
// Constants
// ============================================================================

const TEST_URL: &str = "https://example.com";
const MOCK_URL: &str = "https://example.com/mock.json";

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
    println!("=== 002: Network Interception ===\n");

    let Some(target) = args.target.clone() else {
        return Err(Error::invalid_argument("Pass --target <page-id>"));
    };

    let connection = Connection::connect(&args.url).await?;
    let session = connection.create_session(TargetId::new(target)).await?;
    println!("[Setup] ✓ Session {}\n", session.session_id());

    let network = Arc::new(NetworkManager::new(Arc::new(session.clone())));
    let mut events = network.subscribe();
    network.initialize().await?;
    network.set_request_interception(true).await?;
    println!("[1] Interception enabled");

    session.send("Page.enable", json!({})).await?;
    session
        .send("Page.navigate", json!({ "url": TEST_URL }))
        .await?;

    while let Some(event) = events.recv().await {
        match event {
            NetworkEvent::Request(request) => {
                tokio::spawn(handle(request));
            }
            NetworkEvent::Response(response) => {
                println!("    [{}] {}", response.status(), response.url());
            }
            NetworkEvent::RequestFinished(request) => {
                if !request.redirect_chain().is_empty() {
                    println!(
                        "    redirected {} time(s) to {}",
                        request.redirect_chain().len(),
                        request.url()
                    );
                }
                if request.is_navigation_request() {
                    if let Some(response) = request.response() {
                        let body = response.text().await?;
                        println!("[2] Document loaded ({} bytes)", body.len());
                    }
                    break;
                }
            }
            NetworkEvent::RequestFailed(request) => {
                println!(
                    "    ✗ {} ({})",
                    request.url(),
                    request.failure().unwrap_or_default()
                );
            }
        }
    }

    network.set_request_interception(false).await?;
    common::wait_for_exit(args.no_wait).await;

    println!("\n[Cleanup] Closing connection...");
    connection.dispose();
    println!("          ✓ Done");
    Ok(())
}

async fn handle(request: Request) {
    let result = match request.resource_type() {
        "image" | "media" | "font" => request.abort(ErrorReason::BlockedByClient).await,
        _ if request.url() == MOCK_URL => {
            request
                .fulfill(
                    FulfillResponse::new()
                        .with_content_type("application/json")
                        .with_body(r#"{"mocked":true}"#),
                )
                .await
        }
        _ => request.continue_request(ContinueOverrides::new()).await,
    };

    if let Err(e) = result {
        eprintln!("    interception failed for {}: {e}", request.url());
    }
}
