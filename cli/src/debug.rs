//! Step-by-step connectivity check for the configured MCP server.

use console::style;
use evren_core::config::Config;
use evren_core::mcp::{McpConnector, SessionManager};

pub async fn run(config: &Config) {
    let key_status = match config.resolve_api_key() {
        Ok(_) => style("Found ✓").green(),
        Err(_) => style("MISSING ✗").red(),
    };
    println!("1. Checking API Key: {}", key_status);

    println!(
        "2. Attempting to start MCP Server ({})...",
        style(config.mcp.display_command()).cyan()
    );
    let manager = SessionManager::new(config.mcp.clone());

    let session = match manager.connect().await {
        Ok(session) => session,
        Err(e) => {
            report_failure(e.kind(), &e);
            return;
        }
    };
    println!(
        "   -> Session Initialized! {} {}",
        style("✓").green(),
        style(session.server_name().unwrap_or("unknown server")).dim()
    );

    println!("3. Listing Tools...");
    match session.list_tools().await {
        Ok(tools) => {
            println!("   -> Success! Found {} tools.", style(tools.len()).bold());
            for tool in &tools {
                println!("      - {}", tool.name);
            }
        }
        Err(e) => report_failure(e.kind(), &e),
    }

    session.close().await;
}

fn report_failure(kind: &str, err: &dyn std::error::Error) {
    println!("\n{} {}", style("✗ ERROR CAUGHT:").red().bold(), kind);
    println!("Error Details: {}", err);
    let mut source = err.source();
    while let Some(cause) = source {
        println!("  caused by: {}", cause);
        source = cause.source();
    }
}
