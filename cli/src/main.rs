use anyhow::Result;
use clap::{Parser, Subcommand};
use evren_core::traits::Provider;
use evren_core::{api, config, handler, mcp, providers};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod debug;

#[derive(Parser)]
#[command(name = "evren")]
#[command(about = "evren - a tool-using chat agent backed by an MCP server", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.evren/config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Ask the agent from the terminal
    Chat {
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Check the credential and the MCP server connection
    Debug,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_handler(config: config::Config) -> Result<handler::RequestHandler> {
    let provider: Arc<dyn Provider> = Arc::from(providers::create_provider(&config)?);
    let connector = Arc::new(mcp::SessionManager::new(config.mcp.clone()));
    Ok(handler::RequestHandler::new(
        Arc::new(config),
        provider,
        connector,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = config::Config::load(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    });

    match command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let addr = config.server.bind_address();
            let handler = build_handler(config)?;
            api::serve(api::AppState::new(Arc::new(handler)), &addr).await?;
        }
        Commands::Chat { message } => {
            let handler = build_handler(config)?;

            if let Some(msg) = message {
                println!("\n🤔 Processing...\n");
                match handler.handle(&msg).await {
                    Ok(response) => println!("{}", response),
                    Err(failure) => {
                        eprintln!("❌ Error: {}", failure.detail);
                        anyhow::bail!("Agent processing failed: {}", failure.kind);
                    }
                }
            } else {
                println!("🤖 Evren");
                println!("Type your message (Ctrl+D to exit):\n");
                use std::io::{self, BufRead};
                let stdin = io::stdin();
                let mut stdout = io::stdout();

                loop {
                    print!("> ");
                    let _ = stdout.flush();

                    let mut input = String::new();
                    match stdin.lock().read_line(&mut input) {
                        Ok(0) | Err(_) => {
                            println!("\n👋 Goodbye!");
                            break;
                        }
                        Ok(_) => {
                            let input = input.trim();
                            if input.is_empty() {
                                continue;
                            }

                            println!("\n🤔 Processing...\n");
                            match handler.handle(input).await {
                                Ok(response) => println!("{}", response),
                                Err(failure) => eprintln!("❌ Error: {}", failure.detail),
                            }
                            println!();
                        }
                    }
                }
            }
        }
        Commands::Debug => debug::run(&config).await,
    }

    Ok(())
}
