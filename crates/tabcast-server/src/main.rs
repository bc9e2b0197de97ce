//! Tabcast — consumer endpoint and demo wiring for the capture relay.

use tracing_subscriber::EnvFilter;

mod consumer;
mod demo;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        None | Some("serve") => {
            let port = args
                .get(2)
                .and_then(|p| p.parse().ok())
                .unwrap_or(consumer::DEFAULT_PORT);
            consumer::serve(port).await
        }
        Some("demo") => demo::run().await,
        Some("--help" | "-h" | "help") => {
            println!("Tabcast — tab capture relay consumer");
            println!();
            println!("Usage: tabcast [command]");
            println!();
            println!("Commands:");
            println!("  serve [port]    Accept relay connections (default port 8080)");
            println!("  demo            Run a synthetic end-to-end capture session");
            println!("  help            Show this help message");
            Ok(())
        }
        Some(other) => {
            eprintln!("Unknown command: {}. Use 'tabcast help' for usage.", other);
            std::process::exit(1);
        }
    }
}
