//! wallet-auth application entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Build the auth gateway (challenge codec, signature recovery, session issuer)
//! 3. Start the replay-cache purge job when replay protection is on
//! 4. Build router with API routes, CORS, panic isolation and security headers
//! 5. Start Axum server
//!
//! Also supports a `secret` subcommand for generating server secrets.

use rand::Rng;
use wallet_auth::{auth::AppState, cleanup, config::Config, routes};

/// Generate a random 32-byte secret, hex-encoded.
fn generate_secret() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    hex::encode(bytes)
}

fn print_secret_usage() {
    eprintln!("Usage: wallet-auth secret");
    eprintln!();
    eprintln!("Print a random secret suitable for APP_SECRET or SESSION_SECRET.");
    eprintln!("Run it twice; the two secrets must differ.");
    eprintln!();
    eprintln!("Then set in .env:");
    eprintln!("  APP_SECRET=<first output>");
    eprintln!("  SESSION_SECRET=<second output>");
}

#[tokio::main]
async fn main() {
    // Check for secret subcommand
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 {
        if args[1] == "secret" && args.len() == 2 {
            println!("{}", generate_secret());
            return;
        }
        print_secret_usage();
        std::process::exit(1);
    }

    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config from environment
    let config = Config::from_env().expect("Failed to load config");
    tracing::info!("Starting wallet-auth on {}", config.bind_addr);

    let bind_addr = config.bind_addr;
    let cleanup_interval = config.replay_cleanup_interval();

    // Build shared state
    let state = AppState::from_config(config);

    // Purge consumed challenges in the background
    match state.gateway.replay_cache() {
        Some(cache) => {
            tokio::spawn(cleanup::run_cleanup_loop(cache, cleanup_interval));
            tracing::info!("Replay protection enabled");
        }
        None => tracing::warn!("Replay protection disabled; challenges are reusable until expiry"),
    }

    let app = routes::app(state);

    // Bind to configured address
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Listening on {}", bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
