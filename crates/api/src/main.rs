use std::env;

use anyhow::Result;
use chatbot_api::build_app;
use chatbot_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("chatbot_api");

    let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let bind = env::var("CHATBOT_BIND").unwrap_or_else(|_| format!("0.0.0.0:{port}"));

    let app = build_app().await?;

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(bind = %bind, "chatbot webhook server started");

    axum::serve(listener, app).await?;
    Ok(())
}
