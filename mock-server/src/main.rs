use mock_server::{Secret, DEFAULT_SECRET_KEY};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let key = std::env::var("MOCK_SECRET_KEY").unwrap_or_else(|_| DEFAULT_SECRET_KEY.to_string());
    let secret = Secret::from_base64(&key).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "MOCK_SECRET_KEY must be base64 of 16, 24 or 32 bytes",
        )
    })?;

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "mock API listening");
    mock_server::run(listener, secret).await
}
