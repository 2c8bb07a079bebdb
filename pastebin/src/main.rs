use pastebin::PastebinProvider;
use tfplug::{serve, ServeConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // stdout is reserved for the plugin handshake
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .init();

    serve(PastebinProvider::new(), ServeConfig::from_env()).await?;

    Ok(())
}
