//! Basic image generation example.
//!
//! Run with: `cargo run --example generate_image -- "a red fox in snow"`
//!
//! Requires `FLUX_SCHNELL_API_KEY` (a Together key). The endpoint defaults to
//! Together's images API unless `FLUX_SCHNELL_API_BASE_URL` is set.

use flux_schnell::{generate, Configuration, ProviderKind};

#[tokio::main]
async fn main() -> flux_schnell::Result<()> {
    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "A golden retriever puppy playing in snow".to_string());

    let base_url = std::env::var("FLUX_SCHNELL_API_BASE_URL")
        .unwrap_or_else(|_| ProviderKind::Together.default_endpoint().to_string());

    let config = Configuration::builder()
        .api_base_url(base_url)
        .provider(ProviderKind::Together)
        .inline_images(true)
        .build()?;

    let image = generate(&prompt, &config).await?;
    let path = format!("output.{}", image.format().map_or("png", |f| f.extension()));
    image.save(&path)?;
    println!("Generated image: {path}");

    Ok(())
}
