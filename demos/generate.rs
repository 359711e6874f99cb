//! Generate images from the command line.
//!
//! Reads credential pairs from the environment (or a `.env` file), builds
//! the pool and runs every prompt given on the command line concurrently.
//! Images are written to the current directory as `image-<request id>.<ext>`.
//!
//! ```bash
//! RUST_LOG=imagen_dispatch=debug cargo run --example generate -- \
//!     "a lighthouse at dusk" "a red fox in the snow"
//! ```
//!
//! Optional environment variables: `STYLE` (e.g. `ANIME`) and
//! `ASPECT_RATIO` (e.g. `16:9`).

use imagen_dispatch::{
    AspectRatio, Config, GenerationRequest, ImageGenerator, Passthrough, Presentation,
    PromptResolution, PromptSource, Style, classify, resolve_prompt,
};
use tracing_subscriber::EnvFilter;

fn init_logging(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

fn extension(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "png",
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_logging("info");

    let prompts: Vec<String> = std::env::args().skip(1).collect();
    if prompts.is_empty() {
        eprintln!("usage: generate <prompt> [<prompt> ...]");
        std::process::exit(2);
    }

    let mut config = Config::from_env()?;
    if let Ok(style) = std::env::var("STYLE") {
        config.defaults.style = style.parse::<Style>()?;
    }
    if let Ok(ratio) = std::env::var("ASPECT_RATIO") {
        config.defaults.aspect_ratio = ratio.parse::<AspectRatio>()?;
    }
    let defaults = config.defaults.clone();

    let generator = ImageGenerator::new(config).await?;

    let mut events = generator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::debug!(?event, "generator event");
        }
    });

    let mut handles = Vec::new();
    for prompt in prompts {
        let source = PromptSource::text_for(prompt, defaults.style, defaults.aspect_ratio);
        let prompt = match resolve_prompt(&Passthrough, &source).await {
            PromptResolution::Ready(prompt) => prompt,
            PromptResolution::Blocked | PromptResolution::Unavailable => continue,
        };
        let request = GenerationRequest::with_defaults(prompt, &defaults);
        handles.push(generator.generate(request)?);
    }

    for handle in handles {
        let report = handle.await?;
        match classify(&report.outcome) {
            Presentation::Image(image) => {
                let file = format!("image-{}.{}", report.request_id, extension(image.mime));
                tokio::fs::write(&file, &image.bytes).await?;
                println!("request {}: wrote {file}", report.request_id);
            }
            Presentation::Notice(notice) => {
                println!("request {}: {notice}", report.request_id);
            }
        }
    }

    generator.shutdown().await?;
    Ok(())
}
