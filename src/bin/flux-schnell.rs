//! CLI for flux-schnell - FLUX.1 image generation.

use clap::{Args, Parser, Subcommand, ValueEnum};
use flux_schnell::pipe::render_error;
use flux_schnell::{generate, ChatBody, Configuration, Pipe, ProviderKind};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flux-schnell")]
#[command(about = "Generate images with FLUX.1 Schnell via Hugging Face, Replicate, Together or Hyperbolic")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image from a text prompt
    Generate(GenerateArgs),

    /// Answer a host chat payload read from stdin
    Pipe(PipeArgs),

    /// List the models this manifold exposes
    Pipes,

    /// List supported providers
    Providers,
}

#[derive(Args)]
struct ConfigArgs {
    /// Endpoint URL (defaults to FLUX_SCHNELL_API_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Provider to use (defaults to FLUX_SCHNELL_PROVIDER, then URL inference)
    #[arg(short, long, value_enum)]
    provider: Option<ProviderArg>,

    /// Request timeout in seconds (defaults to FLUX_SCHNELL_TIMEOUT_SECS or 60)
    #[arg(long)]
    timeout: Option<u64>,

    /// Download URL results and return them inline
    #[arg(long)]
    inline: bool,
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    /// Save inline image data to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args)]
struct PipeArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    Huggingface,
    Replicate,
    Together,
    Hyperbolic,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Huggingface => ProviderKind::HuggingFace,
            ProviderArg::Replicate => ProviderKind::Replicate,
            ProviderArg::Together => ProviderKind::Together,
            ProviderArg::Hyperbolic => ProviderKind::Hyperbolic,
        }
    }
}

impl ConfigArgs {
    fn resolve(&self) -> flux_schnell::Result<Configuration> {
        let mut builder = Configuration::builder();
        if let Some(url) = &self.base_url {
            builder = builder.api_base_url(url);
        }
        if let Some(provider) = self.provider {
            builder = builder.provider(provider.into());
        }
        if let Some(secs) = self.timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if self.inline {
            builder = builder.inline_images(true);
        }
        builder.build()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the answer for the host.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => {
            generate_image(args, cli.json).await?;
        }
        Commands::Pipe(args) => {
            run_pipe(args).await?;
        }
        Commands::Pipes => {
            list_pipes(cli.json)?;
        }
        Commands::Providers => {
            list_providers(cli.json)?;
        }
    }

    Ok(())
}

async fn generate_image(args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    let config = args.config.resolve()?;
    let image = generate(&args.prompt, &config).await?;

    if let Some(ref output) = args.output {
        image.save(output)?;
    }

    if json_output {
        let mut result = serde_json::to_value(&image)?;
        result["provider"] = serde_json::json!(config.provider().to_string());
        if let Some(ref output) = args.output {
            result["output"] = serde_json::json!(output.display().to_string());
        }
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if let Some(ref output) = args.output {
        println!(
            "Generated image: {} via {}",
            output.display(),
            config.provider().name()
        );
    } else {
        println!("{}", image.to_markdown());
    }

    Ok(())
}

async fn run_pipe(args: PipeArgs) -> anyhow::Result<()> {
    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    let body: ChatBody = serde_json::from_str(&input)?;

    // The host expects an answer even for configuration problems.
    let pipe = match args.config.resolve() {
        Ok(config) => Pipe::with_config(config),
        Err(e) => {
            println!("{}", render_error(&e));
            std::process::exit(1);
        }
    };

    let answer = pipe.pipe(&body).await;
    println!("{answer}");
    if answer.starts_with("Error:") {
        std::process::exit(1);
    }
    Ok(())
}

fn list_pipes(json_output: bool) -> anyhow::Result<()> {
    let pipe = Pipe::new();
    if json_output {
        println!("{}", serde_json::to_string_pretty(&pipe.pipes())?);
    } else {
        for info in pipe.pipes() {
            println!("{} ({}{})", info.id, pipe.name(), info.name);
        }
    }
    Ok(())
}

fn list_providers(json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct ProviderInfo {
        name: &'static str,
        kind: String,
        endpoint: &'static str,
    }

    let providers: Vec<ProviderInfo> = ProviderKind::ALL
        .into_iter()
        .map(|kind| ProviderInfo {
            name: kind.name(),
            kind: kind.to_string(),
            endpoint: kind.default_endpoint(),
        })
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&providers)?);
    } else {
        println!("Available providers:\n");
        for p in &providers {
            println!("  {} ({})", p.name, p.kind);
            println!("    endpoint: {}", p.endpoint);
        }
        println!("\nAPI key: FLUX_SCHNELL_API_KEY");
    }

    Ok(())
}
