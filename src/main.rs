mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use tm_av::{FfmpegMuxer, ToolRegistry, YtDlpSource};
use tm_core::config::Config;
use tm_pipeline::Pipeline;

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => Config::load(p).with_context(|| format!("loading {}", p.display())),
        None => Ok(Config::default()),
    }
}

async fn serve(host: Option<String>, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    tm_server::start(config).await?;
    Ok(())
}

async fn fetch(url: &str, output: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let tools = ToolRegistry::discover(&config.tools);
    let source = YtDlpSource::from_registry(&tools)?;
    let muxer = FfmpegMuxer::from_registry(&tools)?;
    let pipeline = Pipeline::new(Arc::new(source), Arc::new(muxer), &config);

    let bytes = pipeline.fetch_to(url, output).await?;
    println!("Saved {} ({bytes} bytes)", output.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "tubemux=trace,tm_server=debug,tm_pipeline=debug,tm_av=debug,tower_http=debug"
                .to_string()
        } else {
            "tubemux=info,tm_server=info,tm_pipeline=info,tm_av=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Serve { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve(host, port, cli.config.as_deref()))
        }
        Commands::Fetch { url, output } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(fetch(&url, &output, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("tubemux {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools);

    for tool in tools.check_all() {
        let status = if tool.available { "✓" } else { "✗" };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({version})");
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if tools.all_available() {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg and yt-dlp to serve downloads.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!(
        "  Selection: combined >= {}p, video <= {}",
        config.selection.min_combined_height,
        config
            .selection
            .max_video_height
            .map(|h| format!("{h}p"))
            .unwrap_or_else(|| "any".into())
    );
    println!(
        "  Mux codecs: {} / {}",
        config.mux.video_codec, config.mux.audio_codec
    );
    println!("  Retries: {}", config.retry.max_retries);

    for warning in config.validate() {
        println!("  warning: {warning}");
    }

    Ok(())
}
