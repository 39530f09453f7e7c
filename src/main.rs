use anyhow::Result;
use clap::Parser;
use resize_job_client::app::{App, RunOptions};
use resize_job_client::controller::TracingObserver;
use resize_job_client::models::Config;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "resize-job-client")]
#[command(about = "Upload images for resizing and wait for the results")]
struct CliArgs {
    /// Images to resize, processed one after another.
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// JPEG/WebP quality, 1-100.
    #[arg(short, long, default_value = "85")]
    quality: String,

    /// Maximum output width in pixels.
    #[arg(short = 'W', long, default_value = "128")]
    width: String,

    /// Maximum output height in pixels.
    #[arg(short = 'H', long, default_value = "128")]
    height: String,

    /// Override the detected content type of the input.
    #[arg(long)]
    content_type: Option<String>,

    /// Where resized images are saved.
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Only wait for the result; do not download it.
    #[arg(long)]
    no_download: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resize_job_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(2);
        }
    };

    let app = App::new(&config, Box::new(TracingObserver), args.output_dir.clone()).await?;

    let controller = app.controller();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match controller.cancel() {
                Ok(()) => warn!("Stopped waiting for the resized image"),
                Err(e) => {
                    warn!("Interrupted ({}); exiting", e);
                    std::process::exit(130);
                }
            }
        }
    });

    let options = RunOptions {
        quality: args.quality,
        max_width: args.width,
        max_height: args.height,
        content_type: args.content_type,
        download: !args.no_download,
    };

    let mut failures = 0;
    for file in &args.files {
        match app.run(file, &options).await {
            Ok(Some(path)) => info!("{} -> {}", file.display(), path.display()),
            Ok(None) => info!("{} resized", file.display()),
            Err(e) => {
                error!("{}: {}", file.display(), e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        error!("{} of {} jobs failed", failures, args.files.len());
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::CliArgs;
    use clap::Parser;

    #[test]
    fn test_cli_defaults() {
        let args = CliArgs::try_parse_from(["resize-job-client", "cat.png"]).unwrap();
        assert_eq!(args.files.len(), 1);
        assert_eq!(args.quality, "85");
        assert_eq!(args.width, "128");
        assert_eq!(args.height, "128");
        assert!(!args.no_download);
    }

    #[test]
    fn test_cli_requires_a_file() {
        assert!(CliArgs::try_parse_from(["resize-job-client"]).is_err());
    }

    #[test]
    fn test_cli_dimensions() {
        let args = CliArgs::try_parse_from([
            "resize-job-client",
            "-W",
            "640",
            "-H",
            "480",
            "--no-download",
            "a.png",
            "b.png",
        ])
        .unwrap();
        assert_eq!(args.width, "640");
        assert_eq!(args.height, "480");
        assert!(args.no_download);
        assert_eq!(args.files.len(), 2);
    }
}
