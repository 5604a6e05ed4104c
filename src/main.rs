use christmas_magic::{
    build_prompt, output, ArkClient, Config, GenerationSettings, Intensity, PromptOptions,
    TaskStatus, TaskTracker,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

const USAGE: &str = "usage:
  christmas-magic serve
  christmas-magic [--size 2K|3K|WxH] [--strong] [--no-hats] [--no-env] <photo>...";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    christmas_magic::logger::init()?;
    if dotenv_loaded {
        log::info!(".env file loaded successfully");
    } else {
        log::warn!("No .env file found, using system environment variables");
    }

    let config = Config::from_env();
    christmas_magic::logger::log_config_info(&config);

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("serve") => serve(config).await,
        Some("-h") | Some("--help") | None => {
            println!("{}", USAGE);
            Ok(())
        }
        Some(_) => generate(config, args).await,
    }
}

#[cfg(feature = "server")]
async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    christmas_magic::server::run(config).await?;
    Ok(())
}

#[cfg(not(feature = "server"))]
async fn serve(_config: Config) -> Result<(), Box<dyn std::error::Error>> {
    Err("built without the `server` feature".into())
}

async fn generate(config: Config, args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = PromptOptions::default();
    let mut settings = GenerationSettings::default();
    let mut paths = Vec::new();

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--size" => {
                let size = iter.next().ok_or("--size needs a value")?;
                settings = settings.with_size(size);
            }
            "--strong" => options.intensity = Intensity::Strong,
            "--no-hats" => options.add_hats = false,
            "--no-env" => options.enhance_env = false,
            _ => paths.push(arg),
        }
    }
    settings.prompt = build_prompt(&options);

    let client = ArkClient::new(config.ark.clone());
    let tracker = TaskTracker::new(Arc::new(client)).with_max_concurrency(config.max_concurrency);

    let ids = tracker
        .load_paths(paths.iter().map(PathBuf::from).collect())
        .await;
    log::info!("Prepared {} of {} photos", ids.len(), paths.len());
    if ids.is_empty() {
        return Err("no usable photos".into());
    }

    tracker.generate_all(&settings).await;

    let output_dir = config.output_dir_or_default();
    for task in tracker.snapshot() {
        match (task.status, task.result_url.as_deref()) {
            (TaskStatus::Success, Some(result)) => {
                match output::save_result(result, &output_dir).await {
                    Ok(path) => println!("{} -> {}", task.source_name, path.display()),
                    Err(e) => println!("{} -> generated but not saved: {}", task.source_name, e),
                }
            }
            _ => println!(
                "{} -> failed: {}",
                task.source_name,
                task.error_message.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    Ok(())
}
