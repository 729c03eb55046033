//! CLI mode for bulk-dl - download every file listed in a JSON manifest.

mod progress;

use std::path::PathBuf;
use std::time::Duration;

use console::style;
use tokio::sync::mpsc;

use crate::{
    AppConfig, BatchEvent, Downloader, Error, Manifest, RetryPolicy, format_eta, format_speed,
};

use progress::{make_total_progress_bar, print_error, print_file_list, print_summary};

/// Parsed command-line options.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Options {
    /// Config file override.
    pub config: Option<PathBuf>,
    /// Directory relative manifest paths are resolved against.
    pub root: Option<PathBuf>,
    /// Concurrency limit override.
    pub limit: Option<usize>,
    /// Per-file timeout override.
    pub timeout: Option<Duration>,
    /// Use the lenient retry policy.
    pub lenient: bool,
    /// Manifest path.
    pub manifest: Option<PathBuf>,
    /// Print usage and exit.
    pub help: bool,
}

/// Prints usage information.
pub fn print_usage() {
    eprintln!("Usage: bulk-dl [OPTIONS] <manifest.json>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <PATH>     Config file (default: {})", AppConfig::default_path().display());
    eprintln!("  -r, --root <DIR>        Resolve relative destination paths against DIR");
    eprintln!("  -l, --limit <N>         Number of concurrent downloads");
    eprintln!("  -t, --timeout-ms <MS>   Per-file timeout in milliseconds");
    eprintln!("      --lenient           Retry transient failures instead of aborting");
    eprintln!("  -h, --help              Show this help");
}

/// Parses command-line arguments (without the program name).
///
/// # Errors
///
/// Returns an error for unknown flags, missing values, or unparsable numbers.
pub fn parse_args<I>(args: I) -> crate::Result<Options>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| Error::Config(format!("{flag} requires a value")))
        };
        match arg.as_str() {
            "-c" | "--config" => options.config = Some(PathBuf::from(value(&arg)?)),
            "-r" | "--root" => options.root = Some(PathBuf::from(value(&arg)?)),
            "-l" | "--limit" => {
                let raw = value(&arg)?;
                options.limit = Some(
                    raw.parse()
                        .map_err(|_| Error::Config(format!("invalid limit: {raw}")))?,
                );
            }
            "-t" | "--timeout-ms" => {
                let raw = value(&arg)?;
                let ms: u64 = raw
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid timeout: {raw}")))?;
                options.timeout = Some(Duration::from_millis(ms));
            }
            "--lenient" => options.lenient = true,
            "-h" | "--help" => options.help = true,
            flag if flag.starts_with('-') => {
                return Err(Error::Config(format!("unknown option: {flag}")));
            }
            _ if options.manifest.is_none() => options.manifest = Some(PathBuf::from(&arg)),
            _ => return Err(Error::Config(format!("unexpected argument: {arg}"))),
        }
    }

    Ok(options)
}

/// Loads the config file and applies command-line overrides.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
pub fn resolve_config(options: &Options) -> crate::Result<AppConfig> {
    let path = options.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&path)?;

    if let Some(limit) = options.limit {
        config.download.concurrency_limit = limit;
    }
    if let Some(timeout) = options.timeout {
        config.download.per_file_timeout = timeout;
    }
    if options.lenient {
        config.download.retry_policy = RetryPolicy::Lenient;
    }
    Ok(config)
}

/// Runs the CLI with the process arguments.
///
/// # Errors
///
/// Returns an error if arguments, config, or manifest are invalid, or if the
/// batch is aborted.
pub async fn run() -> crate::Result<()> {
    let options = parse_args(std::env::args().skip(1))?;
    let Some(manifest_path) = options.manifest.clone().filter(|_| !options.help) else {
        print_usage();
        return Ok(());
    };

    let config = resolve_config(&options)?;
    let mut manifest = Manifest::load(&manifest_path)?;
    if let Some(root) = &options.root {
        manifest = manifest.rooted_at(root);
    }
    let total_size = manifest.total_size();
    print_file_list(&manifest.files, total_size);

    let client = config.http.build_client()?;
    let downloader = Downloader::new(client, config.download);

    let (tx, rx) = mpsc::unbounded_channel();
    let renderer = tokio::spawn(render(rx, total_size));

    let result = downloader.download_batch(manifest.files, total_size, &tx).await;
    drop(tx);
    let _ = renderer.await;

    match result {
        Ok(stats) => {
            print_summary(&stats);
            Ok(())
        }
        Err(Error::Aborted(presented)) => {
            print_error(&presented);
            Err(Error::Aborted(presented))
        }
        Err(e) => Err(e),
    }
}

/// Drives the progress bar from batch events until the channel closes.
async fn render(mut rx: mpsc::UnboundedReceiver<BatchEvent>, total_size: u64) {
    let bar = make_total_progress_bar(total_size);
    bar.enable_steady_tick(Duration::from_millis(250));
    let mut speed = String::new();

    while let Some(event) = rx.recv().await {
        match event {
            BatchEvent::Progress {
                downloaded,
                total,
                file_type,
            } => {
                bar.set_length(total.max(downloaded));
                bar.set_position(downloaded);
                if !file_type.is_empty() && speed.is_empty() {
                    bar.set_message(file_type);
                }
            }
            BatchEvent::Speed(bps) => speed = format_speed(bps),
            BatchEvent::Estimated(secs) => {
                bar.set_message(format!("@ {speed} - ETA {}", format_eta(secs)));
            }
            BatchEvent::FileError(error) => {
                bar.println(format!(
                    "{} {error}",
                    style("Skipped:").yellow()
                ));
            }
            BatchEvent::Error(_) => bar.abandon(),
            BatchEvent::Complete => bar.finish_with_message("done"),
        }
    }
}
