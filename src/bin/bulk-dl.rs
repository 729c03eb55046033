//! bulk-dl - Download every file listed in a JSON manifest.

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use bulk_dl::Error;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match bulk_dl::cli::run().await {
        Ok(()) => {}
        // Already reported with its friendly message.
        Err(Error::Aborted(_)) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
