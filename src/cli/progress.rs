//! Progress bar and summary reporting for CLI downloads.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::{BatchStats, FileDescriptor, PresentedError, format_bytes, format_duration, format_speed};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Creates a progress bar for total download progress.
pub fn make_total_progress_bar(size: u64) -> ProgressBar {
    let bar = ProgressBar::new(size);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:40.green/white}] {bytes}/{total_bytes} {msg}",
        )
        .expect("template valid")
        .progress_chars("━━╌"),
    );
    bar
}

/// Prints the list of files to be downloaded.
pub fn print_file_list(files: &[FileDescriptor], total_size: u64) {
    if files.is_empty() {
        println!("No files to download.");
        return;
    }

    println!("\n{SEPARATOR}");
    println!("Files to download:");
    println!("{SEPARATOR}");

    for file in files {
        let size = file.size.map_or_else(|| "?".to_string(), format_bytes);
        let tag = if file.file_type.is_empty() {
            String::new()
        } else {
            format!(" [{}]", file.file_type)
        };
        println!("  {}{tag} ({size})", file.path.display());
    }

    println!("{SEPARATOR}");
    println!(
        "  {} file(s), {} total",
        files.len(),
        format_bytes(total_size)
    );
    println!("{SEPARATOR}\n");
}

/// Prints a summary of batch statistics.
pub fn print_summary(stats: &BatchStats) {
    println!("\n{SEPARATOR}");
    println!("Download Summary");
    println!("{SEPARATOR}");
    println!("  Files downloaded:  {}", stats.files_downloaded);
    if stats.files_failed > 0 {
        println!(
            "  Files failed:      {}",
            style(stats.files_failed).yellow()
        );
    }
    if stats.retries > 0 {
        println!("  Retries:           {}", stats.retries);
    }
    println!("  Total size:        {}", format_bytes(stats.total_bytes));
    println!("  Total time:        {}", format_duration(stats.elapsed));
    println!("  Average speed:     {}", format_speed(stats.average_speed()));
    println!("  Peak speed:        {}", format_speed(stats.peak_speed));
    println!("{SEPARATOR}");
}

/// Prints a presented error: friendly message first, technical details after.
pub fn print_error(error: &PresentedError) {
    eprintln!("\n{} {}", style("Error:").red().bold(), error.message);
    if let Some(file) = &error.file {
        eprintln!("  File:    {}", file.display());
    }
    if let Some(details) = &error.details {
        eprintln!("  Details: {}", style(details).dim());
    }
}
