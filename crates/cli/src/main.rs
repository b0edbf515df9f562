use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use exif2geo_core::{
    app_paths, available_drivers, collect_photos, load_config, load_config_from, run_export,
    AppConfig, DiscoveryOptions, ExportOptions, ExportSummary, PhotoSummary,
};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "exif2geo", version)]
#[command(about = "Exports the GPS positions of JPEG photos as point features")]
struct Cli {
    /// Files or directories to scan for JPEG photos
    paths: Vec<PathBuf>,
    /// Store absolute file paths in the output
    #[arg(short = 'a', long = "abspath")]
    abspath: bool,
    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,
    /// Follow symbolic links while walking directories
    #[arg(short = 'L', long)]
    follow_links: bool,
    /// Write one combined date/time field instead of separate date and time
    #[arg(short = 'd', long = "datetime")]
    datetime: bool,
    /// Write time values as text, for formats without a native time type
    #[arg(short = 't', long = "string")]
    string: bool,
    /// Name of the output layer
    #[arg(short = 'l', long = "layername")]
    layer_name: Option<String>,
    /// Output format, see --list-formats
    #[arg(short, long)]
    format: Option<String>,
    /// Output file or directory
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// EPSG code of the output reference system
    #[arg(short = 's', long = "spatial-ref")]
    spatial_ref: Option<u32>,
    /// Log per-file details
    #[arg(short, long)]
    verbose: bool,
    /// Print results as JSON
    #[arg(long)]
    json: bool,
    /// List the supported output formats and exit
    #[arg(long)]
    list_formats: bool,
    /// Print the GPS facts of each photo instead of exporting
    #[arg(long)]
    inspect: bool,
    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,
    /// Read defaults from this file instead of the user configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => {
            log::debug!("reading defaults from {}", path.display());
            load_config_from(path)?
        }
        None => load_config()?,
    };

    if cli.list_formats {
        return cmd_list_formats(cli.json);
    }
    if cli.show_config {
        return cmd_show_config(&cli, &config);
    }
    if cli.paths.is_empty() {
        usage_error("at least one input path is required");
    }
    if cli.inspect {
        return cmd_inspect(&cli, &config);
    }
    cmd_export(cli, config)
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn usage_error(message: &str) -> ! {
    Cli::command()
        .error(ErrorKind::MissingRequiredArgument, message)
        .exit()
}

fn cmd_export(cli: Cli, config: AppConfig) -> Result<()> {
    let Some(format) = cli.format.or(config.default_format) else {
        usage_error("an output format is required (--format)");
    };
    let Some(output) = cli.output else {
        usage_error("an output path is required (--output)");
    };

    let options = ExportOptions {
        inputs: cli.paths,
        absolute_paths: cli.abspath || config.absolute_paths_default,
        recursive: cli.recursive || config.recursive_default,
        follow_links: cli.follow_links || config.follow_links_default,
        combined_datetime: cli.datetime || config.combined_datetime_default,
        string_temporal: cli.string || config.string_temporal_default,
        layer_name: cli.layer_name.unwrap_or(config.layer_name),
        format,
        output,
        target_epsg: cli
            .spatial_ref
            .unwrap_or(u32::from(config.target_epsg)),
    };
    log::debug!("{options:?}");

    let summary = run_export(&options)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn cmd_inspect(cli: &Cli, config: &AppConfig) -> Result<()> {
    let discovery = DiscoveryOptions {
        recursive: cli.recursive || config.recursive_default,
        follow_links: cli.follow_links || config.follow_links_default,
        absolute_paths: cli.abspath || config.absolute_paths_default,
    };
    let collected = collect_photos(&cli.paths, discovery);
    let summaries: Vec<PhotoSummary> = collected.photos.iter().map(|p| p.summary()).collect();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        print_photo_table(&summaries);
        println!(
            "\nFound {} jpeg files, {} with GPS information.",
            collected.jpeg_files,
            collected.geolocated().count()
        );
    }
    Ok(())
}

fn cmd_list_formats(json: bool) -> Result<()> {
    let names: Vec<&str> = available_drivers().iter().map(|d| d.name()).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(())
}

fn cmd_show_config(cli: &Cli, config: &AppConfig) -> Result<()> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => app_paths()?.config_path,
    };
    println!("config file: {}", path.display());
    println!(
        "{}",
        toml::to_string_pretty(config).context("could not render config")?
    );
    Ok(())
}

fn print_summary(summary: &ExportSummary) {
    println!(
        "Found {} jpeg files, {} with GPS information.",
        summary.photos_found, summary.geolocated
    );
    if summary.skipped > 0 {
        log::warn!("{} photos could not be written.", summary.skipped);
    }
    if !summary.missing_fields.is_empty() {
        log::warn!(
            "fields left out of the output: {}",
            summary.missing_fields.join(", ")
        );
    }
}

fn print_photo_table(summaries: &[PhotoSummary]) {
    println!("file | latitude | longitude | altitude | recorded | epsg");
    for summary in summaries {
        println!(
            "{} | {} | {} | {} | {} | {}",
            summary.path.display(),
            optional(summary.latitude),
            optional(summary.longitude),
            optional(summary.altitude),
            optional(summary.recording_date),
            summary.epsg
        );
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}
