#![warn(clippy::unwrap_used)]

use clap::{Parser, Subcommand};
use pagefit::{
    error::ContextError,
    export::{itinerary_file_name, ExportConfiguration, Exporter},
    page_format::{Orientation, PageFormat},
    raster::RasterSnapshot,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CliArguments {
    /// Log everything down to the trace level.
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct SnapshotArguments {
    /// The rendered snapshot (PNG or JPEG).
    #[arg(short = 'i', long = "image", value_name = "image_file")]
    snapshot_path: PathBuf,
    /// The JSON export configuration.
    #[arg(short = 'c', long = "configuration", value_name = "json_file")]
    configuration_path: Option<PathBuf>,
    /// Overrides the page format of the configuration (a3, a4, a5, letter, legal or <width>x<height> in mm).
    #[arg(long = "page")]
    page_format: Option<PageFormat>,
    /// Overrides the page orientation of the configuration (portrait or landscape).
    #[arg(long = "orientation")]
    orientation: Option<Orientation>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the download PDF document.
    Export {
        #[command(flatten)]
        snapshot: SnapshotArguments,
        /// The path of the output PDF file.
        #[arg(short = 'o', long = "output", value_name = "file_path", conflicts_with_all = ["destination", "customer"])]
        output_file_path: Option<PathBuf>,
        /// The trip destination, used for naming the output file.
        #[arg(long = "destination", default_value = "")]
        destination: String,
        /// The customer name, used for naming the output file.
        #[arg(long = "customer", default_value = "")]
        customer: String,
        /// The directory the named output file is written into.
        #[arg(short = 'd', long = "directory", value_name = "directory", default_value = ".")]
        output_directory: PathBuf,
    },
    /// Write the preview PDF document and open it.
    Preview {
        #[command(flatten)]
        snapshot: SnapshotArguments,
    },
    /// Print how the snapshot would be laid out, as JSON.
    Plan {
        #[command(flatten)]
        snapshot: SnapshotArguments,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LayoutPlan {
    fit: pagefit::fitting::FitResult,
    placements: Vec<pagefit::fitting::PagePlacement>,
    pixel_slices: Vec<pagefit::fitting::PixelSlice>,
}

fn main() {
    if let Err(error) = fallible_main() {
        log::error!("{}", error);
        std::process::exit(1);
    }
}

fn fallible_main() -> Result<(), ContextError> {
    let arguments = CliArguments::parse();
    let default_level = if arguments.verbose { "trace" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
    log::debug!("{:?}", arguments);

    match arguments.command {
        Command::Export {
            snapshot,
            output_file_path,
            destination,
            customer,
            output_directory,
        } => {
            let (exporter, raster_snapshot) = load(&snapshot)?;
            let output_file_path = output_file_path.unwrap_or_else(|| {
                output_directory.join(itinerary_file_name(&destination, &customer))
            });
            exporter.export(&raster_snapshot, &output_file_path)?;
        }
        Command::Preview { snapshot } => {
            let (exporter, raster_snapshot) = load(&snapshot)?;
            let preview_path = exporter.preview(&raster_snapshot)?;
            log::info!("Opened the preview {:?}", preview_path);
        }
        Command::Plan { snapshot } => {
            let (exporter, raster_snapshot) = load(&snapshot)?;
            let fit = exporter.plan(&raster_snapshot)?;
            let layout_plan = LayoutPlan {
                fit,
                placements: fit.placements(),
                pixel_slices: fit.pixel_slices(),
            };
            let rendered_plan = serde_json::to_string_pretty(&layout_plan).map_err(|error| {
                ContextError::with_error("Failed to serialize the layout plan", &error)
            })?;
            println!("{}", rendered_plan);
        }
    }

    Ok(())
}

fn load(arguments: &SnapshotArguments) -> Result<(Exporter, RasterSnapshot), ContextError> {
    let mut configuration = match &arguments.configuration_path {
        Some(configuration_path) => ExportConfiguration::from_path(configuration_path)?,
        None => ExportConfiguration::default(),
    };
    if let Some(page_format) = arguments.page_format {
        configuration.page_format = page_format;
    }
    if let Some(orientation) = arguments.orientation {
        configuration.orientation = orientation;
    }
    log::debug!("{:?}", configuration);

    let raster_snapshot = RasterSnapshot::from_path(&arguments.snapshot_path)?;

    Ok((Exporter::new(configuration), raster_snapshot))
}
