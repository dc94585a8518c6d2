use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "l3-binner")]
#[command(about = "Level-3 binning of satellite swath scenes onto global grids")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Hide progress bars")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Describe the grid of a binning request, optionally locating a position on it
    GridInfo {
        #[arg(short, long, help = "Binning request file (TOML)")]
        config: PathBuf,

        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Bin one scene into a spatial database
    Spatial {
        #[arg(short, long, help = "Binning request file (TOML)")]
        config: PathBuf,

        #[arg(short, long, help = "Scene CSV file (line,pixel,lat,lon,<bands>)")]
        scene: PathBuf,

        #[arg(short, long, help = "Spatial database name [default: scene file stem]")]
        name: Option<String>,
    },

    /// Merge spatial databases into the temporal database
    Merge {
        #[arg(short, long, help = "Binning request file (TOML)")]
        config: PathBuf,

        #[arg(required = true, help = "Names of the spatial databases to merge")]
        databases: Vec<String>,

        #[arg(long, help = "Keep the spatial databases after merging")]
        keep: bool,
    },

    /// Bin every scene of a directory in parallel and merge the results
    Batch {
        #[arg(short, long, help = "Binning request file (TOML)")]
        config: PathBuf,

        #[arg(short, long, help = "Directory containing scene CSV files")]
        input_dir: PathBuf,

        #[arg(
            long,
            help = "Only use scene files whose name contains this pattern",
            default_value = ""
        )]
        file_pattern: String,

        #[arg(long, help = "Worker threads [default: request max_workers or CPU count]")]
        max_workers: Option<usize>,
    },

    /// Print the geographic footprint of the temporal database as JSON
    Footprint {
        #[arg(short, long, help = "Binning request file (TOML)")]
        config: PathBuf,
    },

    /// Write the interpreted bins of the temporal database to CSV
    Dump {
        #[arg(short, long, help = "Binning request file (TOML)")]
        config: PathBuf,

        #[arg(short, long, help = "Output CSV file")]
        output_file: PathBuf,
    },
}
