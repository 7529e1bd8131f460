mod error;
mod parameters;
mod paths;
mod pipeline;
mod run_times;

use std::{io::Write as _, path::PathBuf, process::ExitCode};

use chrono::Local;
use clap::Parser;
use env_logger::{Builder, Env};
use log::LevelFilter;

use error::Error;
use parameters::Parameters;
use pipeline::PostProcessing;

#[derive(Parser, Debug)]
#[command(
    name = "FSCT Post Processing",
    about = "Builds a terrain model from a segmented forest point cloud and cleans its labels by height above ground",
    author = "MIERUNE Inc.",
    version = "0.0.1"
)]
struct Cli {
    /// Point cloud the run started from; outputs go next to it.
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// JSON parameter file; flags given on the command line take precedence.
    #[arg(short, long, value_name = "FILE")]
    parameters: Option<PathBuf>,

    #[arg(long)]
    plot_radius: Option<f64>,

    #[arg(long)]
    plot_radius_buffer: Option<f64>,

    #[arg(long)]
    noise_class: Option<i32>,

    #[arg(long)]
    terrain_class: Option<i32>,

    #[arg(long)]
    vegetation_class: Option<i32>,

    #[arg(long)]
    cwd_class: Option<i32>,

    #[arg(long)]
    stem_class: Option<i32>,

    /// DTM lattice spacing in metres.
    #[arg(short, long)]
    resolution: Option<f64>,

    #[arg(long)]
    clustering_epsilon: Option<f64>,

    #[arg(long)]
    min_cluster_points: Option<usize>,

    #[arg(long)]
    smoothing_radius: Option<f64>,

    /// Keep DTM cells outside the footprint of the point cloud.
    #[arg(long)]
    no_crop: bool,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_parameters(self) -> Result<Parameters, Error> {
        let mut parameters = match &self.parameters {
            Some(path) => Parameters::from_json_file(path)?,
            None => Parameters::default(),
        };

        if let Some(input) = self.input {
            parameters.input_point_cloud = input;
        }
        let overrides = [
            (self.plot_radius, &mut parameters.plot_radius),
            (self.plot_radius_buffer, &mut parameters.plot_radius_buffer),
            (self.resolution, &mut parameters.fine_grid_resolution),
            (self.clustering_epsilon, &mut parameters.clustering_epsilon),
        ];
        for (value, target) in overrides {
            if let Some(value) = value {
                *target = value;
            }
        }
        let class_overrides = [
            (self.noise_class, &mut parameters.noise_class),
            (self.terrain_class, &mut parameters.terrain_class),
            (self.vegetation_class, &mut parameters.vegetation_class),
            (self.cwd_class, &mut parameters.cwd_class),
            (self.stem_class, &mut parameters.stem_class),
        ];
        for (value, target) in class_overrides {
            if let Some(value) = value {
                *target = value;
            }
        }
        if let Some(min_cluster_points) = self.min_cluster_points {
            parameters.min_cluster_points = min_cluster_points;
        }
        if self.smoothing_radius.is_some() {
            parameters.smoothing_radius = self.smoothing_radius;
        }
        if self.no_crop {
            parameters.crop_dtm = false;
        }

        Ok(parameters)
    }
}

fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    Builder::from_env(Env::default().default_filter_or(level.as_str()))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn main() -> ExitCode {
    let args = Cli::parse();
    init_logger(args.verbose);

    let result = args
        .into_parameters()
        .and_then(|parameters| {
            log::info!("input point cloud: {:?}", parameters.input_point_cloud);
            log::info!("fine grid resolution: {}", parameters.fine_grid_resolution);
            PostProcessing::new(parameters)
        })
        .and_then(|processing| {
            log::info!("output folder: {:?}", processing.paths().output_dir);
            processing.run()
        });

    match result {
        Ok(summary) => {
            log::info!(
                "{} points in the cleaned cloud, {} rejected, {} DTM cells, {} noise points",
                summary.cleaned_points,
                summary.rejected_points,
                summary.dtm_cells,
                summary.noise_points
            );
            if summary.plot_area.is_none() {
                log::warn!("no plot area estimate for this run");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("post processing failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
