use std::{path::Path, time::Instant};

use pcd_core::pointcloud::{
    label::{ClassLabel, LabelScheme, LabelSource},
    point::PointCloud,
};
use pcd_exporter::exporters::exporter_for_path;
use pcd_parser::parsers::{parser_for_path, ParseOptions};
use pcd_spatial::ConvexHull;
use pcd_terrain::{build_dtm, normalize_heights, reconcile, ReconcileThresholds};

use crate::{
    error::Error, parameters::Parameters, paths::OutputPaths, run_times::update_run_times,
};

/// What a finished run produced, for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub dtm_cells: usize,
    pub noise_points: usize,
    /// `None` when the terrain points do not span an area.
    pub plot_area: Option<f64>,
    pub rejected_points: usize,
    pub cleaned_points: usize,
}

pub struct PostProcessing {
    parameters: Parameters,
    paths: OutputPaths,
    thresholds: ReconcileThresholds,
    started: Instant,
}

impl PostProcessing {
    pub fn new(parameters: Parameters) -> Result<Self, Error> {
        let started = Instant::now();
        parameters.validate()?;
        let paths = OutputPaths::from_parameters(&parameters)?;
        Ok(Self {
            parameters,
            paths,
            thresholds: ReconcileThresholds::default(),
            started,
        })
    }

    pub fn paths(&self) -> &OutputPaths {
        &self.paths
    }

    pub fn run(self) -> Result<RunSummary, Error> {
        let scheme = self.parameters.label_scheme();

        log::info!("start loading segmented point cloud...");
        let start_local = Instant::now();
        let options = ParseOptions {
            scheme,
            source: LabelSource::Upstream,
        };
        let point_cloud = parser_for_path(vec![self.paths.segmented()], options)?.parse()?;
        log::info!(
            "finish loading {} points in {:?}",
            point_cloud.len(),
            start_local.elapsed()
        );

        let terrain = point_cloud.select_label(ClassLabel::Terrain);
        let terrain_xy = terrain.xy();

        let start_local = Instant::now();
        let model = build_dtm(terrain, Some(&point_cloud), &self.parameters.dtm_params())?;
        log::info!(
            "finish building DTM ({} cells, {} noise points) in {:?}",
            model.grid.len(),
            model.noise_points.len(),
            start_local.elapsed()
        );
        let dtm_path = self.paths.dtm();
        exporter_for_path(&dtm_path, scheme)?.export_grid(&model.grid, &dtm_path)?;

        let plot_area = match ConvexHull::compute(&terrain_xy) {
            Ok(hull) => {
                log::info!(
                    "plot area is approximately {:.2} m^2 or {:.4} ha",
                    hull.area(),
                    hull.area_ha()
                );
                Some(hull.area())
            }
            Err(e) => {
                log::warn!("plot area is unavailable: {}", e);
                None
            }
        };

        let start_local = Instant::now();
        let point_cloud = normalize_heights(point_cloud, &model.grid)?;
        log::info!("finish normalizing heights in {:?}", start_local.elapsed());

        let reconciliation = reconcile(point_cloud, &self.thresholds);
        for (label, rejected) in &reconciliation.rejected {
            if !rejected.is_empty() {
                log::info!("{} {} points rejected", rejected.len(), label);
            }
        }
        let rejected_points = reconciliation.rejected_count();

        log::info!("start saving outputs...");
        for (label, cloud) in [
            (ClassLabel::Terrain, &reconciliation.terrain),
            (ClassLabel::Stem, &reconciliation.stem),
            (ClassLabel::Vegetation, &reconciliation.vegetation),
            (ClassLabel::Cwd, &reconciliation.cwd),
        ] {
            export(cloud, &self.paths.class_points(label), scheme)?;
        }
        let cleaned = reconciliation.into_cleaned();
        export(&cleaned, &self.paths.cleaned(), scheme)?;

        let elapsed = self.started.elapsed();
        log::info!("post processing took {:?}", elapsed);
        update_run_times(&self.paths.run_times(), elapsed.as_secs_f64())?;
        log::info!("post processing done");

        Ok(RunSummary {
            dtm_cells: model.grid.len(),
            noise_points: model.noise_points.len(),
            plot_area,
            rejected_points,
            cleaned_points: cleaned.len(),
        })
    }
}

fn export(cloud: &PointCloud, path: &Path, scheme: LabelScheme) -> Result<(), Error> {
    exporter_for_path(path, scheme)?.export(cloud, path)?;
    Ok(())
}
