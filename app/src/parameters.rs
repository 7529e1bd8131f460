use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use pcd_core::pointcloud::label::{ClassLabel, LabelScheme};
use pcd_exporter::exporters::las::is_storable_class_code;
use pcd_terrain::DtmParams;

use crate::error::Error;

/// Run configuration, shared with the rest of the processing chain through a
/// JSON parameter file. Unknown keys are ignored so the same file can carry
/// settings for the other stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// The point cloud the whole run started from, not the segmented one.
    pub input_point_cloud: PathBuf,
    pub plot_radius: f64,
    pub plot_radius_buffer: f64,
    pub noise_class: i32,
    pub terrain_class: i32,
    pub vegetation_class: i32,
    pub cwd_class: i32,
    pub stem_class: i32,
    pub fine_grid_resolution: f64,
    pub clustering_epsilon: f64,
    pub min_cluster_points: usize,
    /// Defaults to three grid cells.
    pub smoothing_radius: Option<f64>,
    pub crop_dtm: bool,
    pub subsample_min_spacing: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        let scheme = LabelScheme::default();
        let dtm = DtmParams::default();
        Self {
            input_point_cloud: PathBuf::new(),
            plot_radius: 0.0,
            plot_radius_buffer: 0.0,
            noise_class: scheme.noise,
            terrain_class: scheme.terrain,
            vegetation_class: scheme.vegetation,
            cwd_class: scheme.cwd,
            stem_class: scheme.stem,
            fine_grid_resolution: dtm.grid_resolution,
            clustering_epsilon: dtm.clustering_epsilon,
            min_cluster_points: dtm.min_cluster_points,
            smoothing_radius: None,
            crop_dtm: dtm.crop,
            subsample_min_spacing: dtm.subsample_min_spacing,
        }
    }
}

impl Parameters {
    pub fn from_json_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path).map_err(|source| Error::ParameterFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| Error::ParameterJson {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.input_point_cloud.as_os_str().is_empty() {
            return Err(Error::MissingInput);
        }
        let scheme = self.label_scheme();
        for class in ClassLabel::ALL {
            let code = scheme.encode(class);
            if !is_storable_class_code(code) {
                return Err(Error::ClassCodeOutOfRange { class, code });
            }
        }
        if let Some((a, b)) = scheme.find_collision() {
            return Err(Error::LabelCollision(a, b));
        }
        self.dtm_params().validate()?;
        Ok(())
    }

    pub fn label_scheme(&self) -> LabelScheme {
        LabelScheme {
            noise: self.noise_class,
            terrain: self.terrain_class,
            vegetation: self.vegetation_class,
            cwd: self.cwd_class,
            stem: self.stem_class,
        }
    }

    pub fn dtm_params(&self) -> DtmParams {
        let defaults = DtmParams::with_resolution(self.fine_grid_resolution);
        DtmParams {
            clustering_epsilon: self.clustering_epsilon,
            min_cluster_points: self.min_cluster_points,
            smoothing_radius: self
                .smoothing_radius
                .unwrap_or(defaults.smoothing_radius),
            crop: self.crop_dtm,
            subsample_min_spacing: self.subsample_min_spacing,
            ..defaults
        }
    }
}
