use std::path::{Path, PathBuf};

use pcd_core::pointcloud::label::ClassLabel;

use crate::{error::Error, parameters::Parameters};

pub const RUN_TIMES_FILE: &str = "run_times.csv";

/// Locations of the files this stage reads and writes.
///
/// Everything lives in `<input dir>/<input stem>_FSCT_output/`. Product files
/// use the extension of the input point cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub output_dir: PathBuf,
    /// Stem of the segmented cloud, including the crop suffix for plot runs.
    pub working_stem: String,
    pub extension: String,
}

impl OutputPaths {
    pub fn from_parameters(parameters: &Parameters) -> Result<Self, Error> {
        let input = &parameters.input_point_cloud;
        let invalid = || Error::InvalidInputPath(input.clone());

        let stem = input
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(invalid)?;
        let extension = input
            .extension()
            .and_then(|extension| extension.to_str())
            .ok_or_else(invalid)?;
        let parent = input.parent().unwrap_or_else(|| Path::new(""));

        let working_stem = if parameters.plot_radius != 0.0 {
            format!(
                "{}_{}_m_crop",
                stem,
                parameters.plot_radius + parameters.plot_radius_buffer
            )
        } else {
            stem.to_string()
        };

        Ok(Self {
            output_dir: parent.join(format!("{}_FSCT_output", stem)),
            working_stem,
            extension: extension.to_string(),
        })
    }

    fn product(&self, name: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", name, self.extension))
    }

    /// The labelled cloud written by the segmentation stage.
    pub fn segmented(&self) -> PathBuf {
        self.product(&format!("{}_segmented", self.working_stem))
    }

    pub fn cleaned(&self) -> PathBuf {
        self.product(&format!("{}_segmented_cleaned", self.working_stem))
    }

    pub fn dtm(&self) -> PathBuf {
        self.product("DTM")
    }

    pub fn class_points(&self, label: ClassLabel) -> PathBuf {
        self.product(&format!("{}_points", label.name()))
    }

    pub fn run_times(&self) -> PathBuf {
        self.output_dir.join(RUN_TIMES_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths_for(input: &str, plot_radius: f64, plot_radius_buffer: f64) -> OutputPaths {
        OutputPaths::from_parameters(&Parameters {
            input_point_cloud: PathBuf::from(input),
            plot_radius,
            plot_radius_buffer,
            ..Parameters::default()
        })
        .unwrap()
    }

    #[test]
    fn full_cloud_names() {
        let paths = paths_for("data/site/plot.las", 0.0, 0.0);
        let dir = PathBuf::from("data/site/plot_FSCT_output");
        assert_eq!(paths.output_dir, dir);
        assert_eq!(paths.segmented(), dir.join("plot_segmented.las"));
        assert_eq!(paths.cleaned(), dir.join("plot_segmented_cleaned.las"));
        assert_eq!(paths.dtm(), dir.join("DTM.las"));
        assert_eq!(
            paths.class_points(ClassLabel::Cwd),
            dir.join("cwd_points.las")
        );
        assert_eq!(paths.run_times(), dir.join("run_times.csv"));
    }

    #[test]
    fn plot_runs_read_the_cropped_cloud() {
        let paths = paths_for("plot.csv", 10.0, 0.0);
        assert_eq!(paths.output_dir, PathBuf::from("plot_FSCT_output"));
        assert_eq!(
            paths.segmented(),
            PathBuf::from("plot_FSCT_output/plot_10_m_crop_segmented.csv")
        );

        let paths = paths_for("plot.las", 10.0, 0.5);
        assert_eq!(paths.working_stem, "plot_10.5_m_crop");
    }

    #[test]
    fn input_without_extension_is_rejected() {
        let result = OutputPaths::from_parameters(&Parameters {
            input_point_cloud: PathBuf::from("data/plot"),
            ..Parameters::default()
        });
        assert!(matches!(result, Err(Error::InvalidInputPath(_))));
    }
}
