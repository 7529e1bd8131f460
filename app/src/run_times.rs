use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Writer};
use thiserror::Error;

pub const POST_PROCESSING_COLUMN: &str = "Post_processing_time (s)";

#[derive(Debug, Error)]
pub enum RunTimesError {
    #[error("failed to read run times {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to write run times {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Sets this stage's elapsed time on every row of the run-time record,
/// keeping the columns written by the other stages.
pub fn update_run_times(path: &Path, seconds: f64) -> Result<(), RunTimesError> {
    let read_error = |source| RunTimesError::Read {
        path: path.to_path_buf(),
        source,
    };

    let (mut headers, mut rows) = if path.exists() {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(read_error)?;
        let headers = reader.headers().map_err(read_error)?.clone();
        let rows = reader
            .records()
            .collect::<Result<Vec<StringRecord>, _>>()
            .map_err(read_error)?;
        (headers, rows)
    } else {
        log::warn!("{:?} not found, starting a new run time record", path);
        (StringRecord::new(), vec![StringRecord::new()])
    };

    let column = match headers.iter().position(|h| h == POST_PROCESSING_COLUMN) {
        Some(column) => column,
        None => {
            headers.push_field(POST_PROCESSING_COLUMN);
            headers.len() - 1
        }
    };

    let value = seconds.to_string();
    for row in rows.iter_mut() {
        let mut fields: Vec<&str> = row.iter().collect();
        fields.resize(headers.len(), "");
        fields[column] = &value;
        let updated = StringRecord::from(fields);
        *row = updated;
    }

    write_records(path, &headers, &rows).map_err(|source| RunTimesError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("post processing time of {:.2}s recorded in {:?}", seconds, path);
    Ok(())
}

fn write_records(path: &Path, headers: &StringRecord, rows: &[StringRecord]) -> csv::Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn read_back(path: &Path) -> Vec<Vec<String>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn existing_columns_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_times.csv");
        fs::write(
            &path,
            "Preprocessing_time (s),Semantic_segmentation_time (s)\n12.5,340.25\n",
        )
        .unwrap();

        update_run_times(&path, 7.5).unwrap();
        assert_eq!(
            read_back(&path),
            vec![
                vec![
                    "Preprocessing_time (s)",
                    "Semantic_segmentation_time (s)",
                    POST_PROCESSING_COLUMN
                ],
                vec!["12.5", "340.25", "7.5"],
            ]
        );
    }

    #[test]
    fn rerun_overwrites_its_own_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_times.csv");
        fs::write(
            &path,
            format!("Preprocessing_time (s),{}\n1,2\n3,4\n", POST_PROCESSING_COLUMN),
        )
        .unwrap();

        update_run_times(&path, 9.0).unwrap();
        let rows = read_back(&path);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["1", "9"]);
        assert_eq!(rows[2], vec!["3", "9"]);
    }

    #[test]
    fn missing_record_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_times.csv");

        update_run_times(&path, 0.25).unwrap();
        assert_eq!(
            read_back(&path),
            vec![vec![POST_PROCESSING_COLUMN], vec!["0.25"]]
        );
    }
}
