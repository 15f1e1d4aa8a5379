use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::types::{Dataset, Sample};

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("dataset contains no samples")]
    Empty,
}

/// Sparse row before densification: label plus (zero-based index, value) pairs
struct SparseRow {
    label: f64,
    entries: Vec<(usize, f64)>,
}

/// Load a LIBSVM-format file (`<label> <index>:<value> ...`, 1-based indices).
///
/// Rows are densified to the widest index in the file, or to `num_features`
/// when given.
pub fn load_libsvm(path: impl AsRef<Path>, num_features: Option<usize>) -> Result<Dataset, DatasetError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let dataset = parse_libsvm(BufReader::new(file), num_features)?;
    info!(
        "Loaded {} samples with {} features from {}",
        dataset.len(),
        dataset.n_features(),
        path.display()
    );
    Ok(dataset)
}

pub fn parse_libsvm<R: BufRead>(reader: R, num_features: Option<usize>) -> Result<Dataset, DatasetError> {
    let mut rows = Vec::new();
    let mut max_index = 0usize;

    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line?;
        let content = match line.split_once('#') {
            Some((before, _)) => before,
            None => line.as_str(),
        }
        .trim();
        if content.is_empty() {
            continue;
        }

        let row = parse_row(content, line_no)?;
        if let Some(&(last, _)) = row.entries.last() {
            max_index = max_index.max(last + 1);
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(DatasetError::Empty);
    }

    let width = match num_features {
        Some(n) if n < max_index => {
            return Err(DatasetError::Parse {
                line: 0,
                message: format!("feature index {} exceeds declared width {}", max_index, n),
            });
        }
        Some(n) => n,
        None => max_index,
    };
    debug!("Densifying {} rows to width {}", rows.len(), width);

    let samples = rows
        .into_iter()
        .map(|row| {
            let mut features = vec![0.0; width];
            for (index, value) in row.entries {
                features[index] = value;
            }
            Sample::new(row.label, features)
        })
        .collect();

    Ok(Dataset::new(samples))
}

fn parse_row(content: &str, line: usize) -> Result<SparseRow, DatasetError> {
    let err = |message: String| DatasetError::Parse { line, message };

    let mut tokens = content.split_whitespace();
    let label_token = tokens.next().ok_or_else(|| err("missing label".to_string()))?;
    let label: f64 = label_token
        .parse()
        .map_err(|_| err(format!("invalid label '{}'", label_token)))?;

    let mut entries: Vec<(usize, f64)> = Vec::new();
    for token in tokens {
        let (index, value) = token
            .split_once(':')
            .ok_or_else(|| err(format!("expected index:value, got '{}'", token)))?;
        let index: usize = index
            .parse()
            .map_err(|_| err(format!("invalid feature index '{}'", index)))?;
        if index == 0 {
            return Err(err("feature indices are 1-based".to_string()));
        }
        let value: f64 = value
            .parse()
            .map_err(|_| err(format!("invalid feature value '{}'", value)))?;

        let zero_based = index - 1;
        if let Some(&(prev, _)) = entries.last() {
            if zero_based <= prev {
                return Err(err(format!("feature indices must be ascending (got {} after {})", index, prev + 1)));
            }
        }
        entries.push((zero_based, value));
    }

    Ok(SparseRow { label, entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_parse_densifies_sparse_rows() {
        let input = "1 1:0.5 3:2.0\n0 2:-1\n";
        let ds = parse_libsvm(Cursor::new(input), None).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.n_features(), 3);
        assert_eq!(ds.samples()[0].features, vec![0.5, 0.0, 2.0]);
        assert_eq!(ds.samples()[1].features, vec![0.0, -1.0, 0.0]);
        assert_eq!(ds.samples()[1].label, 0.0);
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let input = "# header\n\n1 1:1 # trailing\n   \n0\n";
        let ds = parse_libsvm(Cursor::new(input), None).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.samples()[1].features, vec![0.0]);
    }

    #[test]
    fn test_declared_width_pads_rows() {
        let ds = parse_libsvm(Cursor::new("1 2:1\n"), Some(4)).unwrap();
        assert_eq!(ds.n_features(), 4);
        assert!(parse_libsvm(Cursor::new("1 5:1\n"), Some(4)).is_err());
    }

    #[test]
    fn test_malformed_rows_report_line() {
        let cases = ["1 1:1\nx 1:1\n", "1 1:1\n1 0:1\n", "1 1:1\n1 3:1 2:1\n", "1 1:1\n1 1-1\n"];
        for input in cases {
            match parse_libsvm(Cursor::new(input), None) {
                Err(DatasetError::Parse { line, .. }) => assert_eq!(line, 2),
                other => panic!("expected parse error, got {:?}", other.map(|d| d.len())),
            }
        }
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(
            parse_libsvm(Cursor::new("# nothing\n"), None),
            Err(DatasetError::Empty)
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0 1:0.1 2:0.2").unwrap();
        writeln!(file, "1 1:0.9 2:0.8").unwrap();
        file.flush().unwrap();

        let ds = load_libsvm(file.path(), None).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.class_counts().ones, 1);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            load_libsvm("/nonexistent/data.txt", None),
            Err(DatasetError::Io(_))
        ));
    }
}
