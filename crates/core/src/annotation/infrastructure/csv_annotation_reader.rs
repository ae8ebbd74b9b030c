use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::annotation::domain::annotation_category::{
    AnnotationCategory, AnnotationValue, ACTION_UNIT_COUNT,
};
use crate::annotation::domain::annotation_resolver::ResolveError;
use crate::annotation::domain::annotation_stream::{AnnotationStream, StreamSuffix};

/// Reads a comma-separated annotation file with one header line.
pub fn read_annotation_stream(
    path: &Path,
    suffix: StreamSuffix,
    category: AnnotationCategory,
) -> Result<AnnotationStream, ResolveError> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let file = File::open(path).map_err(|e| ResolveError::Read {
        path: path.to_path_buf(),
        source: csv::Error::from(e),
    })?;
    let rows = parse_rows(file, category, path)?;
    log::debug!("Read {} {category} rows from {}", rows.len(), path.display());
    Ok(AnnotationStream { name, suffix, rows })
}

pub fn parse_rows<R: Read>(
    reader: R,
    category: AnnotationCategory,
    path: &Path,
) -> Result<Vec<AnnotationValue>, ResolveError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b',')
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (row, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|source| ResolveError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let malformed = |reason: String| ResolveError::MalformedAnnotation {
            path: path.to_path_buf(),
            row,
            reason,
        };
        if record.len() != category.column_count() {
            return Err(malformed(format!(
                "expected {} columns for {category}, found {}",
                category.column_count(),
                record.len()
            )));
        }
        let value = match category {
            AnnotationCategory::ValenceArousal => AnnotationValue::ValenceArousal {
                valence: parse_field(&record[0]).map_err(&malformed)?,
                arousal: parse_field(&record[1]).map_err(&malformed)?,
            },
            AnnotationCategory::Expression => {
                AnnotationValue::Expression(parse_field(&record[0]).map_err(&malformed)?)
            }
            AnnotationCategory::ActionUnits => {
                let mut units = [0i32; ACTION_UNIT_COUNT];
                for (unit, field) in units.iter_mut().zip(record.iter()) {
                    *unit = parse_field(field).map_err(&malformed)?;
                }
                AnnotationValue::ActionUnits(units)
            }
        };
        rows.push(value);
    }
    Ok(rows)
}

fn parse_field<T: FromStr>(field: &str) -> Result<T, String> {
    field
        .parse()
        .map_err(|_| format!("cannot parse '{field}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parse(text: &str, category: AnnotationCategory) -> Result<Vec<AnnotationValue>, ResolveError> {
        parse_rows(text.as_bytes(), category, Path::new("test.txt"))
    }

    #[test]
    fn test_valence_arousal_rows() {
        let rows = parse("valence,arousal\n0.1,0.2\n-5,-5\n", AnnotationCategory::ValenceArousal)
            .unwrap();
        assert_eq!(
            rows,
            vec![
                AnnotationValue::ValenceArousal { valence: 0.1, arousal: 0.2 },
                AnnotationValue::ValenceArousal { valence: -5.0, arousal: -5.0 },
            ]
        );
        assert!(rows[1].is_unlabeled());
    }

    #[test]
    fn test_expression_rows() {
        let rows = parse(
            "Neutral,Anger,Disgust,Fear,Happiness,Sadness,Surprise\n0\n4\n-1\n",
            AnnotationCategory::Expression,
        );
        // the header has seven names but each data row has one value
        assert_eq!(
            rows.unwrap(),
            vec![
                AnnotationValue::Expression(0),
                AnnotationValue::Expression(4),
                AnnotationValue::Expression(-1)
            ]
        );
    }

    #[test]
    fn test_action_unit_rows() {
        let rows = parse(
            "AU1,AU2,AU4,AU6,AU12,AU15,AU20,AU25\n0,1,0,0,1,0,0,1\n",
            AnnotationCategory::ActionUnits,
        )
        .unwrap();
        assert_eq!(rows, vec![AnnotationValue::ActionUnits([0, 1, 0, 0, 1, 0, 0, 1])]);
    }

    #[test]
    fn test_wrong_column_count_is_malformed() {
        let err = parse("valence,arousal\n0.1\n", AnnotationCategory::ValenceArousal).unwrap_err();
        assert!(matches!(err, ResolveError::MalformedAnnotation { row: 0, .. }));
    }

    #[test]
    fn test_unparsable_value_is_malformed() {
        let err = parse("expr\n0\nhappy\n", AnnotationCategory::Expression).unwrap_err();
        assert!(matches!(err, ResolveError::MalformedAnnotation { row: 1, .. }));
    }

    #[test]
    fn test_read_file_uses_stem_as_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("118_left.txt");
        fs::write(&path, "valence,arousal\n0.5,0.5\n").unwrap();
        let stream =
            read_annotation_stream(&path, StreamSuffix::Left, AnnotationCategory::ValenceArousal)
                .unwrap();
        assert_eq!(stream.name, "118_left");
        assert_eq!(stream.suffix, StreamSuffix::Left);
        assert_eq!(stream.rows.len(), 1);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = read_annotation_stream(
            Path::new("/definitely/not/here.txt"),
            StreamSuffix::Unsuffixed,
            AnnotationCategory::Expression,
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::Read { .. }));
    }
}
