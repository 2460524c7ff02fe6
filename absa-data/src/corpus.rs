use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::ops::Index;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::vocab::Tokenizer;

/// Marker that stands for the aspect term inside the sentence line.
pub const ASPECT_PLACEHOLDER: &str = "$T$";

/// Suffix of the companion file holding dependency distances.
pub const DISTANCE_SUFFIX: &str = ".dist";

const LINES_PER_RECORD: usize = 3;
const DISTANCE_LINES_PER_RECORD: usize = 2;

/// One aspect-sentiment example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectRecord {
    pub text_left: String,
    pub aspect: String,
    pub text_right: String,
    /// `"{left} {aspect} {right}"`, the sentence with the aspect put back in place.
    pub full_text: String,
    pub text_indices: Vec<usize>,
    pub aspect_indices: Vec<usize>,
    pub left_indices: Vec<usize>,
    /// Raw label shifted by one, so {-1, 0, 1} becomes {0, 1, 2}.
    pub polarity: usize,
    pub dependency_dist: Option<Vec<f32>>,
}

/// Records of one corpus file, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbsaDataset {
    records: Vec<AspectRecord>,
}

impl AbsaDataset {
    pub fn new(records: Vec<AspectRecord>) -> Self {
        AbsaDataset { records }
    }

    pub fn get(&self, index: usize) -> Option<&AspectRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AspectRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[AspectRecord] {
        &self.records
    }

    /// Writes every record as one JSON object per line.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write_jsonl(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| DataError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        for record in &self.records {
            serde_json::to_writer(&mut writer, record).map_err(|source| DataError::Json {
                path: path.to_path_buf(),
                source,
            })?;
            writeln!(writer).map_err(|e| DataError::io(path, e))?;
        }
        writer.flush().map_err(|e| DataError::io(path, e))
    }
}

impl Index<usize> for AbsaDataset {
    type Output = AspectRecord;

    fn index(&self, index: usize) -> &Self::Output {
        &self.records[index]
    }
}

impl<'a> IntoIterator for &'a AbsaDataset {
    type Item = &'a AspectRecord;
    type IntoIter = std::slice::Iter<'a, AspectRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl IntoIterator for AbsaDataset {
    type Item = AspectRecord;
    type IntoIter = std::vec::IntoIter<AspectRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// The raw text fields of one record, lower-cased and trimmed.
struct RawRecord {
    text_left: String,
    aspect: String,
    text_right: String,
    polarity_line: String,
}

impl RawRecord {
    fn full_text(&self) -> String {
        format!("{} {} {}", self.text_left, self.aspect, self.text_right)
    }
}

/// Returns the path of the dependency-distance file that belongs to `corpus_path`.
pub fn distance_path(corpus_path: &Path) -> PathBuf {
    let mut path = corpus_path.as_os_str().to_owned();
    path.push(DISTANCE_SUFFIX);
    PathBuf::from(path)
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(path).map_err(|e| DataError::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::to_string)
        .collect())
}

fn read_raw_records(path: &Path) -> Result<Vec<RawRecord>> {
    let lines = read_lines(path)?;
    if lines.len() % LINES_PER_RECORD != 0 {
        return Err(DataError::format(
            path,
            lines.len(),
            format!(
                "{} lines is not a multiple of {} lines per record",
                lines.len(),
                LINES_PER_RECORD
            ),
        ));
    }

    Ok(lines
        .chunks(LINES_PER_RECORD)
        .map(|chunk| {
            let (left, right) = chunk[0]
                .split_once(ASPECT_PLACEHOLDER)
                .unwrap_or((chunk[0].as_str(), ""));
            RawRecord {
                text_left: left.to_lowercase().trim().to_string(),
                aspect: chunk[1].to_lowercase().trim().to_string(),
                text_right: right.to_lowercase().trim().to_string(),
                polarity_line: chunk[2].trim().to_string(),
            }
        })
        .collect())
}

/// Concatenates the text of every record in `paths` into one corpus string.
/// Used to fit a vocabulary; no records are produced.
///
/// # Errors
/// Returns an error if a file is missing or its line count is malformed.
pub fn read_text<P: AsRef<Path>>(paths: &[P]) -> Result<String> {
    let mut text = String::new();
    for path in paths {
        let path = path.as_ref();
        let records = read_raw_records(path)?;
        log::debug!("read {} records of text from {}", records.len(), path.display());
        for record in &records {
            text.push_str(&record.full_text());
            text.push(' ');
        }
    }
    Ok(text)
}

/// CorpusReader struct that turns a corpus file into [`AspectRecord`]s.
/// Index sequences are produced with the tokenizer it is built with.
pub struct CorpusReader<'a> {
    tokenizer: &'a Tokenizer,
    with_distances: bool,
}

impl<'a> CorpusReader<'a> {
    /// Creates a reader that also requires the `.dist` companion file.
    pub fn new(tokenizer: &'a Tokenizer) -> Self {
        CorpusReader {
            tokenizer,
            with_distances: true,
        }
    }

    /// Creates a reader for corpora without a `.dist` companion file.
    pub fn without_distances(tokenizer: &'a Tokenizer) -> Self {
        CorpusReader {
            tokenizer,
            with_distances: false,
        }
    }

    /// Reads all records of a corpus file.
    ///
    /// # Arguments
    /// * `path` - The corpus file, three lines per record.
    ///
    /// # Returns
    /// The records in file order.
    ///
    /// # Errors
    /// Returns an error if a file is missing, the line count is not a multiple of three,
    /// a polarity is not an integer of at least -1, or the distance file is too short
    /// or holds a non-numeric value.
    pub fn read(&self, path: &Path) -> Result<AbsaDataset> {
        let raw_records = read_raw_records(path)?;

        let distances = if self.with_distances {
            let dist_path = distance_path(path);
            Some(read_distances(&dist_path, raw_records.len())?)
        } else {
            None
        };

        let mut records = Vec::with_capacity(raw_records.len());
        for (i, raw) in raw_records.into_iter().enumerate() {
            let polarity_line_no = i * LINES_PER_RECORD + LINES_PER_RECORD;
            let polarity = parse_polarity(&raw.polarity_line)
                .map_err(|message| DataError::format(path, polarity_line_no, message))?;

            let full_text = raw.full_text();
            records.push(AspectRecord {
                text_indices: self.tokenizer.encode(&full_text),
                aspect_indices: self.tokenizer.encode(&raw.aspect),
                left_indices: self.tokenizer.encode(&raw.text_left),
                polarity,
                dependency_dist: distances.as_ref().map(|d| d[i].clone()),
                text_left: raw.text_left,
                aspect: raw.aspect,
                text_right: raw.text_right,
                full_text,
            });
        }

        log::debug!("parsed {} records from {}", records.len(), path.display());
        Ok(AbsaDataset::new(records))
    }
}

fn parse_polarity(field: &str) -> std::result::Result<usize, String> {
    let raw: i64 = field
        .parse()
        .map_err(|_| format!("polarity '{}' is not an integer", field))?;
    if raw < -1 {
        return Err(format!("polarity {} is below -1", raw));
    }
    raw.checked_add(1)
        .and_then(|shifted| usize::try_from(shifted).ok())
        .ok_or_else(|| format!("polarity {} is out of range", raw))
}

fn read_distances(path: &Path, num_records: usize) -> Result<Vec<Vec<f32>>> {
    let lines = read_lines(path)?;
    let expected = num_records * DISTANCE_LINES_PER_RECORD;
    if lines.len() < expected {
        return Err(DataError::format(
            path,
            lines.len(),
            format!(
                "expected at least {} lines for {} records, found {}",
                expected,
                num_records,
                lines.len()
            ),
        ));
    }

    (0..num_records)
        .map(|i| {
            let line_idx = i * DISTANCE_LINES_PER_RECORD + 1;
            lines[line_idx]
                .split_whitespace()
                .map(|value| {
                    value.parse::<f32>().map_err(|_| {
                        DataError::format(
                            path,
                            line_idx + 1,
                            format!("distance '{}' is not a number", value),
                        )
                    })
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use tempfile::TempDir;

    use crate::vocab::{PAD_INDEX, UNK_INDEX};

    // Helper: write a corpus file and, optionally, its distance companion.
    fn write_corpus(
        dir: &TempDir,
        name: &str,
        corpus: &str,
        dist: Option<&str>,
    ) -> std::result::Result<PathBuf, Box<dyn std::error::Error>> {
        let path = dir.path().join(name);
        let mut file = File::create(&path)?;
        write!(file, "{}", corpus)?;
        if let Some(dist) = dist {
            let mut dist_file = File::create(distance_path(&path))?;
            write!(dist_file, "{}", dist)?;
        }
        Ok(path)
    }

    const CORPUS: &str = "The $T$ was delicious .\n\
                          Pizza\n\
                          1\n\
                          $T$ is too slow\n\
                          service\n\
                          -1\n\
                          I came for the $T$\n\
                          view\n\
                          0\n";

    const DIST: &str = "the pizza was delicious .\n\
                        1 0 1 2 3\n\
                        service is too slow\n\
                        0 1 2 3\n\
                        i came for the view\n\
                        4 3 2 1 0\n";

    #[test]
    fn test_distance_path() {
        assert_eq!(
            distance_path(Path::new("data/Laptops_Train.xml.seg")),
            PathBuf::from("data/Laptops_Train.xml.seg.dist")
        );
    }

    #[test]
    fn test_read_records() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let path = write_corpus(&dir, "train.seg", CORPUS, Some(DIST))?;

        let mut tokenizer = Tokenizer::new();
        tokenizer.fit(&read_text(&[&path])?);
        let dataset = CorpusReader::new(&tokenizer).read(&path)?;

        assert_eq!(dataset.len(), 3);
        for record in &dataset {
            assert!(!record.text_indices.is_empty());
            assert!(record.polarity <= 2);
            assert!(!record.text_indices.contains(&UNK_INDEX));
        }

        let first = &dataset[0];
        assert_eq!(first.text_left, "the");
        assert_eq!(first.aspect, "pizza");
        assert_eq!(first.text_right, "was delicious .");
        assert_eq!(first.full_text, "the pizza was delicious .");
        assert_eq!(first.polarity, 2);
        assert_eq!(first.aspect_indices, tokenizer.encode("pizza"));
        assert_eq!(first.dependency_dist, Some(vec![1.0, 0.0, 1.0, 2.0, 3.0]));

        let second = &dataset[1];
        assert_eq!(second.text_left, "");
        assert_eq!(second.left_indices, vec![PAD_INDEX]);
        assert_eq!(second.polarity, 0);

        assert_eq!(dataset[2].polarity, 1);
        assert_eq!(dataset[2].text_right, "");
        Ok(())
    }

    #[test]
    fn test_read_text_concatenates_files() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let train = write_corpus(&dir, "train.seg", "Nice $T$ !\nScreen\n1\n", None)?;
        let test = write_corpus(&dir, "test.seg", "$T$ died\nbattery\n-1\n", None)?;

        let text = read_text(&[train, test])?;
        assert_eq!(text, "nice screen !  battery died ");
        Ok(())
    }

    #[test]
    fn test_read_without_distances() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let path = write_corpus(&dir, "train.seg", CORPUS, None)?;

        let tokenizer = Tokenizer::new();
        let dataset = CorpusReader::without_distances(&tokenizer).read(&path)?;
        assert_eq!(dataset.len(), 3);
        assert!(dataset.iter().all(|r| r.dependency_dist.is_none()));
        Ok(())
    }

    #[test]
    fn test_missing_distance_file_is_io_error() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let path = write_corpus(&dir, "train.seg", CORPUS, None)?;

        let tokenizer = Tokenizer::new();
        match CorpusReader::new(&tokenizer).read(&path) {
            Err(DataError::Io { path, .. }) => assert!(path.ends_with("train.seg.dist")),
            other => panic!("expected I/O error, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_missing_corpus_file_is_io_error() {
        let tokenizer = Tokenizer::new();
        let result = CorpusReader::new(&tokenizer).read(Path::new("/nonexistent/train.seg"));
        assert!(matches!(result, Err(DataError::Io { .. })));
    }

    #[test]
    fn test_line_count_not_multiple_of_three() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let path = write_corpus(&dir, "train.seg", "The $T$ is fine\nfood\n", Some(""))?;

        let tokenizer = Tokenizer::new();
        assert!(matches!(
            CorpusReader::new(&tokenizer).read(&path),
            Err(DataError::Format { .. })
        ));
        assert!(matches!(read_text(&[&path]), Err(DataError::Format { .. })));
        Ok(())
    }

    #[test]
    fn test_non_integer_polarity() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let path = write_corpus(
            &dir,
            "train.seg",
            "The $T$ is fine\nfood\npositive\n",
            Some("the food is fine\n1 0 1 2\n"),
        )?;

        let tokenizer = Tokenizer::new();
        match CorpusReader::new(&tokenizer).read(&path) {
            Err(DataError::Format { line, message, .. }) => {
                assert_eq!(line, 3);
                assert!(message.contains("positive"));
            }
            other => panic!("expected format error, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_polarity_below_range() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let path = write_corpus(
            &dir,
            "train.seg",
            "The $T$ is awful\nfood\n-2\n",
            Some("the food is awful\n1 0 1 2\n"),
        )?;

        let tokenizer = Tokenizer::new();
        assert!(matches!(
            CorpusReader::new(&tokenizer).read(&path),
            Err(DataError::Format { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_parse_polarity() {
        assert_eq!(parse_polarity("-1"), Ok(0));
        assert_eq!(parse_polarity("1"), Ok(2));
        assert!(parse_polarity("-2").is_err());
        assert!(parse_polarity(&i64::MAX.to_string())
            .unwrap_err()
            .contains("out of range"));
    }

    #[test]
    fn test_short_distance_file() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let path = write_corpus(&dir, "train.seg", CORPUS, Some("the pizza was delicious .\n1 0 1 2 3\n"))?;

        let tokenizer = Tokenizer::new();
        assert!(matches!(
            CorpusReader::new(&tokenizer).read(&path),
            Err(DataError::Format { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_non_numeric_distance() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let path = write_corpus(
            &dir,
            "train.seg",
            "The $T$ is fine\nfood\n0\n",
            Some("the food is fine\n1 zero 1 2\n"),
        )?;

        let tokenizer = Tokenizer::new();
        match CorpusReader::new(&tokenizer).read(&path) {
            Err(DataError::Format { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected format error, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_write_jsonl() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let path = write_corpus(&dir, "train.seg", CORPUS, Some(DIST))?;
        let tokenizer = Tokenizer::new();
        let dataset = CorpusReader::new(&tokenizer).read(&path)?;

        let out = dir.path().join("train.jsonl");
        dataset.write_jsonl(&out)?;

        let content = fs::read_to_string(&out)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: AspectRecord = serde_json::from_str(lines[0])?;
        assert_eq!(first, dataset[0]);
        Ok(())
    }
}
