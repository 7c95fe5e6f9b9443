//! FASTQ lookup and parsing using noodles.
//!
//! Basecalls reach the archive from one of two places: a `<stem>.fastq` file
//! in a separate directory, paired with `<stem>.fast5` by name, or the FASTQ
//! text a basecaller embedded in the Fast5 file itself.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use noodles::fastq;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FastqError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid FASTQ in {origin}: {message}")]
    Invalid { origin: String, message: String },
}

/// One FASTQ record, quality kept as the printable Phred+33 text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FastqRead {
    pub name: String,
    pub description: String,
    pub sequence: Vec<u8>,
    pub quality: Vec<u8>,
}

impl FastqRead {
    /// Render back to four-line FASTQ text
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut text = format!("@{}", self.name);
        if !self.description.is_empty() {
            text.push(' ');
            text.push_str(&self.description);
        }
        text.push('\n');
        text.push_str(&String::from_utf8_lossy(&self.sequence));
        text.push_str("\n+\n");
        text.push_str(&String::from_utf8_lossy(&self.quality));
        text.push('\n');
        text
    }
}

/// Read the first record from a FASTQ stream
fn read_first<R: BufRead>(
    reader: &mut fastq::io::Reader<R>,
    origin: &str,
) -> Result<Option<FastqRead>, FastqError> {
    let invalid = |message: String| FastqError::Invalid {
        origin: origin.to_string(),
        message,
    };

    let Some(result) = reader.records().next() else {
        return Ok(None);
    };
    let record = result.map_err(|e| invalid(e.to_string()))?;

    if record.sequence().len() != record.quality_scores().len() {
        return Err(invalid(format!(
            "sequence length {} does not match quality length {}",
            record.sequence().len(),
            record.quality_scores().len()
        )));
    }

    Ok(Some(FastqRead {
        name: String::from_utf8_lossy(record.name()).to_string(),
        description: String::from_utf8_lossy(record.description()).to_string(),
        sequence: record.sequence().to_vec(),
        quality: record.quality_scores().to_vec(),
    }))
}

/// Parse FASTQ text embedded in a Fast5 dataset.
///
/// # Errors
///
/// Returns `FastqError::Invalid` if the text is not a FASTQ record.
pub fn parse_fastq_text(text: &str, origin: &str) -> Result<Option<FastqRead>, FastqError> {
    let mut reader = fastq::io::Reader::new(text.as_bytes());
    read_first(&mut reader, origin)
}

/// Path of the FASTQ file paired with `fast5_path`: same stem, `.fastq`
#[must_use]
pub fn fastq_path_for(dir: &Path, fast5_path: &Path) -> Option<PathBuf> {
    let stem = fast5_path.file_stem()?;
    let mut name = stem.to_os_string();
    name.push(".fastq");
    Some(dir.join(name))
}

/// Look up and read the FASTQ record paired with a Fast5 file.
///
/// A missing FASTQ file is not an error; the read is archived without
/// basecalls.
///
/// # Errors
///
/// Returns `FastqError::Io` if the paired file exists but cannot be read, or
/// `FastqError::Invalid` if it does not parse.
pub fn read_fastq_for(dir: &Path, fast5_path: &Path) -> Result<Option<FastqRead>, FastqError> {
    let Some(path) = fastq_path_for(dir, fast5_path) else {
        return Ok(None);
    };
    if !path.is_file() {
        tracing::debug!("No FASTQ at {}", path.display());
        return Ok(None);
    }

    let file = File::open(&path).map_err(|source| FastqError::Io {
        path: path.clone(),
        source,
    })?;
    let mut reader = fastq::io::Reader::new(BufReader::new(file));
    read_first(&mut reader, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TEXT: &str = "@read_7 runid=abc\nACGT\n+\n!#%&\n";

    #[test]
    fn test_parse_embedded_text() {
        let read = parse_fastq_text(TEXT, "embedded").unwrap().unwrap();
        assert_eq!(read.name, "read_7");
        assert_eq!(read.description, "runid=abc");
        assert_eq!(read.sequence, b"ACGT");
        assert_eq!(read.quality, b"!#%&");
        assert_eq!(read.to_text(), TEXT);
    }

    #[test]
    fn test_empty_text() {
        assert!(parse_fastq_text("", "embedded").unwrap().is_none());
    }

    #[test]
    fn test_paired_file_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = File::create(dir.path().join("read_7.fastq")).unwrap();
        file.write_all(TEXT.as_bytes()).unwrap();

        let read = read_fastq_for(dir.path(), Path::new("/data/read_7.fast5"))
            .unwrap()
            .unwrap();
        assert_eq!(read.sequence, b"ACGT");

        assert!(read_fastq_for(dir.path(), Path::new("/data/read_8.fast5"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_fastq_path_for() {
        assert_eq!(
            fastq_path_for(Path::new("fq"), Path::new("in/read_1.fast5")).unwrap(),
            Path::new("fq/read_1.fastq")
        );
    }
}
