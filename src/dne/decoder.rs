use std::fs::File;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use encoding_rs::WINDOWS_1252;
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};
use tracing::warn;

use crate::dne::error::ImportError;

/// Streaming reader over one DNE reference file.
///
/// DNE files are ISO-8859-1 encoded, line oriented, with fields separated by
/// a single `@` and no header row. windows-1252 is a superset of ISO-8859-1
/// over the byte range the files use, so the transcoder emits the same
/// Unicode either way. Quote characters have no special meaning in the
/// format, so quoting is disabled outright rather than handled leniently.
pub struct DneFile {
    path: PathBuf,
    records: csv::StringRecordsIntoIter<DecodeReaderBytes<File, Vec<u8>>>,
}

impl std::fmt::Debug for DneFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DneFile").field("path", &self.path).finish_non_exhaustive()
    }
}

impl DneFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ImportError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| ImportError::FileUnavailable {
            path: path.clone(),
            source,
        })?;

        let transcoded = DecodeReaderBytesBuilder::new()
            .encoding(Some(WINDOWS_1252))
            .build(file);

        let reader = csv::ReaderBuilder::new()
            .delimiter(b'@')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .trim(csv::Trim::All)
            .from_reader(transcoded);

        Ok(Self {
            path,
            records: reader.into_records(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for DneFile {
    type Item = StringRecord;

    /// Yields the next well-formed record. A parse error on a single record
    /// is logged and skipped; an I/O error mid-file ends the iteration.
    fn next(&mut self) -> Option<StringRecord> {
        loop {
            match self.records.next()? {
                Ok(record) => return Some(record),
                Err(err) if err.is_io_error() => {
                    warn!(path = %self.path.display(), %err, "read error, stopping file");
                    return None;
                }
                Err(err) => {
                    warn!(path = %self.path.display(), %err, "skipping malformed record");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_latin1(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            let (encoded, _, _) = WINDOWS_1252.encode(line);
            file.write_all(&encoded).unwrap();
            file.write_all(b"\n").unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn decodes_latin1_fields() {
        let file = write_latin1(&["001@SP@São Paulo@01000-000"]);
        let mut records = DneFile::open(file.path()).unwrap();

        let record = records.next().unwrap();
        assert_eq!(record.get(2), Some("São Paulo"));
        assert_eq!(record.get(3), Some("01000-000"));
        assert!(records.next().is_none());
    }

    #[test]
    fn bare_quotes_are_literal() {
        let file = write_latin1(&["001@SP@Praça \"15\" de Novembro@01000-000"]);
        let mut records = DneFile::open(file.path()).unwrap();

        let record = records.next().unwrap();
        assert_eq!(record.get(2), Some("Praça \"15\" de Novembro"));
    }

    #[test]
    fn trims_field_whitespace() {
        let file = write_latin1(&["  001 @ SP @  Santos  @11000-000"]);
        let record = DneFile::open(file.path()).unwrap().next().unwrap();
        assert_eq!(record.get(0), Some("001"));
        assert_eq!(record.get(1), Some("SP"));
        assert_eq!(record.get(2), Some("Santos"));
    }

    #[test]
    fn variable_field_counts_are_yielded() {
        let file = write_latin1(&["001@SP", "002@RJ@Rio de Janeiro@20000-000@1@M@@RJ@3304557"]);
        let records: Vec<_> = DneFile::open(file.path()).unwrap().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].len(), 2);
        assert_eq!(records[1].len(), 9);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let err = DneFile::open("/nonexistent/LOG_LOCALIDADE.TXT").unwrap_err();
        assert!(matches!(err, ImportError::FileUnavailable { .. }));
    }
}
