use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::dne::decoder::DneFile;
use crate::dne::error::ImportError;
use crate::dne::record::{District, Locality};

/// In-memory reference tables consulted during enrichment. Built once per
/// import run and dropped with the importer.
///
/// Localities are kept ordered by code so the locality-CEP phase walks them
/// in a stable order run over run; districts are only ever point-looked-up.
#[derive(Debug, Default)]
pub struct ReferenceTables {
    localities: BTreeMap<String, Locality>,
    districts: HashMap<String, District>,
}

impl ReferenceTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts one locality row. Rows with an empty primary code are
    /// dropped; a duplicate code keeps the last row read.
    pub fn insert_locality(&mut self, locality: Locality) {
        if locality.code.is_empty() {
            return;
        }
        self.localities.insert(locality.code.clone(), locality);
    }

    pub fn insert_district(&mut self, district: District) {
        if district.code.is_empty() {
            return;
        }
        self.districts.insert(district.code.clone(), district);
    }

    pub fn load_localities(&mut self, path: &Path) -> Result<usize, ImportError> {
        let file = DneFile::open(path)?;
        for record in file {
            if let Some(locality) = Locality::from_record(&record) {
                self.insert_locality(locality);
            }
        }
        Ok(self.localities.len())
    }

    pub fn load_districts(&mut self, path: &Path) -> Result<usize, ImportError> {
        let file = DneFile::open(path)?;
        for record in file {
            if let Some(district) = District::from_record(&record) {
                self.insert_district(district);
            }
        }
        Ok(self.districts.len())
    }

    pub fn locality(&self, code: &str) -> Option<&Locality> {
        self.localities.get(code)
    }

    pub fn district(&self, code: &str) -> Option<&District> {
        self.districts.get(code)
    }

    /// Localities in code order, for the locality-CEP import phase.
    pub fn localities(&self) -> impl Iterator<Item = &Locality> {
        self.localities.values()
    }

    pub fn locality_count(&self) -> usize {
        self.localities.len()
    }

    pub fn district_count(&self) -> usize {
        self.districts.len()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use encoding_rs::WINDOWS_1252;
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
    fn loads_localities_and_normalizes_general_cep() {
        let file = write_latin1(&[
            "001@SP@São Paulo@01000-000@1@M@@SP@3550308",
            "002@SP@Santos@@1@M@@Santos@3548500",
        ]);

        let mut tables = ReferenceTables::new();
        let count = tables.load_localities(file.path()).unwrap();
        assert_eq!(count, 2);

        let capital = tables.locality("001").unwrap();
        assert_eq!(capital.name, "São Paulo");
        assert_eq!(capital.general_cep, "01000000");
        assert!(tables.locality("002").unwrap().general_cep.is_empty());
    }

    #[test]
    fn duplicate_code_keeps_last_row() {
        let file = write_latin1(&[
            "001@SP@Old Name@@1@M@@Old@3550308",
            "001@SP@New Name@@1@M@@New@3550308",
        ]);

        let mut tables = ReferenceTables::new();
        tables.load_localities(file.path()).unwrap();
        assert_eq!(tables.locality_count(), 1);
        assert_eq!(tables.locality("001").unwrap().name, "New Name");
    }

    #[test]
    fn empty_primary_code_is_skipped() {
        let file = write_latin1(&["@SP@Nowhere@@1@M@@X@0000000", "001@SP@Somewhere@@1@M@@X@1"]);

        let mut tables = ReferenceTables::new();
        tables.load_localities(file.path()).unwrap();
        assert_eq!(tables.locality_count(), 1);
    }

    #[test]
    fn short_district_rows_are_skipped() {
        let file = write_latin1(&["001@SP@001", "002@SP@001@Centro"]);

        let mut tables = ReferenceTables::new();
        let count = tables.load_districts(file.path()).unwrap();
        assert_eq!(count, 1);
        assert_eq!(tables.district("002").unwrap().name, "Centro");
        assert!(tables.district("002").unwrap().short_name.is_empty());
    }

    #[test]
    fn missing_file_surfaces_as_unavailable() {
        let mut tables = ReferenceTables::new();
        let err = tables
            .load_localities(Path::new("/nonexistent/LOG_LOCALIDADE.TXT"))
            .unwrap_err();
        assert!(matches!(err, ImportError::FileUnavailable { .. }));
    }

    #[test]
    fn localities_iterate_in_code_order() {
        let mut tables = ReferenceTables::new();
        for code in ["300", "100", "200"] {
            let record = csv::StringRecord::from(vec![code, "SP", "X", "", "1", "M", "", "X", "1"]);
            tables.insert_locality(Locality::from_record(&record).unwrap());
        }
        let codes: Vec<_> = tables.localities().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, ["100", "200", "300"]);
    }
}
