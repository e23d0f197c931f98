use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::counter;
use tracing::{debug, error, info, warn};

use crate::dne::decoder::DneFile;
use crate::dne::error::ImportError;
use crate::dne::record::{AddressDocument, CpcRecord, DestinationRecord, Origin, StreetRecord};
use crate::dne::reference::ReferenceTables;
use crate::metrics_const::*;
use crate::store::addresses::AddressStore;

pub const LOCALITY_FILE: &str = "LOG_LOCALIDADE.TXT";
pub const DISTRICT_FILE: &str = "LOG_BAIRRO.TXT";
pub const LARGE_USER_FILE: &str = "LOG_GRANDE_USUARIO.TXT";
pub const OPERATIONAL_UNIT_FILE: &str = "LOG_UNID_OPER.TXT";
pub const CPC_FILE: &str = "LOG_CPC.TXT";

/// Street files ship one per state; this is the import order.
pub const STATE_CODES: [&str; 27] = [
    "AC", "AL", "AP", "AM", "BA", "CE", "DF", "ES", "GO", "MA", "MT", "MS", "MG", "PA", "PB",
    "PR", "PE", "PI", "RJ", "RN", "RS", "RO", "RR", "SC", "SP", "SE", "TO",
];

// Tuning parameters, not contracts. Street files dominate the row count and
// get the bigger batch.
pub const STREET_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_BATCH_SIZE: usize = 5_000;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PhaseStats {
    pub processed: u64,
    pub written: u64,
    /// Rows whose CEP failed normalization. Rows below the minimum field
    /// count are dropped before any counter moves and are not included.
    pub skipped: u64,
}

impl PhaseStats {
    fn merge(&mut self, other: PhaseStats) {
        self.processed += other.processed;
        self.written += other.written;
        self.skipped += other.skipped;
    }
}

#[derive(Debug, Default, Clone)]
pub struct ImportSummary {
    pub localities_loaded: usize,
    pub districts_loaded: usize,
    pub locality_ceps: PhaseStats,
    pub streets: PhaseStats,
    pub large_users: PhaseStats,
    pub operational_units: PhaseStats,
    pub cpc: PhaseStats,
    pub unique_ceps: usize,
    pub elapsed: Duration,
}

/// Accumulates serialized documents and writes them to the store in bounded
/// batches: one flush per `limit` processed records, plus the explicit final
/// flush at end of phase. A failed flush drops the batch contents and the
/// phase continues with a fresh one.
struct WriteBatcher {
    limit: u64,
    processed: u64,
    pending: Vec<(Vec<u8>, Vec<u8>)>,
}

impl WriteBatcher {
    fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1) as u64,
            processed: 0,
            pending: Vec::new(),
        }
    }

    /// First writer of a CEP wins; later writers are silent no-ops.
    fn write_if_new(
        &mut self,
        seen: &mut HashSet<String>,
        document: &AddressDocument,
    ) -> Result<bool, ImportError> {
        if document.cep.is_empty() {
            return Err(ImportError::InvalidCep);
        }
        if seen.contains(&document.cep) {
            return Ok(false);
        }
        let entry = AddressStore::entry_for(document)?;
        self.pending.push(entry);
        seen.insert(document.cep.clone());
        Ok(true)
    }

    fn advance(&mut self, store: &AddressStore) {
        self.processed += 1;
        if self.processed % self.limit == 0 {
            self.flush(store);
            debug!(processed = self.processed, "batch boundary");
        }
    }

    fn flush(&mut self, store: &AddressStore) {
        if self.pending.is_empty() {
            return;
        }
        let entries = std::mem::take(&mut self.pending);
        counter!(IMPORT_BATCH_FLUSHES_COUNTER).increment(1);
        if let Err(err) = store.write_batch(&entries) {
            error!(%err, dropped = entries.len(), "batch flush failed");
            counter!(IMPORT_BATCH_FLUSH_FAILURES_COUNTER).increment(1);
        }
    }
}

/// Runs one full DNE import: loads the reference tables, then walks the
/// source files in phase order, projecting each row into an address document
/// and writing it under the first-writer-wins policy. Owns the reference
/// tables and the dedup set for the duration of the run.
pub struct Importer {
    store: Arc<AddressStore>,
    tables: ReferenceTables,
    seen: HashSet<String>,
    street_batch_size: usize,
    batch_size: usize,
}

impl Importer {
    pub fn new(store: Arc<AddressStore>) -> Self {
        Self {
            store,
            tables: ReferenceTables::new(),
            seen: HashSet::new(),
            street_batch_size: STREET_BATCH_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_sizes(mut self, street: usize, default: usize) -> Self {
        self.street_batch_size = street;
        self.batch_size = default;
        self
    }

    /// Imports the DNE directory at `dne_path`. Phases run in a fixed order
    /// so that phase precedence decides key collisions: locality general
    /// CEPs, then streets per state, large users, operational units, CPC.
    /// A missing or unreadable file skips its phase with a warning.
    pub fn populate(&mut self, dne_path: &Path) -> ImportSummary {
        let start = Instant::now();
        info!(path = %dne_path.display(), "starting DNE import");

        match self.tables.load_localities(&dne_path.join(LOCALITY_FILE)) {
            Ok(count) => info!(count, "localities loaded"),
            Err(err) => warn!(%err, "localities unavailable, enrichment will be degraded"),
        }
        match self.tables.load_districts(&dne_path.join(DISTRICT_FILE)) {
            Ok(count) => info!(count, "districts loaded"),
            Err(err) => warn!(%err, "districts unavailable, enrichment will be degraded"),
        }

        let phase_start = Instant::now();
        let locality_ceps = self.import_locality_ceps();
        self.log_phase(Origin::Locality, locality_ceps, phase_start.elapsed());

        let phase_start = Instant::now();
        let mut streets = PhaseStats::default();
        for uf in STATE_CODES {
            let path = dne_path.join(format!("LOG_LOGRADOURO_{uf}.TXT"));
            match self.import_street_file(&path) {
                Ok(stats) => streets.merge(stats),
                Err(err) => warn!(uf, %err, "skipping street file"),
            }
        }
        self.log_phase(Origin::Street, streets, phase_start.elapsed());

        let phase_start = Instant::now();
        let large_users =
            self.import_destination_file(&dne_path.join(LARGE_USER_FILE), Origin::LargeUser);
        self.log_phase(Origin::LargeUser, large_users, phase_start.elapsed());

        let phase_start = Instant::now();
        let operational_units = self.import_destination_file(
            &dne_path.join(OPERATIONAL_UNIT_FILE),
            Origin::OperationalUnit,
        );
        self.log_phase(Origin::OperationalUnit, operational_units, phase_start.elapsed());

        let phase_start = Instant::now();
        let cpc = self.import_cpc_file(&dne_path.join(CPC_FILE));
        self.log_phase(Origin::Cpc, cpc, phase_start.elapsed());

        if let Err(err) = self.store.flush() {
            error!(%err, "final store flush failed");
        }

        let summary = ImportSummary {
            localities_loaded: self.tables.locality_count(),
            districts_loaded: self.tables.district_count(),
            locality_ceps,
            streets,
            large_users,
            operational_units,
            cpc,
            unique_ceps: self.seen.len(),
            elapsed: start.elapsed(),
        };
        info!(
            unique_ceps = summary.unique_ceps,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "DNE import completed"
        );
        summary
    }

    fn log_phase(&self, origin: Origin, stats: PhaseStats, elapsed: Duration) {
        info!(
            phase = origin.as_tag(),
            processed = stats.processed,
            written = stats.written,
            skipped = stats.skipped,
            elapsed_secs = elapsed.as_secs_f64(),
            "phase completed"
        );
        counter!(IMPORT_RECORDS_PROCESSED_COUNTER, "phase" => origin.as_tag())
            .increment(stats.processed);
        counter!(IMPORT_CEPS_WRITTEN_COUNTER, "phase" => origin.as_tag())
            .increment(stats.written);
        counter!(IMPORT_RECORDS_SKIPPED_COUNTER, "phase" => origin.as_tag())
            .increment(stats.skipped);
    }

    fn write_document(
        batcher: &mut WriteBatcher,
        seen: &mut HashSet<String>,
        stats: &mut PhaseStats,
        store: &AddressStore,
        document: &AddressDocument,
    ) {
        match batcher.write_if_new(seen, document) {
            Ok(true) => stats.written += 1,
            Ok(false) => {}
            Err(err) => debug!(%err, cep = %document.cep, "write skipped"),
        }
        batcher.advance(store);
    }

    fn import_locality_ceps(&mut self) -> PhaseStats {
        let mut batcher = WriteBatcher::new(self.batch_size);
        let mut stats = PhaseStats::default();

        let mut documents: Vec<AddressDocument> = Vec::new();
        for locality in self.tables.localities() {
            match locality.general_cep_document() {
                Some(document) => documents.push(document),
                None => stats.skipped += 1,
            }
        }
        for document in &documents {
            Self::write_document(&mut batcher, &mut self.seen, &mut stats, &self.store, document);
        }

        batcher.flush(&self.store);
        stats.processed = batcher.processed;
        stats
    }

    fn import_street_file(&mut self, path: &Path) -> Result<PhaseStats, ImportError> {
        let file = DneFile::open(path)?;
        let mut batcher = WriteBatcher::new(self.street_batch_size);
        let mut stats = PhaseStats::default();

        for record in file {
            let Some(street) = StreetRecord::from_record(&record) else {
                continue;
            };
            let Some(document) = street.document(&self.tables) else {
                stats.skipped += 1;
                continue;
            };
            Self::write_document(&mut batcher, &mut self.seen, &mut stats, &self.store, &document);
        }

        batcher.flush(&self.store);
        stats.processed = batcher.processed;
        Ok(stats)
    }

    fn import_destination_file(&mut self, path: &Path, origin: Origin) -> PhaseStats {
        let file = match DneFile::open(path) {
            Ok(file) => file,
            Err(err) => {
                warn!(%err, phase = origin.as_tag(), "skipping phase");
                return PhaseStats::default();
            }
        };
        let mut batcher = WriteBatcher::new(self.batch_size);
        let mut stats = PhaseStats::default();

        for record in file {
            let Some(destination) = DestinationRecord::from_record(&record) else {
                continue;
            };
            let Some(document) = destination.document(&self.tables, origin) else {
                stats.skipped += 1;
                continue;
            };
            Self::write_document(&mut batcher, &mut self.seen, &mut stats, &self.store, &document);
        }

        batcher.flush(&self.store);
        stats.processed = batcher.processed;
        stats
    }

    fn import_cpc_file(&mut self, path: &Path) -> PhaseStats {
        let file = match DneFile::open(path) {
            Ok(file) => file,
            Err(err) => {
                warn!(%err, phase = Origin::Cpc.as_tag(), "skipping phase");
                return PhaseStats::default();
            }
        };
        let mut batcher = WriteBatcher::new(self.batch_size);
        let mut stats = PhaseStats::default();

        for record in file {
            let Some(cpc) = CpcRecord::from_record(&record) else {
                continue;
            };
            let Some(document) = cpc.document(&self.tables) else {
                stats.skipped += 1;
                continue;
            };
            Self::write_document(&mut batcher, &mut self.seen, &mut stats, &self.store, &document);
        }

        batcher.flush(&self.store);
        stats.processed = batcher.processed;
        stats
    }
}
