pub const IMPORT_RECORDS_PROCESSED_COUNTER: &str = "dne_import_records_processed_total";
pub const IMPORT_CEPS_WRITTEN_COUNTER: &str = "dne_import_ceps_written_total";
pub const IMPORT_RECORDS_SKIPPED_COUNTER: &str = "dne_import_records_skipped_total";
pub const IMPORT_BATCH_FLUSHES_COUNTER: &str = "dne_import_batch_flushes_total";
pub const IMPORT_BATCH_FLUSH_FAILURES_COUNTER: &str = "dne_import_batch_flush_failures_total";

pub const LOOKUP_REQUESTS_COUNTER: &str = "cep_lookup_requests_total";
