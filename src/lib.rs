pub mod analyzer;
pub mod bucket;
pub mod clock;
pub mod cohort;
pub mod config;
pub mod export;
pub mod ingest;
pub mod record;
pub mod tbf;
