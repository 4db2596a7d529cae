//! Background Jobs
//!
//! Scheduled maintenance for the news pipeline: periodic ingestion of
//! active sources, cleanup of stale articles, and reprocessing of articles
//! that never got enriched.

pub mod scheduler;

pub use scheduler::{background_jobs_task, JobDeps, JobMetrics, JobMetricsSnapshot};
