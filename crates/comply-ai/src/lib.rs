//! Compliance scoring and remediation planning pipeline.
//!
//! Given ingested evidence for an application, the scoring workflow computes a
//! per-control completion percentage and implementation status: a fast
//! deterministic pass over precomputed relevance scores, then a bounded-
//! concurrency batch of model-assisted analyses whose output is validated and
//! auto-corrected before anything is persisted. Downstream, gaps and
//! recommendations become dependency-ordered remediation plans, scheduled
//! into milestones and assembled into POAM reports.

pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod telemetry;
pub mod workflows;
