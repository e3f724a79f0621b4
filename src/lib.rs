//! Purpose: Library crate backing the `fbscrape` CLI and its tests.
//! Exports: `api` (orchestrator, vendor client, configuration, result types).
//! Role: Keeps job orchestration testable without the binary.
//! Invariants: Callers reach core types only through `api`.
pub mod api;
mod core;
