//! Purpose: Define the public Rust API boundary for fbscrape.
//! Exports: Orchestrator, vendor client, configuration, and the core types they exchange.
//! Role: The CLI and integration tests go through this module only.
//! Invariants: Core modules stay private; this module re-exports what callers need.

mod config;
mod orchestrator;
mod thordata;

pub use crate::core::decode::{Decoded, decode};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::job::{JobFailure, JobResult, TASK_ID_UNAVAILABLE, extract_task_id};
pub use crate::core::params::{ParamValue, ParameterPayload, Params};
pub use crate::core::registry::{OPERATIONS, OperationDescriptor, lookup};
pub use config::{
    ClientConfig, Credentials, DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL, Endpoints,
    OPENAPI_BASE_ENV, PUBLIC_KEY_ENV, PUBLIC_TOKEN_ENV, SCRAPER_TOKEN_ENV, SCRAPERAPI_BASE_ENV,
    WaitPolicy,
};
pub use orchestrator::{Orchestrator, ScrapeClient, TaskRequest};
pub use thordata::{RetryPolicy, TaskState, ThordataClient, classify_status};
