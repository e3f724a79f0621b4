//! Purpose: Run one named scraping operation end to end: submit, wait, download, decode.
//! Exports: `Orchestrator`, `ScrapeClient`, `TaskRequest`.
//! Role: Dispatch layer between the CLI and the vendor client.
//! Invariants: Unknown operations fail with `Err` before the client is touched.
//! Invariants: Every failure after dispatch becomes `JobResult::Failure`, never `Err`.
//! Invariants: No state survives a call except the shared client.
use crate::api::config::WaitPolicy;
use crate::core::decode::{Decoded, decode};
use crate::core::error::Error;
use crate::core::job::{JobFailure, JobResult};
use crate::core::params::ParameterPayload;
use crate::core::registry::{self, OperationDescriptor};

/// One job submission as seen by the vendor client.
#[derive(Clone, Debug)]
pub struct TaskRequest<'a> {
    pub descriptor: &'a OperationDescriptor,
    pub parameters: &'a ParameterPayload,
    pub file_name: String,
}

/// Seam over the external scraping service.
pub trait ScrapeClient {
    /// Submits the task and blocks until it is terminal; returns the result download URL.
    fn run_task(&self, task: &TaskRequest<'_>, wait: WaitPolicy) -> Result<String, Error>;

    fn download(&self, url: &str) -> Result<String, Error>;
}

pub struct Orchestrator<C> {
    client: C,
    wait: WaitPolicy,
}

impl<C: ScrapeClient> Orchestrator<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            wait: WaitPolicy::default(),
        }
    }

    pub fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    pub fn execute(
        &self,
        operation: &str,
        parameters: ParameterPayload,
    ) -> Result<JobResult, Error> {
        let descriptor = registry::lookup(operation)?;
        tracing::info!(
            operation = descriptor.name,
            "facebook {}: {}",
            descriptor.name,
            descriptor.description
        );
        note_unrecognized(descriptor, &parameters);

        match self.run(descriptor, &parameters) {
            Ok(decoded) => Ok(JobResult::Success(decoded)),
            Err(err) => {
                let failure = JobFailure::from_error(&err, descriptor, parameters);
                tracing::error!(
                    operation = descriptor.name,
                    task_id = %failure.task_id,
                    error_type = %failure.error_type,
                    error = %failure.error,
                    "scraping task failed"
                );
                Ok(JobResult::Failure(failure))
            }
        }
    }

    fn run(
        &self,
        descriptor: &OperationDescriptor,
        parameters: &ParameterPayload,
    ) -> Result<Decoded, Error> {
        let task = TaskRequest {
            descriptor,
            parameters,
            file_name: task_file_name(descriptor),
        };
        let result_url = self.client.run_task(&task, self.wait)?;
        tracing::info!(operation = descriptor.name, "finished; downloading result");
        let body = self.client.download(&result_url)?;
        let decoded = decode(&body)?;
        tracing::info!(
            operation = descriptor.name,
            records = decoded.record_count(),
            "result decoded"
        );
        Ok(decoded)
    }
}

fn task_file_name(descriptor: &OperationDescriptor) -> String {
    format!("fb_{}_{}", descriptor.name, std::process::id())
}

fn note_unrecognized(descriptor: &OperationDescriptor, parameters: &ParameterPayload) {
    for entry in parameters.entries() {
        for key in entry.keys().filter(|key| !descriptor.recognizes(key)) {
            tracing::debug!(
                operation = descriptor.name,
                parameter = key,
                "passing through unrecognized parameter"
            );
        }
    }
}
