// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous task engine.
//!
//! Most mutating server calls answer with a task handle rather than a
//! result. [`TaskService`] turns such an answer (the *envelope*) into a
//! [`Task`], polling the REST `tasks` collection until it reaches a terminal
//! state when asked to wait.

mod types;

use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::client::CallOptions;
use crate::codec::{parse_resource_url, ResourceId};
use crate::error::{Result, XoError};
use crate::rest::{Params, RestClient, RestPath};
use crate::runtime::{BackoffStrategy, LinearBackoff};

pub use types::{Task, TaskCall, TaskMessage, TaskProperties, TaskResult, TaskStatus};

/// Grace period for the best-effort abort issued when a wait is cancelled.
pub const ABORT_GRACE: Duration = Duration::from_secs(2);

/// Fields requested by [`TaskService::list`] when the caller names none.
pub const DEFAULT_TASK_FIELDS: &[&str] = &[
    "id",
    "status",
    "properties",
    "start",
    "updatedAt",
    "end",
    "result",
];

/// What a mutating call answered with.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// A task record, possibly already terminal.
    Inline(Task),
    /// The ID of a task to fetch or wait for.
    Reference(String),
    /// The operation completed and produced this object.
    Resource(ResourceId),
}

impl Envelope {
    /// Classify a raw response body.
    ///
    /// # Errors
    ///
    /// Returns a decode error when the body has none of the known shapes.
    #[allow(clippy::result_large_err)]
    pub fn classify(body: Value) -> Result<Envelope> {
        match body {
            Value::Object(map) => classify_object(map),
            Value::String(s) => classify_string(s),
            other => Err(XoError::decode(format!(
                "unrecognized task envelope: {other}"
            ))),
        }
    }
}

#[allow(clippy::result_large_err)]
fn classify_object(map: Map<String, Value>) -> Result<Envelope> {
    if map.contains_key("status") {
        let task: Task = serde_json::from_value(Value::Object(map))
            .map_err(|e| XoError::decode(format!("invalid task record: {e}")))?;
        return Ok(Envelope::Inline(task));
    }
    if let Some(task_id) = map.get("taskId") {
        return match task_id {
            Value::String(s) if !s.is_empty() => Ok(Envelope::Reference(task_ref(s))),
            other => Err(XoError::decode(format!("invalid taskId: {other}"))),
        };
    }
    if map.len() == 1 {
        if let Some(Value::String(id)) = map.get("id") {
            if !id.is_empty() {
                return Ok(Envelope::Resource(ResourceId::parse(id)));
            }
        }
    }
    Err(XoError::decode(format!(
        "unrecognized task envelope: {}",
        Value::Object(map)
    )))
}

#[allow(clippy::result_large_err)]
fn classify_string(s: String) -> Result<Envelope> {
    let s = s.trim();
    if s.is_empty() {
        return Err(XoError::decode("empty task envelope"));
    }
    if s.starts_with('/') || s.contains("://") {
        let href = parse_resource_url(s)?;
        return Ok(if href.collection == "tasks" {
            Envelope::Reference(href.id)
        } else {
            Envelope::Resource(ResourceId::parse(&href.id))
        });
    }
    Ok(match ResourceId::parse(s) {
        id @ ResourceId::Uuid(_) => Envelope::Resource(id),
        ResourceId::Other(task_id) => Envelope::Reference(task_id),
    })
}

/// A task ID, or the ID inside a task href.
fn task_ref(s: &str) -> String {
    match parse_resource_url(s) {
        Ok(href) if href.collection == "tasks" => href.id,
        _ => s.to_string(),
    }
}

/// Task operations over the REST transport.
#[derive(Debug, Clone)]
pub struct TaskService {
    rest: RestClient,
    poll: LinearBackoff,
}

impl TaskService {
    pub(crate) fn new(rest: RestClient) -> Self {
        Self {
            rest,
            // 500ms, growing to the 5s ceiling by the tenth poll
            poll: LinearBackoff::new(Duration::from_millis(500))
                .with_increment(Duration::from_millis(450))
                .with_max_delay(Duration::from_secs(5)),
        }
    }

    /// Override the poll schedule.
    #[must_use]
    pub fn with_poll_schedule(mut self, poll: LinearBackoff) -> Self {
        self.poll = poll;
        self
    }

    /// Fetch one task.
    pub async fn get(&self, task_id: &str) -> Result<Task> {
        self.get_with(&CallOptions::default(), task_id).await
    }

    pub async fn get_with(&self, opts: &CallOptions, task_id: &str) -> Result<Task> {
        if task_id.is_empty() {
            return Err(XoError::validation("task id must not be empty"));
        }
        let mut task: Task = self
            .rest
            .get_with(opts, &RestPath::object("tasks", task_id), &Params::new())
            .await?;
        if task.id.is_empty() {
            task.id = task_id.to_string();
        }
        Ok(task)
    }

    /// List tasks. Without a `fields` parameter, the common task fields are requested.
    pub async fn list(&self, params: &Params) -> Result<Vec<Task>> {
        self.list_with(&CallOptions::default(), params).await
    }

    pub async fn list_with(&self, opts: &CallOptions, params: &Params) -> Result<Vec<Task>> {
        let params = if params.contains("fields") {
            params.clone()
        } else {
            params.clone().fields(DEFAULT_TASK_FIELDS.iter().copied())
        };
        self.rest
            .get_with(opts, &RestPath::collection("tasks"), &params)
            .await
    }

    /// Ask the server to abort a task.
    ///
    /// Aborting a task that already finished succeeds without effect.
    pub async fn abort(&self, task_id: &str) -> Result<()> {
        self.abort_with(&CallOptions::default(), task_id).await
    }

    pub async fn abort_with(&self, opts: &CallOptions, task_id: &str) -> Result<()> {
        if task_id.is_empty() {
            return Err(XoError::validation("task id must not be empty"));
        }
        let path = RestPath::object("tasks", task_id)
            .actions_group()
            .action("abort");
        match self.rest.post_with::<_, Value>(opts, &path, &json!({})).await {
            Ok(_) => {
                info!(target: "xo_api::task", task_id, "abort requested");
                Ok(())
            }
            Err(e) if e.is_server() => {
                let task = self.get_with(opts, task_id).await?;
                if task.is_terminal() {
                    debug!(target: "xo_api::task", task_id, status = %task.status, "abort on finished task");
                    Ok(())
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Poll a task until it reaches a terminal state.
    ///
    /// A failed or interrupted task is returned, not turned into an error.
    pub async fn wait(&self, task_id: &str) -> Result<Task> {
        self.wait_with(&CallOptions::default(), task_id).await
    }

    /// Poll under a deadline and cancellation token.
    ///
    /// On cancellation the task is aborted on a best-effort basis: a single
    /// request, the whole abort bounded by [`ABORT_GRACE`]. The wait then
    /// fails as cancelled.
    pub async fn wait_with(&self, opts: &CallOptions, task_id: &str) -> Result<Task> {
        if task_id.is_empty() {
            return Err(XoError::validation("task id must not be empty"));
        }
        let result = opts.run(None, self.poll_until_terminal(task_id)).await;
        if matches!(result, Err(XoError::Cancelled)) {
            warn!(target: "xo_api::task", task_id, "wait cancelled, aborting task");
            // One attempt, and one deadline over the abort and its follow-up read
            let once = CallOptions::new().with_single_attempt();
            match tokio::time::timeout(ABORT_GRACE, self.abort_with(&once, task_id)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(target: "xo_api::task", task_id, error = %e, "best-effort abort failed");
                }
                Err(_) => {
                    debug!(target: "xo_api::task", task_id, "best-effort abort timed out");
                }
            }
        }
        result
    }

    async fn poll_until_terminal(&self, task_id: &str) -> Result<Task> {
        let mut last: Option<TaskStatus> = None;
        let mut attempt = 0u32;
        loop {
            let task = self.get(task_id).await?;
            if let Some(prev) = last {
                if task.status.rank() < prev.rank() {
                    return Err(XoError::Invariant(format!(
                        "task {task_id} went from {prev} back to {}",
                        task.status
                    )));
                }
            }
            if task.is_terminal() {
                task.validate_terminal()?;
                debug!(target: "xo_api::task", task_id, status = %task.status, polls = attempt + 1, "task finished");
                return Ok(task);
            }
            last = Some(task.status);
            tokio::time::sleep(self.poll.delay(attempt)).await;
            attempt = attempt.saturating_add(1);
        }
    }

    /// Normalize the answer of a mutating call into a task.
    ///
    /// An inline task record is returned as-is (or waited on, when it is not
    /// terminal and `wait` is set). A task reference is waited on or fetched
    /// once. A bare object becomes a finished task whose result names it.
    pub async fn handle_task_response(&self, envelope: Value, wait: bool) -> Result<Task> {
        self.handle_task_response_with(&CallOptions::default(), envelope, wait)
            .await
    }

    pub async fn handle_task_response_with(
        &self,
        opts: &CallOptions,
        envelope: Value,
        wait: bool,
    ) -> Result<Task> {
        match Envelope::classify(envelope)? {
            Envelope::Inline(task) => {
                if task.is_terminal() {
                    task.validate_terminal()?;
                    Ok(task)
                } else if wait && !task.id.is_empty() {
                    self.wait_with(opts, &task.id).await
                } else {
                    Ok(task)
                }
            }
            Envelope::Reference(task_id) => {
                if wait {
                    self.wait_with(opts, &task_id).await
                } else {
                    let task = self.get_with(opts, &task_id).await?;
                    if task.is_terminal() {
                        task.validate_terminal()?;
                    }
                    Ok(task)
                }
            }
            Envelope::Resource(id) => {
                let task = Task::completed(id);
                task.validate_terminal()?;
                Ok(task)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "7a1b8e8a-4b1c-4f6e-9d3a-2c1e5f6a7b8c";

    #[test]
    fn test_bare_uuid_is_resource() {
        assert_eq!(
            Envelope::classify(json!(UUID)).unwrap(),
            Envelope::Resource(ResourceId::parse(UUID))
        );
    }

    #[test]
    fn test_bare_string_is_task_reference() {
        assert_eq!(
            Envelope::classify(json!("0lr4zljbe")).unwrap(),
            Envelope::Reference("0lr4zljbe".into())
        );
    }

    #[test]
    fn test_task_id_object() {
        assert_eq!(
            Envelope::classify(json!({"taskId": "task-42"})).unwrap(),
            Envelope::Reference("task-42".into())
        );
        assert_eq!(
            Envelope::classify(json!({"taskId": "/rest/v0/tasks/task-42"})).unwrap(),
            Envelope::Reference("task-42".into())
        );
    }

    #[test]
    fn test_hrefs() {
        assert_eq!(
            Envelope::classify(json!("/rest/v0/tasks/abc")).unwrap(),
            Envelope::Reference("abc".into())
        );
        assert_eq!(
            Envelope::classify(json!(format!("/rest/v0/vms/{UUID}"))).unwrap(),
            Envelope::Resource(ResourceId::parse(UUID))
        );
        assert!(Envelope::classify(json!("/rest/v0/vms")).is_err());
    }

    #[test]
    fn test_id_only_object_is_resource() {
        assert_eq!(
            Envelope::classify(json!({"id": UUID})).unwrap(),
            Envelope::Resource(ResourceId::parse(UUID))
        );
    }

    #[test]
    fn test_inline_task() {
        let env = Envelope::classify(json!({"id": "t1", "status": "running"})).unwrap();
        match env {
            Envelope::Inline(task) => assert_eq!(task.status, TaskStatus::Running),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_shapes_are_decode_errors() {
        for bad in [
            json!(42),
            json!(null),
            json!([UUID]),
            json!({"id": UUID, "name_label": "x"}),
            json!({"status": "exploded"}),
            json!(""),
        ] {
            let err = Envelope::classify(bad.clone()).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Decode, "for {bad}");
        }
    }

    #[test]
    fn test_poll_schedule_reaches_ceiling_after_ten_polls() {
        let poll = LinearBackoff::new(Duration::from_millis(500))
            .with_increment(Duration::from_millis(450))
            .with_max_delay(Duration::from_secs(5));
        assert_eq!(poll.delay(0), Duration::from_millis(500));
        assert!(poll.delay(9) < Duration::from_secs(5));
        assert_eq!(poll.delay(10), Duration::from_secs(5));
        assert_eq!(poll.delay(50), Duration::from_secs(5));
    }
}
