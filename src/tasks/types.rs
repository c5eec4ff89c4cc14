// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{ResourceId, Timestamp};
use crate::error::{ErrorCode, Result, XoError};

/// Lifecycle state of a server task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failure,
    Interrupted,
}

impl TaskStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failure | TaskStatus::Interrupted
        )
    }

    /// Position in the `pending -> running -> terminal` progression.
    pub(crate) fn rank(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Running => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failure => "failure",
            TaskStatus::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// What the task is doing and on whose behalf.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(rename = "objectId", default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// The call a failed task was executing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCall {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Result of a task.
///
/// On success it usually names the created object; on failure it carries the
/// server error. A bare string result is a new object ID when it parses as a
/// UUID and is kept in `value` otherwise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskResult {
    pub id: Option<ResourceId>,
    pub value: Option<String>,
    pub code: Option<ErrorCode>,
    pub message: Option<String>,
    pub name: Option<String>,
    pub stack: Option<String>,
    pub call: Option<TaskCall>,
    /// Any other result shape, kept as received.
    pub other: Option<Value>,
}

impl TaskResult {
    #[must_use]
    pub fn from_id(id: ResourceId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    fn from_bare(s: String) -> Self {
        match ResourceId::parse(&s) {
            id @ ResourceId::Uuid(_) => Self::from_id(id),
            ResourceId::Other(_) => Self {
                value: Some(s),
                ..Self::default()
            },
        }
    }

    fn is_record(&self) -> bool {
        self.code.is_some()
            || self.message.is_some()
            || self.name.is_some()
            || self.stack.is_some()
            || self.call.is_some()
    }
}

#[derive(Deserialize)]
struct ResultRecord {
    #[serde(default)]
    id: Option<ResourceId>,
    #[serde(default)]
    code: Option<ErrorCode>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    stack: Option<String>,
    #[serde(default)]
    call: Option<TaskCall>,
}

impl<'de> Deserialize<'de> for TaskResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let record_shape = matches!(&raw, Value::Object(map) if !map.is_empty()
            && map.keys().all(|k| matches!(
                k.as_str(),
                "id" | "code" | "message" | "name" | "stack" | "call"
            )));
        match raw {
            Value::String(s) => Ok(Self::from_bare(s)),
            raw if record_shape => {
                let record: ResultRecord =
                    serde_json::from_value(raw).map_err(serde::de::Error::custom)?;
                Ok(Self {
                    id: record.id,
                    value: None,
                    code: record.code,
                    message: record.message,
                    name: record.name,
                    stack: record.stack,
                    call: record.call,
                    other: None,
                })
            }
            other => Ok(Self {
                other: Some(other),
                ..Self::default()
            }),
        }
    }
}

impl Serialize for TaskResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if let Some(other) = &self.other {
            return other.serialize(serializer);
        }
        if !self.is_record() {
            match (&self.id, &self.value) {
                (Some(id @ ResourceId::Uuid(_)), None) => return id.serialize(serializer),
                (None, Some(value)) => return serializer.serialize_str(value),
                _ => {}
            }
        }
        let mut map = serializer.serialize_map(None)?;
        if let Some(id) = &self.id {
            map.serialize_entry("id", id)?;
        }
        if let Some(code) = &self.code {
            map.serialize_entry("code", code)?;
        }
        if let Some(message) = &self.message {
            map.serialize_entry("message", message)?;
        }
        if let Some(name) = &self.name {
            map.serialize_entry("name", name)?;
        }
        if let Some(stack) = &self.stack {
            map.serialize_entry("stack", stack)?;
        }
        if let Some(call) = &self.call {
            map.serialize_entry("call", call)?;
        }
        map.end()
    }
}

/// A warning or informational message attached to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Polled state of an asynchronous server operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub properties: TaskProperties,
    #[serde(
        rename = "startedAt",
        alias = "start",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub started_at: Option<Timestamp>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    #[serde(
        rename = "endedAt",
        alias = "end",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ended_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(
        rename = "warnings",
        alias = "warning",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub warnings: Vec<TaskMessage>,
    #[serde(rename = "infos", alias = "info", default, skip_serializing_if = "Vec::is_empty")]
    pub infos: Vec<TaskMessage>,
    /// Subtasks, in the order the server reports them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
}

impl Task {
    /// A finished task standing in for an operation that returned its object directly.
    #[must_use]
    pub fn completed(id: ResourceId) -> Self {
        Self {
            id: String::new(),
            status: TaskStatus::Success,
            properties: TaskProperties::default(),
            started_at: None,
            updated_at: None,
            ended_at: None,
            result: Some(TaskResult::from_id(id)),
            warnings: Vec::new(),
            infos: Vec::new(),
            tasks: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// ID of the object the task produced, if any.
    #[must_use]
    pub fn result_id(&self) -> Option<&ResourceId> {
        self.result.as_ref().and_then(|r| r.id.as_ref())
    }

    /// Error message of a failed or interrupted task.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self.status {
            TaskStatus::Failure | TaskStatus::Interrupted => self
                .result
                .as_ref()
                .and_then(|r| r.message.as_deref())
                .or(Some("task did not succeed")),
            _ => None,
        }
    }

    /// Turn a failed or interrupted task into an error.
    ///
    /// # Errors
    ///
    /// Returns [`XoError::TaskFailed`] unless the task succeeded.
    #[allow(clippy::result_large_err)]
    pub fn into_success(self) -> Result<Task> {
        match self.status {
            TaskStatus::Success => Ok(self),
            TaskStatus::Failure | TaskStatus::Interrupted => Err(XoError::TaskFailed {
                message: self.error_message().unwrap_or_default().to_string(),
                task_id: self.id,
                status: self.status.to_string(),
            }),
            _ => Err(XoError::Invariant(format!(
                "task {} is still {}",
                self.id, self.status
            ))),
        }
    }

    /// Check the guarantees of a terminal task.
    #[allow(clippy::result_large_err)]
    pub(crate) fn validate_terminal(&self) -> Result<()> {
        if self.status != TaskStatus::Success {
            return Ok(());
        }
        match self.result_id() {
            Some(ResourceId::Other(id)) => Err(XoError::Invariant(format!(
                "task {} succeeded with non-UUID result id '{id}'",
                self.id
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const UUID: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn test_status_progression() {
        assert!(TaskStatus::Pending.rank() < TaskStatus::Running.rank());
        assert!(TaskStatus::Running.rank() < TaskStatus::Failure.rank());
        assert!(TaskStatus::Interrupted.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(serde_json::from_str::<TaskStatus>("\"aborted\"").is_err());
    }

    #[test]
    fn test_bare_uuid_result() {
        let result: TaskResult = serde_json::from_value(json!(UUID)).unwrap();
        assert_eq!(result.id, Some(ResourceId::parse(UUID)));
        assert_eq!(result.value, None);
        assert_eq!(serde_json::to_value(&result).unwrap(), json!(UUID));
    }

    #[test]
    fn test_bare_non_uuid_result_is_kept() {
        let result: TaskResult = serde_json::from_value(json!("OpaqueRef:1234")).unwrap();
        assert_eq!(result.id, None);
        assert_eq!(result.value.as_deref(), Some("OpaqueRef:1234"));
        assert_eq!(serde_json::to_value(&result).unwrap(), json!("OpaqueRef:1234"));
    }

    #[test]
    fn test_structured_error_result() {
        let raw = json!({
            "code": "SR_BACKEND_FAILURE_44",
            "message": "insufficient space",
            "name": "XapiError",
            "stack": "XapiError: ...",
            "call": {"method": "VDI.create", "duration": 412, "params": ["x"]}
        });
        let result: TaskResult = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(result.code, Some(ErrorCode::Text("SR_BACKEND_FAILURE_44".into())));
        assert_eq!(result.call.as_ref().unwrap().method, "VDI.create");
        assert_eq!(serde_json::to_value(&result).unwrap(), raw);
    }

    #[test]
    fn test_numeric_code_shape_kept() {
        let raw = json!({"code": 11, "message": "no such object"});
        let result: TaskResult = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(result.code, Some(ErrorCode::Number(11)));
        assert_eq!(serde_json::to_value(&result).unwrap(), raw);
    }

    #[test]
    fn test_other_result_shapes_pass_through() {
        let raw = json!({"vms": ["a", "b"]});
        let result: TaskResult = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(result.other, Some(raw.clone()));
        assert_eq!(serde_json::to_value(&result).unwrap(), raw);
    }

    #[test]
    fn test_task_decode_with_aliases() {
        let raw = json!({
            "id": "0lr4zljbe",
            "properties": {"method": "vm.start", "name": "API call: vm.start", "userId": "u1", "type": "api.call"},
            "start": 1_704_164_645_000_i64,
            "updatedAt": "2024-01-02T03:04:06Z",
            "end": 1_704_164_647_000_i64,
            "status": "success",
            "result": UUID,
            "infos": [{"message": "started"}],
            "tasks": [{"id": "sub", "status": "success"}]
        });
        let task: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(task.id, "0lr4zljbe");
        assert_eq!(task.properties.method.as_deref(), Some("vm.start"));
        assert_eq!(task.properties.kind.as_deref(), Some("api.call"));
        assert!(task.started_at.is_some());
        assert!(task.ended_at.is_some());
        assert_eq!(task.infos.len(), 1);
        assert_eq!(task.tasks[0].id, "sub");
        assert_eq!(task.result_id().unwrap().to_string(), UUID);

        let back: Task = serde_json::from_value(serde_json::to_value(&task).unwrap()).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_into_success() {
        let failed: Task = serde_json::from_value(json!({
            "id": "t1", "status": "failure", "result": {"message": "boom"}
        }))
        .unwrap();
        assert_eq!(failed.error_message(), Some("boom"));
        match failed.into_success() {
            Err(XoError::TaskFailed { task_id, message, .. }) => {
                assert_eq!(task_id, "t1");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_validate_terminal_rejects_non_uuid_id() {
        let task = Task::completed(ResourceId::Other("x".into()));
        assert!(matches!(task.validate_terminal(), Err(XoError::Invariant(_))));
        let ok = Task::completed(ResourceId::parse(UUID));
        assert!(ok.validate_terminal().is_ok());
    }
}
