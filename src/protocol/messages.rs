//! Worker protocol messages
//!
//! The runner writes one `TASK_REQUEST` to a worker's stdin and closes it.
//! The worker writes one `TASK_REPLY` line to its stdout and exits; stdout
//! reaching EOF is the channel closing. Messages are JSON with a type
//! discriminator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// All protocol messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Runner → worker: the task to run
    TaskRequest(TaskRequest),

    /// Worker → runner: the single result
    TaskReply(TaskReply),
}

impl Message {
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::TaskRequest(_) => "TASK_REQUEST",
            Message::TaskReply(_) => "TASK_REPLY",
        }
    }
}

/// The task a worker process should run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Correlates the reply with this request
    pub id: Uuid,

    /// Position of the task in the submitted list
    pub index: usize,

    /// Registered handler name
    pub task: String,

    /// Raw arguments, normalized by the worker
    pub args: Value,
}

/// How the handler finished; bookkeeping only, the result slot is the same
/// sentinel either way
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyOutcome {
    Succeeded,
    Failed,
}

/// The single message a worker sends back
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReply {
    /// Id of the request this answers
    pub id: Uuid,

    pub outcome: ReplyOutcome,

    /// Handler return value, or the failure sentinel
    pub result: Value,

    pub finished_at: DateTime<Utc>,
}

impl TaskReply {
    pub fn new(id: Uuid, outcome: ReplyOutcome, result: Value) -> Self {
        Self {
            id,
            outcome,
            result,
            finished_at: Utc::now(),
        }
    }
}

/// Locate the reply for `id` in a worker's captured stdout.
///
/// Handlers may print to stdout themselves, so every line is a candidate;
/// the last one that parses as a matching reply wins.
pub fn find_reply(output: &[u8], id: Uuid) -> Option<TaskReply> {
    output
        .split(|b| *b == b'\n')
        .rev()
        .filter(|line| !line.is_empty())
        .find_map(|line| match serde_json::from_slice::<Message>(line) {
            Ok(Message::TaskReply(reply)) if reply.id == id => Some(reply),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply_line(id: Uuid, result: Value) -> Vec<u8> {
        let mut line = serde_json::to_vec(&Message::TaskReply(TaskReply::new(
            id,
            ReplyOutcome::Succeeded,
            result,
        )))
        .unwrap();
        line.push(b'\n');
        line
    }

    #[test]
    fn test_message_type_tag() {
        let request = Message::TaskRequest(TaskRequest {
            id: Uuid::new_v4(),
            index: 0,
            task: "double".into(),
            args: json!(3),
        });
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["type"], "TASK_REQUEST");
        assert_eq!(encoded["task"], "double");
        assert_eq!(request.type_name(), "TASK_REQUEST");
    }

    #[test]
    fn test_find_reply_skips_noise() {
        let id = Uuid::new_v4();
        let mut output = b"progress: 50%\n{\"not\": \"a reply\"}\n".to_vec();
        output.extend(reply_line(id, json!(6)));

        let reply = find_reply(&output, id).unwrap();
        assert_eq!(reply.result, json!(6));
        assert_eq!(reply.outcome, ReplyOutcome::Succeeded);
    }

    #[test]
    fn test_find_reply_ignores_other_ids() {
        let output = reply_line(Uuid::new_v4(), json!(1));
        assert!(find_reply(&output, Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_find_reply_without_trailing_newline() {
        let id = Uuid::new_v4();
        let mut output = reply_line(id, json!("ok"));
        output.pop();
        assert_eq!(find_reply(&output, id).unwrap().result, json!("ok"));
    }

    #[test]
    fn test_find_reply_empty_output() {
        assert!(find_reply(b"", Uuid::new_v4()).is_none());
    }
}
