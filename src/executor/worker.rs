//! Worker side of the runner protocol
//!
//! Any executable that hosts tasks calls [`serve_if_worker`] first thing in
//! `main`. When the process was launched by a `TaskRunner` it serves exactly
//! one request and the caller should exit; otherwise it returns `None` and
//! the program continues normally.

use std::io::{self, Read, Write};
use std::panic;

use crate::error::{Error, Result};
use crate::protocol::{Message, TaskReply};
use crate::tasks::TaskRegistry;

use super::wrapper;

/// Environment marker set on every worker process
pub const WORKER_ENV: &str = "FANOUT_WORKER";

/// Whether this process was launched as a worker
pub fn invoked_as_worker() -> bool {
    std::env::var_os(WORKER_ENV).is_some_and(|v| v == "1")
}

/// Serve one task over stdin/stdout if this process is a worker
pub fn serve_if_worker(registry: &TaskRegistry) -> Option<Result<()>> {
    if !invoked_as_worker() {
        return None;
    }

    // Failures are reported as the sentinel only; keep panic messages off stderr
    panic::set_hook(Box::new(|_| {}));

    let stdin = io::stdin().lock();
    let stdout = io::stdout().lock();
    Some(serve_io(registry, stdin, stdout))
}

/// Read one request from `input`, run it, write one reply to `output`.
///
/// `output` is consumed and dropped on return, closing the channel.
pub fn serve_io<R, W>(registry: &TaskRegistry, mut input: R, mut output: W) -> Result<()>
where
    R: Read,
    W: Write,
{
    let mut raw = Vec::new();
    input.read_to_end(&mut raw)?;

    let request = match serde_json::from_slice::<Message>(&raw) {
        Ok(Message::TaskRequest(request)) => request,
        Ok(other) => {
            return Err(Error::ProtocolMalformed {
                message: format!("expected TASK_REQUEST, got {}", other.type_name()),
            })
        }
        Err(e) => {
            return Err(Error::ProtocolMalformed {
                message: e.to_string(),
            })
        }
    };

    let outcome = wrapper::invoke(registry, &request.task, request.args);
    let reply = TaskReply::new(request.id, outcome.reply_outcome(), outcome.into_result());

    // A fresh line guards against handler output without a trailing newline
    output.write_all(b"\n")?;
    serde_json::to_writer(&mut output, &Message::TaskReply(reply))?;
    output.write_all(b"\n")?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{find_reply, ReplyOutcome, TaskRequest};
    use crate::tasks::builtin_registry;
    use serde_json::{json, Value};
    use uuid::Uuid;

    fn request_bytes(task: &str, args: Value) -> (Uuid, Vec<u8>) {
        let id = Uuid::new_v4();
        let message = Message::TaskRequest(TaskRequest {
            id,
            index: 0,
            task: task.to_string(),
            args,
        });
        (id, serde_json::to_vec(&message).unwrap())
    }

    #[test]
    fn test_serve_success() {
        let (id, request) = request_bytes("double", json!(21));
        let mut output = Vec::new();
        serve_io(&builtin_registry(), request.as_slice(), &mut output).unwrap();

        let reply = find_reply(&output, id).unwrap();
        assert_eq!(reply.result, json!(42));
        assert_eq!(reply.outcome, ReplyOutcome::Succeeded);
    }

    #[test]
    fn test_serve_failure_sends_sentinel() {
        let (id, request) = request_bytes("fail", json!([]));
        let mut output = Vec::new();
        serve_io(&builtin_registry(), request.as_slice(), &mut output).unwrap();

        let reply = find_reply(&output, id).unwrap();
        assert_eq!(reply.result, json!([]));
        assert_eq!(reply.outcome, ReplyOutcome::Failed);
    }

    #[test]
    fn test_serve_writes_exactly_one_reply() {
        let (id, request) = request_bytes("sum", json!([1, 2, 3]));
        let mut output = Vec::new();
        serve_io(&builtin_registry(), request.as_slice(), &mut output).unwrap();

        let replies = output
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .count();
        assert_eq!(replies, 1);
        assert_eq!(find_reply(&output, id).unwrap().result, json!(6));
    }

    #[test]
    fn test_serve_rejects_garbage() {
        let mut output = Vec::new();
        let err = serve_io(&builtin_registry(), &b"not json"[..], &mut output).unwrap_err();
        assert!(matches!(err, Error::ProtocolMalformed { .. }));
        assert!(output.is_empty());
    }

    #[test]
    fn test_not_a_worker_by_default() {
        if std::env::var_os(WORKER_ENV).is_none() {
            assert!(!invoked_as_worker());
            assert!(serve_if_worker(&builtin_registry()).is_none());
        }
    }
}
