//! Wire protocol for the WebSocket bridge.
//!
//! Every operation available here is a thin mirror of the native
//! [`SessionHost`](termhub_session::SessionHost) API: same semantics, same
//! capacity constants, same error taxonomy rendered as message text. Push
//! frames are the host's [`HostEvent`]s serialized as-is, so remote
//! subscribers see byte-exact copies of what in-process subscribers see.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use termhub_common::SessionId;
use termhub_session::{AgentKind, HostStats, MetricsSnapshot, SessionConfig, SessionInfo};

/// One request frame. `seq` is a client-chosen correlation number echoed on
/// the matching response; the host assigns it no meaning.
#[derive(Debug, Deserialize)]
pub struct Request {
    pub seq: u64,
    #[serde(flatten)]
    pub op: RequestOp,
}

/// Session parameters for `create`. All optional; defaults match a plain
/// shell session in the current directory.
#[derive(Debug, Default, Deserialize)]
pub struct CreateParams {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub rows: Option<u16>,
    #[serde(default)]
    pub cols: Option<u16>,
    #[serde(default)]
    pub agent: Option<AgentKind>,
    #[serde(default)]
    pub context: Option<Value>,
}

impl CreateParams {
    /// Fill omitted fields from `base`, the host's configured defaults.
    pub fn into_config(self, base: SessionConfig) -> SessionConfig {
        SessionConfig {
            command: self.command,
            cwd: self.cwd.unwrap_or(base.cwd),
            rows: self.rows.unwrap_or(base.rows),
            cols: self.cols.unwrap_or(base.cols),
            agent: self.agent.unwrap_or(base.agent),
            context: self.context.unwrap_or(base.context),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RequestOp {
    Create {
        #[serde(flatten)]
        params: CreateParams,
    },
    List,
    Write {
        session_id: SessionId,
        data: String,
    },
    Resize {
        session_id: SessionId,
        rows: u16,
        cols: u16,
    },
    Pause {
        session_id: SessionId,
    },
    Resume {
        session_id: SessionId,
    },
    Close {
        session_id: SessionId,
    },
    ReadOutput {
        session_id: SessionId,
        #[serde(default)]
        limit: Option<usize>,
    },
    ReadStats,
    ReadMetrics,
}

/// One response frame, echoing the request's `seq`.
#[derive(Debug, Serialize)]
pub struct Response {
    pub seq: u64,
    #[serde(flatten)]
    pub body: ResponseBody,
}

#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ResponseBody {
    Created { session_id: SessionId },
    Sessions { sessions: Vec<SessionInfo> },
    /// Raw retained output, control sequences included; interpretation is
    /// the caller's rendering concern.
    Output { session_id: SessionId, data: String },
    Stats { stats: HostStats },
    Metrics { metrics: MetricsSnapshot },
    Ok,
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_with_defaults() {
        let req: Request = serde_json::from_str(r#"{"seq": 7, "op": "create"}"#).unwrap();
        assert_eq!(req.seq, 7);
        let RequestOp::Create { params } = req.op else {
            panic!("expected create");
        };
        let config = params.into_config(SessionConfig::default());
        assert_eq!(config.command, None);
        assert_eq!(config.rows, 24);
        assert_eq!(config.cols, 80);
        assert_eq!(config.agent, AgentKind::Shell);
    }

    #[test]
    fn create_request_with_agent_and_context() {
        let req: Request = serde_json::from_str(
            r#"{"seq": 1, "op": "create", "command": "claude", "agent": "agent",
                "rows": 40, "cols": 132, "context": {"workspace": "w1"}}"#,
        )
        .unwrap();
        let RequestOp::Create { params } = req.op else {
            panic!("expected create");
        };
        let config = params.into_config(SessionConfig::default());
        assert_eq!(config.command.as_deref(), Some("claude"));
        assert_eq!(config.agent, AgentKind::Agent);
        assert_eq!(config.rows, 40);
        assert_eq!(config.context["workspace"], "w1");
    }

    #[test]
    fn write_request_shape() {
        let req: Request = serde_json::from_str(
            r#"{"seq": 3, "op": "write", "session_id": "abc", "data": "ls\r"}"#,
        )
        .unwrap();
        assert!(matches!(req.op, RequestOp::Write { .. }));
    }

    #[test]
    fn read_output_limit_is_optional() {
        let req: Request = serde_json::from_str(
            r#"{"seq": 4, "op": "read_output", "session_id": "abc"}"#,
        )
        .unwrap();
        match req.op {
            RequestOp::ReadOutput { limit, .. } => assert_eq!(limit, None),
            other => panic!("unexpected op: {other:?}"),
        }
    }

    #[test]
    fn error_response_serializes_with_seq() {
        let resp = Response {
            seq: 9,
            body: ResponseBody::Error {
                message: "session not found".into(),
            },
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["seq"], 9);
        assert_eq!(json["result"], "error");
        assert_eq!(json["message"], "session not found");
    }
}
