//! Request dispatch: one wire operation → one host call.

use std::sync::Arc;

use termhub_session::SessionHost;

use super::protocol::{Request, RequestOp, Response, ResponseBody};

/// Execute one request against the host. Never fails; host errors come back
/// as `Error` responses carrying the error's display text.
pub fn dispatch(host: &Arc<SessionHost>, request: Request) -> Response {
    let Request { seq, op } = request;
    let body = match op {
        RequestOp::Create { params } => match host
            .create(params.into_config(host.default_session_config()))
        {
            Ok(session_id) => ResponseBody::Created { session_id },
            Err(e) => error_body(e),
        },
        RequestOp::List => ResponseBody::Sessions {
            sessions: host.list(),
        },
        RequestOp::Write { session_id, data } => {
            match host.write(&session_id, data.as_bytes()) {
                Ok(()) => ResponseBody::Ok,
                Err(e) => error_body(e),
            }
        }
        RequestOp::Resize {
            session_id,
            rows,
            cols,
        } => match host.resize(&session_id, rows, cols) {
            Ok(()) => ResponseBody::Ok,
            Err(e) => error_body(e),
        },
        RequestOp::Pause { session_id } => match host.pause(&session_id) {
            Ok(()) => ResponseBody::Ok,
            Err(e) => error_body(e),
        },
        RequestOp::Resume { session_id } => match host.resume(&session_id) {
            Ok(()) => ResponseBody::Ok,
            Err(e) => error_body(e),
        },
        RequestOp::Close { session_id } => match host.close(&session_id) {
            Ok(()) => ResponseBody::Ok,
            Err(e) => error_body(e),
        },
        RequestOp::ReadOutput { session_id, limit } => {
            match host.read_output(&session_id, limit) {
                // The ring only ever stores text that already passed the
                // UTF-8 safety buffer, so the lossy conversion is a no-op.
                Ok(bytes) => ResponseBody::Output {
                    data: String::from_utf8_lossy(&bytes).into_owned(),
                    session_id,
                },
                Err(e) => error_body(e),
            }
        }
        RequestOp::ReadStats => ResponseBody::Stats {
            stats: host.stats(),
        },
        RequestOp::ReadMetrics => ResponseBody::Metrics {
            metrics: host.metrics(),
        },
    };
    Response { seq, body }
}

fn error_body(e: termhub_common::HostError) -> ResponseBody {
    ResponseBody::Error {
        message: e.to_string(),
    }
}
