//! Line protocol spoken on the service port.
//!
//! One request per line. Each response is a `SET-COOKIE` line carrying the
//! refreshed session cookie, at most one JSON body line, and a status line
//! (`OK`, `NOTFOUND`, `REJECTED`, `BADREQUEST` or `ERROR`).

use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

use crate::command::{parse_command, Command, CommandError};
use crate::engine::{Engine, EngineError};
use crate::limits::{COOKIE_NAME, MAX_LINE_LEN};
use crate::model::*;
use crate::observability;
use crate::session;

/// What the connection remembers between requests, like a browser's cookie jar.
#[derive(Debug, Default)]
struct ConnectionState {
    cookie_header: Option<String>,
}

struct Reply {
    lines: Vec<String>,
    outcome: &'static str,
    close: bool,
}

impl Reply {
    fn new(outcome: &'static str) -> Self {
        Self {
            lines: Vec::new(),
            outcome,
            close: false,
        }
    }

    fn status(mut self, line: String, outcome: &'static str) -> Self {
        self.lines.push(line);
        self.outcome = outcome;
        self
    }

    fn body<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(json) => {
                self.lines.push(json);
                self.status("OK".into(), "ok")
            }
            Err(e) => self.status(format!("ERROR cannot encode response: {e}"), "error"),
        }
    }

    fn engine_error(self, e: EngineError) -> Self {
        match e {
            EngineError::NotFound(_) => self.status(format!("NOTFOUND {e}"), "not_found"),
            EngineError::Validation(_) => self.status(format!("REJECTED {e}"), "rejected"),
            EngineError::Storage(_) => self.status(format!("ERROR {e}"), "error"),
        }
    }
}

#[derive(Serialize)]
struct Overview {
    now: Secs,
    groups: Vec<GroupSummary>,
}

fn slot_body(resource_id: &str, r: &Reservation) -> serde_json::Value {
    json!({
        "resource_id": resource_id,
        "start": r.span.start,
        "end": r.span.end,
        "info": r.info,
    })
}

fn change_body(resource_id: &str, changed: Option<Reservation>) -> serde_json::Value {
    match changed {
        Some(r) => json!({ "changed": true, "reservation": slot_body(resource_id, &r) }),
        None => json!({ "changed": false }),
    }
}

async fn dispatch(engine: &Engine, reply: Reply, cmd: Command, session: &str) -> Reply {
    let now = now_secs();
    match cmd {
        Command::Cookie { .. } => reply.status("OK".into(), "ok"),
        Command::List => {
            let groups = engine.overview(session, now).await;
            reply.body(&Overview { now, groups })
        }
        Command::View { resource_id } => match engine.view(&resource_id, session, now).await {
            Ok(view) => reply.body(&view),
            Err(e) => reply.engine_error(e),
        },
        Command::Book {
            resource_id,
            duration_minutes,
            info,
        } => match engine
            .book(&resource_id, session, duration_minutes, &info, now)
            .await
        {
            Ok(booking) => {
                let mut body = slot_body(&resource_id, &booking.reservation);
                body["kind"] = json!(booking.kind);
                reply.body(&body)
            }
            Err(e) => reply.engine_error(e),
        },
        Command::Cancel { resource_id, start } => {
            match engine.cancel(&resource_id, session, start, now).await {
                Ok(changed) => reply.body(&change_body(&resource_id, changed)),
                Err(e) => reply.engine_error(e),
            }
        }
        Command::Claim { resource_id, start } => {
            match engine.claim(&resource_id, session, start, now).await {
                Ok(changed) => reply.body(&change_body(&resource_id, changed)),
                Err(e) => reply.engine_error(e),
            }
        }
        Command::Quit => reply.status("BYE".into(), "ok"),
    }
}

async fn handle_request(
    engine: &Engine,
    state: &mut ConnectionState,
    parsed: Result<Command, CommandError>,
) -> Reply {
    if let Ok(Command::Quit) = parsed {
        let mut reply = Reply::new("ok").status("BYE".into(), "ok");
        reply.close = true;
        return reply;
    }
    if let Ok(Command::Cookie { header }) = &parsed {
        state.cookie_header = Some(header.clone());
    }

    let presented = state
        .cookie_header
        .as_deref()
        .and_then(|h| session::cookie_value(h, COOKIE_NAME));
    let token = match session::resolve(presented) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("{e}");
            return Reply::new("error").status(format!("ERROR {e}"), "error");
        }
    };
    if presented != Some(token.as_str()) {
        metrics::counter!(observability::SESSIONS_ISSUED_TOTAL).increment(1);
    }
    state.cookie_header = Some(format!("{COOKIE_NAME}={token}"));

    let mut reply = Reply::new("ok");
    reply
        .lines
        .push(format!("SET-COOKIE {}", session::set_cookie(&token)));

    match parsed {
        Ok(cmd) => dispatch(engine, reply, cmd, &token).await,
        Err(e) => reply.status(format!("BADREQUEST {e}"), "bad_request"),
    }
}

/// Serve one client until it disconnects or sends `QUIT`.
pub async fn process_connection<S>(stream: S, engine: Arc<Engine>) -> Result<(), LinesCodecError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LEN));
    let mut state = ConnectionState::default();

    // Framed yields one `None` right after a decode error before reading on.
    let mut after_error = false;
    loop {
        let line = match framed.next().await {
            Some(line) => line,
            None if after_error => {
                after_error = false;
                continue;
            }
            None => break,
        };
        after_error = false;

        let started = Instant::now();
        let parsed = match line {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => parse_command(&line),
            // The codec skips the rest of the line; answer it like any bad request.
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                after_error = true;
                Err(CommandError::LineTooLong)
            }
            Err(e) => return Err(e),
        };
        let label = match &parsed {
            Ok(cmd) => observability::command_label(cmd),
            Err(_) => "invalid",
        };

        let reply = handle_request(&engine, &mut state, parsed).await;
        metrics::counter!(observability::COMMANDS_TOTAL, "command" => label, "outcome" => reply.outcome)
            .increment(1);
        metrics::histogram!(observability::COMMAND_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());

        for out in reply.lines {
            framed.send(out).await?;
        }
        if reply.close {
            break;
        }
    }
    Ok(())
}
