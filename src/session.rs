//! Per-connection session processing.
//!
//! A worker serves one connection for one turn: receive a frame, log it,
//! acknowledge it, and repeat until the continuous-message cap is reached
//! or the connection ends. A capped connection goes back to the queue with
//! its socket open, so a chatty client cannot pin a worker indefinitely.

use crate::connection::{Connection, SessionState};
use crate::message_log::MessageLog;
use crate::protocol::{ack, Message, FRAME_SIZE};
use crate::server::ServerContext;
use std::io::{self, Read, Write};
use thiserror::Error;
use tracing::{debug, debug_span, info, trace, warn};

/// Why a frame could not be received.
#[derive(Debug, Error)]
pub enum RecvError {
    /// Idle deadline expired.
    #[error("no data within idle timeout ({received} bytes of frame received)")]
    Timeout { received: usize },
    /// Peer closed the stream between frames.
    #[error("connection closed by peer")]
    Closed,
    /// Peer closed the stream part-way through a frame.
    #[error("connection closed after {received} of {} frame bytes", FRAME_SIZE)]
    Truncated { received: usize },
    #[error("receive failed: {0}")]
    Io(#[from] io::Error),
}

impl RecvError {
    /// Session state the connection moves to after this error.
    pub fn state(&self) -> SessionState {
        match self {
            RecvError::Timeout { .. } => SessionState::ClosedTimeout,
            RecvError::Closed | RecvError::Truncated { .. } => SessionState::ClosedByClient,
            RecvError::Io(_) => SessionState::ClosedError,
        }
    }
}

/// Read exactly one frame.
///
/// The idle deadline is enforced by the reader (the socket's read timeout),
/// which surfaces as `WouldBlock` or `TimedOut` depending on the platform.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Message, RecvError> {
    let mut frame = [0u8; FRAME_SIZE];
    let mut filled = 0;

    while filled < FRAME_SIZE {
        match reader.read(&mut frame[filled..]) {
            Ok(0) if filled == 0 => return Err(RecvError::Closed),
            Ok(0) => return Err(RecvError::Truncated { received: filled }),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                return Err(RecvError::Timeout { received: filled })
            }
            Err(e) => return Err(RecvError::Io(e)),
        }
    }

    Ok(Message::decode(&frame))
}

/// Serve one turn on `stream`.
///
/// Returns the state the connection ends the turn in and the number of
/// messages served during the turn. `Requeued` means the cap was reached
/// and the stream is still healthy.
pub fn serve_turn<S, W>(stream: &mut S, log: &MessageLog<W>, cap: u32) -> (SessionState, u64)
where
    S: Read + Write,
    W: Write,
{
    let mut served: u64 = 0;

    loop {
        let message = match read_frame(stream) {
            Ok(message) => message,
            Err(e) => {
                match e {
                    RecvError::Timeout { .. } | RecvError::Closed => {
                        debug!(error = %e, "Session ended")
                    }
                    RecvError::Truncated { .. } | RecvError::Io(_) => {
                        warn!(error = %e, "Receive failed")
                    }
                }
                return (e.state(), served);
            }
        };

        if let Err(e) = log.append(&message) {
            warn!(msg_id = message.id, error = %e, "Failed to write message log");
            return (SessionState::ClosedError, served);
        }
        trace!(msg_id = message.id, msg = %message.payload, "Message received");

        let reply = ack(message.id);
        if let Err(e) = stream.write_all(reply.as_bytes()).and_then(|_| stream.flush()) {
            debug!(msg_id = message.id, error = %e, "Failed to send acknowledgment");
            return (SessionState::ClosedError, served);
        }

        served += 1;
        if served >= u64::from(cap) {
            return (SessionState::Requeued, served);
        }
    }
}

/// Run one turn for a dequeued connection and dispose of it.
///
/// Capped connections are pushed back onto the queue; every other outcome
/// drops the connection, which closes the socket.
pub fn process_turn(mut conn: Connection, ctx: &ServerContext) -> SessionState {
    let span = debug_span!("session", conn_id = conn.id, peer = %conn.peer);
    let _enter = span.enter();

    conn.resume();
    let (state, served) = serve_turn(
        &mut conn.stream,
        &ctx.log,
        ctx.config.max_continuous_msgs,
    );
    conn.finish_turn(state, served);

    match conn.state {
        SessionState::Requeued => {
            debug!(served, turns = conn.turns, "Message cap reached, requeueing client");
            ctx.queue.push(conn);
        }
        SessionState::ClosedTimeout => {
            info!(
                timeout = ctx.config.timeout,
                messages = conn.messages,
                "No data from client within timeout, disconnecting"
            );
        }
        SessionState::ClosedByClient => {
            debug!(messages = conn.messages, "Client disconnected");
        }
        SessionState::ClosedError => {
            debug!(messages = conn.messages, "Closing client after error");
        }
        SessionState::Connected => unreachable!("turn ended without a final state"),
    }

    state
}
