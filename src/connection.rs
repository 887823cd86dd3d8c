//! Client connection handle and session states.
//!
//! A `Connection` is moved between the connection queue and the one worker
//! currently serving it. It is never cloned; dropping it closes the socket.

use std::net::{SocketAddr, TcpStream};

/// Outcome of serving a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Being served by a worker.
    Connected,
    /// Hit the continuous-message cap; back in the queue with the socket open.
    Requeued,
    /// No data arrived within the idle timeout.
    ClosedTimeout,
    /// Peer closed the stream.
    ClosedByClient,
    /// Receive, send, or log failure.
    ClosedError,
}

impl SessionState {
    /// Whether the connection is finished and must be dropped.
    pub fn is_closed(self) -> bool {
        matches!(
            self,
            SessionState::ClosedTimeout | SessionState::ClosedByClient | SessionState::ClosedError
        )
    }
}

/// A single accepted client connection.
#[derive(Debug)]
pub struct Connection {
    /// Process-unique identifier assigned on accept.
    pub id: u64,
    pub peer: SocketAddr,
    pub stream: TcpStream,
    pub state: SessionState,
    /// Number of turns this connection has been given.
    pub turns: u64,
    /// Messages served over the connection's lifetime.
    pub messages: u64,
}

impl Connection {
    /// Wrap a freshly accepted stream.
    pub fn new(id: u64, peer: SocketAddr, stream: TcpStream) -> Self {
        Self {
            id,
            peer,
            stream,
            state: SessionState::Connected,
            turns: 0,
            messages: 0,
        }
    }

    /// Record the result of one turn.
    pub fn finish_turn(&mut self, state: SessionState, served: u64) {
        self.turns += 1;
        self.messages += served;
        self.state = state;
    }

    /// Mark the connection as being served again after a requeue.
    pub fn resume(&mut self) {
        self.state = SessionState::Connected;
    }
}
