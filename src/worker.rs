//! Fixed pool of worker threads.
//!
//! Each worker loops forever: take the next connection from the queue and
//! serve one turn on it. Workers hold at most one connection at a time;
//! fairness between clients comes from the session's requeue on the
//! continuous-message cap.

use crate::server::ServerContext;
use crate::session;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace};

/// Handles to the running worker threads.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `ctx.config.threads` workers draining `ctx.queue`.
    pub fn spawn(ctx: Arc<ServerContext>) -> io::Result<Self> {
        let num_workers = ctx.config.threads;
        let mut handles = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let ctx = Arc::clone(&ctx);

            let handle = thread::Builder::new()
                .name(format!("worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, &ctx))?;

            handles.push(handle);
        }

        info!(workers = num_workers, "Worker pool started");
        Ok(Self { handles })
    }

    /// Number of worker threads in the pool.
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for all workers.
    ///
    /// Workers never exit on their own, so this only returns if one panics.
    pub fn join(self) {
        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("worker").to_owned();
            if handle.join().is_err() {
                error!(worker = %name, "Worker panicked");
            }
        }
    }
}

fn worker_loop(worker_id: usize, ctx: &ServerContext) {
    debug!(worker = worker_id, "Worker started");

    loop {
        let conn = match ctx.queue.try_pop() {
            Some(conn) => conn,
            None => {
                trace!(worker = worker_id, "Waiting for connection");
                ctx.queue.pop()
            }
        };
        debug!(worker = worker_id, conn_id = conn.id, "Processing client");
        let state = session::process_turn(conn, ctx);
        if state.is_closed() {
            debug!(worker = worker_id, ?state, "Connection released");
        }
    }
}
