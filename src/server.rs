//! TCP listener and shared server state.
//!
//! The listener accepts connections, applies the idle-receive timeout and
//! hands each connection to the worker pool through the connection queue.
//! It never reads from a client itself.

use crate::config::Config;
use crate::connection::Connection;
use crate::message_log::MessageLog;
use crate::queue::ConnectionQueue;
use crate::worker::WorkerPool;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

/// Pending-connection backlog of the listening socket
const LISTEN_BACKLOG: i32 = 10;

/// State shared by the listener and every worker.
pub struct ServerContext {
    pub config: Config,
    pub queue: ConnectionQueue<Connection>,
    pub log: MessageLog,
}

impl ServerContext {
    pub fn new(config: Config, log: MessageLog) -> Self {
        Self {
            config,
            queue: ConnectionQueue::new(),
            log,
        }
    }
}

/// Server instance
pub struct Server {
    ctx: Arc<ServerContext>,
    listener: TcpListener,
    next_conn_id: u64,
}

impl Server {
    /// Open the message log and bind the listening socket.
    pub fn bind(config: Config) -> io::Result<Self> {
        let addr = config
            .listen_addr()
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("no address for {}", config.listen_addr()),
                )
            })?;

        let log = MessageLog::create(&config.file)?;
        let listener = create_listener(addr)?;

        Ok(Server {
            ctx: Arc::new(ServerContext::new(config, log)),
            listener,
            next_conn_id: 0,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared state handed to the workers.
    #[cfg(test)]
    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// Start the worker pool and accept connections forever.
    ///
    /// Accepting happens on a dedicated listener thread while the calling
    /// thread waits on the workers, so this only returns if they all die.
    pub fn run(mut self) -> io::Result<()> {
        let pool = WorkerPool::spawn(Arc::clone(&self.ctx))?;
        info!(
            address = %self.local_addr()?,
            workers = pool.size(),
            "Server listening"
        );

        thread::Builder::new()
            .name("listener".to_string())
            .spawn(move || self.accept_loop())?;

        pool.join();
        Err(io::Error::new(io::ErrorKind::Other, "worker pool exited"))
    }

    fn accept_loop(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.admit(stream, peer),
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    /// Configure a freshly accepted stream and queue it for the workers.
    fn admit(&mut self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_read_timeout(self.ctx.config.idle_timeout()) {
            warn!(peer = %peer, error = %e, "Failed to set idle timeout");
        }

        let conn_id = self.next_conn_id;
        self.next_conn_id += 1;

        self.ctx.queue.push(Connection::new(conn_id, peer, stream));
        debug!(
            conn_id,
            peer = %peer,
            queued = self.ctx.queue.len(),
            "Client connected and enqueued"
        );
    }
}

fn create_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}
