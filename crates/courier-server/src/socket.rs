//! Unix socket host.
//!
//! Each connection carries length-prefixed frames (see
//! [`courier_protocol::framing`]). Every frame received is handed to a
//! [`Manager`]; a frame is written back only when the manager produces a
//! response, so notifications get no reply.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use courier_protocol::framing::{check_len, encode_frame};
use courier_protocol::ProtocolError;

use crate::config::ServerConfig;
use crate::error::{ServeError, ServeResult};
use crate::manager::Manager;

/// Listens on a Unix socket and hands out connections.
pub struct SocketServer {
    config: ServerConfig,
    listener: UnixListener,
    connection_semaphore: Arc<Semaphore>,
}

impl SocketServer {
    /// Binds to `config.socket_path`.
    ///
    /// A leftover socket file nobody listens on is removed first when
    /// `cleanup_stale_socket` is set. A live one is always an error.
    pub async fn new(config: ServerConfig) -> ServeResult<Self> {
        let socket_path = &config.socket_path;

        if let Some(parent) = socket_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            return Err(ServeError::socket_path_invalid(
                parent.to_string_lossy().to_string(),
            ));
        }

        if socket_path.exists() {
            if !config.cleanup_stale_socket || UnixStream::connect(socket_path).await.is_ok() {
                return Err(ServeError::socket_in_use(
                    socket_path.to_string_lossy().to_string(),
                ));
            }
            info!(path = %socket_path.display(), "removing stale socket");
            std::fs::remove_file(socket_path)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        info!(path = %socket_path.display(), "socket server listening");

        let connection_semaphore = Arc::new(Semaphore::new(config.max_connections));

        Ok(Self {
            config,
            listener,
            connection_semaphore,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Waits for a connection slot, then for a client.
    pub async fn accept(&self) -> ServeResult<Connection> {
        let permit = Arc::clone(&self.connection_semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ServeError::Shutdown)?;

        let (stream, _addr) = self.listener.accept().await?;
        debug!("accepted connection");

        Ok(Connection {
            stream,
            timeout: self.config.connection_timeout,
            _permit: permit,
        })
    }

    /// Accepts connections forever, spawning `handler` for each one.
    pub async fn run<F, Fut>(&self, handler: F) -> ServeResult<()>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        loop {
            match self.accept().await {
                Ok(connection) => {
                    tokio::spawn(handler(connection));
                }
                Err(ServeError::Shutdown) => return Err(ServeError::Shutdown),
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                }
            }
        }
    }

    /// Like [`run`](Self::run), returning once `shutdown` completes.
    pub async fn run_until_shutdown<F, Fut, S>(&self, handler: F, shutdown: S) -> ServeResult<()>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
        S: Future<Output = ()> + Send,
    {
        tokio::select! {
            result = self.run(handler) => result,
            _ = shutdown => {
                info!("shutdown signal received");
                Ok(())
            }
        }
    }

    /// Serves every connection with `manager`.
    pub async fn serve(&self, manager: Arc<Manager>) -> ServeResult<()> {
        self.run(connection_handler(manager)).await
    }

    /// Like [`serve`](Self::serve), returning once `shutdown` completes.
    ///
    /// Connections already being served keep running on their own tasks.
    pub async fn serve_until_shutdown<S>(&self, manager: Arc<Manager>, shutdown: S) -> ServeResult<()>
    where
        S: Future<Output = ()> + Send,
    {
        self.run_until_shutdown(connection_handler(manager), shutdown)
            .await
    }
}

fn connection_handler(
    manager: Arc<Manager>,
) -> impl Fn(Connection) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static
{
    move |mut conn| {
        let manager = Arc::clone(&manager);
        Box::pin(async move {
            match conn.serve(&manager).await {
                Ok(()) => debug!("client disconnected"),
                Err(e) if e.is_disconnect() => debug!(error = %e, "connection dropped"),
                Err(e) => warn!(error = %e, "connection handler error"),
            }
        })
    }
}

impl Drop for SocketServer {
    fn drop(&mut self) {
        let path = &self.config.socket_path;
        if !path.exists() {
            return;
        }
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed socket file"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove socket file"),
        }
    }
}

/// One client connection.
pub struct Connection {
    stream: UnixStream,
    timeout: std::time::Duration,
    _permit: OwnedSemaphorePermit,
}

impl Connection {
    /// Reads one frame payload.
    ///
    /// Returns `Ok(None)` if the client closed the connection between frames.
    pub async fn read_frame(&mut self) -> ServeResult<Option<Vec<u8>>> {
        let mut len_buf = [0u8; 4];
        match tokio::time::timeout(self.timeout, self.stream.read_exact(&mut len_buf)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ProtocolError::timeout("read frame length").into()),
        }

        let len = check_len(u32::from_be_bytes(len_buf) as usize)? as usize;
        if len == 0 {
            return Err(ProtocolError::EmptyMessage.into());
        }

        let mut payload = vec![0u8; len];
        match tokio::time::timeout(self.timeout, self.stream.read_exact(&mut payload)).await {
            Ok(Ok(_)) => Ok(Some(payload)),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ProtocolError::timeout("read frame payload").into()),
        }
    }

    /// Writes one frame payload.
    pub async fn write_frame(&mut self, payload: &[u8]) -> ServeResult<()> {
        let buffer = encode_frame(payload)?;
        match tokio::time::timeout(self.timeout, self.stream.write_all(&buffer)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProtocolError::timeout("write frame").into()),
        }
    }

    /// Feeds frames to `manager` until the client disconnects.
    ///
    /// Frames on one connection are handled one at a time and answered in
    /// the order they arrived. Callers wanting calls to overlap use one
    /// connection per call; every connection is served on its own task.
    pub async fn serve(&mut self, manager: &Manager) -> ServeResult<()> {
        while let Some(frame) = self.read_frame().await? {
            if let Some(reply) = manager.handle(&frame).await {
                self.write_frame(&reply).await?;
            }
        }
        Ok(())
    }
}
