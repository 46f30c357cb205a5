//! Unix socket transport for talking to a courier socket host.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;

use courier_protocol::{FrameReader, FrameWriter, ProtocolError, Request, encode_frame, framing};

use crate::error::{TransportError, TransportResult};
use crate::transport::{BlockingTransport, Transport, TransportOptions};

/// Sends each request over a fresh connection to a Unix socket.
///
/// A response frame is read only for requests that expect one. Honors a
/// numeric `timeout` transport option (seconds) in place of the configured
/// timeout.
#[derive(Debug, Clone)]
pub struct UnixSocketTransport {
    socket_path: PathBuf,
    timeout: Duration,
}

impl UnixSocketTransport {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    /// Creates a transport for the default socket path.
    pub fn with_defaults() -> Self {
        Self::new(courier_server::default_socket_path(), Duration::from_secs(5))
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Checks if the server socket exists.
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    fn timeout_for(&self, options: &TransportOptions) -> Duration {
        options
            .get("timeout")
            .and_then(|v| v.as_f64())
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or(self.timeout)
    }

    fn connect_error(&self, err: impl std::fmt::Display) -> TransportError {
        TransportError::Connection(format!(
            "failed to connect to {}: {err}",
            self.socket_path.display()
        ))
    }

    async fn exchange(
        &self,
        mut stream: UnixStream,
        payload: &[u8],
        rsvp: bool,
        timeout: Duration,
    ) -> TransportResult<Option<Vec<u8>>> {
        let frame = encode_frame(payload)?;
        tokio::time::timeout(timeout, async {
            stream.write_all(&frame).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| TransportError::Timeout("sending request".into()))??;

        if !rsvp {
            return Ok(None);
        }

        debug!("request sent, waiting for response");

        let reply = tokio::time::timeout(timeout, async {
            let mut len_buf = [0u8; 4];
            stream.read_exact(&mut len_buf).await?;
            let len = framing::check_len(u32::from_be_bytes(len_buf) as usize)? as usize;
            if len == 0 {
                return Err(ProtocolError::EmptyMessage);
            }

            let mut payload = vec![0u8; len];
            stream.read_exact(&mut payload).await?;
            Ok(payload)
        })
        .await
        .map_err(|_| TransportError::Timeout("reading response".into()))??;

        Ok(Some(reply))
    }
}

impl Transport for UnixSocketTransport {
    async fn send(
        &self,
        payload: Vec<u8>,
        request: &Request,
        options: &TransportOptions,
    ) -> TransportResult<Option<Vec<u8>>> {
        let timeout = self.timeout_for(options);
        debug!(
            socket = %self.socket_path.display(),
            request_id = %request.id,
            "connecting to server"
        );

        let stream = tokio::time::timeout(timeout, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| {
                TransportError::Connection(format!(
                    "connection timed out after {:.1}s",
                    timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| self.connect_error(e))?;

        self.exchange(stream, &payload, request.rsvp, timeout).await
    }
}

/// The configured timeout bounds each read and write. Connecting itself is
/// not bounded: `std` offers no connect timeout for Unix sockets, so a
/// listener whose backlog is full can hold the call until it accepts.
impl BlockingTransport for UnixSocketTransport {
    fn send(
        &self,
        payload: Vec<u8>,
        request: &Request,
        options: &TransportOptions,
    ) -> TransportResult<Option<Vec<u8>>> {
        let timeout = self.timeout_for(options);
        debug!(
            socket = %self.socket_path.display(),
            request_id = %request.id,
            "connecting to server"
        );

        let stream = std::os::unix::net::UnixStream::connect(&self.socket_path)
            .map_err(|e| self.connect_error(e))?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let mut writer = FrameWriter::new(&stream);
        writer.write_frame(&payload)?;
        if !request.rsvp {
            return Ok(None);
        }

        let mut reader = FrameReader::new(&stream);
        match reader.read_frame()? {
            Some(reply) => Ok(Some(reply)),
            None => Err(TransportError::Connection(
                "server closed the connection without responding".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    use courier_protocol::{ErrorKind, Params};
    use courier_server::{Dispatcher, Manager, ServerConfig, Signature, SocketServer};

    use crate::client::{BlockingClient, CallOptions, Client};

    #[test]
    fn transport_creation() {
        let transport = UnixSocketTransport::new("/tmp/test.sock", Duration::from_secs(10));
        assert_eq!(transport.socket_path(), Path::new("/tmp/test.sock"));
        assert!(!transport.socket_exists());
    }

    #[test]
    fn default_transport() {
        let transport = UnixSocketTransport::with_defaults();
        assert!(
            transport
                .socket_path()
                .to_string_lossy()
                .contains("courier")
        );
        assert_eq!(transport.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn timeout_option_overrides() {
        let transport = UnixSocketTransport::new("/tmp/test.sock", Duration::from_secs(10));
        let mut options = TransportOptions::new();
        assert_eq!(transport.timeout_for(&options), Duration::from_secs(10));

        options.insert("timeout".into(), json!(0.5));
        assert_eq!(transport.timeout_for(&options), Duration::from_millis(500));

        options.insert("timeout".into(), json!("soon"));
        assert_eq!(transport.timeout_for(&options), Duration::from_secs(10));
    }

    /// Starts a socket host in `dir`; notifications to `record` are
    /// forwarded to the returned channel.
    async fn start_server(
        dir: &Path,
    ) -> (PathBuf, mpsc::UnboundedReceiver<String>, tokio::task::JoinHandle<()>) {
        let socket_path = dir.join("courier.sock");
        let (tx, rx) = mpsc::unbounded_channel();

        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register_fn("add", Signature::new().required("a").required("b"), |args| {
                Ok(args.get::<i64>("a")? + args.get::<i64>("b")?)
            })
            .register_fn("record", Signature::new().required("event"), move |args| {
                let _ = tx.send(args.get::<String>("event")?);
                Ok(())
            });
        let manager = Arc::new(Manager::new(dispatcher));

        let server = SocketServer::new(ServerConfig::new(&socket_path))
            .await
            .unwrap();
        let handle = tokio::spawn(async move {
            let _ = server.serve(manager).await;
        });
        (socket_path, rx, handle)
    }

    #[tokio::test]
    async fn calls_over_socket() {
        let dir = tempdir().unwrap();
        let (socket_path, mut events, server) = start_server(dir.path()).await;
        let client = Client::new(UnixSocketTransport::new(&socket_path, Duration::from_secs(5)));

        let sum: i64 = client
            .method("add")
            .arg("a", 1)
            .arg("b", 2)
            .call_as()
            .await
            .unwrap();
        assert_eq!(sum, 3);

        let err = client.method("add").arg("a", 1).call().await.unwrap_err();
        assert!(err.is(ErrorKind::InvalidParams));

        client.method("record").arg("event", "login").notify().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), "login");

        server.abort();
    }

    #[tokio::test]
    async fn stale_call_times_out() {
        let dir = tempdir().unwrap();
        let (socket_path, _events, server) = start_server(dir.path()).await;
        let client = Client::new(UnixSocketTransport::new(&socket_path, Duration::from_secs(5)));

        let options = CallOptions::new()
            .ttl(1.0)
            .ts(courier_core::now_seconds() - 10.0)
            .transport_option("timeout", 0.2);
        let params: Params = json!({"a": 1, "b": 2}).as_object().cloned().unwrap();
        let err = client.call_with("add", params, options).await.unwrap_err();
        assert!(err.is(ErrorKind::Timeout), "{err}");

        server.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blocking_stale_call_times_out() {
        let dir = tempdir().unwrap();
        let (socket_path, _events, server) = start_server(dir.path()).await;

        let err = tokio::task::spawn_blocking(move || {
            let client = BlockingClient::new(UnixSocketTransport::new(
                &socket_path,
                Duration::from_millis(200),
            ));
            let options = CallOptions::new().ttl(1.0).ts(courier_core::now_seconds() - 10.0);
            let params: Params = json!({"a": 1, "b": 2}).as_object().cloned().unwrap();
            client.call_with("add", params, options).unwrap_err()
        })
        .await
        .unwrap();
        assert!(err.is(ErrorKind::Timeout), "{err}");

        server.abort();
    }

    #[tokio::test]
    async fn missing_socket_is_a_server_error() {
        let dir = tempdir().unwrap();
        let client = Client::new(UnixSocketTransport::new(
            dir.path().join("nothing.sock"),
            Duration::from_secs(1),
        ));
        let err = client.method("add").call().await.unwrap_err();
        assert!(err.is(ErrorKind::ServerError));
        assert!(
            err.data()
                .as_str()
                .unwrap()
                .starts_with("ConnectionError: failed to connect to"),
            "{err}"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blocking_calls_over_socket() {
        let dir = tempdir().unwrap();
        let (socket_path, mut events, server) = start_server(dir.path()).await;

        let result = tokio::task::spawn_blocking(move || {
            let client =
                BlockingClient::new(UnixSocketTransport::new(&socket_path, Duration::from_secs(5)));
            client.method("record").arg("event", "tick").notify().unwrap();
            client.method("add").arg("a", 40).arg("b", 2).call()
        })
        .await
        .unwrap();

        assert_eq!(result.unwrap(), json!(42));
        assert_eq!(events.recv().await.unwrap(), "tick");

        server.abort();
    }
}
