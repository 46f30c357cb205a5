//! Socket host configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Settings for [`SocketServer`](crate::SocketServer).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub socket_path: PathBuf,

    /// Bound on each frame read or write. An idle connection is closed
    /// once it expires.
    pub connection_timeout: Duration,

    /// Connections served at once; further clients wait in the backlog.
    pub max_connections: usize,

    /// Remove a socket file nobody is listening on before binding.
    pub cleanup_stale_socket: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            connection_timeout: Duration::from_secs(30),
            max_connections: 100,
            cleanup_stale_socket: true,
        }
    }
}

impl ServerConfig {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    #[must_use]
    pub fn with_cleanup_stale_socket(mut self, cleanup: bool) -> Self {
        self.cleanup_stale_socket = cleanup;
        self
    }
}

/// `$XDG_RUNTIME_DIR/courier.sock`, or `/tmp/courier-$UID.sock` when the
/// runtime directory is not set.
pub fn default_socket_path() -> PathBuf {
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(runtime_dir) if !runtime_dir.is_empty() => {
            PathBuf::from(runtime_dir).join("courier.sock")
        }
        _ => {
            #[cfg(unix)]
            // SAFETY: getuid has no preconditions and cannot fail.
            let uid = unsafe { libc::getuid() };
            #[cfg(not(unix))]
            let uid = 0;
            PathBuf::from(format!("/tmp/courier-{uid}.sock"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_path, default_socket_path());
        assert_eq!(config.connection_timeout, Duration::from_secs(30));
        assert_eq!(config.max_connections, 100);
        assert!(config.cleanup_stale_socket);
    }

    #[test]
    fn builder_overrides() {
        let config = ServerConfig::new("/run/rpc/api.sock")
            .with_connection_timeout(Duration::from_millis(250))
            .with_max_connections(4)
            .with_cleanup_stale_socket(false);

        assert_eq!(config.socket_path, PathBuf::from("/run/rpc/api.sock"));
        assert_eq!(config.connection_timeout, Duration::from_millis(250));
        assert_eq!(config.max_connections, 4);
        assert!(!config.cleanup_stale_socket);
    }

    #[test]
    fn socket_path_is_per_user() {
        let path = default_socket_path();
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("courier"), "{name}");
        assert!(name.ends_with(".sock"), "{name}");
    }
}
