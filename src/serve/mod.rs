//! Development server: static files from the dev output root.
//!
//! # Module Structure
//!
//! ```text
//! serve/
//! ├── content    # reload script injection
//! ├── path       # URL → file resolution
//! ├── response   # HTTP response handlers
//! └── mod.rs     # DevServer (this file)
//! ```
//!
//! HTML responses get a `<script>` tag for `/__sitepipe/livereload.js`,
//! which is served from memory and connects back to the reload hub.

mod content;
mod path;
mod response;

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tiny_http::{Method, Request, Server};

use crate::embed::serve::LIVERELOAD_PATH;
use crate::reload::MAX_PORT_RETRIES;
use crate::{debug, log};

/// Worker threads answering requests.
const REQUEST_THREADS: usize = 4;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {interface} (ports {first}-{last}): {message}")]
    Bind {
        interface: IpAddr,
        first: u16,
        last: u16,
        message: String,
    },

    #[error("failed to start request pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// A bound static file server.
pub struct DevServer {
    server: Arc<Server>,
    addr: SocketAddr,
    root: Arc<Path>,
    ws_port: Option<u16>,
}

impl DevServer {
    /// Bind `interface:base_port`, trying successive ports while busy.
    ///
    /// `ws_port` is the reload hub's port; `None` serves without injection.
    pub fn bind(
        interface: IpAddr,
        base_port: u16,
        root: &Path,
        ws_port: Option<u16>,
    ) -> Result<Self, ServeError> {
        let mut last_error = String::new();
        let mut last_port = base_port;

        for offset in 0..MAX_PORT_RETRIES {
            let Some(port) = base_port.checked_add(offset) else {
                break;
            };
            last_port = port;

            match Server::http(SocketAddr::new(interface, port)) {
                Ok(server) => {
                    if offset > 0 {
                        log!("serve"; "port {} in use, using {} instead", base_port, port);
                    }
                    let addr = server
                        .server_addr()
                        .to_ip()
                        .unwrap_or_else(|| SocketAddr::new(interface, port));
                    return Ok(Self {
                        server: Arc::new(server),
                        addr,
                        root: Arc::from(root),
                        ws_port,
                    });
                }
                Err(e) => {
                    last_error = e.to_string();
                    if base_port == 0 {
                        break;
                    }
                }
            }
        }

        Err(ServeError::Bind {
            interface,
            first: base_port,
            last: last_port,
            message: last_error,
        })
    }

    /// Address actually bound.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Handle for the shutdown handler, which unblocks [`run`](Self::run).
    pub fn handle(&self) -> Arc<Server> {
        Arc::clone(&self.server)
    }

    /// Stop accepting requests; `run` returns once in-flight requests finish.
    #[cfg(test)]
    pub fn unblock(&self) {
        self.server.unblock();
    }

    /// Serve requests until unblocked. Blocks the calling thread.
    pub fn run(&self) -> Result<(), ServeError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(REQUEST_THREADS)
            .thread_name(|i| format!("sitepipe-http-{i}"))
            .build()?;

        for request in self.server.incoming_requests() {
            let root = Arc::clone(&self.root);
            let ws_port = self.ws_port;
            pool.spawn(move || {
                if let Err(e) = handle_request(request, &root, ws_port) {
                    log!("serve"; "request error: {e}");
                }
            });
        }

        debug!("serve"; "stopped");
        Ok(())
    }
}

fn handle_request(request: Request, root: &Path, ws_port: Option<u16>) -> anyhow::Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }
    if !matches!(request.method(), Method::Get | Method::Head) {
        return response::respond_method_not_allowed(request);
    }

    debug!("serve"; "{} {}", request.method(), request.url());

    let url_path = request.url().split('?').next().unwrap_or_default();
    if let Some(port) = ws_port
        && url_path == LIVERELOAD_PATH
    {
        return response::respond_livereload_js(request, port);
    }

    match path::resolve_path(request.url(), root) {
        Some(file) => response::respond_file(request, &file, ws_port),
        None => response::respond_not_found(request, root, ws_port),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::{Read, Write};
    use std::net::{Ipv4Addr, TcpStream};
    use std::thread;

    use tempfile::TempDir;

    use super::*;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    struct Running {
        server: Arc<DevServer>,
        handle: Option<thread::JoinHandle<()>>,
    }

    impl Running {
        fn start(root: &Path, ws_port: Option<u16>) -> Self {
            let server = Arc::new(DevServer::bind(LOCALHOST, 0, root, ws_port).unwrap());
            let runner = Arc::clone(&server);
            let handle = thread::spawn(move || runner.run().unwrap());
            Self {
                server,
                handle: Some(handle),
            }
        }

        fn request(&self, method: &str, path: &str) -> (u16, String) {
            let mut stream = TcpStream::connect(self.server.addr()).unwrap();
            write!(
                stream,
                "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
            )
            .unwrap();
            let mut raw = String::new();
            stream.read_to_string(&mut raw).unwrap();

            let status = raw
                .split_whitespace()
                .nth(1)
                .and_then(|s| s.parse().ok())
                .unwrap();
            let body = raw.split_once("\r\n\r\n").map(|(_, b)| b.to_owned()).unwrap_or_default();
            (status, body)
        }
    }

    impl Drop for Running {
        fn drop(&mut self) {
            self.server.unblock();
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }

    fn site() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("css")).unwrap();
        fs::write(
            temp.path().join("index.html"),
            "<html><body><h1>Home</h1></body></html>",
        )
        .unwrap();
        fs::write(temp.path().join("css/main.css"), ".a{color:red}").unwrap();
        temp
    }

    #[test]
    fn test_serves_html_with_reload_script() {
        let temp = site();
        let running = Running::start(temp.path(), Some(40000));

        let (status, body) = running.request("GET", "/");
        assert_eq!(status, 200);
        assert!(body.contains("<h1>Home</h1><script src=\"/__sitepipe/livereload.js\"></script></body>"));

        let (status, body) = running.request("GET", "/css/main.css");
        assert_eq!(status, 200);
        assert_eq!(body, ".a{color:red}");
    }

    #[test]
    fn test_serves_livereload_script() {
        let temp = site();
        let running = Running::start(temp.path(), Some(40123));

        let (status, body) = running.request("GET", LIVERELOAD_PATH);
        assert_eq!(status, 200);
        assert!(body.contains("40123"));
    }

    #[test]
    fn test_without_reload_channel() {
        let temp = site();
        let running = Running::start(temp.path(), None);

        let (_, body) = running.request("GET", "/index.html");
        assert!(!body.contains("livereload"));
        let (status, _) = running.request("GET", LIVERELOAD_PATH);
        assert_eq!(status, 404);
    }

    #[test]
    fn test_not_found_and_method() {
        let temp = site();
        let running = Running::start(temp.path(), None);

        let (status, body) = running.request("GET", "/missing.html");
        assert_eq!(status, 404);
        assert!(body.contains("/missing.html"));

        let (status, _) = running.request("GET", "/../../etc/passwd");
        assert_eq!(status, 404);

        let (status, _) = running.request("POST", "/");
        assert_eq!(status, 405);

        fs::write(temp.path().join("404.html"), "<body>custom</body>").unwrap();
        let (status, body) = running.request("GET", "/missing.html");
        assert_eq!(status, 404);
        assert!(body.contains("custom"));
    }

    #[test]
    fn test_bind_retries_busy_port() {
        let temp = site();
        let first = DevServer::bind(LOCALHOST, 0, temp.path(), None).unwrap();
        let busy = first.addr().port();

        match DevServer::bind(LOCALHOST, busy, temp.path(), None) {
            Ok(second) => assert_ne!(second.addr().port(), busy),
            Err(ServeError::Bind { first, .. }) => assert_eq!(first, busy),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
