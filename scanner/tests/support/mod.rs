//! Local stand-ins for the network: a UDP responder playing the part of the
//! devices on the multicast group, and an HTTP server hosting their
//! description documents.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::oneshot;
use upnp_scanner::Configuration;
use warp::http::StatusCode;
use warp::path::FullPath;
use warp::Filter;

pub const ROUTER_XML: &str = include_str!("../fixtures/router_device.xml");
pub const MEDIA_SERVER_XML: &str = include_str!("../fixtures/media_server_with_urlbase.xml");

/// How long a `/slow/...` document takes to be served
pub const SLOW_RESPONSE: Duration = Duration::from_secs(3);

pub fn init_logger() {
    let _ = simplelog::TestLogger::init(simplelog::LevelFilter::Debug, simplelog::Config::default());
}

/// Search reply advertising `location`
pub fn ssdp_reply(location: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age=1800\r\n\
         EXT:\r\n\
         LOCATION: {}\r\n\
         SERVER: Linux/5.10 UPnP/1.0 Test/1.0\r\n\
         ST: upnp:rootdevice\r\n\
         USN: uuid:test-device::upnp:rootdevice\r\n\
         \r\n",
        location
    )
}

/// Answers M-SEARCH requests on a loopback UDP socket. Round `n` of
/// `rounds` is the list of replies sent back for the n-th search received.
pub struct FakeResponder {
    addr: SocketAddr,
    handle: Option<JoinHandle<Vec<String>>>,
}

impl FakeResponder {
    pub fn start(rounds: Vec<Vec<String>>) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        let addr = socket.local_addr().unwrap();

        let handle = std::thread::spawn(move || {
            let mut requests = Vec::new();
            let mut buf = [0u8; 2048];
            for replies in rounds {
                let (size, from) = match socket.recv_from(&mut buf) {
                    Ok(received) => received,
                    Err(_) => break,
                };
                requests.push(String::from_utf8_lossy(&buf[..size]).into_owned());
                for reply in replies {
                    socket.send_to(reply.as_bytes(), from).unwrap();
                }
            }
            requests
        });

        Self {
            addr,
            handle: Some(handle),
        }
    }

    /// Responder answering a single search with `replies`
    pub fn once(replies: Vec<String>) -> Self {
        Self::start(vec![replies])
    }

    /// Scanner configuration aimed at this responder, with a 1s timeout
    pub fn config(&self) -> Configuration {
        let mut config = Configuration::default();
        config.set_host(self.addr.ip()).set_port(self.addr.port());
        config.set_timeout(1).unwrap();
        config
    }

    /// Stop and return the raw search requests that were received
    pub fn requests(mut self) -> Vec<String> {
        self.handle.take().map(|h| h.join().unwrap()).unwrap_or_default()
    }
}

#[derive(Default)]
struct ServerState {
    documents: HashMap<String, String>,
    hits: Mutex<HashMap<String, usize>>,
}

/// HTTP server hosting description documents by path. Unknown paths get a
/// 404; paths under `/slow/` answer after [`SLOW_RESPONSE`].
pub struct DescriptionServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl DescriptionServer {
    pub fn start(documents: &[(&str, &str)]) -> Self {
        let state = Arc::new(ServerState {
            documents: documents
                .iter()
                .map(|(path, body)| (path.to_string(), body.to_string()))
                .collect(),
            hits: Mutex::new(HashMap::new()),
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (addr_tx, addr_rx) = std::sync::mpsc::channel();
        let server_state = Arc::clone(&state);

        let handle = std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async move {
                let route = warp::path::full().and_then(move |path: FullPath| {
                    let state = Arc::clone(&server_state);
                    async move {
                        *state
                            .hits
                            .lock()
                            .unwrap()
                            .entry(path.as_str().to_string())
                            .or_insert(0) += 1;

                        if path.as_str().starts_with("/slow/") {
                            tokio::time::sleep(SLOW_RESPONSE).await;
                        }

                        let reply = match state.documents.get(path.as_str()) {
                            Some(body) => warp::reply::with_status(body.clone(), StatusCode::OK),
                            None => warp::reply::with_status(String::new(), StatusCode::NOT_FOUND),
                        };
                        Ok::<_, warp::Rejection>(reply)
                    }
                });

                let (addr, server) = warp::serve(route)
                    .bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async move {
                        let _ = shutdown_rx.await;
                    });
                addr_tx.send(addr).unwrap();
                server.await;
            });
        });

        let addr = addr_rx.recv().unwrap();
        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of requests received for `path`
    pub fn hits(&self, path: &str) -> usize {
        self.state.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

impl Drop for DescriptionServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
