//! Minimal Docker Engine API client over a plain hyper HTTP/1 connection.
use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Request, StatusCode, header};
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    time::timeout,
};

use crate::{
    config::DockerConfig,
    ports::container::{ContainerError, ContainerResult, ContainerRuntime, ContainerSummary},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the engine listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEndpoint {
    Tcp(String),
    Unix(PathBuf),
}

impl EngineEndpoint {
    pub fn parse(host: &str) -> ContainerResult<Self> {
        if let Some(path) = host.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(ContainerError::InvalidHost(host.to_string()));
            }
            return Ok(EngineEndpoint::Unix(PathBuf::from(path)));
        }

        let address = host
            .strip_prefix("tcp://")
            .or_else(|| host.strip_prefix("http://"))
            .ok_or_else(|| ContainerError::InvalidHost(host.to_string()))?
            .trim_end_matches('/');
        if address.is_empty() || !address.contains(':') {
            return Err(ContainerError::InvalidHost(host.to_string()));
        }
        Ok(EngineEndpoint::Tcp(address.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EngineContainer {
    id: String,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    image: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    status: String,
}

impl From<EngineContainer> for ContainerSummary {
    fn from(container: EngineContainer) -> Self {
        ContainerSummary {
            id: container.id,
            names: container
                .names
                .into_iter()
                .map(|name| name.trim_start_matches('/').to_string())
                .collect(),
            image: container.image,
            state: container.state,
            status: container.status,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DockerClient {
    endpoint: EngineEndpoint,
}

impl DockerClient {
    pub fn new(endpoint: EngineEndpoint) -> Self {
        Self { endpoint }
    }

    /// Parse the configured host and check the engine answers.
    pub async fn connect(config: &DockerConfig) -> ContainerResult<Self> {
        let client = Self::new(EngineEndpoint::parse(&config.host)?);
        client.ping().await?;
        Ok(client)
    }

    async fn get(&self, path: &str) -> ContainerResult<Bytes> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header(header::HOST, "docker")
            .header(header::USER_AGENT, concat!("keel/", env!("CARGO_PKG_VERSION")))
            .body(Empty::<Bytes>::new())
            .map_err(|e| ContainerError::Connection(e.to_string()))?;

        let call = async {
            match &self.endpoint {
                EngineEndpoint::Tcp(address) => {
                    let stream = TcpStream::connect(address)
                        .await
                        .map_err(|e| ContainerError::Connection(format!("{address}: {e}")))?;
                    send(stream, request).await
                }
                #[cfg(unix)]
                EngineEndpoint::Unix(socket) => {
                    let stream = tokio::net::UnixStream::connect(socket).await.map_err(|e| {
                        ContainerError::Connection(format!("{}: {e}", socket.display()))
                    })?;
                    send(stream, request).await
                }
                #[cfg(not(unix))]
                EngineEndpoint::Unix(socket) => Err(ContainerError::InvalidHost(format!(
                    "unix://{}",
                    socket.display()
                ))),
            }
        };

        timeout(REQUEST_TIMEOUT, call)
            .await
            .map_err(|_| ContainerError::Connection(format!("GET {path} timed out")))?
    }
}

async fn send<T>(io: T, request: Request<Empty<Bytes>>) -> ContainerResult<Bytes>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(io))
        .await
        .map_err(|e| ContainerError::Connection(e.to_string()))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!(error = %e, "Engine connection closed with error");
        }
    });

    let response = sender
        .send_request(request)
        .await
        .map_err(|e| ContainerError::Connection(e.to_string()))?;
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| ContainerError::Connection(e.to_string()))?
        .to_bytes();

    if status != StatusCode::OK {
        return Err(ContainerError::Api {
            status: status.as_u16(),
            message: String::from_utf8_lossy(&body).trim().to_string(),
        });
    }
    Ok(body)
}

#[async_trait]
impl ContainerRuntime for DockerClient {
    async fn ping(&self) -> ContainerResult<()> {
        self.get("/_ping").await.map(|_| ())
    }

    async fn list_containers(&self) -> ContainerResult<Vec<ContainerSummary>> {
        let body = self.get("/containers/json?all=1").await?;
        let containers: Vec<EngineContainer> =
            serde_json::from_slice(&body).map_err(|e| ContainerError::Decode(e.to_string()))?;
        Ok(containers.into_iter().map(ContainerSummary::from).collect())
    }

    async fn close(&self) -> ContainerResult<()> {
        // One connection per call, nothing is held open
        Ok(())
    }
}
