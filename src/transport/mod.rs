//! Duplex connection to the controller.
//!
//! One persistent socket carries NDJSON frames both ways. The reader task
//! routes inbound actions; the writer task drains the outbound queue.

pub mod codec;
pub mod reader;
pub mod writer;

use std::fmt::{Display, Formatter};

use interprocess::local_socket::tokio::{prelude::*, Stream as LocalStream};
use interprocess::local_socket::{GenericNamespaced, ToNsName};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::info;

use crate::{AppError, Result};

/// Boxed read half of a connection.
pub type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;

/// Boxed write half of a connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Where the controller listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP `host:port`.
    Tcp(String),
    /// Named local socket (Unix domain socket or Windows named pipe).
    Local(String),
}

impl Endpoint {
    /// Parse `tcp://host:port`, `http://host:port` or `local:<name>`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transport` for unsupported schemes or a missing port.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();

        if let Some(name) = url.strip_prefix("local:") {
            let name = name.trim_start_matches("//");
            if name.is_empty() {
                return Err(AppError::Transport("local socket name is empty".into()));
            }
            return Ok(Self::Local(name.to_owned()));
        }

        let rest = url
            .strip_prefix("tcp://")
            .or_else(|| url.strip_prefix("http://"))
            .ok_or_else(|| AppError::Transport(format!("unsupported endpoint: {url}")))?;
        let authority = rest.split('/').next().unwrap_or_default();

        match authority.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(Self::Tcp(authority.to_owned()))
            }
            _ => Err(AppError::Transport(format!(
                "endpoint must include host and port: {url}"
            ))),
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            Self::Local(name) => write!(f, "local:{name}"),
        }
    }
}

/// Open the controller connection and split it into halves.
///
/// # Errors
///
/// Returns `AppError::Transport` if the connection cannot be established.
pub async fn connect(endpoint: &Endpoint) -> Result<(BoxedReader, BoxedWriter)> {
    match endpoint {
        Endpoint::Tcp(addr) => {
            let stream = TcpStream::connect(addr)
                .await
                .map_err(|err| AppError::Transport(format!("connect to {addr} failed: {err}")))?;
            stream
                .set_nodelay(true)
                .map_err(|err| AppError::Transport(format!("set_nodelay failed: {err}")))?;
            info!(%endpoint, "connected to controller");
            let (read, write) = stream.into_split();
            Ok((Box::new(read), Box::new(write)))
        }
        Endpoint::Local(name) => {
            let ns_name = name
                .as_str()
                .to_ns_name::<GenericNamespaced>()
                .map_err(|err| AppError::Transport(format!("invalid socket name: {err}")))?;
            let stream = LocalStream::connect(ns_name)
                .await
                .map_err(|err| AppError::Transport(format!("connect to {name} failed: {err}")))?;
            info!(%endpoint, "connected to controller");
            let (read, write) = stream.split();
            Ok((Box::new(read), Box::new(write)))
        }
    }
}
