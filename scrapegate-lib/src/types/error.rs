use std::net::SocketAddr;

use thiserror::Error;

/// Possible errors when interacting with `scrapegate_lib`
///
/// Admission rejections and failed fetches are not errors: they are resolved
/// into an [`Outcome`](crate::Outcome) for the caller.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The outbound request client cannot be created
    #[error("Error creating request client: {0}")]
    BuildFetchClient(#[source] reqwest::Error),

    /// Network error while sending the outbound request
    #[error("Network error while trying to fetch `{url}`")]
    NetworkRequest {
        /// The requested URL, possibly empty
        url: String,
        /// The underlying reqwest error
        #[source]
        source: reqwest::Error,
    },

    /// The listener cannot be bound to the requested address
    #[error("Cannot listen on `{addr}`: {source}")]
    Bind {
        /// The requested listen address
        addr: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The server stopped with an I/O error
    #[error("Server on {addr} stopped: {source}")]
    Serve {
        /// The address the server was listening on
        addr: SocketAddr,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The background server task panicked or was aborted
    #[error("Server task failed")]
    ServerTask(#[from] tokio::task::JoinError),

    /// A metric cannot be registered or encoded
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ErrorKind {
    /// Return more details about the given [`ErrorKind`]
    ///
    /// Walks the `source` chain of the underlying error, which for network
    /// errors usually holds the actual reason (DNS, TLS, connection refused).
    #[must_use]
    pub fn details(&self) -> Option<String> {
        let mut source = std::error::Error::source(self)?;
        let mut details = source.to_string();
        while let Some(inner) = source.source() {
            details = format!("{details}: {inner}");
            source = inner;
        }
        Some(details)
    }
}
