use thiserror::Error;

/// Errors from talking to the GitHub REST and GraphQL APIs
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection, TLS or body read failure
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status
    #[error("HTTP error {status} from {url}: {message}")]
    Http {
        status: u16,
        url: String,
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// GraphQL request succeeded at HTTP level but reported errors
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// Repository string could not be parsed
    #[error("Invalid repository '{0}', expected OWNER/NAME or HOST/OWNER/NAME")]
    InvalidRepository(String),

    /// No token in config, environment or gh CLI
    #[error("No GitHub token found. Set GITHUB_TOKEN or GH_TOKEN, or run `gh auth login`.")]
    MissingToken,

    /// HTTP client could not be built
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}
