use base64::Engine;
use serde::Deserialize;

use crate::github::{ApiError, GitHubClient};
use crate::resolver::ManifestSource;

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    encoding: String,
    #[serde(default)]
    content: String,
}

/// Decode a contents API payload. GitHub wraps base64 at 60 columns.
pub fn decode_content(encoding: &str, content: &str) -> Result<String, String> {
    match encoding {
        "base64" => {
            let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map_err(|e| e.to_string())?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        // Files over 1MB come back with encoding "none" and no content
        "" | "none" | "utf-8" => Ok(content.to_string()),
        other => Err(format!("unsupported content encoding '{other}'")),
    }
}

/// Manifest text via `GET repos/{owner}/{name}/contents/{path}`
pub struct RepoContents<'a> {
    client: &'a GitHubClient,
}

impl<'a> RepoContents<'a> {
    pub fn new(client: &'a GitHubClient) -> Self {
        RepoContents { client }
    }
}

impl ManifestSource for RepoContents<'_> {
    fn fetch_manifest_content(&self, manifest_path: &str) -> anyhow::Result<String> {
        let path = self
            .client
            .repo_path(&format!("contents/{}", manifest_path.trim_start_matches('/')));
        let response: ContentResponse = self.client.get_json(&path)?;

        let text = decode_content(&response.encoding, &response.content).map_err(|message| {
            ApiError::Decode {
                url: path.clone(),
                message,
            }
        })?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_wrapped_base64() {
        // "apkg@1.2.3\ntestpkg@4.5.6\n" split across lines like the API does
        let encoded = "YXBrZ0AxLjIuMwp0ZXN0\ncGtnQDQuNS42Cg==\n";
        assert_eq!(
            decode_content("base64", encoded).unwrap(),
            "apkg@1.2.3\ntestpkg@4.5.6\n"
        );
    }

    #[test]
    fn test_decode_passthrough() {
        assert_eq!(decode_content("none", "").unwrap(), "");
        assert_eq!(decode_content("utf-8", "flask==2.0").unwrap(), "flask==2.0");
    }

    #[test]
    fn test_decode_errors() {
        assert!(decode_content("base64", "!!!not base64!!!").is_err());
        assert!(decode_content("rot13", "abc").is_err());
    }
}
