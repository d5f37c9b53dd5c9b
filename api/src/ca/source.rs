use std::{convert::Infallible, fmt, path::PathBuf, str::FromStr};

use tracing::debug;

use super::CaError;

/// Where certificate or key material is read from: a local file or an
/// `http(s)://` URL such as a presigned object store link.
#[derive(Clone, PartialEq, Eq)]
pub enum MaterialSource {
    File(PathBuf),
    Remote(String),
}

impl MaterialSource {
    #[tracing::instrument(skip(self), fields(source = %self))]
    pub async fn fetch(&self) -> Result<Vec<u8>, CaError> {
        match self {
            Self::File(path) => tokio::fs::read(path).await.map_err(|e| {
                CaError::Configuration(format!("Failed to read {}: {}", path.display(), e))
            }),
            Self::Remote(url) => {
                let response = reqwest::get(url)
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| {
                        CaError::Configuration(format!("Failed to fetch {}: {}", self, e.without_url()))
                    })?;

                let body = response.bytes().await.map_err(|e| {
                    CaError::Configuration(format!("Failed to read {}: {}", self, e.without_url()))
                })?;

                debug!(bytes = body.len(), "Fetched remote material");
                Ok(body.to_vec())
            }
        }
    }
}

impl FromStr for MaterialSource {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("https://") || s.starts_with("http://") {
            Ok(Self::Remote(s.to_string()))
        } else {
            Ok(Self::File(PathBuf::from(s)))
        }
    }
}

// Remote URLs may carry credentials in the query string.
impl fmt::Display for MaterialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => f.write_str(url.split('?').next().unwrap_or(url)),
        }
    }
}

impl fmt::Debug for MaterialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Remote(_) => f.debug_tuple("Remote").field(&self.to_string()).finish(),
        }
    }
}
