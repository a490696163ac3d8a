use anyhow::{Context, bail};
use url::Url;

/// Runtime configuration, read from the environment.
///
/// `MICROCMS_BASE_URL` overrides the derived service endpoint so the binary
/// can be pointed at a local mock server.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub write_api_key: Option<String>,
    base: Url,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("MICROCMS_API_KEY")
            .context("MICROCMS_API_KEY is required")?;
        let write_api_key = std::env::var("MICROCMS_WRITE_API_KEY").ok();

        let base = match std::env::var("MICROCMS_BASE_URL") {
            Ok(raw) => Url::parse(&raw).context("MICROCMS_BASE_URL is not a valid URL")?,
            Err(_) => {
                let domain = std::env::var("MICROCMS_SERVICE_DOMAIN")
                    .context("MICROCMS_SERVICE_DOMAIN is required")?;
                if domain.is_empty() {
                    bail!("MICROCMS_SERVICE_DOMAIN must not be empty");
                }
                Url::parse(&format!("https://{}.microcms.io/api/v1/", domain))
                    .context("service domain does not form a valid URL")?
            }
        };

        Ok(Config {
            api_key,
            write_api_key,
            base,
        })
    }

    /// API base, always ending in a trailing slash so endpoint joins work.
    pub fn base_url(&self) -> Url {
        let mut base = self.base.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        base
    }

    pub fn write_api_key(&self) -> anyhow::Result<&str> {
        self.write_api_key
            .as_deref()
            .context("MICROCMS_WRITE_API_KEY is required to post comments")
    }
}
