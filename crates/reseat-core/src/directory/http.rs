//! reqwest-backed [`DeviceDirectory`] against the management API.
//!
//! Authentication is a client-credentials exchange against the tenant's
//! token endpoint. The token is acquired lazily on the first directory call
//! and reused for the client's lifetime, so a client constructed up front
//! does not touch the identity endpoint until it is actually used.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;
use url::Url;

use crate::config::TenantConfig;
use crate::types::DeviceRecord;

use super::{DeviceDirectory, DirectoryError, ImportOutcome};

pub struct HttpDirectoryClient {
    http: reqwest::Client,
    token_endpoint: Url,
    directory_endpoint: Url,
    client_id: String,
    client_secret: String,
    token: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct DeviceIdentityDto {
    id: String,
    #[serde(rename = "serialNumber")]
    serial_number: String,
    #[serde(rename = "groupTag")]
    group_tag: Option<String>,
    model: Option<String>,
    manufacturer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceIdentityPage {
    value: Vec<DeviceIdentityDto>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

impl From<DeviceIdentityDto> for DeviceRecord {
    fn from(dto: DeviceIdentityDto) -> Self {
        DeviceRecord {
            serial: dto.serial_number,
            remote_id: dto.id,
            group_tag: dto.group_tag,
            model: dto.model,
            manufacturer: dto.manufacturer,
        }
    }
}

impl HttpDirectoryClient {
    pub fn new(config: &TenantConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("reseat/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            token_endpoint: config.token_endpoint()?,
            directory_endpoint: config.directory_endpoint()?,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token: OnceCell::new(),
        })
    }

    async fn bearer_token(&self) -> Result<&str, DirectoryError> {
        self.token
            .get_or_try_init(|| self.acquire_token())
            .await
            .map(String::as_str)
    }

    async fn acquire_token(&self) -> Result<String, DirectoryError> {
        tracing::debug!(endpoint = %self.token_endpoint, "acquiring bearer token");

        let scope = default_scope(&self.directory_endpoint);
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];

        let response = self
            .http
            .post(self.token_endpoint.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| self.auth_error(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(self.auth_error(format!("token endpoint returned {status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| self.auth_error(format!("malformed token response: {e}")))?;

        Ok(token.access_token)
    }

    fn auth_error(&self, message: String) -> DirectoryError {
        DirectoryError::Auth {
            endpoint: self.token_endpoint.to_string(),
            message,
        }
    }

    fn item_url(&self, remote_id: &str) -> String {
        format!("{}/{}", self.directory_endpoint, remote_id)
    }

    async fn fetch_page(&self, url: &str) -> Result<DeviceIdentityPage, DirectoryError> {
        let token = self.bearer_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| DirectoryError::Transport {
                message: format!("malformed directory response: {e}"),
            })
    }
}

#[async_trait]
impl DeviceDirectory for HttpDirectoryClient {
    async fn find(&self, serial: &str) -> Result<Option<DeviceRecord>, DirectoryError> {
        let token = self.bearer_token().await?;
        tracing::debug!(serial, endpoint = %self.directory_endpoint, "directory lookup");

        let response = self
            .http
            .get(self.directory_endpoint.clone())
            .query(&[("$filter", serial_filter(serial))])
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }

        let page: DeviceIdentityPage =
            response
                .json()
                .await
                .map_err(|e| DirectoryError::Transport {
                    message: format!("malformed directory response: {e}"),
                })?;

        // The service filter is substring-based; re-check for an exact
        // (case-insensitive) serial match before trusting the result.
        let record = page
            .value
            .into_iter()
            .map(DeviceRecord::from)
            .find(|r| r.matches_serial(serial));

        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<DeviceRecord>, DirectoryError> {
        let mut records = Vec::new();
        let mut next = Some(self.directory_endpoint.to_string());

        while let Some(url) = next {
            let page = self.fetch_page(&url).await?;
            records.extend(page.value.into_iter().map(DeviceRecord::from));
            next = page.next_link;
        }

        tracing::debug!(count = records.len(), "directory inventory listed");
        Ok(records)
    }

    async fn delete(&self, record: &DeviceRecord) -> Result<(), DirectoryError> {
        let token = self.bearer_token().await?;
        tracing::debug!(serial = %record.serial, remote_id = %record.remote_id, "directory delete");

        let response = self
            .http
            .delete(self.item_url(&record.remote_id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }
        Ok(())
    }

    async fn create(
        &self,
        serial: &str,
        group_tag: Option<&str>,
    ) -> Result<ImportOutcome, DirectoryError> {
        let token = self.bearer_token().await?;
        tracing::debug!(serial, ?group_tag, "directory create");

        let body = serde_json::json!({
            "serialNumber": serial,
            "groupTag": group_tag,
        });

        let response = self
            .http
            .post(self.directory_endpoint.clone())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        if response.status() == reqwest::StatusCode::CONFLICT {
            return Ok(ImportOutcome::AlreadyExists);
        }
        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }
        Ok(ImportOutcome::Created)
    }
}

/// Server-side filter expression over the serial field. Single quotes are
/// doubled per the filter grammar.
fn serial_filter(serial: &str) -> String {
    format!("contains(serialNumber,'{}')", serial.replace('\'', "''"))
}

fn default_scope(directory_endpoint: &Url) -> String {
    match directory_endpoint.host_str() {
        Some(host) => format!("{}://{}/.default", directory_endpoint.scheme(), host),
        None => "https://graph.microsoft.com/.default".to_string(),
    }
}

fn transport(error: reqwest::Error) -> DirectoryError {
    DirectoryError::Transport {
        message: error.to_string(),
    }
}

async fn remote_error(response: reqwest::Response) -> DirectoryError {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return DirectoryError::Auth {
            endpoint: "directory service".to_string(),
            message: format!("{status}: {message}"),
        };
    }

    DirectoryError::Remote {
        status: status.as_u16(),
        message,
    }
}
