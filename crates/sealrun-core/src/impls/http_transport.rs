//! HttpCustodyTransport - JSON over HTTP(S) to the custody service
//!
//! Each RPC is a POST of the request JSON to
//! `<endpoint>/v2/capsule-manager/<Method>`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::TlsPaths;
use crate::domain::custody::{GetRaCertRequest, GetRaCertResponse};
use crate::domain::errors::{Result, SidecarError};
use crate::envelope::{EncryptedRequest, EncryptedResponse};
use crate::ports::CustodyTransport;

const API_PREFIX: &str = "v2/capsule-manager";

#[derive(Debug, Clone)]
pub struct HttpCustodyTransport {
    inner: Client,
    base_url: String,
}

impl HttpCustodyTransport {
    /// `tls` enables mutual TLS with the client certificate/key and CA at
    /// the given paths.
    pub fn new(endpoint: &str, timeout: Duration, tls: Option<&TlsPaths>) -> Result<Self> {
        let mut builder = Client::builder().use_rustls_tls().timeout(timeout);
        if let Some(paths) = tls {
            let mut identity_pem = read(&paths.client_cert)?;
            identity_pem.extend_from_slice(b"\n");
            identity_pem.extend_from_slice(&read(&paths.client_key)?);
            let identity = reqwest::Identity::from_pem(&identity_pem)
                .map_err(|e| transport("client identity", e))?;
            let ca = reqwest::Certificate::from_pem(&read(&paths.ca_cert)?)
                .map_err(|e| transport("ca certificate", e))?;
            builder = builder.identity(identity).add_root_certificate(ca);
        }
        let inner = builder.build().map_err(|e| transport("client builder", e))?;
        Ok(Self {
            inner,
            base_url: base_url(endpoint, tls.is_some()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<Req: Serialize, Res: DeserializeOwned>(
        &self,
        method: &str,
        body: &Req,
    ) -> Result<Res> {
        let url = format!("{}/{API_PREFIX}/{method}", self.base_url);
        debug!(%url, "posting custody request");
        let res = self
            .inner
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport(method, e))?;
        let status = res.status();
        if !status.is_success() {
            return Err(SidecarError::Transport {
                method: method.to_string(),
                message: format!("http status {status}"),
            });
        }
        res.json::<Res>().await.map_err(|e| transport(method, e))
    }
}

#[async_trait]
impl CustodyTransport for HttpCustodyTransport {
    async fn get_ra_cert(&self, req: GetRaCertRequest) -> Result<GetRaCertResponse> {
        self.post("GetRaCert", &req).await
    }

    async fn get_data_keys(&self, req: EncryptedRequest) -> Result<EncryptedResponse> {
        self.post("GetDataKeys", &req).await
    }

    async fn create_data_keys(&self, req: EncryptedRequest) -> Result<EncryptedResponse> {
        self.post("CreateDataKeys", &req).await
    }

    async fn create_data_policy(&self, req: EncryptedRequest) -> Result<EncryptedResponse> {
        self.post("CreateDataPolicy", &req).await
    }

    async fn create_result_data_key(&self, req: EncryptedRequest) -> Result<EncryptedResponse> {
        self.post("CreateResultDataKey", &req).await
    }
}

fn base_url(endpoint: &str, tls: bool) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else if tls {
        format!("https://{endpoint}")
    } else {
        format!("http://{endpoint}")
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| SidecarError::io(path, e))
}

fn transport(method: &str, e: impl std::fmt::Display) -> SidecarError {
    SidecarError::Transport {
        method: method.to_string(),
        message: e.to_string(),
    }
}
