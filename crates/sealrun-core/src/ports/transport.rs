//! CustodyTransport port - key-custody service との通信路
//!
//! One method per RPC. Implementations move envelopes; they never look
//! inside them. Channel failures and timeouts surface as
//! `SidecarError::Transport`.

use async_trait::async_trait;

use crate::domain::custody::{GetRaCertRequest, GetRaCertResponse};
use crate::domain::errors::Result;
use crate::envelope::{EncryptedRequest, EncryptedResponse};

#[async_trait]
pub trait CustodyTransport: Send + Sync {
    /// The only plaintext call: returns the service certificate.
    async fn get_ra_cert(&self, req: GetRaCertRequest) -> Result<GetRaCertResponse>;

    async fn get_data_keys(&self, req: EncryptedRequest) -> Result<EncryptedResponse>;

    async fn create_data_keys(&self, req: EncryptedRequest) -> Result<EncryptedResponse>;

    async fn create_data_policy(&self, req: EncryptedRequest) -> Result<EncryptedResponse>;

    async fn create_result_data_key(&self, req: EncryptedRequest) -> Result<EncryptedResponse>;
}
