//! KeyCustodyClient - attestation-gated custody RPCs
//!
//! `handshake` を最初に呼んでサービス証明書を取得する。それより前の
//! 呼び出しはすべて `Precondition` で失敗する。内部でのリトライはしない。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::domain::custody::{
    AttestationReport, CreateDataKeysRequest, CreateDataPolicyRequest, CreateResultDataKeyRequest,
    DataKey, GetDataKeysRequest, GetDataKeysResponse, GetRaCertRequest, ResourceRequest,
    ResultKeyBody, Status,
};
use crate::domain::errors::{Result, SidecarError};
use crate::domain::platform::Platform;
use crate::envelope::{EncryptedResponse, EnvelopeOptions, SignerIdentity, parse_response, seal_request};
use crate::ports::{CustodyTransport, ReportGenerator};

pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_millis(5000);

const NONCE_LEN: usize = 16;

#[derive(Debug, Clone, Copy)]
enum Rpc {
    GetRaCert,
    GetDataKeys,
    CreateDataKeys,
    CreateDataPolicy,
    CreateResultDataKey,
}

impl Rpc {
    fn method(&self) -> &'static str {
        match self {
            Rpc::GetRaCert => "GetRaCert",
            Rpc::GetDataKeys => "GetDataKeys",
            Rpc::CreateDataKeys => "CreateDataKeys",
            Rpc::CreateDataPolicy => "CreateDataPolicy",
            Rpc::CreateResultDataKey => "CreateResultDataKey",
        }
    }
}

/// One client per job. The service certificate is acquired once by
/// [`KeyCustodyClient::handshake`] and read thereafter.
pub struct KeyCustodyClient {
    transport: Arc<dyn CustodyTransport>,
    reports: Arc<dyn ReportGenerator>,
    timeout: Duration,
    service_cert: OnceLock<String>,
}

impl KeyCustodyClient {
    pub fn new(transport: Arc<dyn CustodyTransport>, reports: Arc<dyn ReportGenerator>) -> Self {
        Self {
            transport,
            reports,
            timeout: DEFAULT_RPC_TIMEOUT,
            service_cert: OnceLock::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_attested(&self) -> bool {
        self.service_cert.get().is_some()
    }

    /// PEM certificate of the custody service, once acquired.
    pub fn service_cert(&self) -> Option<&str> {
        self.service_cert.get().map(String::as_str)
    }

    /// Fetch and store the service certificate. Calling again after success
    /// is a no-op.
    pub async fn handshake(&self) -> Result<()> {
        if self.is_attested() {
            return Ok(());
        }
        let nonce: [u8; NONCE_LEN] = rand::random();
        let req = GetRaCertRequest {
            nonce: URL_SAFE_NO_PAD.encode(nonce),
        };
        let res = self
            .bounded(Rpc::GetRaCert, self.transport.get_ra_cert(req))
            .await?;
        ensure_ok(res.status)?;
        if res.cert.is_empty() {
            return Err(SidecarError::format("GetRaCert returned an empty certificate"));
        }
        let _ = self.service_cert.set(res.cert);
        info!("custody service certificate acquired");
        Ok(())
    }

    /// Keys for every resource in `resource_request`. On attested platforms
    /// the report binds `cert + "." + json(resource_request)`.
    pub async fn fetch_keys(
        &self,
        platform: Platform,
        identity: &SignerIdentity,
        resource_request: ResourceRequest,
    ) -> Result<Vec<DataKey>> {
        let peer = self.require_attested()?;
        let user_data = format!(
            "{}.{}",
            identity.cert_pem(),
            serde_json::to_string(&resource_request)?
        );
        let req = GetDataKeysRequest {
            attestation_report: self.report(platform, user_data.as_bytes())?,
            cert: identity.cert_pem().to_string(),
            resource_request,
        };
        let res: GetDataKeysResponse = self.exchange(Rpc::GetDataKeys, &req, identity, peer).await?;
        debug!(keys = res.data_keys.len(), "data keys received");
        Ok(res.data_keys)
    }

    pub async fn create_keys(
        &self,
        identity: &SignerIdentity,
        req: CreateDataKeysRequest,
    ) -> Result<()> {
        let peer = self.require_attested()?;
        self.acknowledge(Rpc::CreateDataKeys, &req, identity, peer).await
    }

    pub async fn create_policy(
        &self,
        identity: &SignerIdentity,
        req: CreateDataPolicyRequest,
    ) -> Result<()> {
        let peer = self.require_attested()?;
        self.acknowledge(Rpc::CreateDataPolicy, &req, identity, peer).await
    }

    /// Register the key of one output. Attestation binds `json(body)`.
    pub async fn register_result_key(
        &self,
        platform: Platform,
        identity: &SignerIdentity,
        body: ResultKeyBody,
    ) -> Result<()> {
        let peer = self.require_attested()?;
        let user_data = serde_json::to_string(&body)?;
        let req = CreateResultDataKeyRequest {
            attestation_report: self.report(platform, user_data.as_bytes())?,
            body,
        };
        self.acknowledge(Rpc::CreateResultDataKey, &req, identity, peer)
            .await?;
        info!(output = %req.body.resource_uri, ancestors = req.body.ancestor_uuids.len(), "result key registered");
        Ok(())
    }

    fn require_attested(&self) -> Result<&str> {
        self.service_cert().ok_or_else(|| {
            SidecarError::Precondition("custody call before GetRaCert handshake".to_string())
        })
    }

    fn report(&self, platform: Platform, user_data: &[u8]) -> Result<Option<AttestationReport>> {
        if !platform.requires_attestation() {
            return Ok(None);
        }
        self.reports.generate(platform, user_data).map(Some)
    }

    /// Round trip whose answer carries an enveloped payload.
    async fn exchange<Req: Serialize, Res: DeserializeOwned>(
        &self,
        rpc: Rpc,
        payload: &Req,
        identity: &SignerIdentity,
        peer_cert: &str,
    ) -> Result<Res> {
        let res = self.send(rpc, payload, identity, peer_cert).await?;
        let (status, body) = parse_response::<Res>(&res, identity.private_key())?;
        ensure_ok(status)?;
        body.ok_or_else(|| SidecarError::format(format!("{} returned no payload", rpc.method())))
    }

    /// Round trip answered by status alone. Any message is ignored.
    async fn acknowledge<Req: Serialize>(
        &self,
        rpc: Rpc,
        payload: &Req,
        identity: &SignerIdentity,
        peer_cert: &str,
    ) -> Result<()> {
        let res = self.send(rpc, payload, identity, peer_cert).await?;
        ensure_ok(res.status)
    }

    async fn send<Req: Serialize>(
        &self,
        rpc: Rpc,
        payload: &Req,
        identity: &SignerIdentity,
        peer_cert: &str,
    ) -> Result<EncryptedResponse> {
        let req = seal_request(payload, identity, peer_cert, EnvelopeOptions::default())?;
        let res = match rpc {
            Rpc::GetDataKeys => self.bounded(rpc, self.transport.get_data_keys(req)).await?,
            Rpc::CreateDataKeys => self.bounded(rpc, self.transport.create_data_keys(req)).await?,
            Rpc::CreateDataPolicy => {
                self.bounded(rpc, self.transport.create_data_policy(req)).await?
            }
            Rpc::CreateResultDataKey => {
                self.bounded(rpc, self.transport.create_result_data_key(req))
                    .await?
            }
            Rpc::GetRaCert => {
                return Err(SidecarError::Precondition(
                    "GetRaCert is not an enveloped call".to_string(),
                ));
            }
        };
        Ok(res)
    }

    async fn bounded<T>(
        &self,
        rpc: Rpc,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        debug!(method = rpc.method(), "custody rpc");
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| SidecarError::Transport {
                method: rpc.method().to_string(),
                message: format!("timed out after {}ms", self.timeout.as_millis()),
            })?
    }
}

fn ensure_ok(status: Status) -> Result<()> {
    if status.is_ok() {
        return Ok(());
    }
    Err(SidecarError::Service {
        code: status.code,
        message: status.message,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::domain::ErrorKind;
    use crate::domain::custody::{GetRaCertResponse, Resource};
    use crate::envelope::{EncryptedRequest, open_request, seal_response};
    use crate::impls::SimulatedReportGenerator;

    struct ScriptedService {
        identity: SignerIdentity,
        ra_calls: AtomicUsize,
        deny_with: Option<Status>,
        stall: bool,
    }

    impl ScriptedService {
        fn new() -> Self {
            Self {
                identity: SignerIdentity::generate_with_bits(2048).unwrap(),
                ra_calls: AtomicUsize::new(0),
                deny_with: None,
                stall: false,
            }
        }

        fn answer<Req: DeserializeOwned, Res: Serialize>(
            &self,
            req: EncryptedRequest,
            build: impl FnOnce(Req) -> Res,
        ) -> Result<EncryptedResponse> {
            let (payload, signer): (Req, _) = open_request(&req, self.identity.private_key())?;
            let signer = signer.expect("requests are signed");
            if let Some(status) = &self.deny_with {
                return seal_response::<Res>(status.clone(), None, &signer);
            }
            seal_response(Status::ok(), Some(&build(payload)), &signer)
        }

        /// Status-only answer, the way the service acknowledges writes.
        fn ack<Req: DeserializeOwned>(
            &self,
            req: EncryptedRequest,
            check: impl FnOnce(Req),
        ) -> Result<EncryptedResponse> {
            let (payload, _): (Req, _) = open_request(&req, self.identity.private_key())?;
            check(payload);
            Ok(EncryptedResponse {
                status: self.deny_with.clone().unwrap_or_else(Status::ok),
                message: None,
            })
        }
    }

    #[async_trait]
    impl CustodyTransport for ScriptedService {
        async fn get_ra_cert(&self, req: GetRaCertRequest) -> Result<GetRaCertResponse> {
            self.ra_calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(URL_SAFE_NO_PAD.decode(&req.nonce).unwrap().len(), NONCE_LEN);
            Ok(GetRaCertResponse {
                status: Status::ok(),
                cert: self.identity.cert_pem().to_string(),
            })
        }

        async fn get_data_keys(&self, req: EncryptedRequest) -> Result<EncryptedResponse> {
            if self.stall {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            self.answer(req, |r: GetDataKeysRequest| GetDataKeysResponse {
                data_keys: r
                    .resource_request
                    .resources
                    .iter()
                    .map(|res| DataKey {
                        resource_uri: res.resource_uri.clone(),
                        data_key_b64: "AAAAAAAAAAAAAAAAAAAAAA==".into(),
                    })
                    .collect(),
            })
        }

        async fn create_data_keys(&self, req: EncryptedRequest) -> Result<EncryptedResponse> {
            self.ack(req, |_: CreateDataKeysRequest| {})
        }

        async fn create_data_policy(&self, req: EncryptedRequest) -> Result<EncryptedResponse> {
            self.ack(req, |_: CreateDataPolicyRequest| {})
        }

        async fn create_result_data_key(&self, req: EncryptedRequest) -> Result<EncryptedResponse> {
            self.ack(req, |r: CreateResultDataKeyRequest| {
                assert_eq!(r.attestation_report.is_some(), !r.body.resource_uri.starts_with("sim-"));
            })
        }
    }

    fn client(service: Arc<ScriptedService>) -> KeyCustodyClient {
        KeyCustodyClient::new(service, Arc::new(SimulatedReportGenerator))
    }

    fn request() -> ResourceRequest {
        ResourceRequest {
            initiator_party_id: "alice".into(),
            op_name: "psi".into(),
            scope: "default".into(),
            resources: vec![Resource {
                resource_uri: "t1".into(),
                columns: vec!["id".into()],
            }],
        }
    }

    #[tokio::test]
    async fn calls_before_handshake_are_precondition_errors() {
        let client = client(Arc::new(ScriptedService::new()));
        let identity = SignerIdentity::generate_with_bits(2048).unwrap();

        let err = client
            .fetch_keys(Platform::Sim, &identity, request())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);

        let err = client
            .register_result_key(Platform::Sim, &identity, ResultKeyBody::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);

        let err = client
            .create_keys(&identity, CreateDataKeysRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    #[tokio::test]
    async fn handshake_is_idempotent() {
        let service = Arc::new(ScriptedService::new());
        let client = client(service.clone());
        client.handshake().await.unwrap();
        client.handshake().await.unwrap();
        assert_eq!(service.ra_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.service_cert(), Some(service.identity.cert_pem()));
    }

    #[tokio::test]
    async fn fetch_keys_after_handshake() {
        let client = client(Arc::new(ScriptedService::new()));
        let identity = SignerIdentity::generate_with_bits(2048).unwrap();
        client.handshake().await.unwrap();

        let keys = client
            .fetch_keys(Platform::Sim, &identity, request())
            .await
            .unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].resource_uri, "t1");

        client.create_keys(&identity, CreateDataKeysRequest::default()).await.unwrap();
        client.create_policy(&identity, CreateDataPolicyRequest::default()).await.unwrap();
    }

    #[tokio::test]
    async fn attested_platform_attaches_report() {
        let client = client(Arc::new(ScriptedService::new()));
        let identity = SignerIdentity::generate_with_bits(2048).unwrap();
        client.handshake().await.unwrap();
        client
            .register_result_key(
                Platform::Tdx,
                &identity,
                ResultKeyBody {
                    resource_uri: "out".into(),
                    ..ResultKeyBody::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_ok_status_is_service_error() {
        let mut service = ScriptedService::new();
        service.deny_with = Some(Status::error(13, "no policy"));
        let client = client(Arc::new(service));
        let identity = SignerIdentity::generate_with_bits(2048).unwrap();
        client.handshake().await.unwrap();

        let err = client
            .fetch_keys(Platform::Sim, &identity, request())
            .await
            .unwrap_err();
        assert!(matches!(err, SidecarError::Service { code: 13, ref message } if message == "no policy"));
    }

    #[tokio::test]
    async fn acknowledgements_carry_no_message() {
        let client = client(Arc::new(ScriptedService::new()));
        let identity = SignerIdentity::generate_with_bits(2048).unwrap();
        client.handshake().await.unwrap();

        client
            .register_result_key(
                Platform::Sim,
                &identity,
                ResultKeyBody {
                    resource_uri: "sim-out".into(),
                    ..ResultKeyBody::default()
                },
            )
            .await
            .unwrap();
        client.create_keys(&identity, CreateDataKeysRequest::default()).await.unwrap();
        client.create_policy(&identity, CreateDataPolicyRequest::default()).await.unwrap();
    }

    #[tokio::test]
    async fn denied_acknowledgement_is_service_error() {
        let mut service = ScriptedService::new();
        service.deny_with = Some(Status::error(5, "scope mismatch"));
        let client = client(Arc::new(service));
        let identity = SignerIdentity::generate_with_bits(2048).unwrap();
        client.handshake().await.unwrap();

        let err = client
            .register_result_key(Platform::Tdx, &identity, ResultKeyBody::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SidecarError::Service { code: 5, ref message } if message == "scope mismatch"));
    }

    #[tokio::test]
    async fn slow_service_is_transport_error() {
        let mut service = ScriptedService::new();
        service.stall = true;
        let client = client(Arc::new(service)).with_timeout(Duration::from_millis(50));
        let identity = SignerIdentity::generate_with_bits(2048).unwrap();
        client.handshake().await.unwrap();

        let err = client
            .fetch_keys(Platform::Sim, &identity, request())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
