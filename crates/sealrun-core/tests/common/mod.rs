//! Shared fixtures for pipeline tests: an in-process custody service that
//! speaks the real envelope protocol, and workers written as shell scripts.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::TempDir;

use sealrun_core::app::{App, AppBuilder};
use sealrun_core::codec::FileCodec;
use sealrun_core::config::SidecarConfig;
use sealrun_core::domain::custody::{
    CreateDataKeysRequest, CreateDataPolicyRequest, CreateResultDataKeyRequest, DataKey,
    GetDataKeysRequest, GetDataKeysResponse, GetRaCertRequest, GetRaCertResponse,
    ResourceRequest, ResultKeyBody, Status,
};
use sealrun_core::domain::errors::Result;
use sealrun_core::domain::{AppMode, Platform};
use sealrun_core::envelope::jose::b64std;
use sealrun_core::envelope::{
    EncryptedRequest, EncryptedResponse, SignerIdentity, open_request, seal_response,
};
use sealrun_core::impls::{InMemoryDomainDataRegistry, SimulatedReportGenerator};
use sealrun_core::ports::CustodyTransport;

/// RSA key generation dominates test time; share one key per role.
pub fn service_identity() -> SignerIdentity {
    static ID: OnceLock<SignerIdentity> = OnceLock::new();
    ID.get_or_init(|| SignerIdentity::generate_with_bits(2048).unwrap())
        .clone()
}

pub fn sidecar_identity() -> SignerIdentity {
    static ID: OnceLock<SignerIdentity> = OnceLock::new();
    ID.get_or_init(|| SignerIdentity::generate_with_bits(2048).unwrap())
        .clone()
}

/// Custody service fake. Holds one key per data uuid and records every
/// resource request and result-key registration.
pub struct FakeCustody {
    identity: SignerIdentity,
    keys: Mutex<HashMap<String, Vec<u8>>>,
    registrations: Mutex<Vec<ResultKeyBody>>,
    resource_requests: Mutex<Vec<ResourceRequest>>,
    ra_calls: AtomicUsize,
    key_requests: AtomicUsize,
}

impl FakeCustody {
    pub fn new() -> Self {
        Self {
            identity: service_identity(),
            keys: Mutex::new(HashMap::new()),
            registrations: Mutex::new(Vec::new()),
            resource_requests: Mutex::new(Vec::new()),
            ra_calls: AtomicUsize::new(0),
            key_requests: AtomicUsize::new(0),
        }
    }

    pub fn grant(&self, data_uuid: &str, key: &[u8]) {
        self.keys.lock().unwrap().insert(data_uuid.to_string(), key.to_vec());
    }

    pub fn registrations(&self) -> Vec<ResultKeyBody> {
        self.registrations.lock().unwrap().clone()
    }

    pub fn resource_requests(&self) -> Vec<ResourceRequest> {
        self.resource_requests.lock().unwrap().clone()
    }

    pub fn ra_calls(&self) -> usize {
        self.ra_calls.load(Ordering::SeqCst)
    }

    pub fn key_requests(&self) -> usize {
        self.key_requests.load(Ordering::SeqCst)
    }

    fn answer<Req: DeserializeOwned, Res: Serialize>(
        &self,
        req: EncryptedRequest,
        build: impl FnOnce(Req) -> Res,
    ) -> Result<EncryptedResponse> {
        let (payload, signer): (Req, _) = open_request(&req, self.identity.private_key())?;
        let signer = signer.expect("sidecar requests are signed");
        seal_response(Status::ok(), Some(&build(payload)), &signer)
    }

    /// Writes are acknowledged by status alone, with no message.
    fn ack<Req: DeserializeOwned>(
        &self,
        req: EncryptedRequest,
        record: impl FnOnce(Req),
    ) -> Result<EncryptedResponse> {
        let (payload, signer): (Req, _) = open_request(&req, self.identity.private_key())?;
        assert!(signer.is_some(), "sidecar requests are signed");
        record(payload);
        Ok(EncryptedResponse {
            status: Status::ok(),
            message: None,
        })
    }
}

#[async_trait]
impl CustodyTransport for FakeCustody {
    async fn get_ra_cert(&self, _req: GetRaCertRequest) -> Result<GetRaCertResponse> {
        self.ra_calls.fetch_add(1, Ordering::SeqCst);
        Ok(GetRaCertResponse {
            status: Status::ok(),
            cert: self.identity.cert_pem().to_string(),
        })
    }

    async fn get_data_keys(&self, req: EncryptedRequest) -> Result<EncryptedResponse> {
        self.key_requests.fetch_add(1, Ordering::SeqCst);
        let keys = self.keys.lock().unwrap().clone();
        let requests = &self.resource_requests;
        self.answer(req, |r: GetDataKeysRequest| {
            assert!(r.attestation_report.is_none(), "sim runs carry no report");
            requests.lock().unwrap().push(r.resource_request.clone());
            GetDataKeysResponse {
                data_keys: r
                    .resource_request
                    .resources
                    .iter()
                    .filter_map(|res| {
                        keys.get(&res.resource_uri).map(|k| DataKey {
                            resource_uri: res.resource_uri.clone(),
                            data_key_b64: b64std(k),
                        })
                    })
                    .collect(),
            }
        })
    }

    async fn create_data_keys(&self, req: EncryptedRequest) -> Result<EncryptedResponse> {
        self.ack(req, |_: CreateDataKeysRequest| {})
    }

    async fn create_data_policy(&self, req: EncryptedRequest) -> Result<EncryptedResponse> {
        self.ack(req, |_: CreateDataPolicyRequest| {})
    }

    async fn create_result_data_key(&self, req: EncryptedRequest) -> Result<EncryptedResponse> {
        let registrations = &self.registrations;
        self.ack(req, |r: CreateResultDataKeyRequest| {
            registrations.lock().unwrap().push(r.body);
        })
    }
}

/// Scratch tree for one test:
///
/// ```text
/// <tmp>/task       task_base_dir
/// <tmp>/workers    worker_root; scripts run with /bin/sh
/// <tmp>/store      encrypted inputs and published outputs
/// ```
pub struct Fixture {
    pub dir: TempDir,
    pub config: SidecarConfig,
    pub custody: Arc<FakeCustody>,
    pub domain_data: InMemoryDomainDataRegistry,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = SidecarConfig {
            task_base_dir: dir.path().join("task"),
            python_path: PathBuf::from("/bin/sh"),
            worker_root: dir.path().join("workers"),
            ..SidecarConfig::default()
        };
        std::fs::create_dir_all(dir.path().join("store")).unwrap();
        Self {
            dir,
            config,
            custody: Arc::new(FakeCustody::new()),
            domain_data: InMemoryDomainDataRegistry::new(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.config.task_base_dir
    }

    pub fn store(&self) -> PathBuf {
        self.dir.path().join("store")
    }

    /// Install `body` as the sim worker script `script`.
    pub fn worker(&self, script: &str, body: &str) {
        let dir = self.config.worker_root.join("sim/teeapps/biz");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(script), body).unwrap();
    }

    /// Encrypt `plaintext` into the store under `file` and grant its key.
    pub fn encrypted_input(&self, data_uuid: &str, file: &str, plaintext: &[u8]) -> PathBuf {
        let key = [7u8; 16];
        let plain = self.dir.path().join(format!("{data_uuid}.plain"));
        std::fs::write(&plain, plaintext).unwrap();
        let dst = self.store().join(file);
        std::fs::create_dir_all(dst.parent().unwrap()).unwrap();
        FileCodec::new().encrypt_file(&plain, &dst, &key).unwrap();
        std::fs::remove_file(&plain).unwrap();
        self.custody.grant(data_uuid, &key);
        dst
    }

    pub fn app(&self, mode: AppMode) -> App {
        let mut builder = AppBuilder::new(self.config.clone())
            .with_builtins()
            .unwrap()
            .platform(Platform::Sim)
            .mode(mode)
            .transport(self.custody.clone())
            .reports(Arc::new(SimulatedReportGenerator))
            .identity(sidecar_identity());
        if mode == AppMode::Kuscia {
            builder = builder.domain_data(Arc::new(self.domain_data.clone()));
        }
        builder.build().unwrap()
    }
}

/// Decrypt a published output with the key its registration carried.
pub fn decrypt_registered(path: &Path, registration: &ResultKeyBody) -> Vec<u8> {
    use base64::Engine;
    let key = base64::engine::general_purpose::STANDARD
        .decode(&registration.data_key_b64)
        .unwrap();
    let out = path.with_extension("check");
    FileCodec::new().decrypt_file(path, &out, &key).unwrap();
    std::fs::read(out).unwrap()
}
