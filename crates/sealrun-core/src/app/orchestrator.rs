//! App - 1 ジョブの実行パイプライン
//!
//! # フロー
//! 1. PreProcess: パラメータ検証 → ResourceRequest → handshake → FetchKeys
//!    → 入力の取得と復号 → task config の書き出し → worker command の解決
//! 2. Execute: worker を起動して終了を待つ
//! 3. PostProcess: 復号済み入力の削除 → 出力の再暗号化と鍵登録 → 公開
//!
//! PostProcess は失敗時にも必ず走る。失敗時は削除だけ行い、最初に捕捉した
//! エラーを `TaskFailure` として返す。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::codec::FileCodec;
use crate::config::SidecarConfig;
use crate::custody::KeyCustodyClient;
use crate::domain::custody::{Resource, ResourceRequest, ResultKeyBody};
use crate::domain::errors::{Result, SidecarError};
use crate::domain::ids::RunId;
use crate::domain::job::{DistData, JobDescriptor, StorageConfig};
use crate::domain::outcome::{TaskFailure, TaskResult};
use crate::domain::platform::{AppMode, Platform};
use crate::domain::state::TaskState;
use crate::domain::uri::{InputUri, OutputUri};
use crate::envelope::SignerIdentity;
use crate::envelope::jose::{b64std, b64std_decode};
use crate::ports::DomainDataRegistry;
use crate::typed::{ComponentRegistry, EvalParamReader, FillContext, write_task_config};
use crate::worker::{self, WorkerCommand};

use super::layout::TaskLayout;
use super::output::{OutputArtifact, copy_artifact};

/// Size of the fresh key each output is re-encrypted with.
pub const RESULT_KEY_LEN: usize = 32;

/// Per-run state threaded through the stages.
#[derive(Debug)]
pub struct TaskContext {
    pub run_id: RunId,
    pub job: JobDescriptor,
    state: TaskState,
    /// Ids of every input, in declaration order. Registered as ancestry.
    input_ids: Vec<String>,
    decrypted_inputs: Vec<PathBuf>,
    outputs: Vec<OutputArtifact>,
    command: Option<WorkerCommand>,
}

impl TaskContext {
    pub fn new(job: JobDescriptor) -> Self {
        Self {
            run_id: RunId::generate(),
            job,
            state: TaskState::Created,
            input_ids: Vec::new(),
            decrypted_inputs: Vec::new(),
            outputs: Vec::new(),
            command: None,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    fn advance(&mut self, next: TaskState) -> Result<()> {
        self.state.advance(next)?;
        info!(run_id = %self.run_id, state = ?next, "task state");
        Ok(())
    }

    fn storage(&self) -> Result<&StorageConfig> {
        self.job
            .storage
            .as_ref()
            .ok_or_else(|| SidecarError::unsupported("kuscia mode requires a storage config"))
    }
}

/// Runs jobs against one custody client and one signer identity.
///
/// Built by [`AppBuilder`](super::AppBuilder).
pub struct App {
    pub(super) config: SidecarConfig,
    pub(super) registry: ComponentRegistry,
    pub(super) custody: KeyCustodyClient,
    pub(super) domain_data: Option<Arc<dyn DomainDataRegistry>>,
    pub(super) identity: SignerIdentity,
    pub(super) platform: Platform,
    pub(super) mode: AppMode,
    pub(super) codec: FileCodec,
    pub(super) layout: TaskLayout,
}

impl App {
    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn custody(&self) -> &KeyCustodyClient {
        &self.custody
    }

    pub fn layout(&self) -> &TaskLayout {
        &self.layout
    }

    /// Run one job to completion.
    ///
    /// Nothing is retried; a failed run is retried by invoking `run` again
    /// with the same descriptor.
    pub async fn run(&self, job: JobDescriptor) -> std::result::Result<TaskResult, TaskFailure> {
        let mut ctx = TaskContext::new(job);
        let mut result = TaskResult::started(ctx.run_id);
        info!(
            run_id = %ctx.run_id,
            component = %ctx.job.params.component_key(),
            plat = %self.platform,
            mode = %self.mode,
            "task started"
        );

        let mut failure = self.pre_process(&mut ctx).await.err();
        if failure.is_none() {
            failure = self.execute(&mut ctx, &mut result).await.err();
        }
        if let Err(e) = self.post_process(&mut ctx, &mut result, failure.is_none()).await {
            if failure.is_none() {
                failure = Some(e);
            } else {
                warn!(error = %e, "post-processing after failure");
            }
        }
        result.finished_at = Some(Utc::now());

        let cause = match failure {
            None => match ctx.advance(TaskState::Done) {
                Ok(()) => {
                    info!(run_id = %ctx.run_id, outputs = result.registered_outputs.len(), "task succeeded");
                    return Ok(result);
                }
                Err(e) => e,
            },
            Some(cause) => {
                if let Err(e) = ctx.advance(TaskState::Failed) {
                    warn!(error = %e, "task state");
                }
                cause
            }
        };
        result.succeeded = false;
        result.process_error = Some(cause.to_string());
        error!(run_id = %ctx.run_id, kind = ?cause.kind(), "{}", result.merged_error());
        Err(TaskFailure { cause, result })
    }

    async fn pre_process(&self, ctx: &mut TaskContext) -> Result<()> {
        ctx.advance(TaskState::PreProcessing)?;
        let key = ctx.job.params.component_key();
        info!(component = %key, "pre-processing");

        let filler = self.registry.resolve(&key)?;
        let reader = EvalParamReader::new(ctx.job.params.clone(), filler.definition().clone())?;

        let mut inputs = Vec::with_capacity(reader.inputs().len());
        for data in reader.inputs() {
            inputs.push((data, InputUri::parse(&data.single_ref()?.uri)?));
        }
        ctx.input_ids = inputs.iter().map(|(_, uri)| uri.id.clone()).collect();

        let request = resource_request(&ctx.job, &inputs);
        self.custody.handshake().await?;
        let keys: HashMap<String, String> = self
            .custody
            .fetch_keys(self.platform, &self.identity, request)
            .await?
            .into_iter()
            .map(|k| (k.resource_uri, k.data_key_b64))
            .collect();
        info!(keys = keys.len(), "data keys fetched");

        self.layout.ensure()?;
        let mut input_paths = Vec::with_capacity(inputs.len());
        for (data, uri) in &inputs {
            let source = self.input_source(ctx, uri)?;
            let dst = self.layout.data_path(&uri.id);
            // tracked before the fetch: a failed decrypt still gets cleaned up
            ctx.decrypted_inputs.push(dst.clone());
            self.fetch_input(data, uri, &source, &dst, &keys)?;
            input_paths.push(dst);
        }

        let def = reader.definition();
        ctx.outputs = reader
            .output_uris()
            .iter()
            .zip(&def.outputs)
            .map(|(raw, out)| {
                let uri = OutputUri::parse(raw, self.mode)?;
                let paths = self.layout.output_paths(&uri.id);
                Ok(OutputArtifact::new(out, uri, paths))
            })
            .collect::<Result<_>>()?;
        let output_paths: Vec<_> = ctx.outputs.iter().map(|o| o.paths.clone()).collect();

        let doc = filler.fill_dyn(&FillContext {
            reader: &reader,
            input_paths: &input_paths,
            outputs: &output_paths,
        })?;
        let config_path = self.config.task_config_path();
        write_task_config(&config_path, &doc)?;
        info!(path = %config_path.display(), "task config written");

        ctx.command = Some(
            WorkerCommand::resolve(self.platform, filler.worker_script(), &self.config)
                .arg(config_path.to_string_lossy()),
        );
        Ok(())
    }

    fn input_source(&self, ctx: &TaskContext, uri: &InputUri) -> Result<PathBuf> {
        match self.mode {
            AppMode::Local => Ok(PathBuf::from(&uri.uri)),
            AppMode::Kuscia => ctx.storage()?.resolve(&uri.uri),
        }
    }

    /// Copy the ciphertext next to the scratch data and decrypt it to `dst`.
    fn fetch_input(
        &self,
        data: &DistData,
        uri: &InputUri,
        source: &Path,
        dst: &Path,
        keys: &HashMap<String, String>,
    ) -> Result<()> {
        let key_b64 = keys
            .get(&uri.id)
            .ok_or_else(|| SidecarError::MissingKey(uri.id.clone()))?;
        let key = b64std_decode("data_key_b64", key_b64)?;

        let tmp = self.layout.encrypted_tmp(&data.name);
        remove_quietly(&tmp);
        std::fs::copy(source, &tmp).map_err(|e| SidecarError::io(source, e))?;
        let decrypted = self.codec.decrypt_file(&tmp, dst, &key);
        remove_quietly(&tmp);
        let bytes = decrypted?;
        info!(input = %uri.id, bytes, "input decrypted");
        Ok(())
    }

    async fn execute(&self, ctx: &mut TaskContext, result: &mut TaskResult) -> Result<()> {
        ctx.advance(TaskState::Executing)?;
        let command = ctx
            .command
            .take()
            .ok_or_else(|| SidecarError::Precondition("no worker command resolved".to_string()))?;

        let output = worker::run(&command).await?;
        // stderr alone is not a failure; workers print warnings there
        if !output.stderr.is_empty() {
            result.execution_error = Some(output.stderr_lossy());
        }
        output.status.map_err(SidecarError::Failure)
    }

    async fn post_process(
        &self,
        ctx: &mut TaskContext,
        result: &mut TaskResult,
        proceed: bool,
    ) -> Result<()> {
        let advanced = ctx.advance(TaskState::PostProcessing);
        for path in ctx.decrypted_inputs.drain(..) {
            remove_logged(&path);
        }
        info!("decrypted inputs removed");
        advanced?;

        if !proceed {
            self.discard_outputs(ctx);
            return Ok(());
        }
        let sealed = self.seal_and_publish(ctx, result).await;
        if sealed.is_err() {
            self.discard_outputs(ctx);
        }
        sealed
    }

    async fn seal_and_publish(&self, ctx: &TaskContext, result: &mut TaskResult) -> Result<()> {
        for out in &ctx.outputs {
            if out.is_report() {
                continue;
            }
            let key: [u8; RESULT_KEY_LEN] = rand::random();
            let header = self.codec.encrypt_in_place(&out.paths.data_path, &key)?;
            info!(output = %out.id(), packets = header.packet_count, "output encrypted");

            let body = ResultKeyBody {
                resource_uri: out.id().to_string(),
                data_key_b64: b64std(key),
                scope: ctx.job.task.scope.clone(),
                ancestor_uuids: ctx.input_ids.clone(),
            };
            self.custody
                .register_result_key(self.platform, &self.identity, body)
                .await?;
            result.registered_outputs.push(out.id().to_string());
        }
        self.publish(ctx).await
    }

    async fn publish(&self, ctx: &TaskContext) -> Result<()> {
        match self.mode {
            AppMode::Local => {
                for out in &ctx.outputs {
                    copy_artifact(&out.paths.data_path, Path::new(&out.uri.uri))?;
                    info!(output = %out.id(), dst = %out.uri.uri, "output copied");
                }
            }
            AppMode::Kuscia => {
                let storage = ctx.storage()?;
                let registry = self.domain_data.as_ref().ok_or_else(|| {
                    SidecarError::Precondition("kuscia mode without a domain data registry".to_string())
                })?;
                for out in &ctx.outputs {
                    let id = registry.create(out.domain_data()?).await?;
                    let dst = storage.resolve(&out.uri.uri)?;
                    copy_artifact(&out.paths.data_path, &dst)?;
                    info!(output = %out.id(), domaindata_id = %id, dst = %dst.display(), "output published");
                }
            }
        }
        Ok(())
    }

    fn discard_outputs(&self, ctx: &TaskContext) {
        for out in &ctx.outputs {
            remove_quietly(&out.paths.data_path);
            remove_quietly(&out.paths.schema_path);
        }
    }
}

/// Every input as a resource; tables also list their columns.
fn resource_request(job: &JobDescriptor, inputs: &[(&DistData, InputUri)]) -> ResourceRequest {
    ResourceRequest {
        initiator_party_id: job.task.task_initiator_id.clone(),
        op_name: job.params.name.clone(),
        scope: job.task.scope.clone(),
        resources: inputs
            .iter()
            .map(|(data, uri)| Resource {
                resource_uri: uri.id.clone(),
                columns: data.table_schema().map(|s| s.columns()).unwrap_or_default(),
            })
            .collect(),
    }
}

fn remove_quietly(path: &Path) {
    let _ = std::fs::remove_file(path);
}

fn remove_logged(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove decrypted input"),
    }
}
