//! sealrun - 1 ジョブを実行して終了する sidecar
//!
//! 署名付き entry config を読み、key-custody service から入力の鍵を取得して
//! worker を実行し、出力を再暗号化して登録する。終了コードは成功で 0、
//! それ以外は 1。

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{error, info};

use sealrun_core::app::AppBuilder;
use sealrun_core::config::SidecarConfig;
use sealrun_core::domain::{AppMode, Platform};
use sealrun_core::envelope::SignerIdentity;
use sealrun_core::impls::{HttpCustodyTransport, LocalJobSource, SimulatedReportGenerator};
use sealrun_core::observability::{self, LogOptions};
use sealrun_core::ports::{JobSource, ReportGenerator};

/// sealrun - confidential task sidecar
#[derive(Parser, Debug)]
#[command(name = "sealrun")]
#[command(version, about, long_about = None)]
struct Args {
    /// Platform: sim, sgx, tdx or csv
    #[arg(long, default_value = "sim")]
    plat: String,

    /// App mode: local or kuscia
    #[arg(long, default_value = "local")]
    app_mode: String,

    /// Signed entry task config (local mode)
    #[arg(long)]
    entry_task_config_path: Option<PathBuf>,

    /// Data mesh endpoint (kuscia mode)
    #[arg(long, default_value = "")]
    data_mesh_endpoint: String,

    /// Use mutual TLS towards the key-custody service
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    enable_capsule_tls: bool,

    /// Sidecar configuration file (JSON); defaults apply without it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: String,

    /// App log file; empty logs to stdout only
    #[arg(long, default_value = "/host/logs/app.log")]
    app_log_path: PathBuf,

    /// Mirror the app log to stdout
    #[arg(long)]
    enable_console_logger: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log = LogOptions {
        app_log_path: Some(args.app_log_path.clone()).filter(|p| !p.as_os_str().is_empty()),
        log_level: args.log_level.clone(),
        enable_console_logger: args.enable_console_logger,
    };
    if let Err(e) = observability::init(&log) {
        eprintln!("sealrun: {e}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("sealrun: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let platform: Platform = args.plat.parse()?;
    let mode: AppMode = args.app_mode.parse()?;
    let config = SidecarConfig::load(args.config.as_deref()).context("loading sidecar config")?;

    let job = match mode {
        AppMode::Local => {
            let path = args
                .entry_task_config_path
                .context("--entry-task-config-path is required in local mode")?;
            LocalJobSource::new(&path)
                .load()
                .with_context(|| format!("loading entry task config {}", path.display()))?
        }
        AppMode::Kuscia => {
            bail!(
                "kuscia job ingestion needs a data mesh client (endpoint `{}`), which this build does not include",
                args.data_mesh_endpoint
            );
        }
    };
    info!(
        component = %job.params.component_key(),
        initiator = %job.task.task_initiator_id,
        "job loaded"
    );

    let reports: Arc<dyn ReportGenerator> = match platform {
        Platform::Sim => Arc::new(SimulatedReportGenerator),
        other => bail!("no attestation provider for platform {other} in this build"),
    };

    let identity = SignerIdentity::generate().context("generating signer identity")?;
    info!("signer key and certificate generated");

    let tls = args.enable_capsule_tls.then_some(&config.tls);
    let transport = HttpCustodyTransport::new(&job.task.capsule_manager_endpoint, config.rpc_timeout(), tls)
        .context("creating key-custody transport")?;

    let app = AppBuilder::new(config)
        .with_builtins()?
        .platform(platform)
        .mode(mode)
        .transport(Arc::new(transport))
        .reports(reports)
        .identity(identity)
        .build()?;

    let result = app.run(job).await?;
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}
