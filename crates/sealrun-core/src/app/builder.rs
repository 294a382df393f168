//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::sync::Arc;

use crate::codec::FileCodec;
use crate::config::SidecarConfig;
use crate::custody::KeyCustodyClient;
use crate::domain::errors::SidecarError;
use crate::domain::platform::{AppMode, Platform};
use crate::envelope::SignerIdentity;
use crate::ports::{CustodyTransport, DomainDataRegistry, ReportGenerator};
use crate::typed::{Component, ComponentRegistry, Filler, RegistryError, register_builtins};

use super::layout::TaskLayout;
use super::orchestrator::App;

/// AppBuilder は App を構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new(config)
///     .with_builtins()?
///     .expect_components(&["stats/table_statistics:0.0.1"])
///     .platform(Platform::Sim)
///     .mode(AppMode::Local)
///     .transport(transport)
///     .reports(reports)
///     .identity(SignerIdentity::generate()?)
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - expect_components() で期待される component を登録
/// - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
/// - 協調者の不足も build() の時点で BuildError にする
pub struct AppBuilder {
    config: SidecarConfig,
    registry: ComponentRegistry,
    expected_components: Option<Vec<String>>,
    platform: Option<Platform>,
    mode: Option<AppMode>,
    transport: Option<Arc<dyn CustodyTransport>>,
    reports: Option<Arc<dyn ReportGenerator>>,
    domain_data: Option<Arc<dyn DomainDataRegistry>>,
    identity: Option<SignerIdentity>,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing components: {0:?}. These components were expected but not registered.")]
    MissingComponents(Vec<String>),

    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] SidecarError),
}

impl AppBuilder {
    pub fn new(config: SidecarConfig) -> Self {
        Self {
            config,
            registry: ComponentRegistry::new(),
            expected_components: None,
            platform: None,
            mode: None,
            transport: None,
            reports: None,
            domain_data: None,
            identity: None,
        }
    }

    /// Filler を登録
    pub fn register<C: Component, F: Filler<C> + 'static>(
        mut self,
        filler: F,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<C, F>(filler)?;
        Ok(self)
    }

    /// 組み込み component をまとめて登録
    pub fn with_builtins(mut self) -> Result<Self, RegistryError> {
        register_builtins(&mut self.registry)?;
        Ok(self)
    }

    /// 期待される component key のリストを設定
    pub fn expect_components(mut self, keys: &[&str]) -> Self {
        self.expected_components = Some(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn mode(mut self, mode: AppMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn CustodyTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn reports(mut self, reports: Arc<dyn ReportGenerator>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// kuscia mode でのみ必要
    pub fn domain_data(mut self, registry: Arc<dyn DomainDataRegistry>) -> Self {
        self.domain_data = Some(registry);
        self
    }

    pub fn identity(mut self, identity: SignerIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// AppBuilder を構築して App を生成
    ///
    /// # 検証
    /// - expect_components() の component が全て登録されているか
    /// - platform / mode / transport / reports / identity が揃っているか
    /// - kuscia mode なら domain data registry があるか
    pub fn build(self) -> Result<App, BuildError> {
        if let Some(expected) = &self.expected_components {
            let registered = self.registry.registered_keys();
            let missing: Vec<String> = expected
                .iter()
                .filter(|k| !registered.contains(k))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingComponents(missing));
            }
        }

        let platform = self.platform.ok_or(BuildError::MissingCollaborator("platform"))?;
        let mode = self.mode.ok_or(BuildError::MissingCollaborator("mode"))?;
        let transport = self.transport.ok_or(BuildError::MissingCollaborator("transport"))?;
        let reports = self.reports.ok_or(BuildError::MissingCollaborator("reports"))?;
        let identity = self.identity.ok_or(BuildError::MissingCollaborator("identity"))?;
        if mode == AppMode::Kuscia && self.domain_data.is_none() {
            return Err(BuildError::MissingCollaborator("domain_data"));
        }

        let codec = FileCodec::with_block_length(self.config.block_length)?;
        let custody = KeyCustodyClient::new(transport, reports).with_timeout(self.config.rpc_timeout());
        let layout = TaskLayout::new(&self.config.task_base_dir);
        Ok(App {
            config: self.config,
            registry: self.registry,
            custody,
            domain_data: self.domain_data,
            identity,
            platform,
            mode,
            codec,
            layout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryDomainDataRegistry, SimulatedReportGenerator};
    use crate::typed::StandardFiller;
    use crate::typed::builtin::{Psi, TableStatistics};
    use std::sync::OnceLock;

    // Transport that is never called; building does not touch the network.
    struct Unreachable;

    #[async_trait::async_trait]
    impl CustodyTransport for Unreachable {
        async fn get_ra_cert(
            &self,
            _req: crate::domain::custody::GetRaCertRequest,
        ) -> crate::domain::errors::Result<crate::domain::custody::GetRaCertResponse> {
            Err(SidecarError::Precondition("unreachable".into()))
        }
        async fn get_data_keys(
            &self,
            _req: crate::envelope::EncryptedRequest,
        ) -> crate::domain::errors::Result<crate::envelope::EncryptedResponse> {
            Err(SidecarError::Precondition("unreachable".into()))
        }
        async fn create_data_keys(
            &self,
            _req: crate::envelope::EncryptedRequest,
        ) -> crate::domain::errors::Result<crate::envelope::EncryptedResponse> {
            Err(SidecarError::Precondition("unreachable".into()))
        }
        async fn create_data_policy(
            &self,
            _req: crate::envelope::EncryptedRequest,
        ) -> crate::domain::errors::Result<crate::envelope::EncryptedResponse> {
            Err(SidecarError::Precondition("unreachable".into()))
        }
        async fn create_result_data_key(
            &self,
            _req: crate::envelope::EncryptedRequest,
        ) -> crate::domain::errors::Result<crate::envelope::EncryptedResponse> {
            Err(SidecarError::Precondition("unreachable".into()))
        }
    }

    fn identity() -> SignerIdentity {
        static IDENTITY: OnceLock<SignerIdentity> = OnceLock::new();
        IDENTITY
            .get_or_init(|| SignerIdentity::generate_with_bits(2048).unwrap())
            .clone()
    }

    fn wired(builder: AppBuilder) -> AppBuilder {
        builder
            .platform(Platform::Sim)
            .mode(AppMode::Local)
            .transport(Arc::new(Unreachable))
            .reports(Arc::new(SimulatedReportGenerator))
            .identity(identity())
    }

    #[test]
    fn test_build_success() {
        let app = wired(AppBuilder::new(SidecarConfig::default()))
            .register::<Psi, _>(StandardFiller)
            .unwrap()
            .expect_components(&["preprocessing/psi:0.0.1"])
            .build()
            .unwrap();
        assert_eq!(app.platform(), Platform::Sim);
        assert!(!app.custody().is_attested());
    }

    #[test]
    fn test_build_missing_components() {
        let app = wired(AppBuilder::new(SidecarConfig::default()))
            .register::<Psi, _>(StandardFiller)
            .unwrap()
            .expect_components(&["preprocessing/psi:0.0.1", "stats/table_statistics:0.0.1"])
            .build();
        assert!(matches!(
            app,
            Err(BuildError::MissingComponents(missing)) if missing == vec![TableStatistics::key()]
        ));
    }

    #[test]
    fn test_build_with_builtins() {
        let app = wired(AppBuilder::new(SidecarConfig::default()))
            .with_builtins()
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(app.registry().registered_keys().len(), 16);
    }

    #[test]
    fn test_build_missing_collaborator() {
        let app = AppBuilder::new(SidecarConfig::default())
            .platform(Platform::Sim)
            .mode(AppMode::Local)
            .build();
        assert!(matches!(app, Err(BuildError::MissingCollaborator("transport"))));
    }

    #[test]
    fn test_kuscia_requires_domain_data() {
        let app = wired(AppBuilder::new(SidecarConfig::default()))
            .mode(AppMode::Kuscia)
            .build();
        assert!(matches!(app, Err(BuildError::MissingCollaborator("domain_data"))));

        let app = wired(AppBuilder::new(SidecarConfig::default()))
            .mode(AppMode::Kuscia)
            .domain_data(Arc::new(InMemoryDomainDataRegistry::new()))
            .build();
        assert!(app.is_ok());
    }

    #[test]
    fn test_build_rejects_bad_block_length() {
        let config = SidecarConfig {
            block_length: 16,
            ..SidecarConfig::default()
        };
        let app = wired(AppBuilder::new(config)).build();
        assert!(matches!(app, Err(BuildError::Config(_))));
    }
}
