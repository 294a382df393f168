//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **HttpCustodyTransport**: key-custody service への HTTP(S) 通信
//! - **SimulatedReportGenerator**: sim 用の attestation
//! - **LocalJobSource**: 署名付き entry config の読み込み
//! - **InMemoryDomainDataRegistry**: 開発用の domain data サービス

pub mod http_transport;
pub mod inmem_domain_data;
pub mod local_job_source;
pub mod sim_attestation;

// 主要な型を再エクスポート
pub use self::http_transport::HttpCustodyTransport;
pub use self::inmem_domain_data::InMemoryDomainDataRegistry;
pub use self::local_job_source::LocalJobSource;
pub use self::sim_attestation::SimulatedReportGenerator;
