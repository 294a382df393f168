//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」。外部の協調者
//! (key-custody service, attestation, job descriptor source, kuscia の
//! domain data service) をここで trait として切り出し、実装は `impls`
//! に置く。テストでは fake を差し込む。

pub mod attestation;
pub mod domain_data;
pub mod job_source;
pub mod transport;

// 主要な trait を再エクスポート
pub use self::attestation::ReportGenerator;
pub use self::domain_data::{DataColumn, DomainData, DomainDataRegistry};
pub use self::job_source::JobSource;
pub use self::transport::CustodyTransport;
