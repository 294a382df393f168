//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせて 1 ジョブのパイプラインを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: アプリケーションの構築とワイヤリング
//! - **App**: PreProcess → Execute → PostProcess の実行
//! - **TaskLayout**: scratch directory 上のファイル配置
//! - **OutputArtifact**: 出力の metadata と公開

pub mod builder;
pub mod layout;
pub mod orchestrator;
pub mod output;

// 主要な型を再エクスポート
pub use self::builder::{AppBuilder, BuildError};
pub use self::layout::TaskLayout;
pub use self::orchestrator::{App, RESULT_KEY_LEN, TaskContext};
pub use self::output::OutputArtifact;
