//! sealrun-core
//!
//! Core building blocks for the sealrun confidential task sidecar.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（errors, job, custody messages, uri, state, outcome）
//! - **codec**: ブロック単位の AES-GCM ファイル暗号化
//! - **envelope**: key-custody service との JWE/JWS envelope
//! - **custody**: attestation 付きの key-custody client
//! - **worker**: worker サブプロセスの起動と出力の回収
//! - **typed**: 型付き Component API（Component, Filler, ComponentRegistry）
//! - **ports**: 抽象化レイヤー（CustodyTransport, ReportGenerator, JobSource, DomainDataRegistry）
//! - **impls**: ports の実装（HTTP transport, sim attestation, local job source など）
//! - **app**: 1 ジョブのパイプライン（builder, orchestrator）
//! - **config** / **observability**: 設定とログ

pub mod app;
pub mod codec;
pub mod config;
pub mod custody;
pub mod domain;
pub mod envelope;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod typed;
pub mod worker;
