//! Typed - 型付き Component API
//!
//! component の (domain, name, version) の typo を型で排除し、filler との
//! 対応付けを静的に保証する。
//!
//! # 二層構造
//! - **表層（Typed）**: `Component` trait, `Filler<C>` trait - 型安全
//! - **内部（Dyn）**: `DynFiller` trait - object-safe, type erasure

pub mod builtin;
pub mod component;
pub mod filler;
pub mod reader;
pub mod registry;

// 主要な trait/型 を再エクスポート
pub use self::builtin::register_builtins;
pub use self::component::{AttrDef, AttrKind, AttrValue, Component, ComponentDef, InputDef, OutputDef};
pub use self::filler::{
    DynFiller, FillContext, Filler, OutputPaths, StandardFiller, TypedFiller, write_task_config,
};
pub use self::reader::EvalParamReader;
pub use self::registry::{ComponentRegistry, RegistryError};
