//! Domain model (errors, job parameters, custody messages, run state).

pub mod custody;
pub mod errors;
pub mod ids;
pub mod job;
pub mod outcome;
pub mod platform;
pub mod state;
pub mod uri;

pub use self::errors::{ErrorKind, FailureDetail, Result, SidecarError};
pub use self::ids::RunId;
pub use self::job::{
    Attribute, DataRef, DistData, DistMeta, JobDescriptor, JobParams, StorageConfig, TableSchema,
    TeeTaskConfig, dist_data_type,
};
pub use self::outcome::{TaskFailure, TaskResult};
pub use self::platform::{AppMode, Platform};
pub use self::state::TaskState;
pub use self::uri::{InputUri, OutputUri};
