//! JobSource port - ジョブ記述子の取得元

use crate::domain::errors::Result;
use crate::domain::job::JobDescriptor;

/// Produces the validated job descriptor for this process.
///
/// Implementations verify whatever signature the descriptor carries before
/// returning it.
pub trait JobSource: Send + Sync {
    fn load(&self) -> Result<JobDescriptor>;
}
