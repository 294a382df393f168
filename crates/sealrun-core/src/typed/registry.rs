//! ComponentRegistry - filler の登録と検索
//!
//! - `register::<C, F>(filler)` で登録し、内部で `TypedFiller` に包んで
//!   `DynFiller` に型消去する
//! - `HashMap<String, Arc<dyn DynFiller>>` を `<domain>/<name>:<version>` で引く

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::errors::{Result, SidecarError};

use super::component::Component;
use super::filler::{DynFiller, Filler, TypedFiller};

/// ```ignore
/// let mut registry = ComponentRegistry::new();
/// registry.register::<Psi, _>(StandardFiller)?;
///
/// let filler = registry.resolve("preprocessing/psi:0.0.1")?;
/// ```
#[derive(Default, Clone)]
pub struct ComponentRegistry {
    fillers: HashMap<String, Arc<dyn DynFiller>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("component '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: Component, F: Filler<C> + 'static>(
        &mut self,
        filler: F,
    ) -> std::result::Result<(), RegistryError> {
        let key = C::key();
        if self.fillers.contains_key(&key) {
            return Err(RegistryError::AlreadyRegistered(key));
        }
        self.fillers
            .insert(key, Arc::new(TypedFiller::<C, F>::new(filler)));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn DynFiller>> {
        self.fillers.get(key).cloned()
    }

    /// Like [`get`](Self::get), but a job naming an unknown component is a
    /// schema error.
    pub fn resolve(&self, key: &str) -> Result<Arc<dyn DynFiller>> {
        self.get(key)
            .ok_or_else(|| SidecarError::schema(format!("component `{key}` is not registered")))
    }

    pub fn registered_keys(&self) -> Vec<String> {
        self.fillers.keys().cloned().collect()
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys = self.registered_keys();
        keys.sort();
        f.debug_struct("ComponentRegistry").field("components", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use crate::typed::builtin::{Psi, TableStatistics};
    use crate::typed::filler::StandardFiller;

    #[test]
    fn register_and_get() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Psi, _>(StandardFiller).unwrap();

        let filler = registry.get(&Psi::key()).unwrap();
        assert_eq!(filler.worker_script(), "psi.py");
        assert_eq!(filler.definition().name, "psi");
    }

    #[test]
    fn double_registration() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Psi, _>(StandardFiller).unwrap();
        let result = registry.register::<Psi, _>(StandardFiller);
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(k)) if k == "preprocessing/psi:0.0.1"));
    }

    #[test]
    fn components_do_not_collide() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Psi, _>(StandardFiller).unwrap();
        registry.register::<TableStatistics, _>(StandardFiller).unwrap();

        assert_eq!(registry.resolve(&Psi::key()).unwrap().worker_script(), "psi.py");
        assert_eq!(
            registry.resolve(&TableStatistics::key()).unwrap().worker_script(),
            "table_statistics.py"
        );
    }

    #[test]
    fn unknown_component_is_schema_error() {
        let registry = ComponentRegistry::new();
        let err = registry.resolve("stats/vif:0.0.1").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }
}
