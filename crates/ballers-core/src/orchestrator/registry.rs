use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use uuid::Uuid;

use crate::errors::RunInProgress;

static GLOBAL_REGISTRY: Lazy<RunRegistry> = Lazy::new(RunRegistry::new);

/// Corridas activas por fuente. Garantiza "una corrida por fuente a la vez"
/// entre todos los orquestadores que compartan el registro.
#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    active: Arc<DashMap<String, Uuid>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registro de proceso, compartido por defecto por todos los
    /// orquestadores.
    pub fn global() -> Self {
        GLOBAL_REGISTRY.clone()
    }

    /// Reserva la fuente o falla de inmediato si ya hay una corrida activa.
    pub fn try_acquire(&self, source_key: &str, run_id: Uuid) -> Result<RunGuard, RunInProgress> {
        match self.active.entry(source_key.to_string()) {
            Entry::Occupied(_) => Err(RunInProgress { source_key: source_key.to_string() }),
            Entry::Vacant(slot) => {
                slot.insert(run_id);
                Ok(RunGuard { active: Arc::clone(&self.active), source_key: source_key.to_string() })
            }
        }
    }

    pub fn is_running(&self, source_key: &str) -> bool {
        self.active.contains_key(source_key)
    }

    /// Corrida activa para la fuente, si la hay.
    pub fn active_run(&self, source_key: &str) -> Option<Uuid> {
        self.active.get(source_key).map(|r| *r.value())
    }
}

/// Libera la fuente al salir de ámbito (también ante pánico).
#[derive(Debug)]
pub struct RunGuard {
    active: Arc<DashMap<String, Uuid>>,
    source_key: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.active.remove(&self.source_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_guard_dropped() {
        let reg = RunRegistry::new();
        let guard = reg.try_acquire("s1", Uuid::new_v4()).unwrap();
        assert!(reg.try_acquire("s1", Uuid::new_v4()).is_err());
        assert!(reg.try_acquire("s2", Uuid::new_v4()).is_ok());
        drop(guard);
        assert!(!reg.is_running("s1"));
        assert!(reg.try_acquire("s1", Uuid::new_v4()).is_ok());
    }
}
