//! Lectura de la fuente externa (hoja de cálculo) paginada.
//!
//! El core sólo conoce la capacidad `PageSource::fetch_page`; cómo se habla
//! con la API concreta (HTTP, credenciales) vive en los adaptadores.

mod reader;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS};
use crate::errors::SourceError;

pub use reader::{SheetReader, SheetRows};

/// Qué hoja y qué rango leer. Para el core es una caja negra que se pasa tal
/// cual al `PageSource`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub spreadsheet_id: String,
    pub range: String,
}

impl SourceRef {
    pub fn new(spreadsheet_id: impl Into<String>, range: impl Into<String>) -> Self {
        Self { spreadsheet_id: spreadsheet_id.into(), range: range.into() }
    }

    /// Clave usada por la guardia de "una corrida por fuente".
    pub fn lock_key(&self) -> String {
        format!("{}:{}", self.spreadsheet_id, self.range)
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.spreadsheet_id, self.range)
    }
}

/// Credencial opaca (token bearer de cuenta de servicio u OAuth). Nunca se
/// imprime ni se persiste.
#[derive(Clone)]
pub struct SourceCredential(String);

impl SourceCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SourceCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SourceCredential(<redacted>)")
    }
}

/// Cursor opaco de paginación devuelto por la fuente.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor(pub String);

/// Una página de filas crudas. En la primera página, la primera fila es la
/// cabecera.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub rows: Vec<Vec<String>>,
    pub next: Option<PageCursor>,
}

/// Capacidad mínima que el lector requiere de la fuente.
pub trait PageSource {
    /// Obtiene la página que empieza en `cursor` (`None` = inicio).
    fn fetch_page(&self, source: &SourceRef, cursor: Option<&PageCursor>) -> Result<Page, SourceError>;
}

impl<T: PageSource + ?Sized> PageSource for Arc<T> {
    fn fetch_page(&self, source: &SourceRef, cursor: Option<&PageCursor>) -> Result<Page, SourceError> {
        (**self).fetch_page(source, cursor)
    }
}

impl<T: PageSource + ?Sized> PageSource for Box<T> {
    fn fetch_page(&self, source: &SourceRef, cursor: Option<&PageCursor>) -> Result<Page, SourceError> {
        (**self).fetch_page(source, cursor)
    }
}

/// Política de reintentos por página.
///
/// Espera antes del intento `n+1`: `base_delay * 2^(n-1)`, acotada por
/// `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay, max_delay }
    }

    /// Sin reintentos: un único intento.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Espera tras el intento fallido número `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS,
                  Duration::from_millis(DEFAULT_BASE_DELAY_MS),
                  Duration::from_millis(DEFAULT_MAX_DELAY_MS))
    }
}

/// Cancelación cooperativa. Sólo se consulta entre páginas.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Vuelve a dejar el token utilizable para la siguiente corrida.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
