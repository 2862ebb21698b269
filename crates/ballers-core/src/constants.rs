//! Valores por defecto del pipeline de sincronización.
//!
//! Los límites de reintento están pensados para una hoja de cálculo de cientos
//! a pocos miles de filas: pocas páginas, cada una barata de repetir.

/// Intentos totales por página (incluye el primero).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
/// Espera base del backoff exponencial, en milisegundos.
pub const DEFAULT_BASE_DELAY_MS: u64 = 200;
/// Tope de la espera entre intentos, en milisegundos.
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;
/// Filas pedidas por página a la fuente.
pub const DEFAULT_PAGE_SIZE: usize = 500;
/// Intervalo del auto-sync, en minutos.
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u64 = 5;
/// Primera fila de datos en la hoja (la fila 1 es la cabecera).
pub const FIRST_DATA_ROW: usize = 2;
