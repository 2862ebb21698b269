//! Normalización de nombres a una clave canónica ASCII.
//!
//! Reglas (aplicadas en este orden):
//! 1. Descomposición Unicode compatible (NFKD).
//! 2. Eliminación de marcas combinantes (acentos, diéresis, tildes).
//! 3. Transliteración de letras latinas que no se descomponen (`ß`, `ø`, ...).
//! 4. Minúsculas.
//! 5. Colapso de cualquier secuencia de espacios a un único espacio y recorte
//!    de bordes.
//!
//! La función es pura y determinista: el mismo texto produce siempre la misma
//! clave. Se usa tanto del lado de la hoja como del lado de la base de datos,
//! nunca se compara texto sin pasar por aquí.

use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::DomainError;

/// Clave canónica de una entidad (p. ej. `"ana garcia"`).
///
/// Sólo se construye a través de [`normalize`] / [`normalize_parts`], o al
/// rehidratar filas ya normalizadas desde persistencia.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Rehidrata una clave leída desde almacenamiento. Vuelve a normalizar y
    /// rechaza valores que no estén ya en forma canónica.
    pub fn from_stored(raw: &str) -> Result<Self, DomainError> {
        let key = normalize(raw)?;
        if key.as_str() != raw {
            return Err(DomainError::InvalidInput(format!("clave almacenada no canónica: {raw:?}")));
        }
        Ok(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Letras (ya en minúscula) que NFKD no descompone en base + marca.
fn transliterate(c: char) -> Option<&'static str> {
    Some(match c {
        'ß' => "ss",
        'æ' => "ae",
        'œ' => "oe",
        'ø' => "o",
        'đ' => "d",
        'ł' => "l",
        'þ' => "th",
        'ı' => "i",
        _ => return None,
    })
}

/// Convierte texto libre en su [`CanonicalKey`].
///
/// Falla con [`DomainError::InvalidInput`] si el texto está vacío o sólo
/// contiene espacios (o caracteres que desaparecen al normalizar).
pub fn normalize(text: &str) -> Result<CanonicalKey, DomainError> {
    let mut folded = String::with_capacity(text.len());
    // Minúscula antes de transliterar: 'ẞ' -> 'ß' -> "ss".
    for c in text.nfkd().flat_map(char::to_lowercase).filter(|c| !is_combining_mark(*c)) {
        match transliterate(c) {
            Some(s) => folded.push_str(s),
            None => folded.push(c),
        }
    }
    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return Err(DomainError::InvalidInput(format!("no se puede normalizar {text:?}")));
    }
    Ok(CanonicalKey(collapsed))
}

/// Normaliza una clave compuesta por varias columnas (p. ej. nombre +
/// apellido). Las partes vacías se ignoran; si todas lo están, falla igual que
/// [`normalize`].
pub fn normalize_parts(parts: &[&str]) -> Result<CanonicalKey, DomainError> {
    normalize(&parts.join(" "))
}
