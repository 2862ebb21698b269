//! Ventanas de filas sobre un rango en notación A1.

/// Rango de columnas completas (`"Hoja 1!A:G"` o `"A:G"`) que se puede
/// recorrer en ventanas de filas (`"Hoja 1!A1:G500"`, `"Hoja 1!A501:G1000"`,
/// ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeWindow {
    sheet: Option<String>,
    first_column: String,
    last_column: String,
}

impl RangeWindow {
    /// `None` si el rango ya fija filas (p. ej. `"A1:G20"`) o no es A1
    /// válido; en ese caso se lee en una sola petición.
    pub fn parse(range: &str) -> Option<Self> {
        let (sheet, columns) = match range.rfind('!') {
            Some(idx) => (Some(range[..idx].to_string()), &range[idx + 1..]),
            None => (None, range),
        };
        let (first, last) = columns.split_once(':')?;
        let is_column = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic());
        if !is_column(first) || !is_column(last) {
            return None;
        }
        Some(Self { sheet: sheet.filter(|s| !s.is_empty()),
                    first_column: first.to_ascii_uppercase(),
                    last_column: last.to_ascii_uppercase() })
    }

    /// Rango de `count` filas empezando en `start_row` (1-based).
    pub fn rows(&self, start_row: usize, count: usize) -> String {
        let end_row = start_row + count.max(1) - 1;
        self.qualified(format!("{}{start_row}:{}{end_row}", self.first_column, self.last_column))
    }

    /// Rango abierto desde `start_row` hasta el final de la hoja.
    pub fn tail(&self, start_row: usize) -> String {
        self.qualified(format!("{}{start_row}:{}", self.first_column, self.last_column))
    }

    fn qualified(&self, cells: String) -> String {
        match &self.sheet {
            Some(sheet) => format!("{sheet}!{cells}"),
            None => cells,
        }
    }
}
