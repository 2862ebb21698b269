use std::collections::VecDeque;

use ballers_domain::{ExternalRecord, HeaderMismatch, SheetSchema};
use log::{debug, warn};

use super::{CancellationToken, PageCursor, PageSource, RetryPolicy, SourceRef};
use crate::constants::FIRST_DATA_ROW;
use crate::errors::SourceError;

/// Lector de la hoja: valida la cabecera, pagina y reintenta fallos
/// transitorios.
pub struct SheetReader<S: PageSource> {
    source: S,
    schema: SheetSchema,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl<S: PageSource> SheetReader<S> {
    pub fn new(source: S, schema: SheetSchema) -> Self {
        Self { source, schema, retry: RetryPolicy::default(), cancel: CancellationToken::new() }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn schema(&self) -> &SheetSchema {
        &self.schema
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Secuencia perezosa de filas. Cada llamada empieza desde el inicio de
    /// la fuente (no hay cursor reanudable).
    pub fn fetch_all<'a>(&'a self, source_ref: &'a SourceRef) -> SheetRows<'a, S> {
        SheetRows { reader: self,
                    source_ref,
                    header: None,
                    buffer: VecDeque::new(),
                    next_cursor: None,
                    started: false,
                    finished: false,
                    next_row: FIRST_DATA_ROW }
    }

    /// Una página con reintentos para errores transitorios.
    fn fetch_page_with_retry(&self, source_ref: &SourceRef, cursor: Option<&PageCursor>) -> Result<super::Page, SourceError> {
        let mut attempt = 1;
        loop {
            match self.source.fetch_page(source_ref, cursor) {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() => {
                    if attempt >= self.retry.max_attempts {
                        warn!("fetch_page:exhausted source={source_ref} attempts={attempt} err={e}");
                        return Err(SourceError::RetriesExhausted { attempts: attempt, last: e.to_string() });
                    }
                    let delay = self.retry.delay_after(attempt);
                    warn!("fetch_page:transient source={source_ref} attempt={attempt} err={e} -> sleeping {}ms",
                          delay.as_millis());
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Iterador de filas producido por [`SheetReader::fetch_all`].
///
/// Tras el primer `Err` el iterador queda agotado.
pub struct SheetRows<'a, S: PageSource> {
    reader: &'a SheetReader<S>,
    source_ref: &'a SourceRef,
    header: Option<Vec<String>>,
    buffer: VecDeque<Vec<String>>,
    next_cursor: Option<PageCursor>,
    started: bool,
    finished: bool,
    next_row: usize,
}

impl<S: PageSource> SheetRows<'_, S> {
    fn fail(&mut self, err: SourceError) -> Option<Result<ExternalRecord, SourceError>> {
        self.finished = true;
        self.buffer.clear();
        Some(Err(err))
    }

    /// Carga la siguiente página en el buffer. La primera página aporta la
    /// cabecera, que se valida antes de entregar ninguna fila.
    fn load_page(&mut self) -> Result<(), SourceError> {
        if self.reader.cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }
        let cursor = self.next_cursor.take();
        debug!("load_page:start source={} cursor={:?}", self.source_ref, cursor);
        let page = self.reader.fetch_page_with_retry(self.source_ref, cursor.as_ref())?;
        let mut rows = page.rows.into_iter();
        if !self.started {
            self.started = true;
            let header: Vec<String> = match rows.next() {
                Some(h) => h.into_iter().map(|c| c.trim().to_string()).collect(),
                None => {
                    let missing = self.reader.schema.required_columns().map(str::to_string).collect();
                    return Err(SourceError::SchemaMismatch(HeaderMismatch { missing, ..Default::default() }));
                }
            };
            self.reader.schema.validate_header(&header).map_err(SourceError::SchemaMismatch)?;
            self.header = Some(header);
        }
        self.buffer.extend(rows);
        self.next_cursor = page.next;
        debug!("load_page:done source={} buffered={} more={}",
               self.source_ref,
               self.buffer.len(),
               self.next_cursor.is_some());
        Ok(())
    }
}

impl<S: PageSource> Iterator for SheetRows<'_, S> {
    type Item = Result<ExternalRecord, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            if let Some(cells) = self.buffer.pop_front() {
                let row = self.next_row;
                self.next_row += 1;
                if cells.iter().all(|c| c.trim().is_empty()) {
                    continue;
                }
                let header = self.header.as_deref().unwrap_or_default();
                let schema = &self.reader.schema;
                let mut record = ExternalRecord::from_cells(row, header, &cells);
                for (column, value) in record.fields.iter_mut() {
                    *value = schema.normalize_value(column, value);
                }
                return Some(Ok(record));
            }
            if self.started && self.next_cursor.is_none() {
                self.finished = true;
                return None;
            }
            if let Err(e) = self.load_page() {
                return self.fail(e);
            }
        }
    }
}
