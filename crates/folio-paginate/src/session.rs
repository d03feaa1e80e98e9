use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use folio::{inner_markup, parse_fragment, Document, MarkupError, NodeId};
use serde::{Deserialize, Serialize};

use crate::engine::{clamp_page_height, Engine, PageFill};
use crate::measure::{Measure, MeasureError};

/// Cancellation hook checked at every page boundary.
pub trait CancelToken {
    fn is_cancelled(&self) -> bool;
}

/// Never-cancel token for default call paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Shareable abort flag. Cloning yields a handle to the same flag.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next page boundary.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl CancelToken for AbortHandle {
    fn is_cancelled(&self) -> bool {
        self.is_aborted()
    }
}

/// Pagination options.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaginateOptions {
    /// Page budget in layout units. Falls back to the measurer's container
    /// height when unset.
    #[serde(alias = "page_height")]
    pub page_height: Option<f32>,
    /// Maximum number of pages to produce; `None` is unbounded.
    #[serde(rename = "maxNumberOfPages", alias = "max_pages")]
    pub max_pages: Option<usize>,
    /// Classes applied to the measurement surface.
    pub classes: Vec<String>,
    /// Log per-page fill statistics at debug level.
    pub trace: bool,
}

impl PaginateOptions {
    pub fn with_page_height(mut self, height: f32) -> Self {
        self.page_height = Some(height);
        self
    }

    /// Cap the number of emitted pages. `0` is treated as `1`.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages.max(1));
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    fn resolved_max_pages(&self) -> Option<usize> {
        self.max_pages.map(|max| max.max(1))
    }
}

/// One finished page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    /// Serialized page content.
    pub markup: String,
    /// Last measured height of the page content.
    pub height: f32,
    /// The page holds a unit taller than the budget.
    pub overflowed: bool,
}

/// Session lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// More pages may be produced.
    Ready,
    /// Source exhausted, page cap reached, or a collaborator failed.
    Finished,
    /// Cancelled at a page boundary.
    Aborted,
}

/// Runtime diagnostics emitted by a session.
#[derive(Clone, Debug, PartialEq)]
pub enum PaginateDiagnostic {
    PageEmitted {
        number: usize,
        height: f32,
    },
    /// A unit taller than the budget was placed on its own page.
    Overflowed {
        number: usize,
        height: f32,
        budget: f32,
    },
    /// The page cap was reached while source content remained.
    Truncated {
        pages: usize,
    },
    Cancelled {
        pages: usize,
    },
}

type DiagnosticSink<'a> = Option<Box<dyn FnMut(PaginateDiagnostic) + 'a>>;

/// Lazy, cancelable page producer returned by [`paginate`].
///
/// Each call to [`PaginationSession::next_page`] (or [`Iterator::next`])
/// fills and serializes exactly one page, then hands control back to the
/// caller.
pub struct PaginationSession<'a, M: Measure + ?Sized> {
    doc: Document,
    source: NodeId,
    page: NodeId,
    measurer: &'a mut M,
    engine: Engine,
    opts: PaginateOptions,
    abort: AbortHandle,
    cancel: Option<&'a dyn CancelToken>,
    diagnostic_sink: DiagnosticSink<'a>,
    state: SessionState,
    pages_emitted: usize,
}

impl<M: Measure + ?Sized> fmt::Debug for PaginationSession<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginationSession")
            .field("opts", &self.opts)
            .field("budget", &self.engine.budget())
            .field("state", &self.state)
            .field("pages_emitted", &self.pages_emitted)
            .finish_non_exhaustive()
    }
}

/// Start paginating the children of `source` in `doc`.
pub fn paginate<'a, M: Measure + ?Sized>(
    doc: Document,
    source: NodeId,
    measurer: &'a mut M,
    opts: PaginateOptions,
) -> PaginationSession<'a, M> {
    PaginationSession::new(doc, source, measurer, opts)
}

/// Parse `markup` with the default adapter and start paginating it.
pub fn paginate_markup<'a, M: Measure + ?Sized>(
    markup: &str,
    measurer: &'a mut M,
    opts: PaginateOptions,
) -> Result<PaginationSession<'a, M>, PaginateError> {
    let mut doc = Document::new();
    let source = parse_fragment(&mut doc, markup)?;
    Ok(PaginationSession::new(doc, source, measurer, opts))
}

impl<'a, M: Measure + ?Sized> PaginationSession<'a, M> {
    pub fn new(
        mut doc: Document,
        source: NodeId,
        measurer: &'a mut M,
        opts: PaginateOptions,
    ) -> Self {
        let page_height = match opts.page_height.or_else(|| measurer.container_height()) {
            Some(height) => clamp_page_height(height),
            None => {
                log::warn!("no page height configured and no container height available");
                clamp_page_height(0.0)
            }
        };
        measurer.attach_classes(&opts.classes);
        let page = doc.create_fragment();
        Self {
            doc,
            source,
            page,
            measurer,
            engine: Engine::new(page_height),
            opts,
            abort: AbortHandle::new(),
            cancel: None,
            diagnostic_sink: None,
            state: SessionState::Ready,
            pages_emitted: 0,
        }
    }

    /// Attach an additional cancellation token.
    pub fn with_cancel(mut self, cancel: &'a dyn CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Register or replace the diagnostics sink.
    pub fn set_diagnostic_sink<F>(&mut self, sink: F)
    where
        F: FnMut(PaginateDiagnostic) + 'a,
    {
        self.diagnostic_sink = Some(Box::new(sink));
    }

    fn emit_diagnostic(&mut self, diagnostic: PaginateDiagnostic) {
        if let Some(sink) = self.diagnostic_sink.as_mut() {
            sink(diagnostic);
        }
    }

    /// Handle that cancels this session from anywhere, including other threads.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Cancel the session. No further pages are produced.
    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pages_emitted(&self) -> usize {
        self.pages_emitted
    }

    /// Effective page budget.
    pub fn page_height(&self) -> f32 {
        self.engine.budget()
    }

    /// Markup of the source content not yet placed on any page.
    pub fn remaining_markup(&self) -> String {
        inner_markup(&self.doc, self.source)
    }

    /// Consume the session and return the markup that was never paginated,
    /// e.g. content dropped by the page cap.
    pub fn into_remaining_markup(self) -> String {
        self.remaining_markup()
    }

    fn is_cancelled(&self) -> bool {
        self.abort.is_aborted() || self.cancel.is_some_and(|cancel| cancel.is_cancelled())
    }

    /// Produce the next page, or `None` once the session has ended.
    pub fn next_page(&mut self) -> Option<Result<Page, PaginateError>> {
        if self.state != SessionState::Ready {
            return None;
        }
        if self.is_cancelled() {
            log::debug!("pagination cancelled after {} page(s)", self.pages_emitted);
            self.state = SessionState::Aborted;
            self.doc.clear_children(self.page);
            let pages = self.pages_emitted;
            self.emit_diagnostic(PaginateDiagnostic::Cancelled { pages });
            return None;
        }
        if !self.doc.has_children(self.source) {
            self.state = SessionState::Finished;
            return None;
        }
        if let Some(max) = self.opts.resolved_max_pages() {
            if self.pages_emitted >= max {
                log::warn!(
                    "page cap of {} reached; remaining content was not paginated",
                    max
                );
                self.state = SessionState::Finished;
                let pages = self.pages_emitted;
                self.emit_diagnostic(PaginateDiagnostic::Truncated { pages });
                return None;
            }
        }

        self.doc.clear_children(self.page);
        let report =
            match self
                .engine
                .fill_page(&mut self.doc, self.source, self.page, &mut *self.measurer)
            {
                Ok(report) => report,
                Err(err) => {
                    log::warn!(
                        "measurement failed on page {}; unplaced content kept in the source",
                        self.pages_emitted + 1
                    );
                    self.state = SessionState::Finished;
                    return Some(Err(err.into()));
                }
            };

        let page_is_empty = !self.doc.has_children(self.page);
        match report.fill {
            PageFill::Exhausted => self.state = SessionState::Finished,
            PageFill::Break if page_is_empty => {
                log::error!(
                    "page {} ended without content while source remains; stopping",
                    self.pages_emitted + 1
                );
                self.state = SessionState::Finished;
            }
            PageFill::Break => {}
        }
        if page_is_empty && self.pages_emitted > 0 {
            return None;
        }

        let markup = inner_markup(&self.doc, self.page);
        self.doc.clear_children(self.page);
        self.pages_emitted += 1;
        let number = self.pages_emitted;

        if self.opts.trace {
            log::debug!(
                "page {}: height={} budget={} committed={} measurements={}",
                number,
                report.height,
                self.engine.budget(),
                report.committed,
                report.measurements
            );
        }
        if report.overflowed {
            let budget = self.engine.budget();
            log::warn!(
                "page {} holds an unbreakable unit of height {} over budget {}",
                number,
                report.height,
                budget
            );
            self.emit_diagnostic(PaginateDiagnostic::Overflowed {
                number,
                height: report.height,
                budget,
            });
        }
        self.emit_diagnostic(PaginateDiagnostic::PageEmitted {
            number,
            height: report.height,
        });

        Some(Ok(Page {
            number,
            markup,
            height: report.height,
            overflowed: report.overflowed,
        }))
    }

    /// Produce the next page after yielding to the tokio scheduler.
    ///
    /// The first page is produced without yielding.
    #[cfg(feature = "async")]
    pub async fn next_page_async(&mut self) -> Option<Result<Page, PaginateError>> {
        if self.pages_emitted > 0 && self.state == SessionState::Ready {
            tokio::task::yield_now().await;
        }
        self.next_page()
    }

    /// Produce every remaining page, handing each to `on_page`.
    ///
    /// Returns the number of pages delivered.
    pub fn drain_pages<F>(&mut self, mut on_page: F) -> Result<usize, PaginateError>
    where
        F: FnMut(Page),
    {
        let mut delivered = 0usize;
        while let Some(page) = self.next_page() {
            on_page(page?);
            delivered += 1;
        }
        Ok(delivered)
    }
}

impl<M: Measure + ?Sized> Iterator for PaginationSession<'_, M> {
    type Item = Result<Page, PaginateError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_page()
    }
}

impl<M: Measure + ?Sized> std::iter::FusedIterator for PaginationSession<'_, M> {}

/// Pagination error.
#[derive(Debug)]
pub enum PaginateError {
    /// The measurement surface failed.
    Measure(MeasureError),
    /// Input markup could not be parsed.
    Markup(MarkupError),
}

impl fmt::Display for PaginateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measure(err) => write!(f, "pagination failed: {}", err),
            Self::Markup(err) => write!(f, "pagination input rejected: {}", err),
        }
    }
}

impl std::error::Error for PaginateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Measure(err) => Some(err),
            Self::Markup(err) => Some(err),
        }
    }
}

impl From<MeasureError> for PaginateError {
    fn from(value: MeasureError) -> Self {
        Self::Measure(value)
    }
}

impl From<MarkupError> for PaginateError {
    fn from(value: MarkupError) -> Self {
        Self::Markup(value)
    }
}
