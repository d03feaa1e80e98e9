//! Traversal and split engine: fills one page at a time.
//!
//! The engine walks the source tree depth-first and moves nodes into the page
//! tree one at a time, measuring after every move. On overflow the offending
//! node goes back to the source and an empty clone takes its place on the
//! page; the engine then descends into the node, splits its text at a break
//! point, or defers it to the next page.

use folio::{break_unit_end, break_units, Document, NodeId};

use crate::continuation;
use crate::measure::{Measure, MeasureError};

/// Replace a non-positive or NaN page height with the smallest usable budget.
pub fn clamp_page_height(height: f32) -> f32 {
    if height.is_nan() || height <= 0.0 {
        log::debug!("page height {} clamped to 1", height);
        return 1.0;
    }
    height
}

/// How a page fill ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageFill {
    /// The page is full; the source still holds content.
    Break,
    /// The source tree has been consumed completely.
    Exhausted,
}

/// Result of one [`Engine::fill_page`] call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FillReport {
    pub fill: PageFill,
    /// Last measured height of the kept page content.
    pub height: f32,
    /// An atomic unit taller than the budget was placed to make progress.
    pub overflowed: bool,
    /// Nodes (or text prefixes) committed to the page.
    pub committed: usize,
    /// Measurement calls made for this page.
    pub measurements: usize,
}

/// Source container paired with its clone on the page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Frame {
    source: NodeId,
    target: NodeId,
}

/// Page filler. Holds the traversal state for the page being built.
#[derive(Clone, Debug)]
pub struct Engine {
    budget: f32,
    stack: Vec<Frame>,
    /// Empty clone on the page that is not (yet) a frame target.
    probe: Option<NodeId>,
    committed: usize,
    height: f32,
    overflowed: bool,
    measurements: usize,
}

impl Engine {
    /// Create an engine for pages of `page_height` layout units.
    pub fn new(page_height: f32) -> Self {
        Self {
            budget: clamp_page_height(page_height),
            stack: Vec::with_capacity(16),
            probe: None,
            committed: 0,
            height: 0.0,
            overflowed: false,
            measurements: 0,
        }
    }

    /// Effective page budget after clamping.
    pub fn budget(&self) -> f32 {
        self.budget
    }

    /// Move as much of `source` into `page` as fits the budget.
    ///
    /// `page` should be empty. On return `source` starts at the first node
    /// that was not consumed. On a measurement failure everything moved onto
    /// the page is returned to `source` and `page` is left empty.
    pub fn fill_page<M: Measure + ?Sized>(
        &mut self,
        doc: &mut Document,
        source: NodeId,
        page: NodeId,
        measurer: &mut M,
    ) -> Result<FillReport, MeasureError> {
        self.stack.clear();
        self.stack.push(Frame {
            source,
            target: page,
        });
        self.probe = None;
        self.committed = 0;
        self.height = 0.0;
        self.overflowed = false;
        self.measurements = 0;

        let fill = match self.walk(doc, page, measurer) {
            Ok(fill) => fill,
            Err(err) => {
                self.restore(doc);
                self.stack.clear();
                return Err(err);
            }
        };
        if fill == PageFill::Break {
            self.settle(doc, source);
        }
        self.probe = None;
        self.stack.clear();

        Ok(FillReport {
            fill,
            height: self.height,
            overflowed: self.overflowed,
            committed: self.committed,
            measurements: self.measurements,
        })
    }

    fn walk<M: Measure + ?Sized>(
        &mut self,
        doc: &mut Document,
        page: NodeId,
        measurer: &mut M,
    ) -> Result<PageFill, MeasureError> {
        loop {
            let Some(frame) = self.stack.last().copied() else {
                log::error!("frame stack emptied below the source root; ending page");
                return Ok(PageFill::Exhausted);
            };
            let Some(child) = doc.first_child(frame.source) else {
                if self.stack.len() == 1 {
                    return Ok(PageFill::Exhausted);
                }
                // Everything in this container made it onto the page.
                self.stack.pop();
                doc.remove(frame.source);
                continue;
            };

            doc.append(frame.target, child);
            let height = self.measure(doc, page, measurer)?;
            if height <= self.budget {
                self.height = height;
                self.committed += 1;
                continue;
            }

            // `child` overflows: put it back and probe with an empty shell.
            let Some(probe) = doc.empty_clone(child) else {
                doc.prepend(frame.source, child);
                return Ok(PageFill::Break);
            };
            doc.prepend(frame.source, child);
            doc.append(frame.target, probe);
            self.probe = Some(probe);

            let forced = self.committed == 0;
            let shell_height = self.measure(doc, page, measurer)?;
            if shell_height > self.budget && !forced {
                self.probe = None;
                doc.remove(probe);
                return Ok(PageFill::Break);
            }

            if doc.is_text(child) {
                self.split_text(doc, page, frame, child, probe, forced, measurer)?;
                self.probe = None;
                return Ok(PageFill::Break);
            }

            self.probe = None;
            if doc.has_children(child) {
                self.stack.push(Frame {
                    source: child,
                    target: probe,
                });
                continue;
            }

            // Leaf element: cannot be split.
            doc.remove(probe);
            if forced {
                doc.append(frame.target, child);
                self.height = height;
                self.committed += 1;
                self.overflowed = true;
            }
            return Ok(PageFill::Break);
        }
    }

    /// Keep the longest breakable prefix of `child` that fits in `probe`,
    /// leaving the rest in the source.
    #[allow(clippy::too_many_arguments)]
    fn split_text<M: Measure + ?Sized>(
        &mut self,
        doc: &mut Document,
        page: NodeId,
        frame: Frame,
        child: NodeId,
        probe: NodeId,
        forced: bool,
        measurer: &mut M,
    ) -> Result<(), MeasureError> {
        let text = doc.text(child).unwrap_or_default().to_owned();
        let mut kept = 0usize;
        let mut first_height = None;

        for end in break_units(&text) {
            doc.set_text(probe, &text[..end]);
            let height = self.measure(doc, page, measurer)?;
            first_height.get_or_insert(height);
            if height > self.budget {
                break;
            }
            kept = end;
            self.height = height;
        }

        if kept == 0 {
            if !forced {
                doc.remove(probe);
                return Ok(());
            }
            kept = break_unit_end(&text, 0);
            if let Some(height) = first_height {
                self.height = height;
            }
            self.overflowed = true;
        }

        self.committed += 1;
        if kept >= text.len() {
            doc.remove(probe);
            doc.append(frame.target, child);
        } else {
            doc.set_text(probe, &text[..kept]);
            doc.set_text(child, &text[kept..]);
        }
        Ok(())
    }

    /// Undo a partial fill: move every page node back in front of its source
    /// container, deepest frame first, and drop the clones.
    ///
    /// Text is only split after the last measurement of a fill, so a pending
    /// text probe holds a copy of a prefix and is simply dropped.
    fn restore(&mut self, doc: &mut Document) {
        if let Some(probe) = self.probe.take() {
            doc.remove(probe);
        }
        for idx in (0..self.stack.len()).rev() {
            let frame = self.stack[idx];
            let nested = self.stack.get(idx + 1).map(|inner| inner.target);
            while let Some(child) = doc.last_child(frame.target) {
                if Some(child) == nested {
                    doc.remove(child);
                } else {
                    doc.prepend(frame.source, child);
                }
            }
        }
    }

    /// Unwind the frame stack after a page break, deepest frame first.
    ///
    /// Clones that received nothing are dropped (their node moves to the next
    /// page whole), fully consumed source containers are dropped, and split
    /// containers get their list continuation hints.
    fn settle(&mut self, doc: &mut Document, source_root: NodeId) {
        let mut deepest_split: Option<usize> = None;
        for idx in (1..self.stack.len()).rev() {
            let frame = self.stack[idx];
            if !doc.has_children(frame.target) {
                doc.remove(frame.target);
                continue;
            }
            if !doc.has_children(frame.source) {
                doc.remove(frame.source);
                continue;
            }
            let child_split = deepest_split.is_some_and(|deepest| deepest > idx);
            deepest_split.get_or_insert(idx);

            if doc.is_element(frame.source, "ol") {
                let mut consumed = doc
                    .children(frame.target)
                    .filter(|item| doc.is_element(*item, "li"))
                    .count();
                // The split item is continued, not consumed.
                let continued_item = doc
                    .first_child(frame.source)
                    .filter(|item| child_split && doc.is_element(*item, "li"));
                if continued_item.is_some() {
                    consumed = consumed.saturating_sub(1);
                }
                continuation::advance_list_start(doc, frame.source, consumed);
            }
        }

        let deferred = deepest_split
            .map(|idx| self.stack[idx].source)
            .and_then(|container| doc.first_child(container));
        if let Some(deferred) = deferred {
            continuation::mark_ancestor_list_items(doc, deferred, source_root);
        }
    }

    fn measure<M: Measure + ?Sized>(
        &mut self,
        doc: &Document,
        page: NodeId,
        measurer: &mut M,
    ) -> Result<f32, MeasureError> {
        self.measurements += 1;
        measurer.measure(doc, page)
    }
}
