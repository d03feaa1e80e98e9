//! Incremental pagination of HTML fragments.
//!
//! A [`PaginationSession`] moves content from a source fragment onto page
//! fragments one page at a time, asking a [`Measure`] implementation for the
//! height of each candidate page. Text is split only at break opportunities
//! (see [`folio::next_break_offset`]) and element structure is preserved on
//! both sides of a split: the page receives a shallow clone of every
//! container it descends into while the remainder stays in the source.
//!
//! ```
//! use folio_paginate::{paginate_markup, ChildCountMeasurer, PaginateOptions};
//!
//! let mut measurer = ChildCountMeasurer;
//! let opts = PaginateOptions::default().with_page_height(1.0);
//! let pages: Vec<String> = paginate_markup("<p>one</p><p>two</p>", &mut measurer, opts)
//!     .expect("valid markup")
//!     .map(|page| page.expect("page").markup)
//!     .collect();
//! assert_eq!(pages, ["<p>one</p>", "<p>two</p>"]);
//! ```

#![cfg_attr(
    not(test),
    deny(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

pub mod continuation;
pub mod engine;
mod measure;
mod session;

pub use continuation::{
    advance_list_start, list_start, mark_ancestor_list_items, mark_follow_up, strip_follow_up,
    FOLLOW_UP_CLASS,
};
pub use engine::{clamp_page_height, Engine, FillReport, PageFill};
pub use measure::{
    ChildCountMeasurer, LineEstimateConfig, LineEstimateMeasurer, Measure, MeasureError,
    MeasureFn,
};
pub use session::{
    paginate, paginate_markup, AbortHandle, CancelToken, NeverCancel, Page, PaginateDiagnostic,
    PaginateError, PaginateOptions, PaginationSession, SessionState,
};
