//! Content model for incremental HTML pagination.
//!
//! `folio` owns the pieces every pagination run shares:
//!
//! - [`Document`]: an arena of content nodes addressed by stable [`NodeId`]s,
//!   so nodes can be moved between a source tree and a page tree without
//!   copying.
//! - [`breaks`]: classification of break characters and the
//!   [`next_break_offset`] scan that defines the minimum split granularity.
//! - [`markup`]: default parser/serializer adapters for XHTML-style
//!   fragments.
//!
//! The pagination engine itself lives in the `folio-paginate` crate.

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

pub mod breaks;
mod error;
pub mod markup;
mod tree;

pub use breaks::{
    break_unit_end, break_units, is_breaking_char, is_non_breaking_char, next_break_offset,
    BreakUnits,
};
pub use error::MarkupError;
pub use indextree::NodeId;
pub use markup::{inner_markup, outer_markup, parse_fragment, parse_into};
pub use tree::{Attributes, Document, Element, NodeKind};
