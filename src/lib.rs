//! shelfwatch: announces e-books newly added to a library catalogue as an
//! Atom feed.
//!
//! A run walks the catalogue's "recently added" listing page by page,
//! compares the records found against the feed written by the previous run,
//! drops entries past the retention window and appends the new ones. The
//! feed file is the only state kept between runs.

pub mod catalogue;
pub mod config;
pub mod feed;
pub mod sync;
