//! # Sheetsync Engine
//!
//! Two-way reconciliation between a relational database and a spreadsheet
//! holding overlapping copies of the same entities.
//!
//! This crate provides the pure half of a sync run: turning raw sheet cells
//! into typed snapshots, deciding which side wins each row, and planning the
//! inserts, deletions and sheet writes that make both stores agree. It
//! performs no I/O; the server crate drives the stores.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine only sees snapshots and returns plans
//! - **Deterministic**: same snapshots in, same plans out, in id order
//! - **Typed at the boundary**: cell text is parsed once, in [`normalize`]
//!
//! ## Core Concepts
//!
//! ### Entities
//!
//! [`Category`] and [`Word`] are the synced collections. A row without an id
//! exists only on the sheet so far. Words are deleted softly via a flag;
//! categories are removed only once no live word references them.
//!
//! ### Snapshots
//!
//! A [`Snapshot`] is a point-in-time read of one collection from one store,
//! tagged with its [`Origin`].
//!
//! ### Resolution
//!
//! [`resolve`] outer-joins a sheet snapshot and a database snapshot on id.
//! The strictly later `updated_at` wins the whole row, one-sided rows flow to
//! the side lacking them, and equal timestamps produce no write.
//!
//! ## Quick Start
//!
//! ```rust
//! use sheetsync_engine::{resolve, Category, Outcome, Snapshot};
//! use chrono::{TimeZone, Utc};
//!
//! let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
//! let t2 = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();
//!
//! let sheet = Snapshot::from_sheet(t2, vec![Category::stored(5, "Beasts", t2)]);
//! let database = Snapshot::from_database(t2, vec![Category::stored(5, "Animals", t1)]);
//!
//! let resolution = resolve(&sheet, &database);
//! assert_eq!(resolution.outcome(5), Some(Outcome::ApplyToDatabase));
//! assert_eq!(resolution.to_database[0].name, "Beasts");
//! ```

pub mod deletion;
pub mod error;
pub mod insert;
pub mod merge;
pub mod normalize;
pub mod reconcile;
pub mod record;
pub mod snapshot;
pub mod summary;

// Re-export main types at crate root
pub use deletion::{missing_categories, plan_category_deletions, plan_word_deletions, CategoryDeletions};
pub use error::{Error, RowRef};
pub use insert::{check_category, plan_inserts, CellWrite, PendingInsert};
pub use merge::{merge_back, RowUpdate, SheetWritePlan};
pub use normalize::{normalize_table, render_timestamp, Normalized, RawTable, Rejected};
pub use reconcile::{resolve, Outcome, Resolution};
pub use record::{Category, Entity, EntityKind, Word};
pub use snapshot::{Origin, Snapshot, SnapshotRow};
pub use summary::{CollectionSummary, RowError, SyncSummary};

/// Type aliases for clarity
pub type RowId = i64;
pub type Timestamp = chrono::DateTime<chrono::Utc>;
