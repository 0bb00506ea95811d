//! # marginalia
//!
//! Collects e-reader annotation exports (KOReader-style `metadata.*.lua`
//! files) from multiple devices and merges them into a canonical per-book
//! highlight database, deduplicated across devices.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────┐   ┌────────────┐   ┌──────────┐
//! │  Discovery   │──▶│ Parser  │──▶│ Classifier │──▶│  Import   │
//! │ device dirs  │   │ Lua tbl │   │  (kind)    │   │  engine   │
//! └──────────────┘   └─────────┘   └────────────┘   └────┬─────┘
//!                                                        ▼
//!                                                  ┌──────────┐
//!                                                  │  SQLite   │
//!                                                  │ books/hl  │
//!                                                  └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! marg init                       # create database
//! marg scan                       # import from all configured roots
//! marg scan --path /mnt/kobo      # import one base directory
//! marg stats                      # what has been collected
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and the annotation classifier |
//! | [`parser`] | Annotation-file (Lua table) parser |
//! | [`discover`] | Device-folder file discovery |
//! | [`ingest`] | Import/dedup engine and scan orchestration |
//! | [`store`] | Storage abstraction (SQLite + in-memory) |
//! | [`stats`] | Database summary |
//! | [`sources`] | Source-root listing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod discover;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod parser;
pub mod sources;
pub mod stats;
pub mod store;
