//! # Recall Engine
//!
//! A local, deterministic document indexing and retrieval engine — the
//! retrieval layer behind AI terminal front-ends.
//!
//! Recall ingests heterogeneous files, derives fixed-length feature-hashed
//! embeddings for their content, stores them in a single durable artifact,
//! and answers similarity queries with ranked, cached results. The text it
//! returns is handed to an external language-model client by the front-end;
//! this engine never calls one.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────┐   ┌─────────────┐
//! │ Front-end  │──▶│  Command Router  │──▶│   Engine    │
//! │ (GUI/CLI)  │◀──│ (line in/out)    │   │  context    │
//! └────────────┘   └──────────────────┘   └──────┬──────┘
//!                                                │
//!                  ┌─────────────┬───────────────┤
//!                  ▼             ▼               ▼
//!            ┌──────────┐  ┌──────────┐   ┌───────────┐
//!            │ Normalize│  │  Embed   │   │   Store   │
//!            │ + chunk  │─▶│ (256-d)  │──▶│ + arena   │
//!            └──────────┘  └──────────┘   └─────┬─────┘
//!                                               │ snapshot
//!                               ┌───────────┐   ▼
//!                               │   Cache   │◀─ Query
//!                               │  (LRU)    │   engine
//!                               └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! recall add ./docs                       # index a directory
//! recall add-text t1 "the quick brown fox"
//! recall search "quick fox"
//! recall ask "what does the deploy script do?"
//! recall serve                            # line protocol for front-ends
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Engine error taxonomy |
//! | [`normalize`] | Format detection and chunk extraction |
//! | [`embedding`] | Deterministic feature-hash embeddings |
//! | [`store`] | Document store, arena, persistence |
//! | [`query`] | Similarity ranking and extraction |
//! | [`cache`] | Generation-stamped LRU result cache |
//! | [`ingest`] | Filesystem ingestion pipeline |
//! | [`engine`] | Engine context object |
//! | [`router`] | Verb/argument command protocol |

pub mod cache;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod query;
pub mod router;
pub mod store;
