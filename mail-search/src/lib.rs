//! mail-search: hybrid keyword + semantic search over stored mail
//!
//! Turns a natural-language query such as
//! `"important invoices from december 2024"` into structured filters, runs a
//! keyword search against the message store and a vector search against the
//! embedding index, fuses both ranked lists and applies the filters.
//!
//! Collaborator failures degrade the search instead of failing it: the
//! returned [`search::SearchReport`] lists whatever went wrong next to the
//! results that were still found.
//!
//! # Example
//!
//! ```no_run
//! use mail_search::embedding::MockEmbedder;
//! use mail_search::search::{SearchSettings, SearchWorkflow};
//! use mail_search::store::{MemoryVectorStore, SqliteMessageStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteMessageStore::connect("sqlite://mail-search.db").await?;
//!     let workflow = SearchWorkflow::new(
//!         Arc::new(store),
//!         Arc::new(MemoryVectorStore::new(64)),
//!         Arc::new(MockEmbedder::new(64)),
//!         SearchSettings::default(),
//!     )?;
//!
//!     let report = workflow.search_emails("meetings last week", 1, 20).await;
//!     println!("{} results", report.total_results);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`search`]: Query parsing, retrieval, fusion, filtering and the workflow
//! - [`store`]: Message store and vector store
//! - [`embedding`]: Embedding providers
//! - [`indexing`]: Embedding sync for stored messages
//! - [`api`]: HTTP API
//! - [`config`]: Configuration management
//! - [`error`]: Error types

pub mod api;
pub mod config;
pub mod embedding;
pub mod error;
pub mod indexing;
pub mod search;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SearchError};
pub use search::{SearchReport, SearchWorkflow};
