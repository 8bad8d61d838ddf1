//! # Coderag Vector Store
//!
//! The document model shared by the retrieval engine, the per-item search
//! filters, and the narrow contracts the engine needs from a vector store.
//!
//! Vectors are never produced here. A deployment either plugs in its own
//! [`VectorSearch`] implementation, uses [`InMemoryVectorStore`] with an
//! [`Embedder`] of its choice, or runs lexical-only with [`NoopVectorSearch`].
//!
//! ## Example
//!
//! ```no_run
//! use coderag_vector_store::{Document, NoopVectorSearch, VectorQuery, VectorSearch};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), coderag_vector_store::VectorStoreError> {
//!     let store = NoopVectorSearch;
//!     let hits = store.search(&VectorQuery::new("async function"), 5).await?;
//!
//!     println!("Found {} similar fragments", hits.len());
//!     let _doc = Document::new("id", "fn main() {}");
//!     Ok(())
//! }
//! ```

mod adapter;
mod chunk;
mod error;
mod filter;
mod store_simple;

pub use adapter::{DocumentSource, Embedder, NoopVectorSearch, VectorHit, VectorQuery, VectorSearch};
pub use chunk::{ContentType, Document, InvalidDocument};
pub use error::VectorStoreError;
pub use filter::{ContentTypeFilter, SearchFilters};
pub use store_simple::{InMemoryVectorStore, VectorStoreConfig};
