//! Reference documentation for the interview engine.
//!
//! - `DocSource` searches and reads documentation pages (`DevDocsClient`
//!   talks to a DevDocs server, `InMemoryDocSource` serves fixtures).
//! - `clean_html` turns a page into plain text.
//! - `DocumentStore` holds loaded pages and implements `Retriever`.
//! - `DocLoader` pulls pages for a technology into the store.

pub mod devdocs;
pub mod html;
pub mod loader;
pub mod source;
pub mod store;

pub use devdocs::DevDocsClient;
pub use html::clean_html;
pub use loader::DocLoader;
pub use source::{DocHit, DocSource, InMemoryDocSource};
pub use store::{Document, DocumentStore, FixedRetriever, Retriever};
