//! Document index for Curator.
//!
//! Loads a community-scoped corpus of `.md`/`.txt` files, embeds each
//! document, and answers nearest-neighbor queries by L2 distance. The
//! retrieved text becomes the context block of the prompt.

pub mod corpus;
pub mod handle;
pub mod index;
pub mod vector;

pub use corpus::{Document, load_corpus};
pub use handle::IndexHandle;
pub use index::{CONTEXT_SEPARATOR, DEFAULT_TOP_K, DocumentIndex, SearchHit};
