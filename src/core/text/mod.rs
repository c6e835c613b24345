//! Text chunking: boundary selection and document splitting.

mod boundary;
mod chunker;

pub use boundary::{BoundaryPolicy, find_boundary};
pub use chunker::{TextChunk, chunk_document};
