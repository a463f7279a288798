pub mod pinecone;
pub mod vectorstore;

pub use pinecone::PineconeIndex;
pub use vectorstore::{
    namespace_for, record_id, ChunkMetadata, InMemoryIndex, IndexStats, MatchFilter, QueryMatch,
    VectorIndex, VectorRecord,
};
