pub mod chunker;
pub mod embeddings;
pub mod pipeline;
pub mod retriever;
pub mod synthesizer;

pub use chunker::{ChunkSpan, TextChunker};
pub use embeddings::{EmbeddingProvider, EmbeddingService, GeminiEmbedder, OpenAiEmbedder};
pub use pipeline::DocumentPipeline;
pub use retriever::{RetrievalParams, Retriever};
pub use synthesizer::AnswerSynthesizer;
