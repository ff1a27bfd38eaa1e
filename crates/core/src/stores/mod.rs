pub mod memory;
pub mod qdrant;

pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantVectorStore;
