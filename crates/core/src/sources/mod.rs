pub mod fs;

pub use fs::FsDocumentSource;
