pub mod chunker;
pub mod domain;
pub mod ports;
pub mod prompt;

pub use chunker::chunk_text;
pub use domain::{
    ChatMessage, Document, DocumentChunk, DocumentFormat, MessageType, User, DEFAULT_CHUNK_SIZE,
    MAX_UPLOAD_BYTES,
};
pub use ports::{
    DatabaseService, FileStorage, InsightGenerationService, PortError, PortResult,
    TextExtractionService,
};
