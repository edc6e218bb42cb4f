pub mod db;
pub mod extractor;
pub mod insight_llm;
pub mod storage;

pub use db::DbAdapter;
pub use extractor::LocalTextExtractor;
pub use insight_llm::GeminiInsightAdapter;
pub use storage::LocalFileStorage;
