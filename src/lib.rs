pub mod api;
pub mod database_ops;
pub mod env_boot;
pub mod ingest;
pub mod orchestrator;

pub mod util {
    pub mod env;
    pub mod logging;
}

pub use ingest::models::{BatchResult, GameRecord, IngestionItem, SourceKind};
pub use orchestrator::IngestionOrchestrator;
