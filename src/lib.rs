pub mod api;
pub mod config;
pub mod database;
pub mod deck_service;
pub mod errors;
pub mod extract;
pub mod generator;
pub mod ingestion;
pub mod llm_providers;
pub mod logging;
pub mod models;
pub mod progress;
pub mod scheduler;

pub use config::Config;
pub use database::Database;
pub use deck_service::DeckService;
pub use errors::*;
pub use generator::ItemGenerator;
pub use ingestion::{IngestionPipeline, IngestionReport, IngestionSettings, IngestionTicket};
pub use llm_providers::{LlmProvider, LlmProviderType, TextCompleter};
pub use models::*;
