pub mod core;
pub mod engine;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod server;
pub mod state;
pub mod transcript;
