pub mod codec;
pub mod config;
pub mod decoder;
pub mod discovery;
pub mod orchestrator;
pub mod transport;

pub use codec::{encode, IMAGE_SIZE_TIER};
pub use config::EngineConfig;
pub use decoder::{decode, DecodeError};
pub use discovery::discover_models;
pub use orchestrator::{BatchError, BatchOrchestrator};
pub use transport::{GeminiTransport, GenerationTransport, TransportError};
