// Library modules for the binary and integration tests
pub mod audio;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod models;
pub mod playback;
pub mod sequencer;
pub mod server;
pub mod session;
pub mod synthesis;

pub use chunking::{chunk_text, ChunkingConfig, TextChunk};
pub use config::{Config, Voice};
pub use dispatcher::{ChunkResult, Dispatcher};
pub use error::{Result, TtsError};
pub use session::{FailurePolicy, RunState, Session};
pub use synthesis::{HttpSynthesizer, Synthesizer};
