pub mod constants;
pub mod settings;
pub mod voice;

pub use settings::{ApiKey, Config};
pub use voice::{Voice, VoiceConfig};
