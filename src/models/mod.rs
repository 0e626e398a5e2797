pub mod requests;
pub mod responses;

pub use requests::ConvertRequest;
pub use responses::{
    AudioChunk, ChunkFailureInfo, ConvertResponse, HealthResponse, VoiceInfo, VoicesResponse,
};
