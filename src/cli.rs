//! CLI argument parsing and help text

use std::path::PathBuf;

use crate::config::constants::DEFAULT_SERVER_PORT;
use crate::config::Voice;
use crate::error::{Result, TtsError};

/// Where the text to convert comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Text(String),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertArgs {
    pub input: Input,
    /// Overrides the configured voice
    pub voice: Option<Voice>,
    pub out_dir: PathBuf,
    /// Abort without output unless every chunk succeeds
    pub strict: bool,
    /// Play on the default output device as well as saving
    pub play: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Version,
    Server { port: u16 },
    Convert(ConvertArgs),
}

/// Parse arguments (without the program name)
pub fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut server = false;
    let mut port = DEFAULT_SERVER_PORT;
    let mut voice = None;
    let mut out_dir = PathBuf::from("tts_output");
    let mut strict = false;
    let mut play = false;
    let mut file = None;
    let mut words = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-v" | "--version" => return Ok(Command::Version),
            "--server" => server = true,
            "--strict" => strict = true,
            "--play" => play = true,
            "--port" => {
                let value = value_for(&mut args, "--port")?;
                port = value.parse().map_err(|_| {
                    TtsError::InvalidRequest(format!("invalid port '{}'", value))
                })?;
            }
            "--voice" => voice = Some(value_for(&mut args, "--voice")?.parse()?),
            "--out" => out_dir = PathBuf::from(value_for(&mut args, "--out")?),
            "--file" => file = Some(PathBuf::from(value_for(&mut args, "--file")?)),
            "--" => words.extend(args.by_ref()),
            flag if flag.starts_with("--") => {
                return Err(TtsError::InvalidRequest(format!("unknown option '{}'", flag)));
            }
            _ => words.push(arg),
        }
    }

    if server {
        return Ok(Command::Server { port });
    }

    let input = match (file, words.is_empty()) {
        (Some(_), false) => {
            return Err(TtsError::InvalidRequest(
                "give either --file or TEXT, not both".to_string(),
            ))
        }
        (Some(path), true) => Input::File(path),
        (None, false) => Input::Text(words.join(" ")),
        (None, true) => return Err(TtsError::EmptyText),
    };

    Ok(Command::Convert(ConvertArgs {
        input,
        voice,
        out_dir,
        strict,
        play,
    }))
}

fn value_for(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| TtsError::InvalidRequest(format!("{} needs a value", flag)))
}

pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!("tts_relay v{}", version);
    println!("Chunked, parallel text-to-speech for OpenAI-compatible speech APIs");
    println!();
    println!("USAGE:");
    println!("    tts_relay [OPTIONS] [TEXT]...");
    println!("    tts_relay --server [--port <PORT>]");
    println!();
    println!("OPTIONS:");
    println!("    --file <PATH>         Read the text from a file");
    println!("    --voice <VOICE>       alloy, echo, fable, onyx, nova or shimmer");
    println!("    --out <DIR>           Output directory (default: tts_output)");
    println!("    --strict              Save nothing unless every chunk succeeds");
    println!("    --play                Also play through the default output device");
    println!("    --server              Start HTTP server mode");
    println!("    --port <PORT>         Server port (default: {})", DEFAULT_SERVER_PORT);
    println!("    -h, --help            Print this help message");
    println!("    -v, --version         Print version information");
    println!();
    println!("EXAMPLES:");
    println!("    tts_relay \"Hello, world!\"");
    println!("    tts_relay --voice nova --file chapter1.txt --out chapter1");
    println!("    tts_relay --server --port 8080");
    println!();
    println!("SERVER ENDPOINTS:");
    println!("    POST   /api/convert        - Convert text, chunks returned as base64");
    println!("    POST   /api/convert/audio  - Convert text, joined audio returned");
    println!("    GET    /voices             - List available voices");
    println!("    GET    /health             - Health check");
    println!("    GET    /stats              - Dispatcher statistics");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("    TTS_ENDPOINT                 - Full speech endpoint URL (required)");
    println!("    TTS_API_KEY                  - API key (required)");
    println!("    TTS_VOICE                    - Default voice (default: alloy)");
    println!("    TTS_MODEL                    - Model name (default: gpt-4o-mini-tts)");
    println!("    TTS_RESPONSE_FORMAT          - mp3, opus, aac, flac, wav or pcm (default: mp3)");
    println!("    TTS_MAX_CHARS                - Characters per chunk, 1-4000 (default: 4000)");
    println!("    TTS_MAX_WORKERS              - Concurrent requests (default: 3)");
    println!("    TTS_REQUEST_TIMEOUT_SECONDS  - Per-request timeout (default: 30)");
    println!("    TTS_SENTENCE_TERMINATORS     - Sentence-ending characters");
    println!("    TTS_CLAUSE_SEPARATORS        - Clause-separating characters");
    println!("    TTS_RELAY_LOG_DIR            - Write a JSON log file to this directory");
    println!("    RUST_LOG                     - Log level (error/warn/info/debug/trace)");
    println!();
    println!("Settings are also read from a .env file in the current directory.");
}

pub fn print_version() {
    println!("tts_relay v{}", env!("CARGO_PKG_VERSION"));
}
