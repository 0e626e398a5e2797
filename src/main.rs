use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use tts_relay::cli::{self, Command, ConvertArgs, Input};
use tts_relay::config::Config;
use tts_relay::error::{Result, TtsError};
use tts_relay::logging::{self, LogConfig};
use tts_relay::playback::{FileSink, SinkChain};
use tts_relay::server::{create_router, AppState};
use tts_relay::session::{FailurePolicy, Session};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if it exists (silently ignore if it doesn't)
    let _ = dotenvy::dotenv();

    let command = match cli::parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run with --help for usage.");
            return ExitCode::from(2);
        }
    };

    match command {
        Command::Help => {
            cli::print_help();
            return ExitCode::SUCCESS;
        }
        Command::Version => {
            cli::print_version();
            return ExitCode::SUCCESS;
        }
        _ => {}
    }

    let _log_guard = match logging::init_logging(&LogConfig::from_env()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::log_platform_info();

    let result = match command {
        Command::Server { port } => run_server(port).await,
        Command::Convert(args) => run_convert(args).await,
        Command::Help | Command::Version => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(TtsError::Cancelled) => {
            eprintln!("Stopped.");
            ExitCode::from(130)
        }
        Err(TtsError::Aggregate(failure)) => {
            for line in failure.lines() {
                eprintln!("{}", line);
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> Result<Config> {
    let config = Config::from_env()?;
    tracing::info!(
        "Endpoint {} (key {}), model {}, voice {}, {} workers, {} chars per chunk",
        config.endpoint,
        config.api_key.masked(),
        config.model,
        config.voice,
        config.max_workers,
        config.max_chars
    );
    Ok(config)
}

async fn run_server(port: u16) -> Result<()> {
    let config = load_config()?;
    let max_workers = config.max_workers;
    let state = AppState::new(config)?;

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("tts_relay v{}", env!("CARGO_PKG_VERSION"));
    println!("Server listening on http://{}", addr);
    println!("\nAvailable endpoints:");
    println!("  POST   /api/convert        - Convert text, chunks returned as base64");
    println!("  POST   /api/convert/audio  - Convert text, joined audio returned");
    println!("  GET    /voices             - List available voices");
    println!("  GET    /health             - Health check");
    println!("  GET    /stats              - Dispatcher statistics");
    println!("\nAt most {} synthesis requests in flight across all clients", max_workers);
    println!("  Set TTS_MAX_WORKERS to change");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}

async fn run_convert(args: ConvertArgs) -> Result<()> {
    let mut config = load_config()?;
    if let Some(voice) = args.voice {
        config = config.with_voice(voice);
    }

    let (text, stem) = match &args.input {
        Input::Text(text) => (text.clone(), "speech".to_string()),
        Input::File(path) => (tokio::fs::read_to_string(path).await?, file_stem(path)),
    };
    if text.trim().is_empty() {
        return Err(TtsError::EmptyText);
    }

    let voice = config.voice;
    let format = config.response_format;
    let session = Arc::new(Session::new(config)?);

    // Ctrl-C stops the run and cuts any audio that is playing short
    let device_stop = CancellationToken::new();
    let stopper = session.clone();
    let device_stopper = device_stop.clone();
    let cancel_watch = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.stop();
            device_stopper.cancel();
        }
    });

    let mut sink = SinkChain::new().push(FileSink::new(&args.out_dir, stem.clone(), format));
    if args.play {
        sink = with_device(sink, device_stop)?;
    }

    let policy = if args.strict {
        FailurePolicy::AbortOnFailure
    } else {
        FailurePolicy::SkipFailed
    };

    let outcome = session.convert_and_play(&text, voice, &mut sink, policy).await;
    cancel_watch.abort();
    let report = outcome?;

    if report.total_chunks() == 0 {
        println!("Nothing to convert.");
        return Ok(());
    }

    let Some(summary) = report.playback else {
        println!(
            "Nothing played: {} of {} chunks failed (--strict)",
            report.total_chunks() - report.sequence.succeeded(),
            report.total_chunks()
        );
        report.report()?;
        return Ok(());
    };
    println!(
        "Converted {} of {} chunks in {:.1}s",
        summary.played,
        report.total_chunks(),
        report.elapsed.as_secs_f64()
    );
    if summary.played > 0 {
        println!(
            "Audio saved to {}",
            args.out_dir.join(format!("{}.{}", stem, format.extension())).display()
        );
    }

    report.report()?;
    Ok(())
}

#[cfg(feature = "playback")]
fn with_device(sink: SinkChain, stop: CancellationToken) -> Result<SinkChain> {
    Ok(sink.push(tts_relay::playback::RodioSink::new(stop)))
}

#[cfg(not(feature = "playback"))]
fn with_device(_sink: SinkChain, _stop: CancellationToken) -> Result<SinkChain> {
    Err(TtsError::Playback(
        "built without the `playback` feature; rebuild with --features playback".to_string(),
    ))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("speech")
        .to_string()
}
