use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Arg, ArgAction, value_parser};
use eyre::WrapErr;
use libtubetag_pipeline::tubetag::{
    FfmpegTranscoder, Pipeline, Settings, TagFailurePolicy, TranscodeIo, YtDlpMediaSource,
    find_exe,
};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tubetagd::{AppState, clap_base_command, router, server_port};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        // a missing .env file is normal
        if !e.not_found() {
            eprintln!("error loading .env: {e}");
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let matches = clap_base_command()
        .name("tubetagd")
        .about("Downloads audio and serves it back as a tagged mp3")
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .value_parser(value_parser!(u16))
                .help("Port to listen on. Defaults to $PORT or 5000"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .default_value("0.0.0.0")
                .help("Address to bind to"),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .short('w')
                .value_parser(value_parser!(usize))
                .help("Max number of requests processed at once. Defaults to the number of CPUs"),
        )
        .arg(
            Arg::new("pipe")
                .long("pipe")
                .action(ArgAction::SetTrue)
                .help("Stream audio to and from ffmpeg over stdin/stdout instead of temp files"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_parser(value_parser!(u64))
                .help("Per-stage timeout in seconds"),
        )
        .arg(
            Arg::new("scratch-dir")
                .long("scratch-dir")
                .value_parser(value_parser!(PathBuf))
                .help("Directory for per-request temp files"),
        )
        .arg(
            Arg::new("untagged-on-failure")
                .long("untagged-on-failure")
                .action(ArgAction::SetTrue)
                .help("Return untagged audio instead of failing when tagging fails"),
        )
        .get_matches();

    let port = match matches.get_one::<u16>("port") {
        Some(port) => *port,
        None => server_port().wrap_err("PORT is not a valid port number")?,
    };
    let host = matches
        .get_one::<String>("host")
        .map(String::as_str)
        .unwrap_or("0.0.0.0");
    let workers = matches
        .get_one::<usize>("workers")
        .copied()
        .unwrap_or_else(num_cpus::get);

    let defaults = Settings::default();
    let settings = Settings {
        transcode_io: if matches.get_flag("pipe") {
            TranscodeIo::pipes()
        } else {
            TranscodeIo::default()
        },
        stage_timeout: matches
            .get_one::<u64>("timeout")
            .map(|s| Duration::from_secs(*s))
            .unwrap_or(defaults.stage_timeout),
        scratch_dir: matches.get_one::<PathBuf>("scratch-dir").cloned(),
        tag_failure: if matches.get_flag("untagged-on-failure") {
            TagFailurePolicy::Untagged
        } else {
            TagFailurePolicy::Fail
        },
        ..defaults
    };
    if settings.tag_failure == TagFailurePolicy::Untagged {
        warn!("tagging failures will return untagged audio");
    }

    let source = YtDlpMediaSource::new(&settings).wrap_err("error configuring yt-dlp")?;
    let ffmpeg_path = find_exe(settings.ffmpeg_path.as_deref(), "FFMPEG_PATH", "ffmpeg")
        .wrap_err("error configuring ffmpeg")?;
    let transcoder = FfmpegTranscoder::new(ffmpeg_path, settings.transcode_io);
    let pipeline = Pipeline::new(Arc::new(source), Arc::new(transcoder), settings);

    let listener = TcpListener::bind((host, port))
        .await
        .wrap_err_with(|| format!("error binding to {host}:{port}"))?;
    info!(
        "listening on {} with {workers} worker(s)",
        listener.local_addr()?
    );

    axum::serve(listener, router(AppState::new(pipeline, workers)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received ctrl-c, shutting down"),
        Err(e) => warn!("unable to listen for ctrl-c: {e:?}"),
    }
}
