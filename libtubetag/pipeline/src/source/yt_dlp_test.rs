use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use rstest::*;
use tempfile::TempDir;
use tracing::Level;

use super::*;
use crate::dto::pipeline_error::{Classify, ErrorKind};
use crate::mock::{FAKE_YT_DLP_ARGS, FakeYtDlp, MockMediaSource, write_fake_yt_dlp};
use crate::source::select_audio_stream;

const SOURCE: &str = "https://www.youtube.com/watch?v=abc";

const LISTING: &str = r#"{
  "id": "abc",
  "title": "Song Title",
  "uploader": "Some Artist",
  "duration": 211.6,
  "thumbnail": "https://i.ytimg.com/vi/abc/hqdefault.jpg",
  "formats": [
    { "format_id": "140", "ext": "m4a", "acodec": "mp4a.40.2", "vcodec": "none", "abr": 129.5 },
    { "format_id": "251", "ext": "webm", "acodec": "opus", "vcodec": "none", "abr": 160.0 },
    { "format_id": "18", "ext": "mp4", "acodec": "mp4a.40.2", "vcodec": "avc1.42001E", "tbr": 500.0, "height": 360 }
  ]
}"#;

#[ctor::ctor]
fn init() {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(Level::DEBUG)
        .try_init()
        .unwrap_or_default();
}

struct FakeProvider {
    bin: TempDir,
    source: YtDlpMediaSource,
}

impl FakeProvider {
    fn new(behavior: FakeYtDlp) -> Self {
        let bin = TempDir::new().unwrap();
        let yt_dlp_path = write_fake_yt_dlp(bin.path(), &behavior).unwrap();
        let source = YtDlpMediaSource::new(&Settings {
            yt_dlp_path: Some(yt_dlp_path),
            ..Default::default()
        })
        .unwrap();
        Self { bin, source }
    }

    fn serving(media: &[u8]) -> Self {
        Self::new(FakeYtDlp::Serve {
            listing: LISTING.to_owned(),
            media: media.to_vec(),
        })
    }

    fn recorded_args(&self) -> Vec<String> {
        std::fs::read_to_string(self.bin.path().join(FAKE_YT_DLP_ARGS))
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

fn source_id() -> SourceId {
    SourceId::parse(SOURCE).unwrap()
}

#[tokio::test]
async fn inspect_maps_provider_listing() {
    let provider = FakeProvider::serving(b"");
    let listing = provider.source.inspect(&source_id()).await.unwrap();

    assert_eq!(
        MediaMetadata {
            id: "abc".to_owned(),
            title: "Song Title".to_owned(),
            author: "Some Artist".to_owned(),
            duration_seconds: 212,
            thumbnail_url: "https://i.ytimg.com/vi/abc/hqdefault.jpg".to_owned(),
        },
        listing.metadata
    );
    assert_eq!(3, listing.streams.len());
    assert_eq!("251", select_audio_stream(&listing.streams).unwrap().format_id);

    let args = provider.recorded_args();
    assert!(args.iter().any(|a| a == "--no-playlist"));
    assert!(args.iter().any(|a| a == SOURCE));
    assert!(!args.iter().any(|a| a == "-o"));
}

#[rstest]
#[case(
    "ERROR: [youtube] abc: Private video. Sign in if you've been granted access",
    ErrorKind::Unavailable
)]
#[case("ERROR: [youtube] abc: Video unavailable", ErrorKind::NotFound)]
#[case("ERROR: unable to download webpage: timed out", ErrorKind::ProviderError)]
#[tokio::test]
async fn inspect_failures_are_classified(#[case] stderr: &str, #[case] kind: ErrorKind) {
    let provider = FakeProvider::new(FakeYtDlp::Fail(stderr.to_owned()));
    let err = provider.source.inspect(&source_id()).await.unwrap_err();

    assert_eq!(kind, err.kind());
    assert!(err.to_string().contains(stderr));
}

#[tokio::test]
async fn download_writes_chosen_format() {
    let provider = FakeProvider::serving(b"webm bytes");
    let mut scope = ResourceScope::open(None).unwrap();
    let destination = scope.new_temp_file(".webm").unwrap();
    let handle = MockMediaSource::audio_stream(SOURCE, "251", 160.0);

    let len = provider
        .source
        .download(&handle, &destination, &mut scope)
        .await
        .unwrap();

    assert_eq!(10, len);
    assert_eq!(b"webm bytes".to_vec(), std::fs::read(&destination).unwrap());
    let args = provider.recorded_args();
    let tail = &args[args.len() - 6..];
    assert_eq!(
        vec![
            "-f".to_owned(),
            "251".to_owned(),
            "-o".to_owned(),
            destination.to_string_lossy().into_owned(),
            "--".to_owned(),
            SOURCE.to_owned(),
        ],
        tail
    );
    assert!(args.iter().any(|a| a == "--no-playlist"));
}

#[tokio::test]
async fn download_failure_keeps_stderr() {
    let provider = FakeProvider::new(FakeYtDlp::Fail(
        "ERROR: unable to download video data: HTTP Error 403: Forbidden".to_owned(),
    ));
    let mut scope = ResourceScope::open(None).unwrap();
    let destination = scope.new_temp_file(".webm").unwrap();
    let handle = MockMediaSource::audio_stream(SOURCE, "251", 160.0);

    let err = provider
        .source
        .download(&handle, &destination, &mut scope)
        .await
        .unwrap_err();
    assert_matches!(&err, SourceError::Download(stderr) if stderr.contains("HTTP Error 403"));
    assert_eq!(ErrorKind::DownloadError, err.kind());
}

#[tokio::test]
async fn empty_download_is_an_error() {
    let provider = FakeProvider::serving(b"");
    let mut scope = ResourceScope::open(None).unwrap();
    let destination = scope.new_temp_file(".webm").unwrap();
    let handle = MockMediaSource::audio_stream(SOURCE, "251", 160.0);

    let err = provider
        .source
        .download(&handle, &destination, &mut scope)
        .await
        .unwrap_err();
    assert_eq!(
        SourceError::Download("downloaded file is empty".to_owned()),
        err
    );
}

#[tokio::test]
async fn download_runs_inside_the_scope() {
    let provider = FakeProvider::serving(b"webm bytes");
    let mut scope = ResourceScope::open(None).unwrap();
    let destination = scope.new_temp_file(".webm").unwrap();
    scope.close();
    let handle = MockMediaSource::audio_stream(SOURCE, "251", 160.0);

    let err = provider
        .source
        .download(&handle, &destination, &mut scope)
        .await
        .unwrap_err();
    assert_matches!(err, SourceError::Scope(_));
    assert!(!provider.bin.path().join(FAKE_YT_DLP_ARGS).exists());
}
