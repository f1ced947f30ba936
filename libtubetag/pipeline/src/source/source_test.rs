use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use rstest::*;

use super::*;
use crate::dto::pipeline_error::Classify;
use crate::settings::DEFAULT_THUMBNAIL_PATTERN;

fn stream(format_id: &str, acodec: &str, vcodec: &str, kbps: f64) -> StreamHandle {
    StreamHandle {
        source: "https://www.youtube.com/watch?v=abc".to_owned(),
        format_id: format_id.to_owned(),
        bitrate_kbps: kbps,
        extension: Some("webm".to_owned()),
        audio_codec: Some(acodec.to_owned()),
        video_codec: Some(vcodec.to_owned()),
        height: None,
        filesize: None,
    }
}

fn video(format_id: &str, ext: &str, height: u32, kbps: f64) -> StreamHandle {
    StreamHandle {
        extension: Some(ext.to_owned()),
        height: Some(height),
        ..stream(format_id, "mp4a.40.2", "avc1.64001F", kbps)
    }
}

fn metadata() -> MediaMetadata {
    MediaMetadata {
        id: "abc".to_owned(),
        title: "Song".to_owned(),
        author: "Artist".to_owned(),
        duration_seconds: 180,
        thumbnail_url: "https://i.ytimg.com/vi/abc/hqdefault.jpg".to_owned(),
    }
}

#[rstest(
    streams,
    expected,
    case(vec![stream("249", "opus", "none", 50.0)], "249"),
    case(
        vec![
            stream("249", "opus", "none", 50.0),
            stream("251", "opus", "none", 160.0),
            stream("140", "mp4a.40.2", "none", 129.5),
        ],
        "251"
    ),
    case(
        vec![
            stream("18", "mp4a.40.2", "avc1", 500.0),
            stream("140", "mp4a.40.2", "none", 129.5),
        ],
        "140"
    ),
    case(
        vec![
            stream("a", "opus", "none", 160.0),
            stream("b", "opus", "none", 160.0),
            stream("c", "opus", "none", 64.0),
        ],
        "a"
    ),
    case(
        vec![
            stream("c", "opus", "none", 64.0),
            stream("b", "opus", "none", 160.0),
            stream("a", "opus", "none", 160.0),
        ],
        "b"
    ),
)]
fn selects_highest_bitrate_audio_only(streams: Vec<StreamHandle>, expected: &str) {
    let selected = select_audio_stream(&streams).unwrap();
    assert_eq!(expected, selected.format_id);
    assert!(
        streams
            .iter()
            .filter(|s| s.is_audio_only())
            .all(|s| s.bitrate_kbps <= selected.bitrate_kbps)
    );
}

#[rstest]
#[case(vec![])]
#[case(vec![stream("18", "mp4a.40.2", "avc1", 500.0)])]
#[case(vec![stream("137", "none", "avc1", 4000.0)])]
fn no_audio_only_stream(#[case] streams: Vec<StreamHandle>) {
    assert_matches!(
        select_audio_stream(&streams),
        Err(SourceError::NoAudioStream)
    );
}

#[test]
fn missing_codec_is_not_audio() {
    let mut unknown = stream("x", "opus", "none", 300.0);
    unknown.audio_codec = None;
    let streams = vec![unknown, stream("251", "opus", "none", 160.0)];
    assert_eq!("251", select_audio_stream(&streams).unwrap().format_id);
}

#[test]
fn selects_highest_progressive_mp4() {
    let streams = vec![
        video("18", "mp4", 360, 500.0),
        video("22", "mp4", 720, 1200.0),
        video("43", "webm", 1080, 2000.0),
        stream("137", "none", "avc1", 4000.0),
    ];
    assert_eq!("22", select_progressive_video(&streams).unwrap().format_id);
}

#[test]
fn no_progressive_mp4() {
    let streams = vec![stream("251", "opus", "none", 160.0)];
    let err = select_progressive_video(&streams).unwrap_err();
    assert_eq!(SourceError::NoVideoStream, err);
    assert_eq!(ErrorKind::NotFound, err.kind());
}

#[test]
fn thumbnail_candidates_prefer_pattern() {
    let candidates = thumbnail_candidates(Some(DEFAULT_THUMBNAIL_PATTERN), &metadata());
    assert_eq!(
        vec![
            "https://i.ytimg.com/vi/abc/maxresdefault.jpg".to_owned(),
            "https://i.ytimg.com/vi/abc/hqdefault.jpg".to_owned(),
        ],
        candidates
    );
}

#[test]
fn thumbnail_candidates_dedupe_and_skip_empty() {
    let mut meta = metadata();
    meta.thumbnail_url = "https://i.ytimg.com/vi/abc/maxresdefault.jpg".to_owned();
    assert_eq!(
        1,
        thumbnail_candidates(Some(DEFAULT_THUMBNAIL_PATTERN), &meta).len()
    );

    meta.id = String::new();
    meta.thumbnail_url = String::new();
    assert!(thumbnail_candidates(Some(DEFAULT_THUMBNAIL_PATTERN), &meta).is_empty());
    assert_eq!(
        vec![metadata().thumbnail_url],
        thumbnail_candidates(None, &metadata())
    );
}

#[rstest]
#[case(
    "ERROR: [youtube] abc: Sign in to confirm your age. This video may be inappropriate for some users.",
    ErrorKind::Unavailable
)]
#[case(
    "ERROR: [youtube] abc: Video unavailable. The uploader has not made this video available in your country",
    ErrorKind::Unavailable
)]
#[case("ERROR: [youtube] abc: Private video. Sign in if you've been granted access", ErrorKind::Unavailable)]
#[case("ERROR: [youtube] abc: Video unavailable", ErrorKind::NotFound)]
#[case("ERROR: Unsupported URL: https://example.com/", ErrorKind::NotFound)]
#[case("ERROR: 'abc' is not a valid URL.", ErrorKind::NotFound)]
#[case("ERROR: [youtube] abc: Incomplete YouTube ID abc", ErrorKind::NotFound)]
#[case("ERROR: unable to download webpage: <urlopen error timed out>", ErrorKind::ProviderError)]
fn classifies_provider_errors(#[case] stderr: &str, #[case] kind: ErrorKind) {
    let error = classify_provider_error(stderr);
    assert_eq!(kind, error.kind());
    assert!(error.to_string().contains("ERROR"));
}

fn provider_video() -> ProviderVideo {
    ProviderVideo {
        id: "abc".to_owned(),
        title: Some("Song".to_owned()),
        uploader: Some("Artist".to_owned()),
        channel: Some("Channel".to_owned()),
        duration: Some(179.6),
        thumbnail: Some("https://i.ytimg.com/vi/abc/hqdefault.jpg".to_owned()),
        formats: vec![
            ProviderFormat {
                format_id: Some("251".to_owned()),
                acodec: Some("opus".to_owned()),
                vcodec: Some("none".to_owned()),
                abr: Some(160.0),
                tbr: Some(165.0),
                ext: Some("webm".to_owned()),
                ..Default::default()
            },
            ProviderFormat {
                format_id: Some("140".to_owned()),
                acodec: Some("mp4a.40.2".to_owned()),
                vcodec: Some("none".to_owned()),
                abr: None,
                tbr: Some(129.5),
                ext: Some("m4a".to_owned()),
                filesize: Some(2_000_000),
                ..Default::default()
            },
            ProviderFormat {
                format_id: None,
                acodec: Some("opus".to_owned()),
                vcodec: Some("none".to_owned()),
                abr: Some(999.0),
                ..Default::default()
            },
        ],
    }
}

#[test]
fn maps_provider_video_into_listing() {
    let source_id = SourceId::parse("https://youtu.be/abc").unwrap();
    let listing = provider_video().into_listing(&source_id).unwrap();

    assert_eq!(metadata(), listing.metadata);
    assert_eq!(2, listing.streams.len());
    assert_eq!(129.5, listing.streams[1].bitrate_kbps);
    assert_eq!(Some(2_000_000), listing.streams[1].filesize);
    assert!(
        listing
            .streams
            .iter()
            .all(|s| s.source == "https://youtu.be/abc")
    );
    assert_eq!("251", select_audio_stream(&listing.streams).unwrap().format_id);
}

#[test]
fn uploader_falls_back_to_channel() {
    let source_id = SourceId::parse("abc").unwrap();
    let listing = ProviderVideo {
        uploader: None,
        ..provider_video()
    }
    .into_listing(&source_id)
    .unwrap();
    assert_eq!("Channel", listing.metadata.author);
}

#[test]
fn missing_duration_is_zero() {
    let source_id = SourceId::parse("abc").unwrap();
    let listing = ProviderVideo {
        duration: None,
        ..provider_video()
    }
    .into_listing(&source_id)
    .unwrap();
    assert_eq!(0, listing.metadata.duration_seconds);
}

#[test]
fn surrounding_whitespace_is_preserved() {
    let source_id = SourceId::parse("abc").unwrap();
    let listing = ProviderVideo {
        title: Some("  Song (Live) ".to_owned()),
        uploader: Some(" Artist".to_owned()),
        ..provider_video()
    }
    .into_listing(&source_id)
    .unwrap();
    assert_eq!("  Song (Live) ", listing.metadata.title);
    assert_eq!(" Artist", listing.metadata.author);
}

#[rstest]
#[case(ProviderVideo { title: None, ..provider_video() }, "title")]
#[case(ProviderVideo { title: Some("  ".to_owned()), ..provider_video() }, "title")]
#[case(ProviderVideo { uploader: None, channel: None, ..provider_video() }, "uploader")]
#[case(ProviderVideo { thumbnail: None, ..provider_video() }, "thumbnail")]
fn missing_required_fields_fail_fast(#[case] video: ProviderVideo, #[case] field: &str) {
    let source_id = SourceId::parse("abc").unwrap();
    let err = video.into_listing(&source_id).unwrap_err();
    assert_eq!(ErrorKind::ProviderError, err.kind());
    assert!(err.to_string().contains(field));
}
