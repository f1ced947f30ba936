use std::future::Future;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::dto::artifact::ArtifactResult;
use crate::dto::audio_buffer::{EncodedAudioBuffer, RawAudioBuffer};
use crate::dto::cover_image::CoverImage;
use crate::dto::media_metadata::{MediaMetadata, SourceId};
use crate::dto::pipeline_error::{Classify, ErrorKind, PipelineError, Stage};
use crate::dto::pipeline_state::PipelineState;
use crate::dto::stream_handle::StreamHandle;
use crate::scope::ResourceScope;
use crate::settings::{Settings, TagFailurePolicy};
use crate::source::{
    MediaSource, SourceError, select_audio_stream, select_progressive_video, thumbnail_candidates,
};
use crate::tag_writer::TagWriter;
use crate::transcoder::{TranscodeOptions, Transcoder};

/// Tracks one request's progress through [`PipelineState`] and logs each transition.
#[derive(Debug)]
struct Run<'a> {
    source_id: &'a str,
    state: PipelineState,
}

impl<'a> Run<'a> {
    fn start(source_id: &'a str) -> Self {
        info!("{source_id}: {}", PipelineState::Start);
        Self {
            source_id,
            state: PipelineState::Start,
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.state.successor() {
            info!("{}: {} -> {next}", self.source_id, self.state);
            self.state = next;
        }
    }

    fn finish<T>(mut self, result: Result<T, PipelineError>) -> Result<T, PipelineError> {
        let next = match &result {
            Ok(_) => PipelineState::Done,
            Err(e) => {
                if e.kind.is_caller_actionable() {
                    warn!("{}: {e}", self.source_id);
                } else {
                    error!("{}: {e}", self.source_id);
                }
                PipelineState::Failed(e.kind)
            }
        };
        info!("{}: {} -> {next}", self.source_id, self.state);
        self.state = next;
        result
    }
}

/// Runs requests end to end. Holds no per-request state, so one instance is shared by every
/// request and each run gets its own [`ResourceScope`].
#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn MediaSource>,
    transcoder: Arc<dyn Transcoder>,
    tag_writer: TagWriter,
    settings: Settings,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn MediaSource>,
        transcoder: Arc<dyn Transcoder>,
        settings: Settings,
    ) -> Self {
        Self {
            source,
            transcoder,
            tag_writer: TagWriter::new(),
            settings,
        }
    }

    /// Metadata only. Nothing is downloaded.
    pub async fn info(&self, raw_source_id: &str) -> Result<MediaMetadata, PipelineError> {
        let source_id = parse_source_id(raw_source_id)?;
        let listing = self
            .run_stage(Stage::Resolve, self.source.inspect(&source_id))
            .await?;
        Ok(listing.metadata)
    }

    /// The best audio stream as a tagged MP3.
    pub async fn download_audio(
        &self,
        raw_source_id: &str,
    ) -> Result<ArtifactResult, PipelineError> {
        let mut run = Run::start(raw_source_id);
        let result = self.run_audio(raw_source_id, &mut run).await;
        run.finish(result)
    }

    /// The best progressive mp4 stream, untouched.
    pub async fn download_video(
        &self,
        raw_source_id: &str,
    ) -> Result<ArtifactResult, PipelineError> {
        let mut run = Run::start(raw_source_id);
        let result = self.run_video(raw_source_id, &mut run).await;
        run.finish(result)
    }

    async fn run_audio(
        &self,
        raw_source_id: &str,
        run: &mut Run<'_>,
    ) -> Result<ArtifactResult, PipelineError> {
        let source_id = parse_source_id(raw_source_id)?;
        let mut scope = self.open_scope()?;

        let listing = self
            .run_stage(Stage::Resolve, self.source.inspect(&source_id))
            .await?;
        let metadata = listing.metadata;
        run.advance();

        let handle = select_audio_stream(&listing.streams)
            .map_err(|e| PipelineError::at(Stage::Select, &e))?;
        run.advance();

        let raw = self.download(&mut scope, &handle).await?;
        run.advance();

        let encoded = self
            .run_stage(
                Stage::Transcode,
                self.transcoder
                    .transcode(&mut scope, &raw, &TranscodeOptions::standard()),
            )
            .await?;
        run.advance();

        let cover = self.fetch_cover(&metadata).await;
        run.advance();

        let tagged = self.tag(encoded, &metadata, cover.as_ref())?;
        run.advance();

        scope.close();
        Ok(ArtifactResult::mp3(tagged, &metadata.title))
    }

    async fn run_video(
        &self,
        raw_source_id: &str,
        run: &mut Run<'_>,
    ) -> Result<ArtifactResult, PipelineError> {
        let source_id = parse_source_id(raw_source_id)?;
        let mut scope = self.open_scope()?;

        let listing = self
            .run_stage(Stage::Resolve, self.source.inspect(&source_id))
            .await?;
        run.advance();

        let handle = select_progressive_video(&listing.streams)
            .map_err(|e| PipelineError::at(Stage::Select, &e))?;
        run.advance();

        let raw = self.download(&mut scope, &handle).await?;
        let bytes = tokio::fs::read(raw.path()).await.map_err(|e| {
            PipelineError::new(Stage::Download, ErrorKind::InternalError, e.to_string())
        })?;

        scope.close();
        Ok(ArtifactResult::mp4(bytes, &listing.metadata.title))
    }

    fn open_scope(&self) -> Result<ResourceScope, PipelineError> {
        ResourceScope::open(self.settings.scratch_dir.as_deref())
            .map_err(|e| PipelineError::at(Stage::Scope, &e))
    }

    /// Runs one stage under the configured deadline. Dropping the stage's future on timeout drops
    /// any subprocess it spawned, which kills it.
    async fn run_stage<T, E, F>(&self, stage: Stage, future: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, E>>,
        E: Classify,
    {
        match tokio::time::timeout(self.settings.stage_timeout, future).await {
            Ok(result) => result.map_err(|e| PipelineError::at(stage, &e)),
            Err(_) => Err(PipelineError::timed_out(stage, self.settings.stage_timeout)),
        }
    }

    async fn download(
        &self,
        scope: &mut ResourceScope,
        handle: &StreamHandle,
    ) -> Result<RawAudioBuffer, PipelineError> {
        let transfer = async {
            let path = scope.new_temp_file(&format!(".{}", handle.extension()))?;
            let len = self.source.download(handle, &path, scope).await?;
            Ok::<_, SourceError>(RawAudioBuffer::new(path, len, handle.extension()))
        };
        self.run_stage(Stage::Download, transfer).await
    }

    /// Tries each thumbnail candidate in order. A failed request or an image that isn't a JPEG or
    /// PNG moves on to the next one. Never fails the run.
    async fn fetch_cover(&self, metadata: &MediaMetadata) -> Option<CoverImage> {
        let candidates = thumbnail_candidates(
            self.settings.primary_thumbnail_pattern.as_deref(),
            metadata,
        );
        for url in candidates {
            match self
                .run_stage(Stage::Thumbnail, self.source.fetch_thumbnail(&url))
                .await
            {
                Ok(bytes) => match CoverImage::detect(bytes) {
                    Some(cover) => {
                        info!("using thumbnail {url} ({})", cover.mime_type());
                        return Some(cover);
                    }
                    None => warn!("thumbnail {url} is not a jpeg or png"),
                },
                Err(e) => warn!("skipping thumbnail {url}: {e}"),
            }
        }
        warn!("no usable thumbnail for {}, continuing without a cover", metadata.id);
        None
    }

    fn tag(
        &self,
        encoded: EncodedAudioBuffer,
        metadata: &MediaMetadata,
        cover: Option<&CoverImage>,
    ) -> Result<EncodedAudioBuffer, PipelineError> {
        match self.tag_writer.embed(&encoded, metadata, cover) {
            Ok(tagged) => Ok(tagged),
            Err(e) if self.settings.tag_failure == TagFailurePolicy::Untagged => {
                warn!("returning untagged audio: {e}");
                Ok(encoded)
            }
            Err(e) => Err(PipelineError::at(Stage::Tag, &e)),
        }
    }
}

fn parse_source_id(raw: &str) -> Result<SourceId, PipelineError> {
    SourceId::parse(raw).map_err(|e| PipelineError::at(Stage::Input, &e))
}

#[cfg(test)]
#[path = "./orchestrator_test.rs"]
mod orchestrator_test;
