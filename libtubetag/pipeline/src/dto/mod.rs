pub(crate) mod artifact;
pub(crate) mod audio_buffer;
pub(crate) mod cover_image;
pub(crate) mod media_metadata;
pub(crate) mod pipeline_error;
pub(crate) mod pipeline_state;
pub(crate) mod stream_handle;
