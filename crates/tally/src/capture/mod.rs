pub(crate) mod claim;
mod ffmpeg;
pub(crate) mod progress;

pub(crate) use ffmpeg::FfmpegBackend;
