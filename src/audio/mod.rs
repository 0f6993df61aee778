pub mod decode;
pub mod resample;
pub mod wav;

pub use decode::{
    DecodeCascade, DecodeError, DecodeStrategy, DecodedAudio, FfmpegStrategy, FormatHint,
    StrategyFailure, SymphoniaStrategy, WavStrategy,
};
pub use resample::{downmix_to_mono, resample_linear};
pub use wav::encode_wav;
