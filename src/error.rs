use thiserror::Error;

#[derive(Debug, Error)]
pub enum RadarError {
    #[error("invalid radar parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("invalid target {index}: {reason}")]
    InvalidTarget { index: usize, reason: &'static str },
    #[error("invalid noise power: {0}")]
    InvalidNoisePower(f64),
    #[error("waveform length mismatch: tx has {tx} samples, rx has {rx}")]
    LengthMismatch { tx: usize, rx: usize },
    #[error("waveform is empty")]
    EmptyWaveform,
    #[error("processor is planned for {expected} samples, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("real FFT failed: {0}")]
    Fft(#[from] realfft::FftError),
    #[error("range-Doppler processing needs at least one chirp")]
    NoChirps,
    #[error("requested {requested} range bins but a chirp only has {available}")]
    TooManyRangeBins { requested: usize, available: usize },
    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RadarError>;
