use std::fmt;

/// Top-level error for the explicit setup calls (config, drivers, samples).
///
/// Trigger calls never return these; they log and fall silent instead.
#[derive(Debug)]
pub enum GlissandoError {
    Device(DeviceError),
    Sample(SampleError),
    Config(ConfigError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceError {
    NoOutputDevice,
    UnsupportedFormat(String),
    Stream(String),
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SampleError {
    Fetch(String),
    Decode(String),
    UnsupportedCodec,
    Integrity { expected: String, actual: String },
}

#[derive(Debug)]
pub struct ConfigError(pub serde_json::Error);

impl ConfigError {
    /// A document that parsed but describes an unusable config.
    pub fn invalid(msg: impl fmt::Display) -> Self {
        ConfigError(serde::de::Error::custom(msg))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParseError {
    pub input: String,
}

impl fmt::Display for GlissandoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlissandoError::Device(e) => write!(f, "Device error: {e}"),
            GlissandoError::Sample(e) => write!(f, "Sample error: {e}"),
            GlissandoError::Config(e) => write!(f, "Config error: {e}"),
        }
    }
}

impl std::error::Error for GlissandoError {}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NoOutputDevice => write!(f, "no output device available"),
            DeviceError::UnsupportedFormat(format) => {
                write!(f, "unsupported output sample format {format}")
            }
            DeviceError::Stream(msg) => write!(f, "output stream failed: {msg}"),
            DeviceError::Closed => write!(f, "device already closed"),
        }
    }
}

impl std::error::Error for DeviceError {}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleError::Fetch(msg) => write!(f, "fetch failed: {msg}"),
            SampleError::Decode(msg) => write!(f, "decode failed: {msg}"),
            SampleError::UnsupportedCodec => write!(f, "unsupported audio codec"),
            SampleError::Integrity { expected, actual } => {
                write!(f, "sha256 mismatch: expected {expected}, got {actual}")
            }
        }
    }
}

impl std::error::Error for SampleError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid engine config: {}", self.0)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl fmt::Display for KeyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized key identifier '{}'", self.input)
    }
}

impl std::error::Error for KeyParseError {}

impl From<DeviceError> for GlissandoError {
    fn from(e: DeviceError) -> Self {
        GlissandoError::Device(e)
    }
}

impl From<SampleError> for GlissandoError {
    fn from(e: SampleError) -> Self {
        GlissandoError::Sample(e)
    }
}

impl From<ConfigError> for GlissandoError {
    fn from(e: ConfigError) -> Self {
        GlissandoError::Config(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError(e)
    }
}
