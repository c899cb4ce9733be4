use std::fmt;

/// Errors raised while setting up the engine. Nothing on the render path
/// returns these; the audio callback degrades to silence instead.
#[derive(Debug)]
pub enum EngineError {
    Io(std::io::Error),
    ConfigParse(toml::de::Error),
    ConfigSerialize(toml::ser::Error),
    NoOutputDevice,
    #[cfg(not(target_arch = "wasm32"))]
    BuildStream(cpal::BuildStreamError),
    #[cfg(not(target_arch = "wasm32"))]
    PlayStream(cpal::PlayStreamError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Io(e) => write!(f, "I/O error: {e}"),
            EngineError::ConfigParse(e) => write!(f, "invalid config: {e}"),
            EngineError::ConfigSerialize(e) => write!(f, "could not serialize config: {e}"),
            EngineError::NoOutputDevice => write!(f, "no audio output device available"),
            #[cfg(not(target_arch = "wasm32"))]
            EngineError::BuildStream(e) => write!(f, "failed to build output stream: {e}"),
            #[cfg(not(target_arch = "wasm32"))]
            EngineError::PlayStream(e) => write!(f, "failed to start output stream: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io(e) => Some(e),
            EngineError::ConfigParse(e) => Some(e),
            EngineError::ConfigSerialize(e) => Some(e),
            EngineError::NoOutputDevice => None,
            #[cfg(not(target_arch = "wasm32"))]
            EngineError::BuildStream(e) => Some(e),
            #[cfg(not(target_arch = "wasm32"))]
            EngineError::PlayStream(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e)
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(e: toml::de::Error) -> Self {
        EngineError::ConfigParse(e)
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(e: toml::ser::Error) -> Self {
        EngineError::ConfigSerialize(e)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl From<cpal::BuildStreamError> for EngineError {
    fn from(e: cpal::BuildStreamError) -> Self {
        EngineError::BuildStream(e)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl From<cpal::PlayStreamError> for EngineError {
    fn from(e: cpal::PlayStreamError) -> Self {
        EngineError::PlayStream(e)
    }
}
