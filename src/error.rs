use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::grid::Pos;

/// Жёсткая ошибка генерации. Возникает до запуска первого этапа.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot i/o failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to (de)serialize snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot holds {actual} tiles, expected {expected} for its dimensions")]
    Shape { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("image buffer does not match map dimensions {width}x{height}")]
    Buffer { width: u32, height: u32 },
    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
}

/// Вырожденный исход, записанный в готовый мир.
///
/// Ни один из них не останавливает генерацию; завершённые этапы не откатываются.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SoftFailure {
    /// Для поселения не нашлось места; остальные поселения и все дороги
    /// пропущены.
    #[error("no site found for settlement '{settlement}', placement and roads skipped")]
    PlacementExhausted { settlement: String },
    /// Между поселениями нет проходимого пути.
    #[error("no road from '{from}' to '{to}' (searched from {start:?})")]
    Unreachable { from: String, to: String, start: Pos },
    #[error("forest covers {reached:.3} of the map, target was {target:.3}")]
    ForestTargetMissed { target: f32, reached: f32 },
    #[error("only {accepted} of {requested} rivers accepted")]
    RiversShort { requested: usize, accepted: usize },
}
