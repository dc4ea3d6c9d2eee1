//! Процедурная генерация фэнтезийных карт мира из тайлов.
//!
//! Запуск превращает карту высот в сетку тайлов по классам высот, убирает
//! мелкие артефакты, выращивает леса, прокладывает реки и расставляет
//! поселения, соединённые дорогами. См. [`WorldGenerator`].

pub mod classify;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod export;
pub mod forest;
pub mod grid;
pub mod heightmap;
pub mod pipeline;
pub mod rivers;
pub mod settlement;
pub mod terrain;

pub use config::GenerationConfig;
pub use error::{ConfigError, GenerationError, RenderError, SnapshotError, SoftFailure};
pub use export::WorldSnapshot;
pub use grid::{Grid, Pos, Tile};
pub use heightmap::{Heightmap, generate_heightmap};
pub use pipeline::{GenerationObserver, NoopObserver, Stage, StepControl, World, WorldGenerator};
pub use terrain::{TerrainProfile, TileType};
