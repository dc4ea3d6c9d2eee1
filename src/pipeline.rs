//! Порядок и запуск этапов генерации.
//!
//! ```no_run
//! use fantasy_mapgen::{GenerationConfig, NoopObserver, WorldGenerator};
//!
//! let config = GenerationConfig { seed: 7, world_size: 256, ..Default::default() };
//! let world = WorldGenerator::new(config).generate(&mut NoopObserver)?;
//! world.save_as_png("world.png")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use log::{debug, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::classify::{assign_tile_types, band_populations, compute_thresholds};
use crate::cleanup::{RegionCleaner, Replacement, remove_noise};
use crate::config::GenerationConfig;
use crate::error::{GenerationError, SoftFailure};
use crate::forest::grow_forests;
use crate::grid::Grid;
use crate::heightmap::generate_heightmap;
use crate::rivers::{River, generate_rivers};
use crate::settlement::{Road, Settlement, connect_settlements, place_settlements};
use crate::terrain::{TerrainProfile, TileType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    HeightField,
    Classification,
    Cleanup,
    Forests,
    ForestCleanup,
    Rivers,
    Settlements,
}

impl Stage {
    /// Порядок выполнения.
    pub const ALL: [Stage; 7] = [
        Stage::HeightField,
        Stage::Classification,
        Stage::Cleanup,
        Stage::Forests,
        Stage::ForestCleanup,
        Stage::Rivers,
        Stage::Settlements,
    ];

    /// Прибавляется к общему сиду, чтобы у каждого этапа был свой поток.
    fn salt(self) -> u64 {
        match self {
            Stage::HeightField => 0x11,
            Stage::Classification => 0x22,
            Stage::Cleanup => 0x33,
            Stage::Forests => 0x44,
            Stage::ForestCleanup => 0x55,
            Stage::Rivers => 0x66,
            Stage::Settlements => 0x77,
        }
    }

    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Stage::HeightField => "Генерация карты высот",
            Stage::Classification => "Разметка полос высот",
            Stage::Cleanup => "Удаление мелких островов, озёр и гор",
            Stage::Forests => "Выращивание лесов",
            Stage::ForestCleanup => "Удаление мелких лесов",
            Stage::Rivers => "Прокладка рек",
            Stage::Settlements => "Размещение поселений и дорог",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
    Continue,
    Abort,
}

/// Получает ход генерации. По умолчанию оба метода ничего не делают.
pub trait GenerationObserver {
    fn on_progress(&mut self, _message: &str) {}

    /// Вызывается после каждого этапа; `Abort` завершает генерацию здесь.
    fn on_stage_complete(&mut self, _stage: Stage, _world: &World) -> StepControl {
        StepControl::Continue
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl GenerationObserver for NoopObserver {}

/// Готовая карта и всё, что на ней размещено.
#[derive(Debug, Clone)]
pub struct World {
    pub grid: Grid,
    pub profile: TerrainProfile,
    /// Границы полос высот по возрастанию.
    pub thresholds: Vec<f32>,
    pub rivers: Vec<River>,
    pub settlements: Vec<Settlement>,
    pub roads: Vec<Road>,
    pub warnings: Vec<SoftFailure>,
    /// Последний выполненный этап, если наблюдатель остановил генерацию.
    pub aborted_after: Option<Stage>,
}

impl World {
    fn new(grid: Grid, profile: TerrainProfile) -> Self {
        Self {
            grid,
            profile,
            thresholds: Vec::new(),
            rivers: Vec::new(),
            settlements: Vec::new(),
            roads: Vec::new(),
            warnings: Vec::new(),
            aborted_after: None,
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.grid.width()
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.grid.height()
    }

    fn warn(&mut self, failure: SoftFailure) {
        warn!("{failure}");
        self.warnings.push(failure);
    }
}

pub struct WorldGenerator {
    config: GenerationConfig,
}

impl WorldGenerator {
    #[must_use]
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Запускает все этапы по порядку.
    ///
    /// Конфигурация проверяется до начала работы; это единственная ошибка.
    /// Вырожденные исходы записываются в `World::warnings`.
    pub fn generate(
        &self,
        observer: &mut impl GenerationObserver,
    ) -> Result<World, GenerationError> {
        self.config.validate()?;

        let size = self.config.world_size as usize;
        let grid = Grid::new(size, size, self.config.spherical_world);
        let mut world = World::new(grid, self.config.classification.profile);

        for stage in Stage::ALL {
            observer.on_progress(stage.describe());
            info!("stage {stage:?} started");
            let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(stage.salt()));
            let reported = world.warnings.len();
            self.run_stage(stage, &mut world, &mut rng)?;
            for failure in &world.warnings[reported..] {
                observer.on_progress(&format!("предупреждение: {failure}"));
            }

            if observer.on_stage_complete(stage, &world) == StepControl::Abort {
                info!("Generation stopped after {stage:?}");
                world.aborted_after = Some(stage);
                break;
            }
        }
        Ok(world)
    }

    fn run_stage(
        &self,
        stage: Stage,
        world: &mut World,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), GenerationError> {
        let config = &self.config;
        let profile = world.profile;

        match stage {
            Stage::HeightField => {
                let heightmap = generate_heightmap(
                    world.width(),
                    config.seed,
                    &config.height,
                    config.spherical_world,
                    rng,
                )?;
                world.grid = Grid::from_heightmap(&heightmap, config.spherical_world);
            }
            Stage::Classification => {
                let heights = world.grid.heights();
                let thresholds =
                    compute_thresholds(&heights, world.width(), &config.classification);
                debug!(
                    "thresholds {thresholds:?}, band sizes {:?}",
                    band_populations(&heights, &thresholds)
                );
                assign_tile_types(&mut world.grid, &thresholds, profile);
                world.thresholds = thresholds;
            }
            Stage::Cleanup => {
                if !config.cleanup.delete_small_objects {
                    debug!("small object removal disabled");
                    return Ok(());
                }
                let min_size = config.cleanup.min_region_size;
                let grid = &mut world.grid;
                let mut cleaner = RegionCleaner::new(grid);
                cleaner.remove_small_regions(
                    grid,
                    profile.island_types(),
                    min_size,
                    Replacement::Surrounding {
                        fallback: profile.coastal_water(),
                    },
                );
                cleaner.remove_small_regions(
                    grid,
                    profile.lake_types(),
                    min_size,
                    Replacement::Surrounding {
                        fallback: TileType::Land,
                    },
                );
                remove_noise(grid, profile.coastal_water());
                cleaner.remove_small_regions(
                    grid,
                    &[profile.mountain(), profile.peak()],
                    min_size,
                    Replacement::Surrounding {
                        fallback: TileType::Land,
                    },
                );
                remove_noise(grid, profile.mountain());
                remove_noise(grid, profile.peak());
            }
            Stage::Forests => {
                let report = grow_forests(&mut world.grid, &config.forest, rng);
                if !report.target_met {
                    world.warn(SoftFailure::ForestTargetMissed {
                        target: config.forest.part,
                        reached: report.fraction,
                    });
                }
            }
            Stage::ForestCleanup => {
                let grid = &mut world.grid;
                RegionCleaner::new(grid).remove_small_regions(
                    grid,
                    &[TileType::Forest],
                    config.cleanup.min_forest_size,
                    Replacement::Fixed(TileType::Land),
                );
                remove_noise(grid, TileType::Forest);
            }
            Stage::Rivers => {
                if config.rivers.count == 0 {
                    return Ok(());
                }
                let (rivers, report) = generate_rivers(&mut world.grid, &config.rivers, rng);
                world.rivers = rivers;
                if report.accepted < report.requested {
                    world.warn(SoftFailure::RiversShort {
                        requested: report.requested,
                        accepted: report.accepted,
                    });
                }
            }
            Stage::Settlements => {
                let settings = &config.settlements;
                let outcome =
                    place_settlements(&mut world.grid, &settings.locations, settings, rng);
                world.settlements = outcome.settlements;
                if let Some(failure) = outcome.exhausted {
                    world.warn(failure);
                    return Ok(());
                }
                let (roads, failures) = connect_settlements(&mut world.grid, &world.settlements);
                world.roads = roads;
                for failure in failures {
                    world.warn(failure);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdMode;

    fn small_config() -> GenerationConfig {
        let mut config = GenerationConfig {
            seed: 11,
            world_size: 48,
            spherical_world: false,
            ..Default::default()
        };
        config.rivers.count = 2;
        config.rivers.min_turns = 0;
        config.rivers.min_length = 3;
        config.cleanup.min_forest_size = 4;
        config.settlements.min_distance = 5.0;
        config.settlements.locations.truncate(2);
        config
    }

    #[derive(Default)]
    struct Recorder {
        stages: Vec<Stage>,
        messages: Vec<String>,
        stop_at: Option<Stage>,
    }

    impl GenerationObserver for Recorder {
        fn on_progress(&mut self, message: &str) {
            self.messages.push(message.to_owned());
        }

        fn on_stage_complete(&mut self, stage: Stage, _world: &World) -> StepControl {
            self.stages.push(stage);
            if self.stop_at == Some(stage) {
                StepControl::Abort
            } else {
                StepControl::Continue
            }
        }
    }

    #[test]
    fn test_observer_sees_every_stage_in_order() {
        let mut recorder = Recorder::default();
        let world = WorldGenerator::new(small_config())
            .generate(&mut recorder)
            .unwrap();
        assert_eq!(recorder.stages, Stage::ALL.to_vec());
        assert_eq!(
            recorder.messages.len(),
            Stage::ALL.len() + world.warnings.len()
        );
        assert!(world.aborted_after.is_none());
    }

    #[test]
    fn test_soft_failures_reach_the_observer() {
        let mut config = small_config();
        config.forest.part = 1.0;
        config.forest.max_cycles = 20;
        config.rivers.min_turns = 10_000;
        let mut recorder = Recorder::default();
        let world = WorldGenerator::new(config).generate(&mut recorder).unwrap();

        assert!(world.warnings.contains(&SoftFailure::RiversShort {
            requested: 2,
            accepted: 0,
        }));
        assert!(
            world
                .warnings
                .iter()
                .any(|w| matches!(w, SoftFailure::ForestTargetMissed { .. }))
        );
        for failure in &world.warnings {
            let message = format!("предупреждение: {failure}");
            assert!(recorder.messages.contains(&message), "{message}");
        }
        assert!(
            recorder
                .messages
                .iter()
                .any(|m| m == "предупреждение: only 0 of 2 rivers accepted")
        );
    }

    #[test]
    fn test_abort_returns_partial_world() {
        let mut recorder = Recorder {
            stop_at: Some(Stage::Classification),
            ..Default::default()
        };
        let world = WorldGenerator::new(small_config())
            .generate(&mut recorder)
            .unwrap();
        assert_eq!(world.aborted_after, Some(Stage::Classification));
        assert_eq!(recorder.stages.len(), 2);
        assert_eq!(world.thresholds.len(), world.profile.threshold_count());
        assert_eq!(world.grid.count(TileType::Forest), 0);
        assert!(world.settlements.is_empty());
    }

    #[test]
    fn test_same_seed_same_world() {
        let a = WorldGenerator::new(small_config())
            .generate(&mut NoopObserver)
            .unwrap();
        let b = WorldGenerator::new(small_config())
            .generate(&mut NoopObserver)
            .unwrap();
        let kinds = |w: &World| w.grid.tiles().map(|t| t.kind).collect::<Vec<_>>();
        assert_eq!(kinds(&a), kinds(&b));
        assert_eq!(a.settlements, b.settlements);
        assert_eq!(a.warnings, b.warnings);
    }

    #[test]
    fn test_invalid_config_fails_before_any_stage() {
        let mut config = small_config();
        config.classification.threshold_mode = ThresholdMode::Fixed;
        let mut recorder = Recorder::default();
        let result = WorldGenerator::new(config).generate(&mut recorder);
        assert!(matches!(result, Err(GenerationError::InvalidConfig(_))));
        assert!(recorder.stages.is_empty());
        assert!(recorder.messages.is_empty());
    }
}
