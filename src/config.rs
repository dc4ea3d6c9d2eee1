// src/config.rs
//! Конфигурация генерации
//!
//! Здесь собраны все параметры запуска:
//! - синтез карты высот (шум или плазма)
//! - разметка высот и способ подбора порогов
//! - очистка мелких артефактов
//! - леса, реки и поселения
//!
//! Все структуры читаются из TOML/JSON, так что в файле конфигурации
//! достаточно указать только изменённые значения.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, GenerationError};
use crate::terrain::TerrainProfile;

/// Способ построения сырой карты высот.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HeightStrategy {
    /// Фрактальный когерентный шум, бесшовный по краям.
    #[default]
    Noise,
    /// Рекурсивное смещение средней точки.
    Plasma,
}

/// Способ сложения октав шума.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FractalKind {
    #[default]
    FBm,
    Ridged,
}

/// Параметры карты высот
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightSettings {
    #[serde(default)]
    pub strategy: HeightStrategy,

    /// Количество октав шума
    #[serde(default = "default_octaves")]
    pub octaves: u32,

    /// Базовая частота шума
    #[serde(default = "default_frequency")]
    pub frequency: f32,

    #[serde(default)]
    pub fractal: FractalKind,

    /// Масштаб смещения плазмы:
    /// - `0.0`: простая интерполяция между углами,
    /// - `1.0`: смещение размером с обрабатываемую область.
    #[serde(default = "default_roughness")]
    pub roughness: f32,

    /// Делитель смещения на каждом уровне рекурсии плазмы
    /// (должен быть > 1, иначе карта не сходится).
    #[serde(default = "default_variability")]
    pub variability: f32,

    /// Только для плазмы: углы равны 0, и карта обычно окружена водой.
    #[serde(default)]
    pub surrounded_by_water: bool,
}

fn default_octaves() -> u32 {
    6
}
fn default_frequency() -> f32 {
    1.25
}
fn default_roughness() -> f32 {
    1.0
}
fn default_variability() -> f32 {
    2.0
}

impl Default for HeightSettings {
    fn default() -> Self {
        Self {
            strategy: HeightStrategy::Noise,
            octaves: 6,
            frequency: 1.25,
            fractal: FractalKind::FBm,
            roughness: 1.0,
            variability: 2.0,
            surrounded_by_water: false,
        }
    }
}

/// Способ перевода долей полос в пороги высот.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ThresholdMode {
    /// Жадный подъём с шагом 0.01. Воспроизводим, но не точный квантиль.
    #[default]
    Approximate,
    /// Квантили по отсортированным высотам.
    Exact,
    /// Взять `fixed_levels` как есть, `parts` не учитывается.
    Fixed,
}

/// Параметры разметки высот
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationSettings {
    #[serde(default)]
    pub profile: TerrainProfile,

    /// Доля площади каждой полосы, кроме последней, начиная с нижней.
    /// Для `Banded`: глубокая вода, мелководье, песок, суша, скалы.
    #[serde(default = "default_parts")]
    pub parts: Vec<f32>,

    #[serde(default)]
    pub threshold_mode: ThresholdMode,

    /// Пороги по возрастанию для `ThresholdMode::Fixed`.
    #[serde(default)]
    pub fixed_levels: Vec<f32>,
}

fn default_parts() -> Vec<f32> {
    vec![0.1, 0.3, 0.05, 0.4, 0.1]
}

impl Default for ClassificationSettings {
    fn default() -> Self {
        Self {
            profile: TerrainProfile::Banded,
            parts: default_parts(),
            threshold_mode: ThresholdMode::Approximate,
            fixed_levels: Vec::new(),
        }
    }
}

/// Параметры очистки артефактов
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupSettings {
    /// Удалять мелкие острова, озёра и горы вместе с шумом.
    #[serde(default)]
    pub delete_small_objects: bool,

    /// Минимальный размер острова / озера / горы в тайлах
    #[serde(default = "default_min_region_size")]
    pub min_region_size: usize,

    /// Минимальный размер леса в тайлах
    #[serde(default = "default_min_region_size")]
    pub min_forest_size: usize,
}

fn default_min_region_size() -> usize {
    1000
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            delete_small_objects: false,
            min_region_size: 1000,
            min_forest_size: 1000,
        }
    }
}

/// Параметры роста лесов
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestSettings {
    /// Целевая доля леса среди всех тайлов
    #[serde(default = "default_forest_part")]
    pub part: f32,

    /// Максимум циклов посева и роста
    #[serde(default = "default_max_forest_cycles")]
    pub max_cycles: usize,
}

fn default_forest_part() -> f32 {
    0.1
}
fn default_max_forest_cycles() -> usize {
    10_000
}

impl Default for ForestSettings {
    fn default() -> Self {
        Self {
            part: 0.1,
            max_cycles: 10_000,
        }
    }
}

/// Параметры рек
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiverSettings {
    /// Сколько рек нужно принять
    #[serde(default = "default_river_count")]
    pub count: usize,

    /// Исток должен быть строго выше этой высоты
    #[serde(default = "default_min_river_height")]
    pub min_height: f32,

    /// Сколько раз искать исток, прежде чем сдаться
    #[serde(default = "default_max_river_attempts")]
    pub max_attempts: usize,

    #[serde(default = "default_min_river_turns")]
    pub min_turns: usize,

    #[serde(default = "default_min_river_length")]
    pub min_length: usize,

    #[serde(default = "default_max_river_intersections")]
    pub max_intersections: usize,
}

fn default_river_count() -> usize {
    40
}
fn default_min_river_height() -> f32 {
    0.6
}
fn default_max_river_attempts() -> usize {
    2000
}
fn default_min_river_turns() -> usize {
    18
}
fn default_min_river_length() -> usize {
    20
}
fn default_max_river_intersections() -> usize {
    2
}

impl Default for RiverSettings {
    fn default() -> Self {
        Self {
            count: 40,
            min_height: 0.6,
            max_attempts: 2000,
            min_turns: 18,
            min_length: 20,
            max_intersections: 2,
        }
    }
}

/// Поселение, которое нужно разместить на карте.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    pub name: String,

    /// Соединять ли поселение дорогами с соседями по списку
    #[serde(default = "default_connected")]
    pub connected: bool,
}

fn default_connected() -> bool {
    true
}

impl LocationConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: true,
        }
    }
}

/// Параметры размещения поселений
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementSettings {
    /// Минимальное расстояние между поселениями в тайлах
    #[serde(default = "default_min_distance")]
    pub min_distance: f32,

    /// Попыток найти место для одного поселения
    #[serde(default = "default_max_placement_attempts")]
    pub max_attempts: usize,

    /// Отступ места от воды и гор в тайлах
    #[serde(default = "default_clearance_radius")]
    pub clearance_radius: usize,

    /// Вероятность отбросить подходящее место
    #[serde(default = "default_rejection_chance")]
    pub rejection_chance: f32,

    #[serde(default = "default_locations")]
    pub locations: Vec<LocationConfig>,
}

fn default_min_distance() -> f32 {
    50.0
}
fn default_max_placement_attempts() -> usize {
    100
}
fn default_clearance_radius() -> usize {
    1
}
fn default_rejection_chance() -> f32 {
    0.05
}
fn default_locations() -> Vec<LocationConfig> {
    [
        "Bal Harbor",
        "Westwood",
        "Goblin Mountain",
        "Kobolds Village",
        "Kuo Toans",
        "Atlantis",
        "Wagoneers",
    ]
    .into_iter()
    .map(LocationConfig::new)
    .collect()
}

impl Default for SettlementSettings {
    fn default() -> Self {
        Self {
            min_distance: 50.0,
            max_attempts: 100,
            clearance_radius: 1,
            rejection_chance: 0.05,
            locations: default_locations(),
        }
    }
}

/// Полная конфигурация одного запуска генерации.
///
/// Не меняется во время генерации. Загружается из TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Общий сид; каждый этап строит от него свой генератор
    #[serde(default)]
    pub seed: u64,

    /// Сторона квадратной карты в тайлах (по умолчанию 1024)
    #[serde(default = "default_world_size")]
    pub world_size: u32,

    /// Замкнуть карту по обеим осям
    #[serde(default = "default_spherical_world")]
    pub spherical_world: bool,

    #[serde(default)]
    pub height: HeightSettings,

    #[serde(default)]
    pub classification: ClassificationSettings,

    #[serde(default)]
    pub cleanup: CleanupSettings,

    #[serde(default)]
    pub forest: ForestSettings,

    #[serde(default)]
    pub rivers: RiverSettings,

    #[serde(default)]
    pub settlements: SettlementSettings,
}

fn default_world_size() -> u32 {
    1024
}
fn default_spherical_world() -> bool {
    true
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            world_size: 1024,
            spherical_world: true,
            height: HeightSettings::default(),
            classification: ClassificationSettings::default(),
            cleanup: CleanupSettings::default(),
            forest: ForestSettings::default(),
            rivers: RiverSettings::default(),
            settlements: SettlementSettings::default(),
        }
    }
}

impl GenerationConfig {
    /// Загружает конфигурацию из TOML-файла
    ///
    /// ```toml
    /// # world.toml
    /// seed = 42
    /// world_size = 512
    ///
    /// [rivers]
    /// count = 10
    /// ```
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Отклоняет конфигурации, с которыми генерация невозможна.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.world_size == 0 {
            return Err(invalid("world_size must be positive"));
        }

        let h = &self.height;
        if h.octaves == 0 {
            return Err(invalid("height.octaves must be positive"));
        }
        if !(h.frequency.is_finite() && h.frequency > 0.0) {
            return Err(invalid("height.frequency must be a positive number"));
        }
        if !(h.roughness.is_finite() && h.roughness >= 0.0) {
            return Err(invalid("height.roughness must be non-negative"));
        }
        if !(h.variability.is_finite() && h.variability > 1.0) {
            return Err(invalid("height.variability must be greater than 1"));
        }

        let c = &self.classification;
        let expected = c.profile.threshold_count();
        match c.threshold_mode {
            ThresholdMode::Approximate | ThresholdMode::Exact => {
                if c.parts.len() != expected {
                    return Err(invalid(format!(
                        "classification.parts needs {expected} entries for {:?}, got {}",
                        c.profile,
                        c.parts.len()
                    )));
                }
                for &part in &c.parts {
                    check_fraction("classification.parts", part)?;
                }
                let total: f32 = c.parts.iter().sum();
                if total > 1.0 + 1e-4 {
                    return Err(invalid(format!(
                        "classification.parts sum to {total}, must not exceed 1"
                    )));
                }
            }
            ThresholdMode::Fixed => {
                if c.fixed_levels.len() != expected {
                    return Err(invalid(format!(
                        "classification.fixed_levels needs {expected} entries for {:?}, got {}",
                        c.profile,
                        c.fixed_levels.len()
                    )));
                }
                if c.fixed_levels.iter().any(|l| !l.is_finite()) {
                    return Err(invalid("classification.fixed_levels must be finite"));
                }
                if c.fixed_levels.windows(2).any(|w| w[0] > w[1]) {
                    return Err(invalid("classification.fixed_levels must be ascending"));
                }
            }
        }

        check_fraction("forest.part", self.forest.part)?;
        check_fraction("rivers.min_height", self.rivers.min_height)?;

        let s = &self.settlements;
        if !(s.min_distance.is_finite() && s.min_distance >= 0.0) {
            return Err(invalid("settlements.min_distance must be non-negative"));
        }
        check_fraction("settlements.rejection_chance", s.rejection_chance)?;
        if s.rejection_chance >= 1.0 {
            return Err(invalid("settlements.rejection_chance must be below 1"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> GenerationError {
    GenerationError::InvalidConfig(msg.into())
}

fn check_fraction(name: &str, value: f32) -> Result<(), GenerationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be within [0, 1], got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GenerationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.settlements.locations.len(), 7);
        assert!(config.settlements.locations.iter().all(|l| l.connected));
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config = GenerationConfig::from_toml_str(
            r#"
            seed = 42
            world_size = 256

            [rivers]
            count = 5

            [[settlements.locations]]
            name = "Capital"

            [[settlements.locations]]
            name = "Ur"
            connected = false
            "#,
        )
        .unwrap();

        assert_eq!(config.seed, 42);
        assert_eq!(config.world_size, 256);
        assert_eq!(config.rivers.count, 5);
        assert_eq!(config.rivers.min_turns, 18);
        assert_eq!(config.height.octaves, 6);
        assert_eq!(config.settlements.locations.len(), 2);
        assert!(!config.settlements.locations[1].connected);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_size() {
        let config = GenerationConfig {
            world_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(GenerationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_parts_over_one() {
        let mut config = GenerationConfig::default();
        config.classification.parts = vec![0.5, 0.3, 0.2, 0.2, 0.1];
        assert!(config.validate().is_err());

        config.classification.parts = vec![0.1, -0.1, 0.1, 0.1, 0.1];
        assert!(config.validate().is_err());

        config.classification.parts = vec![0.1, 0.1];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fixed_levels_must_ascend() {
        let mut config = GenerationConfig::default();
        config.classification.profile = TerrainProfile::Simple;
        config.classification.threshold_mode = ThresholdMode::Fixed;
        config.classification.fixed_levels = vec![0.5, 0.4, 0.9];
        assert!(config.validate().is_err());

        config.classification.fixed_levels = vec![0.5, 1.0, 1.0];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_forest_part() {
        let mut config = GenerationConfig::default();
        config.forest.part = 1.5;
        assert!(config.validate().is_err());
    }
}
