use serde::{Deserialize, Serialize};

/// Тип местности одного тайла.
///
/// Какие варианты встречаются на карте, зависит от [`TerrainProfile`];
/// `River` и `Road` появляются только после прокладки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileType {
    Water,
    DeepWater,
    ShallowWater,
    Sand,
    Land,
    Forest,
    Mountain,
    Rock,
    Snow,
    River,
    Road,
}

impl TileType {
    #[must_use]
    pub fn to_rgb(self) -> [u8; 3] {
        match self {
            TileType::Water => [0, 0, 255],
            TileType::DeepWater => [0, 40, 120],
            TileType::ShallowWater => [40, 100, 200],
            TileType::Sand => [220, 200, 130],
            TileType::Land => [70, 160, 60],
            TileType::Forest => [20, 90, 30],
            TileType::Mountain => [128, 128, 128],
            TileType::Rock => [110, 100, 90],
            TileType::Snow => [245, 245, 250],
            TileType::River => [60, 130, 230],
            TileType::Road => [140, 80, 30],
        }
    }

    /// Любая открытая вода, включая прорытые русла.
    #[must_use]
    pub fn is_water(self) -> bool {
        matches!(
            self,
            TileType::Water | TileType::DeepWater | TileType::ShallowWater | TileType::River
        )
    }

    #[must_use]
    pub fn is_mountain(self) -> bool {
        matches!(self, TileType::Mountain | TileType::Rock | TileType::Snow)
    }

    /// Сухопутный тайл, через который ещё может пройти река.
    #[must_use]
    pub fn is_collidable(self) -> bool {
        !self.is_water()
    }

    /// Тайл, по которому можно проложить дорогу (без учёта соседства с горами).
    #[must_use]
    pub fn is_road_surface(self) -> bool {
        matches!(
            self,
            TileType::Land | TileType::Sand | TileType::Forest | TileType::Road
        )
    }
}

/// Версия набора типов тайлов.
///
/// * `Simple`: полосы вода / суша / горы / снег.
/// * `Banded`: глубокая вода, мелководье, песок, суша, скалы и снег.
///
/// Оба профиля на поздних этапах добавляют `Forest`, `River` и `Road`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TerrainProfile {
    Simple,
    #[default]
    Banded,
}

impl TerrainProfile {
    /// Полосы высот снизу вверх. Последняя присваивается высоте выше всех
    /// порогов, поэтому профилю с `n` полосами нужно `n - 1` порогов.
    #[must_use]
    pub fn bands(self) -> &'static [TileType] {
        match self {
            TerrainProfile::Simple => &[
                TileType::Water,
                TileType::Land,
                TileType::Mountain,
                TileType::Snow,
            ],
            TerrainProfile::Banded => &[
                TileType::DeepWater,
                TileType::ShallowWater,
                TileType::Sand,
                TileType::Land,
                TileType::Rock,
                TileType::Snow,
            ],
        }
    }

    /// Все типы тайлов, возможные на карте с этим профилем.
    #[must_use]
    pub fn tile_types(self) -> Vec<TileType> {
        let mut types = self.bands().to_vec();
        types.extend([TileType::Forest, TileType::River, TileType::Road]);
        types
    }

    #[must_use]
    pub fn threshold_count(self) -> usize {
        self.bands().len() - 1
    }

    /// Типы, образующие остров при удалении мелкой суши.
    #[must_use]
    pub fn island_types(self) -> &'static [TileType] {
        match self {
            TerrainProfile::Simple => &[TileType::Land],
            TerrainProfile::Banded => &[TileType::Sand, TileType::Land],
        }
    }

    /// Типы, образующие озеро при удалении мелких водоёмов.
    #[must_use]
    pub fn lake_types(self) -> &'static [TileType] {
        match self {
            TerrainProfile::Simple => &[TileType::Water],
            TerrainProfile::Banded => &[TileType::DeepWater, TileType::ShallowWater, TileType::Sand],
        }
    }

    /// Тип воды для сглаживания шума вдоль берегов.
    #[must_use]
    pub fn coastal_water(self) -> TileType {
        match self {
            TerrainProfile::Simple => TileType::Water,
            TerrainProfile::Banded => TileType::ShallowWater,
        }
    }

    #[must_use]
    pub fn mountain(self) -> TileType {
        match self {
            TerrainProfile::Simple => TileType::Mountain,
            TerrainProfile::Banded => TileType::Rock,
        }
    }

    #[must_use]
    pub fn peak(self) -> TileType {
        TileType::Snow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_share_carved_types() {
        for profile in [TerrainProfile::Simple, TerrainProfile::Banded] {
            let types = profile.tile_types();
            assert!(types.contains(&TileType::Forest));
            assert!(types.contains(&TileType::River));
            assert!(types.contains(&TileType::Road));
            assert_eq!(profile.threshold_count() + 1, profile.bands().len());
        }
        assert_eq!(TerrainProfile::Simple.tile_types().len(), 7);
    }

    #[test]
    fn test_river_is_not_collidable() {
        assert!(!TileType::River.is_collidable());
        assert!(!TileType::ShallowWater.is_collidable());
        assert!(TileType::Sand.is_collidable());
        assert!(TileType::Rock.is_collidable());
    }
}
