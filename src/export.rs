//! Отрисовка готового мира в PNG и JSON-снимки.

use std::fs;
use std::path::Path;

use image::{ImageBuffer, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, SnapshotError};
use crate::grid::{Grid, Pos, RiverId};
use crate::heightmap::Heightmap;
use crate::pipeline::World;
use crate::settlement::{Road, Settlement};
use crate::terrain::{TerrainProfile, TileType};

const SETTLEMENT_RADIUS: i32 = 3;
const SETTLEMENT_COLOR: Rgba<u8> = Rgba([200, 30, 30, 255]);

impl World {
    /// Пиксель на тайл, поселения поверх рисуются закрашенными кругами.
    pub fn to_rgba_image(&self) -> Result<RgbaImage, RenderError> {
        let (width, height) = (self.width() as u32, self.height() as u32);
        let data: Vec<u8> = self
            .grid
            .tiles()
            .flat_map(|t| {
                let [r, g, b] = t.kind.to_rgb();
                [r, g, b, 255]
            })
            .collect();
        let mut img: RgbaImage = ImageBuffer::from_raw(width, height, data)
            .ok_or(RenderError::Buffer { width, height })?;

        for settlement in &self.settlements {
            let Pos { x, y } = settlement.position;
            draw_filled_circle_mut(
                &mut img,
                (x as i32, y as i32),
                SETTLEMENT_RADIUS,
                SETTLEMENT_COLOR,
            );
        }
        Ok(img)
    }

    pub fn save_as_png(&self, path: impl AsRef<Path>) -> Result<(), RenderError> {
        self.to_rgba_image()?.save(path)?;
        Ok(())
    }

    /// Высоты после всех этапов; прорытые русла имеют высоту 0.
    #[must_use]
    pub fn heightmap(&self) -> Heightmap {
        Heightmap {
            width: self.width(),
            height: self.height(),
            data: self.grid.heights(),
        }
    }

    #[must_use]
    pub fn to_snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            width: self.width(),
            height: self.height(),
            wrap: self.grid.wraps(),
            profile: self.profile,
            tiles: self
                .grid
                .tiles()
                .map(|t| TileRecord {
                    kind: t.kind,
                    height: t.height,
                    rivers: t.rivers().to_vec(),
                    carved_width: t.carved_width(),
                })
                .collect(),
            settlements: self.settlements.clone(),
            roads: self.roads.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    pub kind: TileType,
    pub height: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rivers: Vec<RiverId>,
    #[serde(default)]
    pub carved_width: u8,
}

/// Сериализуемая копия карты мира с поселениями и дорогами.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub width: usize,
    pub height: usize,
    pub wrap: bool,
    pub profile: TerrainProfile,
    /// По строкам.
    pub tiles: Vec<TileRecord>,
    pub settlements: Vec<Settlement>,
    pub roads: Vec<Road>,
}

impl WorldSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Восстанавливает сетку тайлов.
    pub fn into_grid(self) -> Result<Grid, SnapshotError> {
        let expected = self.width * self.height;
        if self.tiles.len() != expected {
            return Err(SnapshotError::Shape {
                expected,
                actual: self.tiles.len(),
            });
        }

        let mut grid = Grid::new(self.width, self.height, self.wrap);
        for (idx, record) in self.tiles.into_iter().enumerate() {
            let pos = grid.pos(idx);
            // Принадлежность реке пишется только на сушу, поэтому восстанавливаем
            // её до окончательного типа.
            grid.set_kind(pos, TileType::Land);
            for id in record.rivers {
                grid.add_river(pos, id);
            }
            grid.set_carved_width(pos, record.carved_width);
            let tile = grid.tile_mut(pos);
            tile.kind = record.kind;
            tile.height = record.height;
        }
        Ok(grid)
    }
}
