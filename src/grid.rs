//! Сетка тайлов, общая для всех этапов генерации.
//!
//! Тайлы не ссылаются на сетку; поиск соседей зависит только от
//! `(сетка, позиция)`. На сферическом мире сетка замкнута по обеим осям,
//! иначе запрос за краем возвращает `None`.

use serde::{Deserialize, Serialize};

use crate::heightmap::Heightmap;
use crate::terrain::TileType;

pub type RiverId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    pub x: usize,
    pub y: usize,
}

impl Pos {
    #[must_use]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Top,
    Bottom,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Right,
        Direction::Top,
        Direction::Bottom,
    ];

    #[must_use]
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::Top => (0, -1),
            Direction::Bottom => (0, 1),
        }
    }

    #[must_use]
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Top => Direction::Bottom,
            Direction::Bottom => Direction::Top,
        }
    }
}

/// Одна клетка карты мира.
#[derive(Debug, Clone)]
pub struct Tile {
    pos: Pos,
    pub height: f32,
    pub kind: TileType,
    rivers: Vec<RiverId>,
    carved_width: u8,
}

impl Tile {
    fn new(pos: Pos, height: f32) -> Self {
        Self {
            pos,
            height,
            kind: TileType::Land,
            rivers: Vec::new(),
            carved_width: 0,
        }
    }

    #[must_use]
    pub fn pos(&self) -> Pos {
        self.pos
    }

    /// Реки, путь или русло которых проходит через тайл.
    #[must_use]
    pub fn rivers(&self) -> &[RiverId] {
        &self.rivers
    }

    #[must_use]
    pub fn has_river(&self, id: RiverId) -> bool {
        self.rivers.contains(&id)
    }

    /// Ширина русла, прорытого с центром в этом тайле; 0, если не рылось.
    #[must_use]
    pub fn carved_width(&self) -> u8 {
        self.carved_width
    }

    #[must_use]
    pub fn is_collidable(&self) -> bool {
        self.kind.is_collidable()
    }
}

#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    wrap: bool,
    tiles: Vec<Tile>,
}

impl Grid {
    /// Плоская сетка, все высоты равны 0.
    #[must_use]
    pub fn new(width: usize, height: usize, wrap: bool) -> Self {
        let tiles = (0..width * height)
            .map(|i| Tile::new(Pos::new(i % width, i / width), 0.0))
            .collect();
        Self {
            width,
            height,
            wrap,
            tiles,
        }
    }

    #[must_use]
    pub fn from_heightmap(heightmap: &Heightmap, wrap: bool) -> Self {
        let mut grid = Self::new(heightmap.width, heightmap.height, wrap);
        for (tile, &h) in grid.tiles.iter_mut().zip(&heightmap.data) {
            tile.height = h;
        }
        grid
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn wraps(&self) -> bool {
        self.wrap
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    #[must_use]
    pub fn index(&self, pos: Pos) -> usize {
        pos.y * self.width + pos.x
    }

    #[must_use]
    pub fn pos(&self, index: usize) -> Pos {
        Pos::new(index % self.width, index / self.width)
    }

    #[must_use]
    pub fn contains(&self, x: isize, y: isize) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    #[must_use]
    pub fn tile(&self, pos: Pos) -> &Tile {
        &self.tiles[self.index(pos)]
    }

    pub fn tile_mut(&mut self, pos: Pos) -> &mut Tile {
        let idx = self.index(pos);
        &mut self.tiles[idx]
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    #[must_use]
    pub fn kind(&self, pos: Pos) -> TileType {
        self.tile(pos).kind
    }

    pub fn set_kind(&mut self, pos: Pos, kind: TileType) {
        self.tile_mut(pos).kind = kind;
    }

    #[must_use]
    pub fn height_at(&self, pos: Pos) -> f32 {
        self.tile(pos).height
    }

    #[must_use]
    pub fn heights(&self) -> Vec<f32> {
        self.tiles.iter().map(|t| t.height).collect()
    }

    /// Позиция со смещением `(dx, dy)` от `pos`, с переносом на сферическом мире.
    #[must_use]
    pub fn offset(&self, pos: Pos, dx: isize, dy: isize) -> Option<Pos> {
        let x = pos.x as isize + dx;
        let y = pos.y as isize + dy;
        if self.wrap {
            Some(Pos::new(
                x.rem_euclid(self.width as isize) as usize,
                y.rem_euclid(self.height as isize) as usize,
            ))
        } else if self.contains(x, y) {
            Some(Pos::new(x as usize, y as usize))
        } else {
            None
        }
    }

    #[must_use]
    pub fn neighbor(&self, pos: Pos, direction: Direction) -> Option<Pos> {
        let (dx, dy) = direction.offset();
        self.offset(pos, dx, dy)
    }

    /// Четыре соседа в порядке `Direction::ALL`.
    pub fn neighbors4(&self, pos: Pos) -> impl Iterator<Item = Pos> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(move |d| self.neighbor(pos, d))
    }

    /// Есть ли в радиусе Чебышёва `radius` от `pos` (не считая `pos`) тайл,
    /// подходящий под `pred`. Позиции за незамкнутым краем не учитываются.
    pub fn is_near(&self, pos: Pos, radius: usize, pred: impl Fn(TileType) -> bool) -> bool {
        let r = radius as isize;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx == 0 && dy == 0 {
                    continue;
                }
                if let Some(p) = self.offset(pos, dx, dy) {
                    if p != pos && pred(self.kind(p)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Евклидово расстояние; на сферическом мире берётся кратчайший путь.
    #[must_use]
    pub fn distance(&self, a: Pos, b: Pos) -> f32 {
        let mut dx = a.x.abs_diff(b.x);
        let mut dy = a.y.abs_diff(b.y);
        if self.wrap {
            dx = dx.min(self.width - dx);
            dy = dy.min(self.height - dy);
        }
        ((dx * dx + dy * dy) as f32).sqrt()
    }

    #[must_use]
    pub fn count(&self, kind: TileType) -> usize {
        self.tiles.iter().filter(|t| t.kind == kind).count()
    }

    #[must_use]
    pub fn fraction(&self, kind: TileType) -> f32 {
        if self.tiles.is_empty() {
            return 0.0;
        }
        self.count(kind) as f32 / self.tiles.len() as f32
    }

    /// Отмечает принадлежность реке; водные тайлы в реку не входят.
    pub fn add_river(&mut self, pos: Pos, id: RiverId) {
        let tile = self.tile_mut(pos);
        if tile.is_collidable() && !tile.rivers.contains(&id) {
            tile.rivers.push(id);
        }
    }

    pub fn remove_river(&mut self, pos: Pos, id: RiverId) {
        self.tile_mut(pos).rivers.retain(|&r| r != id);
    }

    /// Сколько из четырёх соседей `pos` принадлежат реке `id`.
    #[must_use]
    pub fn river_neighbor_count(&self, pos: Pos, id: RiverId) -> usize {
        self.neighbors4(pos)
            .filter(|&p| self.tile(p).has_river(id))
            .count()
    }

    /// Превращает `pos` в русло. Необратимо.
    pub(crate) fn carve_river(&mut self, pos: Pos, id: RiverId) {
        self.add_river(pos, id);
        let tile = self.tile_mut(pos);
        tile.kind = TileType::River;
        tile.height = 0.0;
    }

    pub(crate) fn set_carved_width(&mut self, pos: Pos, width: u8) {
        self.tile_mut(pos).carved_width = width;
    }
}
