//! Удаление мелких связных областей и одиночных вкраплений.

use log::{debug, info};

use crate::grid::{Grid, Pos};
use crate::terrain::TileType;

/// Пары смещений для сглаживания шума; каждая проверяется вместе с зеркальной.
const NOISE_DIRECTIONS: [(isize, isize); 4] = [(0, -1), (-1, 0), (-1, -1), (1, -1)];

/// Во что превращается удалённая область.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    Fixed(TileType),
    /// Самый частый тип на границе области или `fallback`, если границы
    /// нет (область занимает всю достижимую карту).
    Surrounding { fallback: TileType },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoiseReport {
    pub passes: usize,
    pub replaced: usize,
}

/// Заливка по четырём соседям с переиспользуемой маской посещённых.
#[derive(Debug, Clone)]
pub struct RegionCleaner {
    mask: Vec<bool>,
}

impl RegionCleaner {
    #[must_use]
    pub fn new(grid: &Grid) -> Self {
        Self {
            mask: vec![false; grid.len()],
        }
    }

    fn clear_mask(&mut self, len: usize) {
        self.mask.clear();
        self.mask.resize(len, false);
    }

    /// Собирает область, содержащую `start`, и отмечает её посещённой.
    /// Без рекурсии: большая область не должна переполнить стек.
    fn flood(&mut self, grid: &Grid, start: Pos, targets: &[TileType]) -> Vec<Pos> {
        let mut region = Vec::new();
        let mut stack = vec![start];
        self.mask[grid.index(start)] = true;

        while let Some(pos) = stack.pop() {
            region.push(pos);
            for n in grid.neighbors4(pos) {
                let idx = grid.index(n);
                if !self.mask[idx] && targets.contains(&grid.kind(n)) {
                    self.mask[idx] = true;
                    stack.push(n);
                }
            }
        }
        region
    }

    /// Все максимальные связные области из `targets` в порядке обхода.
    pub fn find_regions(&mut self, grid: &Grid, targets: &[TileType]) -> Vec<Vec<Pos>> {
        self.clear_mask(grid.len());
        let mut regions = Vec::new();
        for idx in 0..grid.len() {
            let pos = grid.pos(idx);
            if !self.mask[idx] && targets.contains(&grid.kind(pos)) {
                regions.push(self.flood(grid, pos, targets));
            }
        }
        regions
    }

    /// Перезаписывает все области из `targets` меньше `min_size` тайлов.
    /// Возвращает число заменённых тайлов.
    pub fn remove_small_regions(
        &mut self,
        grid: &mut Grid,
        targets: &[TileType],
        min_size: usize,
        replacement: Replacement,
    ) -> usize {
        let mut replaced = 0;
        let mut removed_regions = 0;

        for region in self.find_regions(grid, targets) {
            if region.len() >= min_size {
                continue;
            }
            let kind = match replacement {
                Replacement::Fixed(kind) => kind,
                Replacement::Surrounding { fallback } => {
                    dominant_border(grid, &region, targets).unwrap_or(fallback)
                }
            };
            debug!(
                "replacing {}-tile region at {:?} with {kind:?}",
                region.len(),
                region[0]
            );
            for &pos in &region {
                grid.set_kind(pos, kind);
            }
            replaced += region.len();
            removed_regions += 1;
        }

        info!("Removed {removed_regions} regions of {targets:?}, tiles replaced: {replaced}");
        replaced
    }
}

fn dominant_border(grid: &Grid, region: &[Pos], targets: &[TileType]) -> Option<TileType> {
    let mut counts: Vec<(TileType, usize)> = Vec::new();
    for &pos in region {
        for n in grid.neighbors4(pos) {
            let kind = grid.kind(n);
            if targets.contains(&kind) {
                continue;
            }
            match counts.iter_mut().find(|(k, _)| *k == kind) {
                Some((_, c)) => *c += 1,
                None => counts.push((kind, 1)),
            }
        }
    }
    // При равенстве побеждает встреченный первым.
    counts
        .into_iter()
        .rev()
        .max_by_key(|&(_, c)| c)
        .map(|(k, _)| k)
}

/// Заполняет одиночные пропуски в `target`, пока проход что-то меняет.
///
/// Тайл меняется, если оба тайла какой-либо пары смещений уже `target`.
/// Позиции за незамкнутым краем считаются `target`.
pub fn remove_noise(grid: &mut Grid, target: TileType) -> NoiseReport {
    let mut report = NoiseReport::default();
    loop {
        report.passes += 1;
        let mut changed = 0;
        for idx in 0..grid.len() {
            let pos = grid.pos(idx);
            if grid.kind(pos) == target {
                continue;
            }
            let matches = |dx: isize, dy: isize| {
                grid.offset(pos, dx, dy)
                    .is_none_or(|p| grid.kind(p) == target)
            };
            if NOISE_DIRECTIONS
                .iter()
                .any(|&(dx, dy)| matches(dx, dy) && matches(-dx, -dy))
            {
                grid.set_kind(pos, target);
                changed += 1;
            }
        }
        report.replaced += changed;
        if changed == 0 {
            break;
        }
    }
    info!(
        "Smoothed {target:?} noise: {} passes, tiles replaced: {}",
        report.passes, report.replaced
    );
    report
}
