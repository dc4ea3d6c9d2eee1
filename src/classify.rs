//! Пороги высот и разметка полос.
//!
//! Приближённый режим поднимает каждый порог от предыдущего с шагом
//! `SCAN_STEP`, пока в полосе не окажется её доля тайлов. Результат
//! воспроизводим, но это не точный квантиль; `ThresholdMode::Exact`
//! сортирует высоты.

#[cfg(feature = "parallel")]
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::{ClassificationSettings, ThresholdMode};
use crate::grid::Grid;
use crate::terrain::{TerrainProfile, TileType};

pub const SCAN_STEP: f32 = 0.01;

/// Пороги выбранного режима по возрастанию, по одному на границу полос.
#[must_use]
pub fn compute_thresholds(
    heights: &[f32],
    row_len: usize,
    settings: &ClassificationSettings,
) -> Vec<f32> {
    match settings.threshold_mode {
        ThresholdMode::Approximate => approximate_thresholds(heights, row_len, &settings.parts),
        ThresholdMode::Exact => exact_thresholds(heights, &settings.parts),
        ThresholdMode::Fixed => settings.fixed_levels.clone(),
    }
}

#[must_use]
pub fn approximate_thresholds(heights: &[f32], row_len: usize, parts: &[f32]) -> Vec<f32> {
    let mut levels = Vec::with_capacity(parts.len());
    let mut minimum = 0.0;
    for &part in parts {
        minimum = approximate_level(heights, row_len, minimum, part);
        levels.push(minimum);
    }
    levels
}

fn approximate_level(heights: &[f32], row_len: usize, minimum: f32, part: f32) -> f32 {
    if part <= 0.0 || heights.is_empty() {
        return minimum;
    }
    let total = heights.len() as f32;
    let mut maximum = minimum + SCAN_STEP;
    while maximum < 1.0 {
        let count = count_in_band(heights, row_len, minimum, maximum);
        if count as f32 / total >= part {
            break;
        }
        maximum += SCAN_STEP;
    }
    maximum
}

/// Количество высот в `[lo, hi)`, с подсчётом по строкам.
#[cfg(feature = "parallel")]
fn count_in_band(heights: &[f32], row_len: usize, lo: f32, hi: f32) -> usize {
    let counter = AtomicUsize::new(0);
    heights.par_chunks(row_len.max(1)).for_each(|row| {
        let c = row.iter().filter(|&&h| lo <= h && h < hi).count();
        counter.fetch_add(c, Ordering::Relaxed);
    });
    counter.into_inner()
}

#[cfg(not(feature = "parallel"))]
fn count_in_band(heights: &[f32], row_len: usize, lo: f32, hi: f32) -> usize {
    heights
        .chunks(row_len.max(1))
        .map(|row| row.iter().filter(|&&h| lo <= h && h < hi).count())
        .sum()
}

/// Квантильные пороги по отсортированной копии высот.
///
/// Каждая полоса получает не меньше `ceil(part * n)` тайлов, равные высоты
/// всегда попадают в одну полосу. Плоская карта целиком уходит в нижнюю.
#[must_use]
pub fn exact_thresholds(heights: &[f32], parts: &[f32]) -> Vec<f32> {
    let mut sorted: Vec<f32> = heights.to_vec();
    sorted.sort_by(f32::total_cmp);
    let n = sorted.len();

    let mut levels = Vec::with_capacity(parts.len());
    let mut previous = 0.0f32;
    for &part in parts {
        if part > 0.0 && n > 0 {
            let below = sorted.partition_point(|&h| h < previous);
            let wanted = (part * n as f32).ceil() as usize;
            let last = sorted[(below + wanted).min(n).max(1) - 1];
            // Равные высоты не делятся между полосами.
            let above = sorted.partition_point(|&h| h <= last);
            let level = if above < n {
                sorted[above]
            } else {
                1.0 + SCAN_STEP
            };
            previous = level.max(previous);
        }
        levels.push(previous);
    }
    levels
}

/// Полоса для `height`: первая, чей порог выше неё, иначе самая верхняя.
#[must_use]
pub fn classify_height(height: f32, thresholds: &[f32], bands: &[TileType]) -> TileType {
    thresholds
        .iter()
        .position(|&level| height < level)
        .map_or(bands[bands.len() - 1], |i| bands[i])
}

/// Перезаписывает тип каждого тайла по его высоте.
pub fn assign_tile_types(grid: &mut Grid, thresholds: &[f32], profile: TerrainProfile) {
    let bands = profile.bands();
    let positions: Vec<_> = grid.tiles().map(crate::grid::Tile::pos).collect();
    for pos in positions {
        let kind = classify_height(grid.height_at(pos), thresholds, bands);
        grid.set_kind(pos, kind);
    }
}

/// Число тайлов в каждой полосе, начиная с нижней.
#[must_use]
pub fn band_populations(heights: &[f32], thresholds: &[f32]) -> Vec<usize> {
    let mut counts = vec![0; thresholds.len() + 1];
    for &h in heights {
        let band = thresholds
            .iter()
            .position(|&level| h < level)
            .unwrap_or(thresholds.len());
        counts[band] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightmap::Heightmap;

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32 / (n - 1) as f32).collect()
    }

    #[test]
    fn test_approximate_thresholds_cover_requested_parts() {
        let heights = ramp(10_000);
        let parts = [0.1, 0.3, 0.05, 0.4, 0.1];
        let levels = approximate_thresholds(&heights, 100, &parts);
        assert_eq!(levels.len(), parts.len());
        assert!(levels.windows(2).all(|w| w[0] <= w[1]));

        let pops = band_populations(&heights, &levels);
        for (i, &part) in parts.iter().enumerate() {
            let share = pops[i] as f32 / heights.len() as f32;
            assert!(share + 1e-3 >= part, "band {i}: {share} < {part}");
        }
    }

    #[test]
    fn test_zero_part_yields_empty_band() {
        let heights = ramp(100);
        let levels = approximate_thresholds(&heights, 10, &[0.0, 0.5]);
        assert_eq!(levels[0], 0.0);
        assert_eq!(band_populations(&heights, &levels)[0], 0);
    }

    #[test]
    fn test_exact_thresholds_match_quantiles() {
        let heights = ramp(1001);
        let levels = exact_thresholds(&heights, &[0.25, 0.5]);
        assert!((levels[0] - 0.25).abs() < 5e-3, "{levels:?}");
        assert!((levels[1] - 0.75).abs() < 5e-3, "{levels:?}");
        let pops = band_populations(&heights, &levels);
        assert!(pops[0] >= 251 && pops[1] >= 501, "{pops:?}");
    }

    #[test]
    fn test_exact_band_never_falls_short() {
        let heights = ramp(10);
        let levels = exact_thresholds(&heights, &[0.14]);
        let pops = band_populations(&heights, &levels);
        assert_eq!(pops, vec![2, 8]);

        let parts = [0.1, 0.3, 0.05, 0.4, 0.1];
        let heights = ramp(997);
        let pops = band_populations(&heights, &exact_thresholds(&heights, &parts));
        for (i, &part) in parts.iter().enumerate() {
            assert!(pops[i] as f32 >= part * 997.0, "band {i}: {pops:?}");
        }
    }

    #[test]
    fn test_exact_keeps_tied_heights_together() {
        // Четыре уровня по 25 одинаковых значений.
        let heights: Vec<f32> = (0..100).map(|i| (i / 25) as f32 / 3.0).collect();
        let levels = exact_thresholds(&heights, &[0.1, 0.1]);
        assert_eq!(band_populations(&heights, &levels), vec![25, 25, 50]);
    }

    #[test]
    fn test_flat_field_fills_lowest_band_in_both_modes() {
        let heights = vec![0.0; 100];
        let parts = [0.1, 0.3, 0.05, 0.4, 0.1];
        let expected = vec![100, 0, 0, 0, 0, 0];
        let exact = exact_thresholds(&heights, &parts);
        assert_eq!(band_populations(&heights, &exact), expected);
        let approx = approximate_thresholds(&heights, 10, &parts);
        assert_eq!(band_populations(&heights, &approx), expected);
    }

    #[test]
    fn test_every_tile_matches_its_band() {
        let mut map = Heightmap::new(20, 20);
        map.data = ramp(400);
        let mut grid = Grid::from_heightmap(&map, false);
        let levels = [0.1, 0.4, 0.45, 0.85, 0.95];
        assign_tile_types(&mut grid, &levels, TerrainProfile::Banded);

        let bands = TerrainProfile::Banded.bands();
        for tile in grid.tiles() {
            let h = tile.height;
            let expected = if h < 0.1 {
                bands[0]
            } else if h < 0.4 {
                bands[1]
            } else if h < 0.45 {
                bands[2]
            } else if h < 0.85 {
                bands[3]
            } else if h < 0.95 {
                bands[4]
            } else {
                bands[5]
            };
            assert_eq!(tile.kind, expected, "height {h}");
        }
    }

    #[test]
    fn test_cumulative_populations_grow_with_thresholds() {
        let heights = ramp(500);
        let levels = approximate_thresholds(&heights, 50, &[0.2, 0.2, 0.2, 0.2]);
        let mut below = 0;
        for (i, &level) in levels.iter().enumerate() {
            let count = heights.iter().filter(|&&h| h < level).count();
            assert!(count >= below, "threshold {i}");
            below = count;
        }
    }

    #[test]
    fn test_height_above_all_levels_takes_top_band() {
        let bands = TerrainProfile::Simple.bands();
        assert_eq!(classify_height(1.0, &[0.5, 1.0, 1.0], bands), TileType::Snow);
        assert_eq!(classify_height(0.99, &[0.5, 1.0, 1.0], bands), TileType::Land);
        assert_eq!(classify_height(0.2, &[0.5, 1.0, 1.0], bands), TileType::Water);
    }
}
