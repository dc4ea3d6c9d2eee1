use std::collections::VecDeque;
use std::f32::consts::TAU;

use log::{debug, info};
use rand::Rng;

use crate::config::ForestSettings;
use crate::grid::{Grid, Pos};
use crate::terrain::TileType;

const SEEDS_PER_CYCLE: usize = 10;
const SEED_ATTEMPTS: usize = 100;
const SPREAD_CANDIDATES: usize = 4;
/// Кандидаты появляются не дальше этого числа тайлов (не включая) от родителя.
const SPREAD_DISTANCE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestReport {
    pub planted: usize,
    pub cycles: usize,
    pub fraction: f32,
    pub target_met: bool,
}

/// Выращивает леса на суше, пока лесом не станет доля `settings.part` всех
/// тайлов или не кончится лимит циклов.
///
/// Каждый цикл берёт до десяти семян на суше и растёт от них в ширину;
/// каждый новый лесной тайл ставит в очередь несколько кандидатов со
/// случайным полярным смещением, поэтому края лесов получаются рваными.
pub fn grow_forests(grid: &mut Grid, settings: &ForestSettings, rng: &mut impl Rng) -> ForestReport {
    let total = grid.len() as f32;
    let mut planted = 0usize;
    let mut cycles = 0usize;
    let below_target = |planted: usize| (planted as f32 / total) < settings.part;

    while below_target(planted) && cycles < settings.max_cycles {
        cycles += 1;

        let mut queue: VecDeque<Pos> = (0..SEEDS_PER_CYCLE)
            .filter_map(|_| find_seed(grid, rng))
            .collect();
        if queue.is_empty() {
            debug!("no land left to seed forests");
            break;
        }

        while below_target(planted) {
            let Some(pos) = queue.pop_front() else {
                break;
            };
            if grid.kind(pos) != TileType::Land
                || grid.is_near(pos, 1, |k| k.is_water() || k.is_mountain())
            {
                continue;
            }

            grid.set_kind(pos, TileType::Forest);
            planted += 1;

            for _ in 0..SPREAD_CANDIDATES {
                let dist = rng.gen_range(0..SPREAD_DISTANCE) as f32;
                let (sin, cos) = rng.gen_range(0.0..TAU).sin_cos();
                let x = pos.x as isize + (cos * dist) as isize;
                let y = pos.y as isize + (sin * dist) as isize;
                if !grid.contains(x, y) {
                    continue;
                }
                let candidate = Pos::new(x as usize, y as usize);
                if grid.kind(candidate) == TileType::Land {
                    queue.push_back(candidate);
                }
            }
        }
    }

    let fraction = planted as f32 / total;
    let report = ForestReport {
        planted,
        cycles,
        fraction,
        target_met: !below_target(planted),
    };
    info!(
        "Planted {planted} forest tiles in {cycles} cycles ({:.1}% of map)",
        fraction * 100.0
    );
    report
}

fn find_seed(grid: &Grid, rng: &mut impl Rng) -> Option<Pos> {
    (0..SEED_ATTEMPTS).find_map(|_| {
        let pos = Pos::new(
            rng.gen_range(0..grid.width()),
            rng.gen_range(0..grid.height()),
        );
        (grid.kind(pos) == TileType::Land).then_some(pos)
    })
}
