//! Прокладка, группировка и прорытие рек.
//!
//! Река начинается на случайном высоком тайле и жадно идёт к самому низкому
//! подходящему соседу, пока такой есть. Слишком короткие и слишком прямые
//! реки откатываются, как и пересекающие слишком много других. Принятые реки
//! с общим тайлом образуют группу; самая длинная (ствол) роется первой, а
//! остальные сужаются к ней.

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use petgraph::unionfind::UnionFind;
use rand::Rng;

use crate::config::RiverSettings;
use crate::grid::{Direction, Grid, Pos, RiverId};

/// Разница высот, при которой река сохраняет направление, а не
/// разворачивается по той же оси.
const HEADING_EPSILON: f32 = 0.1;
/// Ширина русла выбирается меньше этой границы.
const MAX_CARVE_WIDTH: usize = 5;

/// Форма русла для каждой ширины относительно центрального тайла.
const FOOTPRINT_1: &[(isize, isize)] = &[(0, 1), (1, 1), (1, 0)];
const FOOTPRINT_2: &[(isize, isize)] = &[
    (0, 1),
    (1, 1),
    (1, 0),
    (0, -1),
    (-1, -1),
    (1, -1),
    (-1, 0),
    (-1, 1),
];
const FOOTPRINT_3: &[(isize, isize)] = &[
    (0, 1),
    (1, 1),
    (0, 2),
    (1, 2),
    (1, 0),
    (2, 0),
    (2, 1),
    (0, -1),
    (-1, -1),
    (1, -1),
    (-1, 0),
    (-1, 1),
];
const FOOTPRINT_4: &[(isize, isize)] = &[
    (0, 1),
    (1, 1),
    (0, 2),
    (1, 2),
    (1, 0),
    (2, 0),
    (2, 1),
    (0, -1),
    (1, -1),
    (2, -1),
    (0, -2),
    (1, -2),
    (-1, 0),
    (-1, 1),
    (-1, 2),
    (-2, 0),
    (-2, 1),
    (-2, -1),
    (-1, -1),
    (-1, -2),
];

#[must_use]
pub fn footprint(width: u8) -> &'static [(isize, isize)] {
    match width {
        0 => &[],
        1 => FOOTPRINT_1,
        2 => FOOTPRINT_2,
        3 => FOOTPRINT_3,
        _ => FOOTPRINT_4,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiverState {
    Seeking,
    Validated,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct River {
    pub id: RiverId,
    /// Путь от истока до места остановки.
    pub tiles: Vec<Pos>,
    visited: HashSet<Pos>,
    pub turns: usize,
    pub intersections: usize,
    /// Начальное направление реки; по нему река держит курс.
    pub heading: Direction,
    pub direction: Direction,
    pub state: RiverState,
}

impl River {
    #[must_use]
    pub fn new(id: RiverId, heading: Direction) -> Self {
        Self {
            id,
            tiles: Vec::new(),
            visited: HashSet::new(),
            turns: 0,
            intersections: 0,
            heading,
            direction: heading,
            state: RiverState::Seeking,
        }
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
    pub fn contains(&self, pos: Pos) -> bool {
        self.visited.contains(&pos)
    }

    fn push(&mut self, pos: Pos) {
        self.visited.insert(pos);
        self.tiles.push(pos);
    }

    #[must_use]
    pub fn satisfies(&self, settings: &RiverSettings) -> bool {
        self.turns >= settings.min_turns
            && self.len() >= settings.min_length
            && self.intersections <= settings.max_intersections
    }
}

/// Реки с хотя бы одним общим тайлом, индексами в списке рек.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiverGroup {
    pub members: Vec<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiverReport {
    pub requested: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub attempts: usize,
    pub groups: usize,
}

/// Прокладывает, группирует и роет реки. Возвращает принятые реки.
pub fn generate_rivers(
    grid: &mut Grid,
    settings: &RiverSettings,
    rng: &mut impl Rng,
) -> (Vec<River>, RiverReport) {
    let (mut rivers, mut report) = trace_rivers(grid, settings, rng);
    let groups = group_rivers(grid, &rivers);
    report.groups = groups.len();
    info!("Built {} river groups", groups.len());
    carve_groups(grid, &mut rivers, &groups, rng);
    (rivers, report)
}

/// Направление к строго самому низкому соседу, `Bottom`, если такого нет.
#[must_use]
pub fn lowest_neighbor(grid: &Grid, pos: Pos) -> Direction {
    let h = |d| {
        grid.neighbor(pos, d)
            .map_or(f32::INFINITY, |p| grid.height_at(p))
    };
    let (left, right, top, bottom) = (
        h(Direction::Left),
        h(Direction::Right),
        h(Direction::Top),
        h(Direction::Bottom),
    );
    if left < right && left < top && left < bottom {
        Direction::Left
    } else if right < left && right < top && right < bottom {
        Direction::Right
    } else if top < left && top < right && top < bottom {
        Direction::Top
    } else {
        Direction::Bottom
    }
}

/// Ищет истоки и прокладывает реки, пока не принято `settings.count` рек
/// или не исчерпан лимит попыток.
pub fn trace_rivers(
    grid: &mut Grid,
    settings: &RiverSettings,
    rng: &mut impl Rng,
) -> (Vec<River>, RiverReport) {
    let mut rivers = Vec::new();
    let mut report = RiverReport {
        requested: settings.count,
        ..Default::default()
    };
    let mut next_id: RiverId = 0;

    while rivers.len() < settings.count && report.attempts < settings.max_attempts {
        report.attempts += 1;

        let pos = Pos::new(
            rng.gen_range(0..grid.width()),
            rng.gen_range(0..grid.height()),
        );
        let tile = grid.tile(pos);
        if !tile.is_collidable() || !tile.rivers().is_empty() || tile.height <= settings.min_height
        {
            continue;
        }

        let mut river = River::new(next_id, lowest_neighbor(grid, pos));
        next_id += 1;
        trace(grid, &mut river, pos);

        if river.satisfies(settings) {
            river.state = RiverState::Validated;
            debug!(
                "river {} accepted: {} tiles, {} turns, {} intersections",
                river.id,
                river.len(),
                river.turns,
                river.intersections
            );
            rivers.push(river);
        } else {
            river.state = RiverState::Rejected;
            for &p in &river.tiles {
                grid.remove_river(p, river.id);
            }
            report.rejected += 1;
        }
    }

    report.accepted = rivers.len();
    info!(
        "Traced {} of {} rivers in {} attempts ({} rejected)",
        report.accepted, report.requested, report.attempts, report.rejected
    );
    (rivers, report)
}

/// Ведёт поток от `start`, пока есть подходящий сосед.
pub fn trace(grid: &mut Grid, river: &mut River, start: Pos) {
    let id = river.id;
    let mut current = Some(start);

    while let Some(pos) = current.take() {
        if river.contains(pos) || grid.tile(pos).has_river(id) {
            break;
        }
        if !grid.tile(pos).rivers().is_empty() {
            river.intersections += 1;
        }
        grid.add_river(pos, id);
        river.push(pos);

        // Лево, право, верх, низ
        let mut values = [f32::MAX; 4];
        let mut targets = [None; 4];
        for (i, d) in Direction::ALL.into_iter().enumerate() {
            let Some(n) = grid.neighbor(pos, d) else {
                continue;
            };
            targets[i] = Some(n);
            if grid.river_neighbor_count(n, id) < 2 && !river.contains(n) {
                values[i] = grid.height_at(n);
            }
            // Свободная вода притягивает поток.
            let tile = grid.tile(n);
            if tile.rivers().is_empty() && !tile.is_collidable() {
                values[i] = 0.0;
            }
        }

        let [left, right, top, bottom] = &mut values;
        match river.heading {
            Direction::Left if (*right - *left).abs() < HEADING_EPSILON => *right = f32::MAX,
            Direction::Right if (*right - *left).abs() < HEADING_EPSILON => *left = f32::MAX,
            Direction::Top if (*top - *bottom).abs() < HEADING_EPSILON => *bottom = f32::MAX,
            Direction::Bottom if (*top - *bottom).abs() < HEADING_EPSILON => *top = f32::MAX,
            _ => {}
        }

        let min = values.iter().copied().fold(f32::MAX, f32::min);
        if min == f32::MAX {
            break;
        }

        // При равенстве порядок: лево, право, низ, верх.
        let Some(choice) = [0usize, 1, 3, 2].into_iter().find(|&i| values[i] == min) else {
            break;
        };
        let Some(next) = targets[choice] else {
            break;
        };
        if !grid.tile(next).is_collidable() {
            break;
        }
        let direction = Direction::ALL[choice];
        if river.direction != direction {
            river.turns += 1;
            river.direction = direction;
        }
        current = Some(next);
    }
}

/// Делит `rivers` по общим тайлам. Реки без пересечений образуют группы
/// из одной реки, так что каждая река входит ровно в одну группу.
#[must_use]
pub fn group_rivers(grid: &Grid, rivers: &[River]) -> Vec<RiverGroup> {
    let index: HashMap<RiverId, usize> =
        rivers.iter().enumerate().map(|(i, r)| (r.id, i)).collect();
    let mut sets = UnionFind::<usize>::new(rivers.len());

    for tile in grid.tiles() {
        let members = tile.rivers();
        if members.len() < 2 {
            continue;
        }
        let Some(&first) = index.get(&members[0]) else {
            continue;
        };
        for id in &members[1..] {
            if let Some(&other) = index.get(id) {
                sets.union(first, other);
            }
        }
    }

    let mut groups: Vec<RiverGroup> = Vec::new();
    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    for i in 0..rivers.len() {
        let root = sets.find(i);
        let g = *group_of_root.entry(root).or_insert_with(|| {
            groups.push(RiverGroup {
                members: Vec::new(),
            });
            groups.len() - 1
        });
        groups[g].members.push(i);
    }
    groups
}

/// Роет каждую группу: сначала ствол своей ширины, затем притоки.
pub fn carve_groups(
    grid: &mut Grid,
    rivers: &mut [River],
    groups: &[RiverGroup],
    rng: &mut impl Rng,
) {
    for group in groups {
        // Из самых длинных берётся первая.
        let Some(&trunk) = group
            .members
            .iter()
            .rev()
            .max_by_key(|&&i| rivers[i].len())
        else {
            continue;
        };
        carve_trunk(grid, &rivers[trunk], rng);
        for &member in &group.members {
            if member != trunk {
                carve_tributary(grid, &rivers[member], &rivers[trunk], rng);
            }
        }
    }
}

fn random_range(rng: &mut impl Rng, lo: usize, hi: usize) -> usize {
    if hi > lo { rng.gen_range(lo..hi) } else { lo }
}

/// Накопленное число тайлов от устья вверх для ширин 4, 3, 2 и 1.
/// Дальше последней границы река роется с шириной 0.
fn width_bands(len: usize, size: usize, rng: &mut impl Rng) -> [usize; 4] {
    let two = len / 2;
    let three = two / 2;
    let four = three / 2;
    let five = four / 2;

    let mut c1 = random_range(rng, five / 3, five);
    if size < 4 {
        c1 = 0;
    }
    let mut c2 = c1 + random_range(rng, four / 3, four);
    if size < 3 {
        c1 = 0;
        c2 = 0;
    }
    let mut c3 = c2 + random_range(rng, three / 3, three);
    if size < 2 {
        c1 = 0;
        c2 = 0;
        c3 = 0;
    }
    let mut c4 = c3 + random_range(rng, two / 3, two);

    // Не рыть за пределами пути реки.
    let mut extra = c4.saturating_sub(len);
    while extra > 0 {
        if c1 > 0 {
            c1 -= 1;
        }
        if c2 > c1 {
            c2 -= 1;
        }
        if c3 > c2 {
            c3 -= 1;
        }
        c4 -= 1;
        extra -= 1;
    }
    [c1, c2, c3, c4]
}

fn dig_with_bands(grid: &mut Grid, river: &River, bands: [usize; 4]) {
    for (counter, &pos) in river.tiles.iter().rev().enumerate() {
        let width = match bands.iter().position(|&c| counter < c) {
            Some(0) => 4,
            Some(1) => 3,
            Some(2) => 2,
            Some(_) => 1,
            None => 0,
        };
        dig(grid, pos, river.id, width);
    }
}

fn dig(grid: &mut Grid, pos: Pos, id: RiverId, width: u8) {
    grid.carve_river(pos, id);
    grid.set_carved_width(pos, width);
    for &(dx, dy) in footprint(width) {
        if let Some(p) = grid.offset(pos, dx, dy) {
            grid.carve_river(p, id);
        }
    }
}

fn carve_trunk(grid: &mut Grid, river: &River, rng: &mut impl Rng) {
    let size = random_range(rng, 1, MAX_CARVE_WIDTH);
    let bands = width_bands(river.len(), size, rng);
    debug!("carving trunk {} ({} tiles) at size {size}", river.id, river.len());
    dig_with_bands(grid, river, bands);
}

/// Роет `river` так, чтобы в месте слияния ширина совпала со `trunk`.
fn carve_tributary(grid: &mut Grid, river: &River, trunk: &River, rng: &mut impl Rng) {
    let (junction, junction_width) = river
        .tiles
        .iter()
        .enumerate()
        .rev()
        .find(|(_, p)| trunk.contains(**p))
        .map_or((0, 0), |(i, &p)| (i, usize::from(grid.tile(p).carved_width())));

    let size = random_range(rng, junction_width, MAX_CARVE_WIDTH);
    let mut bands = width_bands(river.len(), size, rng);
    let upstream = river.len() - junction;

    match junction_width {
        1 => bands = [0, 0, 0, upstream],
        2 => {
            bands[0] = 0;
            bands[1] = 0;
            bands[2] = upstream;
        }
        3 => {
            bands[0] = 0;
            bands[1] = upstream;
        }
        4 => bands[0] = upstream,
        _ => bands = [0; 4],
    }
    debug!(
        "carving tributary {} into {} at width {junction_width}",
        river.id, trunk.id
    );
    dig_with_bands(grid, river, bands);
}
