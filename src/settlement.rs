//! Размещение поселений и прокладка дорог.

use std::collections::HashSet;

use log::{debug, info, warn};
use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{LocationConfig, SettlementSettings};
use crate::error::SoftFailure;
use crate::grid::{Direction, Grid, Pos};
use crate::terrain::TileType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub name: String,
    pub connected: bool,
    pub position: Pos,
}

/// Дорога между поселениями `from` и `to` (индексы в списке поселений).
/// `path` начинается на ближайшем к цели тайле существующей дороги и
/// заканчивается в цели.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Road {
    pub from: usize,
    pub to: usize,
    pub path: Vec<Pos>,
}

#[derive(Debug, Clone, Default)]
pub struct PlacementOutcome {
    pub settlements: Vec<Settlement>,
    /// Задано, если поселению не нашлось места; следующие не размещались.
    pub exhausted: Option<SoftFailure>,
}

/// Может ли поселение стоять на `pos` (до случайного отсева).
#[must_use]
pub fn is_site_candidate(grid: &Grid, pos: Pos, clearance_radius: usize) -> bool {
    grid.kind(pos).is_road_surface()
        && !grid.is_near(pos, clearance_radius, |k| k.is_water() || k.is_mountain())
}

/// Может ли дорога пройти через `pos`.
#[must_use]
pub fn is_road_passable(grid: &Grid, pos: Pos) -> bool {
    grid.kind(pos).is_road_surface() && !grid.is_near(pos, 1, TileType::is_mountain)
}

/// Размещает поселения в порядке конфигурации, каждое на проходимом тайле
/// не ближе `min_distance` к предыдущим. Тайл поселения становится дорогой.
pub fn place_settlements(
    grid: &mut Grid,
    locations: &[LocationConfig],
    settings: &SettlementSettings,
    rng: &mut impl Rng,
) -> PlacementOutcome {
    let mut outcome = PlacementOutcome::default();

    for location in locations {
        let site = (0..settings.max_attempts).find_map(|_| {
            let pos = Pos::new(
                rng.gen_range(0..grid.width()),
                rng.gen_range(0..grid.height()),
            );
            if !is_site_candidate(grid, pos, settings.clearance_radius)
                || rng.gen_bool(f64::from(settings.rejection_chance))
            {
                return None;
            }
            outcome
                .settlements
                .iter()
                .all(|s| grid.distance(s.position, pos) >= settings.min_distance)
                .then_some(pos)
        });

        let Some(position) = site else {
            warn!(
                "no site found for '{}' after {} attempts, placement aborted",
                location.name, settings.max_attempts
            );
            outcome.exhausted = Some(SoftFailure::PlacementExhausted {
                settlement: location.name.clone(),
            });
            break;
        };

        debug!("placed '{}' at {position:?}", location.name);
        grid.set_kind(position, TileType::Road);
        outcome.settlements.push(Settlement {
            name: location.name.clone(),
            connected: location.connected,
            position,
        });
    }

    info!("Placed {} of {} settlements", outcome.settlements.len(), locations.len());
    outcome
}

/// Все уже проложенные тайлы дорог в порядке добавления.
#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    tiles: Vec<Pos>,
    known: HashSet<Pos>,
}

impl RoadNetwork {
    pub fn insert(&mut self, pos: Pos) {
        if self.known.insert(pos) {
            self.tiles.push(pos);
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

    /// Ближайший к `target` тайл дороги; при равенстве добавленный раньше.
    // TODO: линейно по размеру сети; завести пространственный индекс, когда
    // карты с множеством поселений начнут упираться в это в профайлере.
    #[must_use]
    pub fn closest_to(&self, grid: &Grid, target: Pos) -> Option<Pos> {
        self.tiles.iter().copied().reduce(|best, p| {
            if grid.distance(p, target) < grid.distance(best, target) {
                p
            } else {
                best
            }
        })
    }
}

/// Граф проходимых для дорог тайлов по четырём соседям; индекс узла равен индексу тайла.
fn passability_graph(grid: &Grid, always_passable: &[Pos]) -> UnGraph<(), f32> {
    let mut passable: Vec<bool> = (0..grid.len())
        .map(|i| is_road_passable(grid, grid.pos(i)))
        .collect();
    for &p in always_passable {
        passable[grid.index(p)] = true;
    }

    let mut graph = UnGraph::with_capacity(grid.len(), grid.len() * 2);
    for _ in 0..grid.len() {
        graph.add_node(());
    }
    for idx in 0..grid.len() {
        if !passable[idx] {
            continue;
        }
        let pos = grid.pos(idx);
        for direction in [Direction::Right, Direction::Bottom] {
            let Some(n) = grid.neighbor(pos, direction) else {
                continue;
            };
            let n_idx = grid.index(n);
            if n_idx != idx && passable[n_idx] {
                graph.add_edge(NodeIndex::new(idx), NodeIndex::new(n_idx), 1.0);
            }
        }
    }
    graph
}

fn shortest_path(graph: &UnGraph<(), f32>, grid: &Grid, start: Pos, goal: Pos) -> Option<Vec<Pos>> {
    let goal_node = NodeIndex::new(grid.index(goal));
    astar(
        graph,
        NodeIndex::new(grid.index(start)),
        |n| n == goal_node,
        |e| *e.weight(),
        |n| grid.distance(grid.pos(n.index()), goal),
    )
    .map(|(_, nodes)| nodes.into_iter().map(|n| grid.pos(n.index())).collect())
}

/// Соединяет дорогой каждую соседнюю пару связанных поселений.
///
/// Дорога начинается с ближайшего к цели тайла существующей дороги, так что
/// поздние дороги ответвляются от ранних. Недостижимые пары пропускаются.
pub fn connect_settlements(
    grid: &mut Grid,
    settlements: &[Settlement],
) -> (Vec<Road>, Vec<SoftFailure>) {
    let mut roads = Vec::new();
    let mut failures = Vec::new();
    if settlements.len() < 2 {
        return (roads, failures);
    }

    let sites: Vec<Pos> = settlements.iter().map(|s| s.position).collect();
    let graph = passability_graph(grid, &sites);
    let mut network = RoadNetwork::default();

    for (i, pair) in settlements.windows(2).enumerate() {
        let (source, dest) = (&pair[0], &pair[1]);
        if !source.connected || !dest.connected {
            continue;
        }
        info!("Building road between '{}' and '{}'", source.name, dest.name);

        network.insert(source.position);
        let start = network
            .closest_to(grid, dest.position)
            .unwrap_or(source.position);

        let Some(path) = shortest_path(&graph, grid, start, dest.position) else {
            warn!("no road from '{}' to '{}'", source.name, dest.name);
            failures.push(SoftFailure::Unreachable {
                from: source.name.clone(),
                to: dest.name.clone(),
                start,
            });
            continue;
        };

        for &p in &path {
            grid.set_kind(p, TileType::Road);
            network.insert(p);
        }
        roads.push(Road {
            from: i,
            to: i + 1,
            path,
        });
    }
    (roads, failures)
}
