use fantasy_mapgen::classify::assign_tile_types;
use fantasy_mapgen::cleanup::RegionCleaner;
use fantasy_mapgen::config::{LocationConfig, ThresholdMode};
use fantasy_mapgen::heightmap::plasma_heightmap;
use fantasy_mapgen::rivers::RiverState;
use fantasy_mapgen::{
    GenerationConfig, GenerationError, Grid, NoopObserver, Pos, SoftFailure, TerrainProfile,
    TileType, WorldGenerator, WorldSnapshot,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn open_land_config() -> GenerationConfig {
    let mut config = GenerationConfig {
        seed: 2024,
        world_size: 64,
        spherical_world: false,
        ..Default::default()
    };
    config.classification.profile = TerrainProfile::Simple;
    config.classification.threshold_mode = ThresholdMode::Fixed;
    // Любая нормализованная высота попадает в полосу суши.
    config.classification.fixed_levels = vec![0.0, 1.1, 1.1];
    config.forest.part = 0.0;
    config.rivers.count = 0;
    config.settlements.min_distance = 10.0;
    config.settlements.locations = ["A", "B", "C"].into_iter().map(LocationConfig::new).collect();
    config
}

fn is_four_adjacent(a: Pos, b: Pos) -> bool {
    a.x.abs_diff(b.x) + a.y.abs_diff(b.y) == 1
}

#[test]
fn settlements_on_open_land_are_linked_by_roads() {
    let world = WorldGenerator::new(open_land_config())
        .generate(&mut NoopObserver)
        .unwrap();

    assert!(world.warnings.is_empty(), "{:?}", world.warnings);
    assert_eq!(world.settlements.len(), 3);
    let names: Vec<&str> = world.settlements.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["A", "B", "C"]);

    for (i, a) in world.settlements.iter().enumerate() {
        assert_eq!(world.grid.kind(a.position), TileType::Road);
        for b in &world.settlements[i + 1..] {
            assert!(world.grid.distance(a.position, b.position) >= 10.0);
        }
    }

    assert_eq!(world.roads.len(), 2);
    for road in &world.roads {
        let dest = world.settlements[road.to].position;
        assert_eq!(road.path.last(), Some(&dest));
        assert!(road.path.windows(2).all(|w| is_four_adjacent(w[0], w[1])));
        assert!(road.path.iter().all(|&p| world.grid.kind(p) == TileType::Road));
    }
    // Первая дорога выходит из своего исходного поселения.
    assert_eq!(world.roads[0].path[0], world.settlements[0].position);
}

#[test]
fn half_water_map_keeps_roads_on_land() {
    let mut config = open_land_config();
    config.classification.fixed_levels = vec![0.5, 1.0, 1.0];
    let world = WorldGenerator::new(config).generate(&mut NoopObserver).unwrap();

    assert_eq!(world.settlements.len(), 3);
    for settlement in &world.settlements {
        assert_eq!(world.grid.kind(settlement.position), TileType::Road);
    }
    // Разделённые водой пары могут быть недостижимы, но каждая дорога связна.
    for road in &world.roads {
        assert_eq!(road.path.last(), Some(&world.settlements[road.to].position));
        assert!(road.path.windows(2).all(|w| is_four_adjacent(w[0], w[1])));
        assert!(road.path.iter().all(|&p| !world.grid.kind(p).is_water()));
    }
    assert!(
        world
            .warnings
            .iter()
            .all(|w| matches!(w, SoftFailure::Unreachable { .. }))
    );
}

#[test]
fn unconnected_settlement_breaks_its_pairs() {
    let mut config = open_land_config();
    config.settlements.locations[1].connected = false;
    let world = WorldGenerator::new(config).generate(&mut NoopObserver).unwrap();
    assert_eq!(world.settlements.len(), 3);
    assert!(world.roads.is_empty());
}

#[test]
fn exhausted_placement_skips_roads() {
    let mut config = open_land_config();
    config.settlements.min_distance = 95.0;
    config.settlements.max_attempts = 20;
    let world = WorldGenerator::new(config).generate(&mut NoopObserver).unwrap();
    assert!(world.settlements.len() < 3);
    assert!(world.roads.is_empty());
    assert!(matches!(
        world.warnings.last(),
        Some(SoftFailure::PlacementExhausted { .. })
    ));
}

#[test]
fn gradient_plateau_forms_one_land_region() {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let mut map = plasma_heightmap(65, 65, [0.0, 0.0, 0.0, 1.0], 0.0, 2.0, &mut rng);
    map.normalize();
    let mut grid = Grid::from_heightmap(&map, false);
    assign_tile_types(&mut grid, &[0.5, 1.0, 1.0], TerrainProfile::Simple);

    let mut cleaner = RegionCleaner::new(&grid);
    let land = cleaner.find_regions(&grid, &[TileType::Land, TileType::Snow]);
    assert_eq!(land.len(), 1);
    let water = cleaner.find_regions(&grid, &[TileType::Water]);
    assert_eq!(water.len(), 1);
    assert_eq!(land[0].len() + water[0].len(), 65 * 65);
}

#[test]
fn invalid_configuration_is_rejected() {
    let mut config = open_land_config();
    config.classification.fixed_levels = vec![0.9, 0.1, 1.0];
    assert!(matches!(
        WorldGenerator::new(config).generate(&mut NoopObserver),
        Err(GenerationError::InvalidConfig(_))
    ));

    let mut config = open_land_config();
    config.world_size = 0;
    assert!(WorldGenerator::new(config).generate(&mut NoopObserver).is_err());
}

#[test]
fn accepted_rivers_are_carved_and_valid() {
    let mut config = GenerationConfig {
        seed: 99,
        world_size: 96,
        ..Default::default()
    };
    config.rivers.count = 6;
    config.rivers.min_turns = 1;
    config.rivers.min_length = 5;
    config.settlements.locations.clear();

    let world = WorldGenerator::new(config.clone())
        .generate(&mut NoopObserver)
        .unwrap();
    assert!(world.rivers.len() <= 6);
    for river in &world.rivers {
        assert_eq!(river.state, RiverState::Validated);
        assert!(river.satisfies(&config.rivers));
        assert!(
            river
                .tiles
                .iter()
                .all(|&p| world.grid.kind(p) == TileType::River)
        );
    }
    if world.rivers.len() < 6 {
        assert!(world.warnings.contains(&SoftFailure::RiversShort {
            requested: 6,
            accepted: world.rivers.len(),
        }));
    }
}

#[test]
fn snapshot_survives_a_file_round_trip() {
    let world = WorldGenerator::new(open_land_config())
        .generate(&mut NoopObserver)
        .unwrap();
    let path = std::env::temp_dir().join(format!("fantasy-mapgen-{}.json", std::process::id()));

    let snapshot = world.to_snapshot();
    snapshot.save_json(&path).unwrap();
    let loaded = WorldSnapshot::load_json(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded, snapshot);
    let grid = loaded.into_grid().unwrap();
    assert_eq!(grid.count(TileType::Road), world.grid.count(TileType::Road));
}

#[test]
fn config_file_drives_generation() {
    let path = std::env::temp_dir().join(format!("fantasy-mapgen-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        r#"
        seed = 5
        world_size = 32
        spherical_world = false

        [rivers]
        count = 0

        [[settlements.locations]]
        name = "Lonely"
        "#,
    )
    .unwrap();
    let config = GenerationConfig::from_toml_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.world_size, 32);
    let world = WorldGenerator::new(config).generate(&mut NoopObserver).unwrap();
    assert_eq!(world.grid.len(), 32 * 32);
    assert!(world.roads.is_empty());
}
