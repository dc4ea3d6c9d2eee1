use std::path::PathBuf;

use clap::Parser;
use fantasy_mapgen::{
    GenerationConfig, GenerationObserver, Stage, StepControl, World, WorldGenerator,
};

/// Генератор фэнтезийных карт мира
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к TOML-файлу конфигурации (без него берутся значения по умолчанию)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Заменяет сид из конфигурации
    #[arg(short, long)]
    seed: Option<u64>,

    /// Заменяет сторону карты в тайлах
    #[arg(long)]
    size: Option<u32>,

    /// Куда сохранить карту
    #[arg(short, long, default_value = "world.png")]
    output: PathBuf,

    /// Дополнительно сохранить JSON-снимок мира
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Дополнительно сохранить итоговую карту высот в оттенках серого
    #[arg(long)]
    heightmap: Option<PathBuf>,
}

struct ConsoleProgress;

impl GenerationObserver for ConsoleProgress {
    fn on_progress(&mut self, message: &str) {
        println!("{message}");
    }

    fn on_stage_complete(&mut self, stage: Stage, world: &World) -> StepControl {
        if stage == Stage::Settlements {
            println!(
                "  поселений: {}, дорог: {}",
                world.settlements.len(),
                world.roads.len()
            );
        }
        StepControl::Continue
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            println!("Загрузка конфигурации из {}", path.display());
            GenerationConfig::from_toml_file(path)?
        }
        None => GenerationConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(size) = cli.size {
        config.world_size = size;
    }

    println!(
        "Генерация мира {0}×{0} (сид {1})",
        config.world_size, config.seed
    );
    let world = WorldGenerator::new(config).generate(&mut ConsoleProgress)?;

    println!("Сохранение карты в {}", cli.output.display());
    world.save_as_png(&cli.output)?;

    if let Some(path) = &cli.heightmap {
        println!("Сохранение карты высот в {}", path.display());
        world.heightmap().save_as_png(path)?;
    }

    if let Some(path) = &cli.snapshot {
        println!("Сохранение снимка в {}", path.display());
        world.to_snapshot().save_json(path)?;
    }

    println!("\nГотово!");
    Ok(())
}
