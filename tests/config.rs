use std::time::Duration;

use strata::{ConfigError, ConfigWatcher, TerrainConfig, TileConfig, load_config_from_path};

fn temp_config(name: &str, contents: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("strata-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("terrain.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn empty_file_gives_defaults() {
    let cfg = TerrainConfig::from_toml_str("").unwrap();
    assert_eq!(cfg.tile, TileConfig::default());
    assert_eq!(cfg.grid.size, 9);
    assert_eq!(cfg.grid.frame_budget(), Duration::from_millis(4));
    assert_eq!(cfg.pages.page_size, 64);
}

#[test]
fn sections_override_only_what_they_name() {
    let cfg = TerrainConfig::from_toml_str(
        r#"
        [tile]
        edge = 32
        tolerance = 0.25

        [grid]
        size = 5

        [pages]
        capacity = 16

        [noise]
        seed = 7
        "#,
    )
    .unwrap();
    assert_eq!(cfg.tile.edge, 32);
    assert_eq!(cfg.tile.tolerance, 0.25);
    assert_eq!(cfg.tile.compile_grid, 4);
    assert_eq!(cfg.grid.size, 5);
    assert_eq!(cfg.grid.frame_budget_ms, 4.0);
    assert_eq!(cfg.pages.capacity, 16);
    assert_eq!(cfg.pages.page_size, 64);
    assert_eq!(cfg.noise.seed, 7);
}

#[test]
fn validation_failures() {
    let mut cfg = TerrainConfig::default();
    assert_eq!(cfg.validate(), Ok(()));

    cfg.grid.size = 8;
    assert_eq!(cfg.validate(), Err(ConfigError::GridSize(8)));
    cfg.grid.size = 7;

    cfg.tile.edge = 24;
    assert!(matches!(cfg.validate(), Err(ConfigError::Tile(_))));
    cfg.tile.edge = 64;

    cfg.tile.max_texture_size = 300;
    assert!(matches!(cfg.validate(), Err(ConfigError::Tile(_))));
    cfg.tile.max_texture_size = 256;

    cfg.pages.capacity = 0;
    assert_eq!(cfg.validate(), Err(ConfigError::Pages("capacity")));
    cfg.pages.capacity = 4;
    assert!(matches!(
        cfg.validate(),
        Err(ConfigError::PageCapacity { capacity: 4, .. })
    ));
    cfg.pages.capacity = 64;

    cfg.grid.frame_budget_ms = 0.0;
    assert_eq!(cfg.validate(), Err(ConfigError::FrameBudget(0.0)));
}

#[test]
fn page_capacity_covers_one_tile_build() {
    let mut cfg = TerrainConfig::default();
    // 68 lattice samples plus slack span 3 pages of 64 per side, and a
    // touch asks for a 3x3 ring.
    assert_eq!(cfg.pages_per_tile(), 18);

    cfg.pages.page_size = 16;
    cfg.pages.capacity = 40;
    assert_eq!(cfg.pages_per_tile(), 45);
    assert_eq!(
        cfg.validate(),
        Err(ConfigError::PageCapacity {
            capacity: 40,
            needed: 45
        })
    );
    cfg.pages.capacity = 45;
    assert_eq!(cfg.validate(), Ok(()));
}

#[test]
fn parse_and_validation_errors_surface_as_errors() {
    assert!(TerrainConfig::from_toml_str("[tile]\nedge = \"big\"").is_err());
    let err = TerrainConfig::from_toml_str("[grid]\nsize = 4").unwrap_err();
    assert!(err.to_string().contains("odd"), "{err}");
}

#[test]
fn loads_from_disk() {
    let path = temp_config("load", "[tile]\nmax_lod = 2\n");
    let cfg = load_config_from_path(&path).unwrap();
    assert_eq!(cfg.tile.max_lod, 2);
    assert!(load_config_from_path(&path.with_file_name("missing.toml")).is_err());
}

#[test]
fn watcher_reloads_on_request() {
    let path = temp_config("watch", "[tile]\ntolerance = 0.5\n");
    let watcher = ConfigWatcher::spawn(&path);
    assert_eq!(watcher.path(), path.as_path());
    assert!(watcher.poll().is_none());

    watcher.request_reload();
    watcher.request_reload();
    let cfg = watcher.poll().unwrap().unwrap();
    assert_eq!(cfg.tile.tolerance, 0.5);

    std::fs::write(&path, "[grid]\nsize = 2\n").unwrap();
    watcher.request_reload();
    // A file event for the write may also be pending; either way one reload
    // sees the invalid file.
    assert!(watcher.poll().unwrap().is_err());
}
