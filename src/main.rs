use std::sync::Arc;
use std::time::Duration;

use biosphere::{config, schema, Engine};

/// Headless driver: run the world for a while, then report and save.
/// Usage: `biosphere [seconds] [config.json]`
fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let run_seconds: u64 = args
        .next()
        .and_then(|value| value.parse().ok())
        .unwrap_or(30);
    let config_path = args.next().unwrap_or_else(|| "biosphere.json".to_string());
    config::install_from_file(&config_path);

    let env = &config::settings().environment;
    let engine = Arc::new(Engine::new(env.map_width, env.map_height));

    let runner = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || engine.run())
    };

    std::thread::sleep(Duration::from_secs(run_seconds));
    engine.stop();
    match runner.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::error!("engine stopped with error: {e}"),
        Err(_) => log::error!("engine thread panicked"),
    }

    let data = engine.simulation().data();
    log::info!(
        "world time {:.1}s: {} creatures, {} food, {} eggs, {} species",
        data.world_time,
        data.creatures.len(),
        data.food.len(),
        data.eggs.len(),
        engine
            .cluster()
            .species_sizes()
            .keys()
            .filter(|&&label| label != biosphere::cluster::NOISE)
            .count(),
    );

    if let Err(e) = schema::write_json("biosphere_save.json", &data) {
        log::warn!("could not save the final snapshot: {e}");
    }
}
