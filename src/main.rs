use std::path::PathBuf;
use std::time::*;

use mcpeserv::network::resources;
use mcpeserv::prelude::*;

// unused workers are reaped once a minute at 20 ticks per second
const REAP_INTERVAL_TICKS: u64 = 20 * 60;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = ServerConfig::load_or_default(config_path.as_deref())?;

    if let Some(dir) = &config.resource_path {
        resources::set_resource_dir(dir);
    }
    resources::warm()?;

    let mut pool = AsyncPool::from_config(&config.async_workers);
    log::info!("async pool ready with up to {} workers", pool.size());

    let tick = Duration::from_millis(config.tick_millis.max(1));
    let starttime = Instant::now();
    let mut ticks: u64 = 0;
    loop {
        pool.collect_tasks();
        if ticks % REAP_INTERVAL_TICKS == 0 {
            pool.shutdown_unused_workers();
        }

        ticks += 1;
        let next_tick_due = starttime + tick * ticks as u32;
        if let Some(wait) = next_tick_due.checked_duration_since(Instant::now()) {
            std::thread::sleep(wait);
        } else {
            let behind = (Instant::now() - starttime).as_millis() / tick.as_millis() - ticks as u128;
            if behind > 0 {
                log::warn!("tick loop is {behind} ticks behind");
            }
        }
    }
}
