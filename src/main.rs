use alarmon::{AlarmEngine, Config, SignalBus};
use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> Result<()> {
    alarmon::init_logging();

    info!("alarmon v{} starting", alarmon::VERSION);

    let Some(config_path) = std::env::args().nth(1) else {
        error!("Usage: alarmon <config.yaml>");
        std::process::exit(1);
    };

    let config = Config::from_file(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;
    info!(
        "Loaded {} signals, {} digital alarms, {} analog alarms",
        config.signals.len(),
        config.digital_alarms.len(),
        config.analog_alarms.len()
    );

    let bus = SignalBus::new();
    let engine = AlarmEngine::from_config(&config, &bus).context("Failed to start alarm engine")?;

    for alarm in engine.list_alarms() {
        info!(
            "{:?} alarm '{}' enabled={} state={}",
            alarm.alarm_type, alarm.name, alarm.enabled, alarm.state
        );
    }

    let mut events = engine.subscribe();
    let event_logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => println!("{}", json),
                    Err(e) => warn!("Failed to encode event: {}", e),
                },
                Err(RecvError::Lagged(missed)) => warn!("Event logger lagged, {} events dropped", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    #[cfg(feature = "simulation")]
    let simulator = config.simulation.as_ref().map(|simulation| {
        let simulator = alarmon::Simulator::new(bus.clone(), simulation);
        info!("Simulating {} signals", simulator.len());
        tokio::spawn(simulator.run())
    });
    #[cfg(not(feature = "simulation"))]
    if config.simulation.is_some() {
        warn!("Configuration has a simulation section but the simulation feature is disabled");
    }

    signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    info!("Received shutdown signal");

    #[cfg(feature = "simulation")]
    if let Some(simulator) = simulator {
        simulator.abort();
    }
    engine.shutdown();
    event_logger.abort();

    let stats = engine.stats();
    info!(
        "Final stats: {} ticks, {} events, uptime: {}s",
        stats.tick_count, stats.events_published, stats.uptime_secs
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
