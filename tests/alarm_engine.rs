use alarmon::*;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::sleep;

fn drain(rx: &mut broadcast::Receiver<AlarmEvent>) -> Vec<AlarmEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
    events
}

fn state(engine: &AlarmEngine, name: &str) -> AlarmState {
    engine.list_alarms().into_iter().find(|a| a.name == name).unwrap().state
}

fn tank(engine: &AlarmEngine, level: &FloatSignal) -> bool {
    engine.add_analog_alarm(true, level.handle(), Some(0.2), Some(0.3), Some(0.4), Some(0.5), 1000, "tank")
}

#[tokio::test(start_paused = true)]
async fn test_registration_visible_in_list() {
    let engine = AlarmEngine::init(100).unwrap();
    let door = BoolSignal::new(false);
    let level = FloatSignal::new(0.35);

    assert!(engine.add_digital_alarm(true, door.handle(), Polarity::ActiveHigh, 1000, 500, "door_open"));
    assert!(engine.add_analog_alarm(false, level.handle(), None, None, Some(0.4), None, 0, "level_high"));

    let list = engine.list_alarms();
    assert_eq!(list.len(), 2);
    assert_eq!(
        list[0],
        AlarmSummary {
            name: "door_open".into(),
            enabled: true,
            alarm_type: AlarmType::Digital,
            state: AlarmState::Digital(false),
        }
    );
    assert_eq!(
        list[1],
        AlarmSummary {
            name: "level_high".into(),
            enabled: false,
            alarm_type: AlarmType::Analog,
            state: AlarmState::Analog(AnalogState::Nominal),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_names_rejected_across_types() {
    let engine = AlarmEngine::init(100).unwrap();
    let door = BoolSignal::new(false);
    let level = FloatSignal::new(0.0);

    assert!(engine.add_digital_alarm(true, door.handle(), Polarity::ActiveHigh, 0, 0, "alarm1"));
    assert!(!engine.add_digital_alarm(true, door.handle(), Polarity::ActiveLow, 0, 0, "alarm1"));
    assert!(!engine.add_analog_alarm(true, level.handle(), Some(0.1), None, None, None, 0, "alarm1"));
    assert_eq!(engine.list_alarms().len(), 1);

    assert!(engine.add_analog_alarm(true, level.handle(), Some(0.1), None, None, None, 0, "alarm2"));
    assert!(!engine.add_digital_alarm(true, door.handle(), Polarity::ActiveHigh, 0, 0, "alarm2"));
    assert_eq!(engine.list_alarms().len(), 2);

    let err = engine
        .add_digital(DigitalAlarm::new(
            "alarm2",
            door.handle(),
            Polarity::ActiveHigh,
            Duration::ZERO,
            Duration::ZERO,
        ))
        .unwrap_err();
    assert!(matches!(err, AlarmError::DuplicateName(name) if name == "alarm2"));
}

#[tokio::test(start_paused = true)]
async fn test_empty_name_rejected() {
    let engine = AlarmEngine::init(100).unwrap();
    let door = BoolSignal::new(false);
    assert!(!engine.add_digital_alarm(true, door.handle(), Polarity::ActiveHigh, 0, 0, ""));
    assert!(engine.list_alarms().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_digital_short_pulse_is_debounced() {
    let engine = AlarmEngine::init(100).unwrap();
    let mut events = engine.subscribe();
    let door = BoolSignal::new(false);
    engine.add_digital_alarm(true, door.handle(), Polarity::ActiveHigh, 1000, 500, "door_open");

    door.set(true);
    sleep(Duration::from_millis(550)).await;
    door.set(false);
    sleep(Duration::from_millis(2000)).await;

    assert!(drain(&mut events).is_empty());
    assert_eq!(state(&engine, "door_open"), AlarmState::Digital(false));
}

#[tokio::test(start_paused = true)]
async fn test_digital_set_then_reset() {
    let engine = AlarmEngine::init(100).unwrap();
    let mut events = engine.subscribe();
    let door = BoolSignal::new(false);
    engine.add_digital_alarm(true, door.handle(), Polarity::ActiveHigh, 1000, 500, "door_open");

    door.set(true);
    sleep(Duration::from_millis(950)).await;
    assert!(drain(&mut events).is_empty());

    sleep(Duration::from_millis(150)).await;
    let set = drain(&mut events);
    assert_eq!(set.len(), 1);
    assert_eq!(set[0].kind, AlarmEventKind::Set);
    assert_eq!(set[0].name, "door_open");
    assert_eq!(set[0].state, AlarmState::Digital(true));
    assert_eq!(state(&engine, "door_open"), AlarmState::Digital(true));

    // held long after confirmation: no repeat
    sleep(Duration::from_millis(3000)).await;
    assert!(drain(&mut events).is_empty());

    door.set(false);
    sleep(Duration::from_millis(400)).await;
    assert!(drain(&mut events).is_empty());

    sleep(Duration::from_millis(300)).await;
    let reset = drain(&mut events);
    assert_eq!(reset.len(), 1);
    assert_eq!(reset[0].kind, AlarmEventKind::Reset);
    assert_eq!(reset[0].state, AlarmState::Digital(false));
    assert_eq!(state(&engine, "door_open"), AlarmState::Digital(false));
}

#[tokio::test(start_paused = true)]
async fn test_digital_active_low() {
    let engine = AlarmEngine::init(100).unwrap();
    let mut events = engine.subscribe();
    let pressure_ok = BoolSignal::new(true);
    engine.add_digital_alarm(true, pressure_ok.handle(), Polarity::ActiveLow, 200, 200, "low_pressure");

    sleep(Duration::from_millis(1000)).await;
    assert!(drain(&mut events).is_empty());

    pressure_ok.set(false);
    sleep(Duration::from_millis(500)).await;
    let fired = drain(&mut events);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].kind, AlarmEventKind::Set);
}

#[tokio::test(start_paused = true)]
async fn test_analog_high_then_low_low() {
    let engine = AlarmEngine::init(100).unwrap();
    let mut events = engine.subscribe();
    let level = FloatSignal::new(0.1);
    assert!(tank(&engine, &level));

    level.set(0.45);
    sleep(Duration::from_millis(900)).await;
    assert_eq!(state(&engine, "tank"), AlarmState::Analog(AnalogState::Nominal));

    sleep(Duration::from_millis(200)).await;
    let high = drain(&mut events);
    assert_eq!(high.len(), 1);
    assert_eq!(high[0].kind, AlarmEventKind::Set);
    assert_eq!(high[0].alarm_type, AlarmType::Analog);
    assert_eq!(high[0].state, AlarmState::Analog(AnalogState::High));

    level.set(0.1);
    sleep(Duration::from_millis(950)).await;
    assert_eq!(state(&engine, "tank"), AlarmState::Analog(AnalogState::High));

    sleep(Duration::from_millis(250)).await;
    let low_low = drain(&mut events);
    assert_eq!(low_low.len(), 1);
    // LL is more severe than H
    assert_eq!(low_low[0].kind, AlarmEventKind::Set);
    assert_eq!(low_low[0].state, AlarmState::Analog(AnalogState::LowLow));
}

#[tokio::test(start_paused = true)]
async fn test_analog_clearing_publishes_reset() {
    let engine = AlarmEngine::init(100).unwrap();
    let mut events = engine.subscribe();
    let level = FloatSignal::new(0.6);
    tank(&engine, &level);

    sleep(Duration::from_millis(1200)).await;
    assert_eq!(state(&engine, "tank"), AlarmState::Analog(AnalogState::HighHigh));
    drain(&mut events);

    level.set(0.45);
    sleep(Duration::from_millis(1200)).await;
    let high = drain(&mut events);
    assert_eq!(high.len(), 1);
    assert_eq!(high[0].kind, AlarmEventKind::Reset);
    assert_eq!(high[0].state, AlarmState::Analog(AnalogState::High));

    level.set(0.35);
    sleep(Duration::from_millis(1200)).await;
    let nominal = drain(&mut events);
    assert_eq!(nominal.len(), 1);
    assert_eq!(nominal[0].kind, AlarmEventKind::Reset);
    assert_eq!(nominal[0].state, AlarmState::Analog(AnalogState::Nominal));
}

#[tokio::test(start_paused = true)]
async fn test_analog_excursion_shorter_than_delay_ignored() {
    let engine = AlarmEngine::init(100).unwrap();
    let mut events = engine.subscribe();
    let level = FloatSignal::new(0.35);
    tank(&engine, &level);

    for _ in 0..5 {
        level.set(0.45);
        sleep(Duration::from_millis(500)).await;
        level.set(0.35);
        sleep(Duration::from_millis(500)).await;
    }

    assert!(drain(&mut events).is_empty());
    assert_eq!(state(&engine, "tank"), AlarmState::Analog(AnalogState::Nominal));
}

#[tokio::test(start_paused = true)]
async fn test_remove_with_pending_timer() {
    let engine = AlarmEngine::init(100).unwrap();
    let mut events = engine.subscribe();
    let level = FloatSignal::new(0.45);
    let door = BoolSignal::new(true);
    tank(&engine, &level);
    engine.add_digital_alarm(true, door.handle(), Polarity::ActiveHigh, 1000, 500, "door_open");

    sleep(Duration::from_millis(500)).await;
    assert!(engine.remove_alarm("tank"));
    assert!(engine.remove_alarm("door_open"));
    assert!(!engine.remove_alarm("tank"));

    sleep(Duration::from_millis(3000)).await;
    assert!(drain(&mut events).is_empty());
    assert!(engine.list_alarms().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_disable_suppresses_until_enabled() {
    let engine = AlarmEngine::init(100).unwrap();
    let mut events = engine.subscribe();
    let door = BoolSignal::new(true);
    engine.add_digital_alarm(true, door.handle(), Polarity::ActiveHigh, 1000, 500, "door_open");

    sleep(Duration::from_millis(1200)).await;
    assert_eq!(drain(&mut events).len(), 1);

    assert!(engine.disable_alarm("door_open"));
    let summary = engine.alarm("door_open").unwrap();
    assert!(!summary.enabled);
    assert_eq!(summary.state, AlarmState::Digital(false));

    sleep(Duration::from_millis(5000)).await;
    assert!(drain(&mut events).is_empty());
    assert_eq!(state(&engine, "door_open"), AlarmState::Digital(false));

    assert!(engine.enable_alarm("door_open"));
    sleep(Duration::from_millis(1200)).await;
    let again = drain(&mut events);
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].kind, AlarmEventKind::Set);

    assert!(!engine.disable_alarm("missing"));
    assert!(!engine.enable_alarm("missing"));
}

#[tokio::test(start_paused = true)]
async fn test_disable_cancels_pending_analog_timer() {
    let engine = AlarmEngine::init(100).unwrap();
    let mut events = engine.subscribe();
    let level = FloatSignal::new(0.45);
    tank(&engine, &level);

    sleep(Duration::from_millis(500)).await;
    assert!(engine.disable_alarm("tank"));
    sleep(Duration::from_millis(2000)).await;

    assert!(drain(&mut events).is_empty());
    assert_eq!(state(&engine, "tank"), AlarmState::Analog(AnalogState::Nominal));
}

#[tokio::test(start_paused = true)]
async fn test_reset_is_idempotent() {
    let engine = AlarmEngine::init(100).unwrap();
    let mut events = engine.subscribe();
    let level = FloatSignal::new(0.6);
    tank(&engine, &level);

    sleep(Duration::from_millis(1200)).await;
    assert_eq!(drain(&mut events).len(), 1);

    assert!(engine.reset_alarm("tank"));
    assert_eq!(state(&engine, "tank"), AlarmState::Analog(AnalogState::Nominal));
    assert!(engine.alarm("tank").unwrap().enabled);

    assert!(engine.reset_alarm("tank"));
    assert_eq!(state(&engine, "tank"), AlarmState::Analog(AnalogState::Nominal));

    assert!(!engine.reset_alarm("missing"));
    // reset publishes nothing
    assert!(drain(&mut events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reset_during_reset_delay_rearms_set_delay() {
    let engine = AlarmEngine::init(10).unwrap();
    let mut events = engine.subscribe();
    let door = BoolSignal::new(false);
    engine.add_digital_alarm(true, door.handle(), Polarity::ActiveHigh, 100, 2000, "door_open");

    door.set(true);
    sleep(Duration::from_millis(150)).await;
    assert_eq!(drain(&mut events).len(), 1);

    // reset delay running when the operator resets
    door.set(false);
    sleep(Duration::from_millis(50)).await;
    assert!(engine.reset_alarm("door_open"));
    door.set(true);

    sleep(Duration::from_millis(500)).await;
    let set = drain(&mut events);
    assert_eq!(set.len(), 1);
    assert_eq!(set[0].kind, AlarmEventKind::Set);
    assert_eq!(state(&engine, "door_open"), AlarmState::Digital(true));

    // the abandoned reset delay never fires
    sleep(Duration::from_millis(3000)).await;
    assert!(drain(&mut events).is_empty());
    assert_eq!(state(&engine, "door_open"), AlarmState::Digital(true));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_thresholds_rejected() {
    let engine = AlarmEngine::init(100).unwrap();
    let level = FloatSignal::new(0.0);

    assert!(!engine.add_analog_alarm(true, level.handle(), Some(0.2), Some(0.5), Some(0.4), Some(0.6), 0, "bad_order"));
    assert!(!engine.add_analog_alarm(true, level.handle(), None, None, None, None, 0, "all_unset"));
    assert!(!engine.add_analog_alarm(true, level.handle(), Some(f64::NAN), None, None, None, 0, "nan"));
    assert!(engine.list_alarms().is_empty());

    let err = engine
        .add_analog(AnalogAlarm::new(
            "bad_order",
            level.handle(),
            Thresholds { ll: None, l: Some(0.5), h: Some(0.4), hh: None },
            Duration::ZERO,
        ))
        .unwrap_err();
    assert!(matches!(err, AlarmError::InvalidThresholds(_)));
}

#[tokio::test(start_paused = true)]
async fn test_engine_from_config_drives_bus_signals() {
    let config = Config::from_yaml(
        r#"
engine:
  poll_interval_ms: 50
signals:
  - { name: door, type: bool, initial: false }
  - { name: tank_level, type: float, initial: 0.35 }
digital_alarms:
  - { name: door_open, signal: door, set_delay_ms: 500, reset_delay_ms: 500 }
analog_alarms:
  - { name: tank, signal: tank_level, ll: 0.2, l: 0.3, h: 0.4, hh: 0.5, set_delay_ms: 500 }
"#,
    )
    .unwrap();

    let bus = SignalBus::new();
    let engine = AlarmEngine::from_config(&config, &bus).unwrap();
    let mut events = engine.subscribe();
    assert_eq!(engine.list_alarms().len(), 2);
    assert_eq!(engine.poll_interval(), Duration::from_millis(50));

    bus.set("door", Value::Bool(true)).unwrap();
    bus.set("tank_level", Value::Float(0.1)).unwrap();
    sleep(Duration::from_millis(700)).await;

    let mut fired: Vec<(String, AlarmState)> = drain(&mut events)
        .into_iter()
        .map(|e| (e.name, e.state))
        .collect();
    fired.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        fired,
        vec![
            ("door_open".to_string(), AlarmState::Digital(true)),
            ("tank".to_string(), AlarmState::Analog(AnalogState::LowLow)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_dropping_engine_stops_everything() {
    let engine = AlarmEngine::init(100).unwrap();
    let mut events = engine.subscribe();
    let door = BoolSignal::new(true);
    engine.add_digital_alarm(true, door.handle(), Polarity::ActiveHigh, 500, 500, "door_open");

    sleep(Duration::from_millis(200)).await;
    drop(engine);
    sleep(Duration::from_millis(2000)).await;

    assert!(matches!(events.try_recv(), Err(TryRecvError::Closed)));
}

#[tokio::test]
async fn test_oversized_event_channel_rejected() {
    let config = EngineConfig { event_channel_capacity: usize::MAX, ..EngineConfig::default() };
    assert!(matches!(AlarmEngine::new(&config), Err(AlarmError::Config(_))));

    let config = EngineConfig { event_channel_capacity: MAX_EVENT_CHANNEL_CAPACITY, ..EngineConfig::default() };
    assert!(AlarmEngine::new(&config).is_ok());
}
