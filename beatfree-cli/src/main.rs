mod args;
mod report;

use std::fs::File;
use std::path::Path;
use std::time::{Duration, Instant};

use beatfree_audio::{write_wav, AudioBackend, AudioOutput, NullBackend, OfflineBackend};
use beatfree_core::action::Action;
use beatfree_core::config::Config;
use beatfree_core::dispatch::dispatch_action;
use beatfree_core::snapshot::TunerSnapshot;
use beatfree_core::Tuner;
use beatfree_types::DetuneMap;

use args::{parse_args, CliArgs, USAGE};

const FRAME: Duration = Duration::from_millis(16);
/// Upper bound on frames spent waiting for fades after stop.
const MAX_TAIL_FRAMES: u32 = 250;

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("beatfree")
        .join("beatfree.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = File::create(&log_path).unwrap_or_else(|_| {
        File::create(std::env::temp_dir().join("beatfree.log")).expect("Cannot create log file")
    });

    WriteLogger::init(log_level, simplelog::Config::default(), log_file)
        .expect("Failed to initialize logger");

    log::info!("beatfree starting (log level: {:?})", log_level);
}

fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    if args.help {
        println!("{}", USAGE);
        return;
    }
    if args.list_intervals {
        print!("{}", report::format_interval_table());
        return;
    }

    init_logging(args.verbose);
    let config = Config::load();

    let result = match &args.render {
        Some(path) => run_offline(&args, &config, path),
        None => run_live(&args, &config),
    };
    if let Err(e) = result {
        log::error!("{}", e);
        eprintln!("beatfree: {}", e);
        std::process::exit(1);
    }
}

fn build_tuner(
    backend: Box<dyn AudioBackend>,
    config: &Config,
    args: &CliArgs,
    now: Instant,
) -> Result<Tuner, String> {
    let mut tuner = Tuner::new(
        backend,
        config.tuner_settings(),
        config.default_activation(),
        DetuneMap::zeroed(),
    );
    if let Some(path) = &args.state {
        let snapshot = TunerSnapshot::load(path)?;
        tuner.restore(&snapshot, now);
        log::info!("restored state from {}", path.display());
    }
    Ok(tuner)
}

/// Setup actions, then playback, then the requested retunes.
fn start(tuner: &mut Tuner, args: &CliArgs, now: Instant) {
    for action in args.setup.iter() {
        run_action(action, tuner, now);
    }
    run_action(&Action::Play, tuner, now);
    for action in args.retune.iter() {
        run_action(action, tuner, now);
    }
}

fn run_action(action: &Action, tuner: &mut Tuner, now: Instant) {
    let result = dispatch_action(action, tuner, now);
    for line in result.status {
        println!("{}", line);
    }
}

fn finish(tuner: &mut Tuner, args: &CliArgs) -> Result<(), String> {
    print!("{}", report::format_detune_table(tuner));
    if let Some(path) = &args.save_state {
        tuner.snapshot().save(path)?;
        println!("saved state to {}", path.display());
    }
    tuner.shutdown();
    Ok(())
}

fn run_live(args: &CliArgs, config: &Config) -> Result<(), String> {
    let (output, backend): (Option<AudioOutput>, Box<dyn AudioBackend>) =
        match AudioOutput::open_default() {
            Ok((output, backend)) => (Some(output), Box::new(backend) as Box<dyn AudioBackend>),
            Err(e) => {
                log::warn!(target: "audio::device", "{}; continuing without sound", e);
                eprintln!("no audio output ({}); continuing without sound", e);
                (None, Box::new(NullBackend))
            }
        };
    if let Some(output) = &output {
        println!(
            "playing on {} ({} Hz, {} ch)",
            output.device_name(),
            output.sample_rate(),
            output.channels()
        );
    }

    let mut tuner = build_tuner(backend, config, args, Instant::now())?;
    start(&mut tuner, args, Instant::now());

    let started = Instant::now();
    let play_for = Duration::from_secs_f64(args.seconds);
    while started.elapsed() < play_for {
        tuner.tick(Instant::now());
        std::thread::sleep(FRAME);
    }

    tuner.stop();
    let mut frames = 0;
    while !tuner.is_silent() && frames < MAX_TAIL_FRAMES {
        std::thread::sleep(FRAME);
        tuner.tick(Instant::now());
        frames += 1;
    }

    finish(&mut tuner, args)?;
    drop(output);
    Ok(())
}

/// Drive the tuner on a simulated frame clock, rendering one frame of audio
/// before each tick so both clocks move together.
fn run_offline(args: &CliArgs, config: &Config, path: &Path) -> Result<(), String> {
    let renderer = OfflineBackend::new(config.sample_rate());
    let sample_rate = renderer.sample_rate();
    let frames_per_tick = (sample_rate as u128 * FRAME.as_millis() / 1000) as usize;

    let t0 = Instant::now();
    let mut elapsed = Duration::ZERO;
    let mut samples = Vec::new();

    let mut tuner = build_tuner(Box::new(renderer.clone()), config, args, t0)?;
    start(&mut tuner, args, t0);

    let ticks = (args.seconds * 1000.0 / FRAME.as_millis() as f64).ceil() as u64;
    for _ in 0..ticks {
        samples.extend(renderer.render(frames_per_tick));
        elapsed += FRAME;
        tuner.tick(t0 + elapsed);
    }

    tuner.stop();
    let mut frames = 0;
    while !tuner.is_silent() && frames < MAX_TAIL_FRAMES {
        samples.extend(renderer.render(frames_per_tick));
        elapsed += FRAME;
        tuner.tick(t0 + elapsed);
        frames += 1;
    }

    write_wav(path, &samples, sample_rate)?;
    println!(
        "rendered {:.2}s to {}",
        samples.len() as f64 / sample_rate as f64,
        path.display()
    );
    finish(&mut tuner, args)
}
