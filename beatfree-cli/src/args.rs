use std::path::PathBuf;

use beatfree_core::action::Action;
use beatfree_types::{ChordType, NoteId, PitchClass};

pub const USAGE: &str = "\
usage: beatfree [options]

  --notes C,E,G'            sound exactly these notes (' = upper octave)
  --chord <root> <type>     sound a chord: Dur, Moll or Maj7
  --interval <root> <name>  sound root plus a named interval, e.g. \"Perfect Fifth\"
  --detune <pc>=<cents>     manual detune, repeatable
  --auto-tune               retune the active notes beat-free after starting
  --reset                   retune the active notes to equal temperament after starting
  --transition-ms <ms>      duration of a gradual retune
  --seconds <s>             how long to play (default 4)
  --render <file.wav>       render offline to a WAV file instead of the sound card
  --state <file.json>       restore activation and detune from a snapshot
  --save-state <file.json>  write a snapshot on exit
  --intervals               print the interval table and exit
  -v, --verbose             debug logging
  -h, --help                this text";

#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub verbose: bool,
    pub help: bool,
    pub list_intervals: bool,
    pub seconds: f64,
    pub render: Option<PathBuf>,
    pub state: Option<PathBuf>,
    pub save_state: Option<PathBuf>,
    /// Applied before playback starts
    pub setup: Vec<Action>,
    /// Applied once playback is running
    pub retune: Vec<Action>,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            verbose: false,
            help: false,
            list_intervals: false,
            seconds: 4.0,
            render: None,
            state: None,
            save_state: None,
            setup: Vec::new(),
            retune: Vec::new(),
        }
    }
}

/// Parse arguments, not including the program name.
pub fn parse_args<I>(args: I) -> Result<CliArgs, String>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = CliArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-v" | "--verbose" => parsed.verbose = true,
            "-h" | "--help" => parsed.help = true,
            "--intervals" => parsed.list_intervals = true,
            "--auto-tune" => parsed.retune.push(Action::AutoTune),
            "--reset" => parsed.retune.push(Action::Reset),
            "--notes" => {
                let list = value(&mut args, &arg)?;
                let notes = list
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| s.parse::<NoteId>().map_err(|e| e.to_string()))
                    .collect::<Result<Vec<_>, _>>()?;
                parsed.setup.push(Action::SetNotes(notes));
            }
            "--chord" => {
                let root = pitch_class(&value(&mut args, &arg)?)?;
                let chord = value(&mut args, &arg)?.parse::<ChordType>()?;
                parsed.setup.push(Action::ApplyChord { root, chord });
            }
            "--interval" => {
                let root = pitch_class(&value(&mut args, &arg)?)?;
                let interval = value(&mut args, &arg)?;
                parsed.setup.push(Action::ApplyInterval { root, interval });
            }
            "--detune" => {
                let spec = value(&mut args, &arg)?;
                let (pc, cents) = spec
                    .split_once('=')
                    .ok_or_else(|| format!("--detune expects <pc>=<cents>, got '{}'", spec))?;
                let pitch_class = pitch_class(pc)?;
                let cents = number(cents.trim(), "--detune")?;
                parsed.setup.push(Action::SetDetune { pitch_class, cents });
            }
            "--transition-ms" => {
                let ms = value(&mut args, &arg)?;
                let ms = ms
                    .parse::<u64>()
                    .map_err(|_| format!("--transition-ms expects milliseconds, got '{}'", ms))?;
                parsed.setup.push(Action::SetTransitionMs(ms));
            }
            "--seconds" => {
                let secs = number(&value(&mut args, &arg)?, "--seconds")?;
                if secs < 0.0 {
                    return Err("--seconds must not be negative".to_string());
                }
                parsed.seconds = secs;
            }
            "--render" => parsed.render = Some(PathBuf::from(value(&mut args, &arg)?)),
            "--state" => parsed.state = Some(PathBuf::from(value(&mut args, &arg)?)),
            "--save-state" => parsed.save_state = Some(PathBuf::from(value(&mut args, &arg)?)),
            other => return Err(format!("unknown argument '{}'", other)),
        }
    }
    Ok(parsed)
}

fn value<I: Iterator<Item = String>>(args: &mut I, flag: &str) -> Result<String, String> {
    args.next().ok_or_else(|| format!("{} needs a value", flag))
}

fn pitch_class(s: &str) -> Result<PitchClass, String> {
    s.trim().parse::<PitchClass>().map_err(|e| e.to_string())
}

fn number(s: &str, flag: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(format!("{} expects a number, got '{}'", flag, s)),
    }
}
