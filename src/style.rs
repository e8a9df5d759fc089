//! Terminal output helpers for the CLI boundary.
//!
//! The report core emits byte-neutral strings; every escape sequence and
//! color decision lives here. Color is a single capability decision
//! (`NO_COLOR` plus stdout capability) applied through one `paint` helper.

use std::{
   io::{self, Write},
   sync::{OnceLock, mpsc},
   thread,
   time::Duration,
};

use owo_colors::OwoColorize;

static COLOR: OnceLock<bool> = OnceLock::new();

/// One capability check, cached: an exported `NO_COLOR` disables color
/// outright, otherwise stdout must report basic color support.
fn use_color() -> bool {
   *COLOR.get_or_init(|| {
      std::env::var_os("NO_COLOR").is_none()
         && supports_color::on(supports_color::Stream::Stdout)
            .is_some_and(|level| level.has_basic)
   })
}

/// The handful of roles this CLI distinguishes.
#[derive(Debug, Clone, Copy)]
pub enum Tone {
   Error,
   Warning,
   Info,
   Accent,
   Muted,
}

/// Apply one tone to a string, or pass it through when color is off.
pub fn paint(tone: Tone, text: &str) -> String {
   if !use_color() {
      return text.to_string();
   }

   match tone {
      Tone::Error => text.red().bold().to_string(),
      Tone::Warning => text.yellow().to_string(),
      Tone::Info => text.cyan().to_string(),
      Tone::Accent => text.bold().to_string(),
      Tone::Muted => text.dimmed().to_string(),
   }
}

/// Erase the current stderr line (where the spinner draws) when color mode
/// implies a live terminal.
fn wipe_progress_line() {
   if use_color() {
      eprint!("\x1b[2K\r");
      io::stderr().flush().ok();
   }
}

/// Emit a warning line on stderr, displacing any active spinner frame.
pub fn warn(msg: &str) {
   wipe_progress_line();
   eprintln!("{} {msg}", paint(Tone::Warning, "warning:"));
}

/// Emit an informational line on stderr.
pub fn print_info(msg: &str) {
   wipe_progress_line();
   eprintln!("{} {msg}", paint(Tone::Info, "info:"));
}

/// Terminal width clamped into a readable band.
pub fn term_width() -> usize {
   terminal_size::terminal_size()
      .map(|(terminal_size::Width(w), _)| usize::from(w))
      .unwrap_or(80)
      .clamp(20, 120)
}

/// Title centered in a rule of the given width; any odd column goes to the
/// right side.
pub fn section_header(title: &str, width: usize) -> String {
   let pad = width.saturating_sub(title.chars().count() + 2);
   let left = pad / 2;
   let right = pad - left;

   format!(
      "{} {} {}",
      paint(Tone::Muted, &"─".repeat(left)),
      paint(Tone::Accent, title),
      paint(Tone::Muted, &"─".repeat(right)),
   )
}

const FRAME_INTERVAL: Duration = Duration::from_millis(120);
const FRAMES: [char; 4] = ['-', '\\', '|', '/'];

/// Run `f` while a spinner ticks on stderr. Without a capable terminal the
/// message prints once and `f` runs plain.
///
/// The ticker thread blocks on the stop channel with a frame-length
/// timeout: a timeout draws the next frame, anything else (stop signal or a
/// dropped sender) erases the line and exits.
pub fn with_spinner<F, T>(message: &str, f: F) -> T
where
   F: FnOnce() -> T,
{
   if !use_color() {
      eprintln!("{message}");
      return f();
   }

   let (tx, rx) = mpsc::channel::<()>();
   let label = message.to_string();

   let ticker = thread::spawn(move || {
      let mut frame = 0;
      loop {
         match rx.recv_timeout(FRAME_INTERVAL) {
            Err(mpsc::RecvTimeoutError::Timeout) => {
               eprint!("\r{} {label}", FRAMES[frame % FRAMES.len()]);
               io::stderr().flush().ok();
               frame += 1;
            },
            _ => {
               wipe_progress_line();
               break;
            },
         }
      }
   });

   let result = f();
   tx.send(()).ok();
   ticker.join().ok();
   result
}
