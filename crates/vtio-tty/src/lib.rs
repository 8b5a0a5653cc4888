#![forbid(unsafe_code)]

//! Unix terminal session for vtio.
//!
//! This crate owns the process's single raw-mode terminal resource:
//! raw/cooked line-discipline transitions, the alternate screen buffer,
//! cached window dimensions, resize notification, and the byte source
//! that feeds the `vtio-core` key decoder.
//!
//! # Lifecycle Guarantees
//!
//! 1. **One explicit session.** Construct a [`Terminal`], call
//!    [`init`](Terminal::init) once, drive the read loop, call
//!    [`quit`](Terminal::quit) on the way out.
//!
//! 2. **The terminal is always restored.** `quit()` is idempotent and
//!    runs from [`Drop`] too, so early returns and `?` cannot leave the
//!    terminal raw. A panic hook and a SIGINT/SIGTERM watcher cover the
//!    remaining exit paths; on a fatal signal the process exits with
//!    status 128+signal after restoration.
//!
//! 3. **Restore targets the original settings.** The line-discipline
//!    state captured at `init()` is the only restore target; the raw
//!    settings are never saved over it.
//!
//! # Escape Sequences Reference
//!
//! | Operation        | Sequence         |
//! |------------------|------------------|
//! | Clear screen     | `CSI 2 J`        |
//! | Cursor home      | `CSI H`          |
//! | Cursor position  | `CSI {r};{c} H`  |
//! | Cursor hide/show | `CSI ? 25 l/h`   |
//! | Alt buffer on/off| `CSI ? 1049 h/l` |

mod screen;

use std::fmt;
use std::io::{self, Read, Write};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use rustix::termios::{
    self, ControlModes, InputModes, LocalModes, OptionalActions, OutputModes, SpecialCodeIndex,
    Termios,
};
use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGWINCH};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::{debug, info, warn};

// Re-exported so binaries only need this crate.
pub use vtio_core::{ByteSource, Key, Mods, ReadMode, read_key};

const DEFAULT_ROWS: u16 = 24;
const DEFAULT_COLUMNS: u16 = 80;

/// Escape-sequence continuation timeout, in deciseconds (VTIME units).
const ESC_TIMEOUT_DECISECONDS: u8 = 1;

// ─── Process-wide restore state ──────────────────────────────────────────────
//
// The signal watcher and the panic hook cannot reach the session object,
// so the restore target and the alternate-buffer flag are mirrored here.
// Both have a single writer: the main thread, during init/quit and
// buffer transitions.

static SAVED_TERMIOS: Mutex<Option<Termios>> = Mutex::new(None);
static ALT_BUFFER_ACTIVE: AtomicBool = AtomicBool::new(false);

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Failure to acquire the terminal resource.
///
/// Feature-fatal: surfaced to the caller, never retried internally.
/// Size-query failures are not represented here — they fall back to the
/// cached dimensions silently.
#[derive(Debug, Error)]
pub enum TermError {
    /// The control stream is not attached to a terminal.
    #[error("standard input is not a terminal")]
    NotATty,
    /// The line discipline could not be queried or changed.
    #[error("terminal attribute query failed")]
    QueryFailed(#[source] io::Error),
}

/// Successful outcomes of [`Terminal::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    /// Raw mode was entered and signal handlers were installed.
    Entered,
    /// The session was already raw; nothing was changed.
    AlreadyRaw,
}

// ─── Terminal session ────────────────────────────────────────────────────────

/// The process's one raw-mode terminal session.
///
/// Holds the restore target, the cached window dimensions, the
/// raw/alternate-buffer flags, and the resize flag written by the
/// SIGWINCH handler. All operations take the session by reference;
/// there is no hidden module-level session.
pub struct Terminal {
    /// Line-discipline settings captured once at `init()`.
    original: Option<Termios>,
    rows: u16,
    columns: u16,
    raw: bool,
    alt: bool,
    /// Set by the SIGWINCH handler, cleared by `was_resized()`.
    resized: Arc<AtomicBool>,
    read_mode: ReadMode,
    signals: Option<SignalGuard>,
}

impl Terminal {
    /// A cooked, normal-buffer session with default 24×80 dimensions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            original: None,
            rows: DEFAULT_ROWS,
            columns: DEFAULT_COLUMNS,
            raw: false,
            alt: false,
            resized: Arc::new(AtomicBool::new(false)),
            read_mode: ReadMode::Blocking,
            signals: None,
        }
    }

    /// Enter raw mode and install signal handling.
    ///
    /// Disables echo, canonical input, signal-generating control
    /// characters (Ctrl-C/Ctrl-Z arrive as bytes), input/output
    /// translation, and flow control; sets blocking single-byte reads.
    /// Queries the window size, keeping the cached default if the query
    /// fails. Calling `init()` on an already-raw session returns
    /// [`InitStatus::AlreadyRaw`] without touching anything.
    ///
    /// # Errors
    ///
    /// [`TermError::NotATty`] if stdin is not a terminal;
    /// [`TermError::QueryFailed`] if the line discipline cannot be read
    /// or written.
    pub fn init(&mut self) -> Result<InitStatus, TermError> {
        if self.raw {
            return Ok(InitStatus::AlreadyRaw);
        }

        let stdin = io::stdin();
        if !termios::isatty(&stdin) {
            return Err(TermError::NotATty);
        }

        let original =
            termios::tcgetattr(&stdin).map_err(|err| TermError::QueryFailed(err.into()))?;

        let mut raw = original.clone();
        // IXON: Ctrl-S/Ctrl-Q flow control; ICRNL: CR→NL translation;
        // BRKINT: break-condition signals; INPCK: parity checking;
        // ISTRIP: 8th-bit stripping.
        raw.input_modes &= !(InputModes::IXON
            | InputModes::ICRNL
            | InputModes::BRKINT
            | InputModes::INPCK
            | InputModes::ISTRIP);
        // OPOST: output processing.
        raw.output_modes &= !OutputModes::OPOST;
        // CS8: 8-bit characters.
        raw.control_modes |= ControlModes::CS8;
        // ECHO; ICANON: line buffering; ISIG: Ctrl-C/Ctrl-Z signal
        // generation; IEXTEN: Ctrl-V.
        raw.local_modes &= !(LocalModes::ECHO
            | LocalModes::ICANON
            | LocalModes::ISIG
            | LocalModes::IEXTEN);
        // Blocking single-byte reads.
        raw.special_codes[SpecialCodeIndex::VMIN] = 1;
        raw.special_codes[SpecialCodeIndex::VTIME] = 0;

        termios::tcsetattr(&stdin, OptionalActions::Flush, &raw)
            .map_err(|err| TermError::QueryFailed(err.into()))?;

        if let Ok(mut saved) = SAVED_TERMIOS.lock() {
            *saved = Some(original.clone());
        }
        // Only once raw mode is actually on: the hook is global and
        // permanent, and restore_terminal() must stay a no-op for
        // sessions that never started or already ended.
        install_panic_hook();
        self.original = Some(original);
        self.raw = true;
        self.read_mode = ReadMode::Blocking;
        self.resized.store(false, Ordering::SeqCst);

        // Registration can only fail for forbidden or exhausted signal
        // slots, which correct call discipline rules out.
        let guard = SignalGuard::new(Arc::clone(&self.resized))
            .unwrap_or_else(|err| panic!("terminal signal handler installation failed: {err}"));
        self.signals = Some(guard);

        self.size_update();
        info!(
            rows = self.rows,
            columns = self.columns,
            "terminal raw mode entered"
        );
        Ok(InitStatus::Entered)
    }

    /// Leave raw mode and restore the terminal.
    ///
    /// Shows the cursor, clears the screen, homes the cursor, leaves
    /// the alternate buffer if active, and restores the original
    /// line-discipline settings. No-op when not raw; safe to call any
    /// number of times, including before `init()`.
    pub fn quit(&mut self) {
        if !self.raw {
            return;
        }
        // Tear down the watcher first so a signal racing quit() cannot
        // run the restore sequence concurrently with it.
        self.signals = None;
        restore_terminal();
        self.raw = false;
        self.alt = false;
        self.original = None;
        info!("terminal restored to cooked mode");
    }

    /// Cached row count; no syscall.
    #[must_use]
    pub fn get_rows(&self) -> u16 {
        self.rows
    }

    /// Cached column count; no syscall.
    #[must_use]
    pub fn get_columns(&self) -> u16 {
        self.columns
    }

    /// Refresh the cached dimensions from the kernel.
    ///
    /// A failed query keeps the cache: stale-but-sane dimensions beat
    /// an error nobody can act on.
    pub fn size_update(&mut self) {
        match termios::tcgetwinsize(io::stdout()) {
            Ok(size) if size.ws_row > 0 && size.ws_col > 0 => {
                self.rows = size.ws_row;
                self.columns = size.ws_col;
            }
            Ok(_) => {}
            Err(err) => {
                debug!(?err, "window size query failed; keeping cached size");
            }
        }
    }

    /// Test-and-clear the resize flag.
    ///
    /// When it was set, the dimension cache is refreshed before
    /// returning, so a `true` result guarantees fresh `get_rows()` /
    /// `get_columns()`. A resize arriving between the clear and the
    /// next poll is observed on the following call — never lost, never
    /// double-counted.
    pub fn was_resized(&mut self) -> bool {
        if self.resized.swap(false, Ordering::SeqCst) {
            self.size_update();
            return true;
        }
        false
    }

    /// Decode the next keypress from stdin.
    ///
    /// [`Key::NONE`] means the input stream reported no data (EOF).
    pub fn read_key(&mut self) -> Key {
        vtio_core::read_key(self)
    }

    // ── Buffer transitions ───────────────────────────────────────────

    /// Switch to the normal screen buffer. No write if already there.
    pub fn use_normal_buffer(&mut self) -> io::Result<()> {
        if self.alt {
            self.write_bytes(screen::ALT_BUFFER_LEAVE)?;
            self.alt = false;
            ALT_BUFFER_ACTIVE.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Switch to the alternate screen buffer. No write if already there.
    pub fn use_alternate_buffer(&mut self) -> io::Result<()> {
        if !self.alt {
            self.write_bytes(screen::ALT_BUFFER_ENTER)?;
            self.alt = true;
            ALT_BUFFER_ACTIVE.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Switch to whichever buffer is not active.
    pub fn toggle_buffer(&mut self) -> io::Result<()> {
        if self.alt {
            self.use_normal_buffer()
        } else {
            self.use_alternate_buffer()
        }
    }

    /// Whether the alternate buffer is active.
    #[must_use]
    pub fn alternate_buffer_active(&self) -> bool {
        self.alt
    }

    // ── Screen pass-throughs ─────────────────────────────────────────

    /// Clear the entire screen.
    pub fn clear(&mut self) -> io::Result<()> {
        self.write_bytes(screen::CLEAR_SCREEN)
    }

    /// Move the cursor to the top-left corner.
    pub fn cursor_home(&mut self) -> io::Result<()> {
        self.write_bytes(screen::CURSOR_HOME)
    }

    /// Move the cursor; `row` and `column` are 1-indexed.
    pub fn cursor_move(&mut self, row: u16, column: u16) -> io::Result<()> {
        let mut stdout = io::stdout();
        screen::write_cursor_move(&mut stdout, row, column)?;
        stdout.flush()
    }

    /// Hide the cursor.
    pub fn cursor_hide(&mut self) -> io::Result<()> {
        self.write_bytes(screen::CURSOR_HIDE)
    }

    /// Show the cursor.
    pub fn cursor_show(&mut self) -> io::Result<()> {
        self.write_bytes(screen::CURSOR_SHOW)
    }

    /// Raw write to the output stream, flushed immediately.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(bytes)?;
        stdout.flush()
    }

    /// String write to the output stream, flushed immediately.
    pub fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.write_bytes(text.as_bytes())
    }

    /// Formatted write; lets `write!(term, ...)` target the terminal.
    pub fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_fmt(args)?;
        stdout.flush()
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        self.quit();
    }
}

impl ByteSource for Terminal {
    fn read_byte(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        loop {
            match io::stdin().read(&mut buf) {
                // Zero bytes is a VTIME timeout in timed mode, EOF in
                // blocking mode; both read as "no data".
                Ok(0) => return None,
                Ok(_) => return Some(buf[0]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(?err, "terminal read failed");
                    return None;
                }
            }
        }
    }

    fn set_read_mode(&mut self, mode: ReadMode) {
        if mode == self.read_mode {
            return;
        }
        let stdin = io::stdin();
        let Ok(mut term) = termios::tcgetattr(&stdin) else {
            return;
        };
        let (vmin, vtime) = match mode {
            ReadMode::Blocking => (1, 0),
            ReadMode::EscTimeout => (0, ESC_TIMEOUT_DECISECONDS),
        };
        term.special_codes[SpecialCodeIndex::VMIN] = vmin;
        term.special_codes[SpecialCodeIndex::VTIME] = vtime;
        if termios::tcsetattr(&stdin, OptionalActions::Now, &term).is_ok() {
            self.read_mode = mode;
        }
    }
}

// ─── Exit-path restoration ───────────────────────────────────────────────────

/// The fixed restore sequence shared by `quit()`, the signal watcher,
/// and the panic hook.
///
/// The saved-termios slot doubles as the session-active guard: it is
/// populated only between a successful raw-mode entry and the first
/// restore, and it is taken before anything is written. A call with no
/// active session is a complete no-op, so a panic after `quit()` (or
/// after a failed `init()`) never sprays escape sequences into a
/// stdout that is no longer (or never was) a raw terminal.
fn restore_terminal() {
    let Ok(mut saved) = SAVED_TERMIOS.lock() else {
        return;
    };
    let Some(original) = saved.take() else {
        return;
    };

    let mut stdout = io::stdout();
    // Show the cursor and wipe while still on whichever buffer is
    // active, then drop back to the normal buffer so its original
    // content survives.
    let _ = stdout.write_all(screen::CURSOR_SHOW);
    let _ = stdout.write_all(screen::CLEAR_SCREEN);
    let _ = stdout.write_all(screen::CURSOR_HOME);
    if ALT_BUFFER_ACTIVE.swap(false, Ordering::SeqCst) {
        let _ = stdout.write_all(screen::ALT_BUFFER_LEAVE);
    }
    let _ = stdout.flush();

    let _ = termios::tcsetattr(io::stdin(), OptionalActions::Flush, &original);
}

fn install_panic_hook() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_terminal();
            previous(info);
        }));
    });
}

// ─── Signal handling ─────────────────────────────────────────────────────────

/// Owns the signal registrations for the lifetime of a raw session.
///
/// SIGWINCH is a flag-only registration: the handler body is a single
/// atomic store, safe at any point including mid-read. SIGINT and
/// SIGTERM are serviced on a watcher thread that runs the fixed restore
/// sequence and exits with 128+signal; it never returns to normal
/// execution and never calls into the decoder.
struct SignalGuard {
    winch: signal_hook::SigId,
    handle: signal_hook::iterator::Handle,
    thread: Option<thread::JoinHandle<()>>,
}

impl SignalGuard {
    fn new(resized: Arc<AtomicBool>) -> io::Result<Self> {
        let winch = signal_hook::flag::register(SIGWINCH, resized)?;
        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        let handle = signals.handle();
        let thread = thread::spawn(move || {
            for signal in signals.forever() {
                warn!(signal, "termination signal received, restoring terminal");
                restore_terminal();
                process::exit(128 + signal);
            }
        });
        Ok(Self {
            winch,
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        signal_hook::low_level::unregister(self.winch);
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
