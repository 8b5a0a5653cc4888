#![forbid(unsafe_code)]

//! Interactive key-echo demo.
//!
//! Runs a raw-mode session on the alternate buffer and prints the name
//! of every decoded key. Resizes are reported as they happen.
//!
//! # Running
//!
//! ```sh
//! cargo run -p vtio-demo
//! ```
//!
//! Quit with `q` or Ctrl-C. Set `RUST_LOG=vtio_tty=debug` to see
//! session tracing on stderr.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vtio_tty::{Key, Mods, Terminal};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut term = Terminal::new();
    term.init().context("cannot enter raw mode")?;
    term.use_alternate_buffer()?;
    term.clear()?;
    term.cursor_home()?;

    write!(
        term,
        "vtio key echo — {}x{} — press keys, q or Ctrl-C quits\r\n",
        term.get_columns(),
        term.get_rows()
    )?;

    loop {
        if term.was_resized() {
            write!(
                term,
                "[resize] now {}x{}\r\n",
                term.get_columns(),
                term.get_rows()
            )?;
        }

        let key = term.read_key();
        if key == Key::NONE {
            break;
        }
        write!(term, "{key}\r\n")?;
        if key == Key::from_byte(b'q') || key == Key::from_byte(b'c').with(Mods::CTRL) {
            break;
        }
    }

    term.quit();
    info!("session ended");
    Ok(())
}
