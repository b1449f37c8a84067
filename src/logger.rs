//! Log output for the CLI.
//!
//! Diagnostics go to stderr through `env_logger` so they never mix with the
//! command output printed on stdout.

use env_logger::fmt::{Color, Style, StyledValue};
use log::{Level, LevelFilter};

/// Logger honouring `RUST_LOG`.
///
/// Without `RUST_LOG` only warnings are shown, or debug output for this
/// crate when `verbose` is set.
pub fn build_logger(verbose: bool) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();

    builder.format(|f, record| {
        use std::io::Write;

        let mut style = f.style();
        let level = colored_level(&mut style, record.level());

        let mut style = f.style();
        let target = style.set_bold(true).value(record.target());

        writeln!(f, "{} {} > {}", level, target, record.args())
    });

    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(LevelFilter::Warn);
        if verbose {
            builder.filter_module(env!("CARGO_CRATE_NAME"), LevelFilter::Debug);
        }
    }

    builder.parse_env("RUST_LOG");

    builder
}

fn colored_level(style: &mut Style, level: Level) -> StyledValue<'_, &'static str> {
    match level {
        Level::Trace => style.set_color(Color::Magenta).value("TRACE"),
        Level::Debug => style.set_color(Color::Blue).value("DEBUG"),
        Level::Info => style.set_color(Color::Green).value("INFO "),
        Level::Warn => style.set_color(Color::Yellow).value("WARN "),
        Level::Error => style.set_color(Color::Red).value("ERROR"),
    }
}
