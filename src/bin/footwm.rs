//! The footwm window manager binary.
use clap::Parser;
use footwm::{
    core::{
        bindings::{KeyBindings, KeyEventHandler, KeySpec},
        Config, WindowManager,
    },
    x::XConnExt,
    x11rb::RustConn,
    Result,
};
use tracing_subscriber::EnvFilter;

/// A minimalist window manager: virtual desktops, MRU stacking, one
/// fullscreen window at a time.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Opts {
    /// The X display to manage (defaults to $DISPLAY)
    #[arg(long)]
    display: Option<String>,

    /// Log filter directives (overridden by RUST_LOG when set)
    #[arg(long, default_value = "info")]
    log_filter: String,
}

// Meta-1..9 select the corresponding desktop, Meta-Tab flips between the
// two most recent windows and Meta-Shift-q closes the focused window.
fn key_bindings() -> Result<KeyBindings<RustConn>> {
    let mut bindings = KeyBindings::new();

    for i in 1..=9usize {
        let select: KeyEventHandler<RustConn> =
            Box::new(move |state, x| x.select_desktop(i - 1, state));
        bindings.bind(KeySpec::parse(&format!("M-{i}"))?, select);
    }

    bindings.bind(
        KeySpec::parse("M-Tab")?,
        Box::new(|state, x| x.cycle_window(state)),
    );

    bindings.bind(
        KeySpec::parse("M-S-q")?,
        Box::new(|state, x| match state.desktops.current().top() {
            Some(id) => x.close_window(id, state),
            None => Ok(()),
        }),
    );

    Ok(bindings)
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&opts.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let conn = RustConn::connect(opts.display.as_deref())?;
    let wm = WindowManager::new(Config::default(), key_bindings()?, conn)?;

    wm.run()
}
