//! Command line control for footwm.
//!
//! Window operations go through the EWMH client message protocol; desktop
//! operations that EWMH has no verbs for travel through the FOOT_COMMANDV
//! string-vector property.
use clap::{Parser, Subcommand};
use footwm::{
    core::command::Command,
    x::{
        atom::Atom,
        event::{ClientEventMask, ClientMessage, ClientMessageData},
        property::Prop,
        XConn, XConnExt,
    },
    x11rb::RustConn,
    Error, Result, Xid,
};

/// Inspect and drive a running footwm instance.
#[derive(Parser, Debug)]
#[command(name = "footsh", version, about)]
struct Opts {
    /// The X display to talk to (defaults to $DISPLAY)
    #[arg(long, global = true)]
    display: Option<String>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Inspect and manage desktops
    #[command(subcommand)]
    Desktops(DesktopCmd),
    /// Inspect and manage windows
    #[command(subcommand)]
    Windows(WindowCmd),
}

#[derive(Subcommand, Debug)]
enum DesktopCmd {
    /// List desktops in order (the first is current)
    Ls,
    /// Create a new desktop
    Add {
        /// The (unique) name for the new desktop
        name: String,
        /// Position in the desktop list; 0 selects it immediately
        #[arg(long, default_value_t = 0)]
        index: usize,
    },
    /// Delete a desktop, parking its windows on the unassigned desktop
    Delete {
        /// The desktop to delete
        index: usize,
    },
    /// Rename a desktop
    Rename {
        /// The desktop to rename
        index: usize,
        /// Its new (unique) name
        name: String,
    },
    /// Switch to a desktop
    Select {
        /// The desktop to select
        index: usize,
    },
}

#[derive(Subcommand, Debug)]
enum WindowCmd {
    /// List windows
    Ls {
        /// List in creation order rather than stacking order
        #[arg(long)]
        created: bool,
    },
    /// Bring a window to the front
    Activate {
        /// Index of the window in the listing
        number: usize,
    },
    /// Ask a window to close itself
    Close {
        /// Index of the window in the listing
        number: usize,
    },
    /// Move a window to another desktop
    Move {
        /// Index of the window in the listing
        number: usize,
        /// The destination desktop
        #[arg(long)]
        desktop: usize,
    },
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    let conn = RustConn::connect(opts.display.as_deref())?;

    match opts.command {
        Cmd::Desktops(cmd) => run_desktop_cmd(&conn, cmd)?,
        Cmd::Windows(cmd) => run_window_cmd(&conn, cmd)?,
    }
    conn.flush();

    Ok(())
}

fn run_desktop_cmd(conn: &RustConn, cmd: DesktopCmd) -> Result<()> {
    let command = match cmd {
        DesktopCmd::Ls => {
            for (i, name) in desktop_names(conn)?.iter().enumerate() {
                let marker = if i == 0 { '*' } else { ' ' };
                println!("{i: >2}{marker} {name}");
            }
            return Ok(());
        }
        DesktopCmd::Add { name, index } => Command::DesktopInsert { name, index },
        DesktopCmd::Delete { index } => Command::DesktopDelete { index },
        DesktopCmd::Rename { index, name } => Command::DesktopRename { index, name },
        DesktopCmd::Select { index } => Command::DesktopSelect { index },
    };

    conn.set_prop(
        conn.root(),
        Atom::FootCommandV.as_ref(),
        Prop::UTF8String(command.to_argv()),
    )
}

fn run_window_cmd(conn: &RustConn, cmd: WindowCmd) -> Result<()> {
    match cmd {
        WindowCmd::Ls { created } => {
            for (i, id) in window_list(conn, created)?.iter().enumerate() {
                let name = conn.window_title(*id)?;
                println!("{i: >2} 0x{:08x} \"{name}\"", **id);
            }
            Ok(())
        }
        WindowCmd::Activate { number } => {
            let id = nth_window(conn, number)?;
            send_wm_message(conn, id, Atom::NetActiveWindow, [0; 5])
        }
        WindowCmd::Close { number } => {
            let id = nth_window(conn, number)?;
            send_wm_message(conn, id, Atom::NetCloseWindow, [0; 5])
        }
        WindowCmd::Move { number, desktop } => {
            let id = nth_window(conn, number)?;
            send_wm_message(conn, id, Atom::NetWmDesktop, [desktop as u32, 0, 0, 0, 0])
        }
    }
}

fn desktop_names(conn: &RustConn) -> Result<Vec<String>> {
    match conn.get_prop(conn.root(), Atom::NetDesktopNames.as_ref())? {
        Some(Prop::UTF8String(names)) => Ok(names),
        _ => Ok(vec![]),
    }
}

fn window_list(conn: &RustConn, created: bool) -> Result<Vec<Xid>> {
    let atom = if created {
        Atom::NetClientList
    } else {
        Atom::NetClientListStacking
    };

    match conn.get_prop(conn.root(), atom.as_ref())? {
        Some(Prop::Window(ids)) => Ok(ids),
        _ => Ok(vec![]),
    }
}

fn nth_window(conn: &RustConn, number: usize) -> Result<Xid> {
    window_list(conn, false)?
        .get(number)
        .copied()
        .ok_or_else(|| Error::InvalidCommand(format!("no window at index {number}")))
}

// EWMH: messages for the window manager name the target window but are
// sent to the root with the substructure masks set.
fn send_wm_message(conn: &RustConn, id: Xid, atom: Atom, data: [u32; 5]) -> Result<()> {
    conn.send_client_message(ClientMessage::new(
        id,
        ClientEventMask::SubstructureNotifyRedirect,
        atom.as_ref(),
        ClientMessageData::from(data),
    ))
}
