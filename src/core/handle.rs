//! XEvent handlers for use in the main event loop
use crate::{
    core::{
        bindings::{KeyBindings, KeyCode, KeyboardMap},
        command::Command,
        State,
    },
    x::{
        atom::Atom,
        event::{ClientMessage, ConfigureEvent, ConfigureRequest, PropertyEvent, UnmapEvent},
        property::{MapState, Prop, WmState},
        ClientConfig, XConn, XConnExt,
    },
    Result, Xid,
};
use tracing::{debug, error, trace, warn};

pub(crate) fn create_notify<X: XConn>(
    id: Xid,
    override_redirect: bool,
    state: &mut State,
    x: &X,
) -> Result<()> {
    if state.clients.contains(&id) {
        return Ok(());
    }

    match x.new_client(id) {
        Ok(mut client) => {
            client.override_redirect |= override_redirect;
            state.clients.insert(client);
        }
        // windows can die between the event being generated and us asking
        // the server about them
        Err(e) => debug!(%id, %e, "unable to track new window"),
    }

    Ok(())
}

pub(crate) fn map_request<X: XConn>(id: Xid, state: &mut State, x: &X) -> Result<()> {
    trace!(%id, "handling map request");

    if !state.clients.contains(&id) {
        match x.new_client(id) {
            Ok(client) => state.clients.insert(client),
            Err(e) => {
                error!(%id, %e, "MapRequest for unknown window");
                return Ok(());
            }
        }
    }

    x.manage_window(id, state)
}

// The server has mapped the window: a managed window can now be marked
// Normal (ICCCM 4.1.3.1).
pub(crate) fn map_notify<X: XConn>(id: Xid, state: &mut State, x: &X) -> Result<()> {
    if !state.desktops.contains_window(&id) {
        trace!(%id, "MapNotify for an unmanaged window");
        return Ok(());
    }

    x.set_wm_state(id, WmState::Normal)?;
    if let Some(client) = state.clients.get_mut(&id) {
        client.wm_state = WmState::Normal;
        client.map_state = MapState::Viewable;
    }

    Ok(())
}

pub(crate) fn unmap_notify<X: XConn>(ev: UnmapEvent, state: &mut State, x: &X) -> Result<()> {
    if ev.synthetic {
        // The client called something like XWithdrawWindow: unmap on its
        // behalf and finish the withdrawal when the server reports the
        // real unmap back to us.
        debug!(id = %ev.id, "client requested unmap");
        x.unmap(ev.id)
    } else {
        x.withdraw_window(ev.id, state)
    }
}

pub(crate) fn destroy_notify<X: XConn>(id: Xid, state: &mut State, x: &X) -> Result<()> {
    trace!(%id, "window destroyed");

    x.unmanage_window(id, state)
}

pub(crate) fn configure_notify<X: XConn>(
    e: ConfigureEvent,
    state: &mut State,
    x: &X,
) -> Result<()> {
    if e.is_root {
        debug!(r = %e.r, "root geometry changed");
        state.root_geometry = e.r;
        return x.redraw(state);
    }

    let Some(client) = state.clients.get_mut(&e.id) else {
        return Ok(());
    };

    client.geometry = e.r;
    let wanted = client.wanted_geometry;
    if wanted == e.r {
        trace!(id = %e.id, "current dimensions are good, no need to request again");
    } else {
        trace!(id = %e.id, %wanted, current = %e.r, "requesting geometry again");
        x.position_window(e.id, wanted)?;
    }

    Ok(())
}

// Grant whatever was asked for: most clients misbehave when refused, so the
// request is honoured verbatim and the ConfigureNotify reconciliation pulls
// the window back to the geometry we actually want.
pub(crate) fn configure_request<X: XConn>(
    e: ConfigureRequest,
    _state: &mut State,
    x: &X,
) -> Result<()> {
    let mut config = vec![];
    if let Some(v) = e.x {
        config.push(ClientConfig::X(v));
    }
    if let Some(v) = e.y {
        config.push(ClientConfig::Y(v));
    }
    if let Some(v) = e.w {
        config.push(ClientConfig::Width(v));
    }
    if let Some(v) = e.h {
        config.push(ClientConfig::Height(v));
    }

    trace!(id = %e.id, ?config, "granting configure request");
    if config.is_empty() {
        Ok(())
    } else {
        x.set_client_config(e.id, &config)
    }
}

pub(crate) fn client_message<X: XConn>(m: ClientMessage, state: &mut State, x: &X) -> Result<()> {
    let data = m.data.as_u32();
    debug!(id = %m.id, dtype = %m.dtype, "got client message");

    match m.dtype.as_str() {
        s if s == Atom::NetActiveWindow.as_ref() => x.raise_window(m.id, state),
        s if s == Atom::NetCloseWindow.as_ref() => x.close_window(m.id, state),
        s if s == Atom::NetCurrentDesktop.as_ref() => x.select_desktop(data[0] as usize, state),
        s if s == Atom::NetWmDesktop.as_ref() => {
            x.set_window_desktop(m.id, data[0] as usize, state)
        }
        _ => {
            trace!(dtype = %m.dtype, "unhandled client message type");
            Ok(())
        }
    }
}

pub(crate) fn property_notify<X: XConn>(e: PropertyEvent, state: &mut State, x: &X) -> Result<()> {
    if !e.is_root || e.atom != Atom::FootCommandV.as_ref() {
        // property caches on client records are deliberately not refreshed
        trace!(id = %e.id, atom = %e.atom, "ignoring property change");
        return Ok(());
    }

    let argv = match x.get_prop(state.root, Atom::FootCommandV.as_ref())? {
        Some(Prop::UTF8String(argv)) => argv,
        Some(Prop::Latin1String(argv)) => argv,
        _ => {
            warn!("FOOT_COMMANDV was not a string list");
            return Ok(());
        }
    };

    match Command::parse(&argv) {
        Ok(cmd) => run_command(cmd, state, x),
        Err(e) => {
            warn!(%e, "ignoring invalid command");
            Ok(())
        }
    }
}

pub(crate) fn run_command<X: XConn>(cmd: Command, state: &mut State, x: &X) -> Result<()> {
    debug!(?cmd, "running command");

    match cmd {
        Command::DesktopInsert { name, index } => x.add_desktop(&name, index, state),
        Command::DesktopDelete { index } => x.delete_desktop(index, state),
        Command::DesktopRename { index, name } => x.rename_desktop(index, &name, state),
        Command::DesktopSelect { index } => x.select_desktop(index, state),
        Command::Window => {
            debug!("window commands are reserved and currently ignored");
            Ok(())
        }
    }
}

pub(crate) fn keypress<X: XConn>(
    key: KeyCode,
    bindings: &mut KeyBindings<X>,
    state: &mut State,
    x: &X,
) -> Result<()> {
    if let Err(error) = bindings.run(key, state, x) {
        error!(%error, ?key, "error running user keybinding");
        return Err(error);
    }

    Ok(())
}

pub(crate) fn mapping_notify<X: XConn>(
    map: &KeyboardMap,
    bindings: &mut KeyBindings<X>,
    x: &X,
) -> Result<()> {
    trace!("keyboard mapping changed: rebuilding grabs");
    x.ungrab_keys()?;
    bindings.resolve(map);

    x.grab_keys(&bindings.grab_codes())
}
