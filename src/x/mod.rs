//! Logic for interacting with the X server
use crate::{
    core::{
        bindings::{KeyCode, KeyboardMapping, ModifierMapping},
        State,
    },
    pure::{geometry::Rect, Client},
    x::{
        atom::EWMH_SUPPORTED_ATOMS,
        event::ClientMessageKind,
        property::{MapState, Prop, WindowAttributes, WmState},
    },
    Result, Xid,
};
use tracing::{debug, trace, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod atom;
pub mod event;
pub mod property;

#[cfg(test)]
pub mod mock;

#[cfg(test)]
pub use mock::MockXConn;

pub use atom::Atom;
pub use event::XEvent;

/// On screen configuration options for X clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ClientConfig {
    /// Absolute size and position on the screen as a [Rect]
    Position(Rect),
    /// Absolute x coordinate only
    X(i32),
    /// Absolute y coordinate only
    Y(i32),
    /// Width only
    Width(u32),
    /// Height only
    Height(u32),
}

/// Attributes for an X11 client window.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClientAttr {
    /// The event mask for windows under management
    /// (EnterWindow | FocusChange | StructureNotify)
    ClientEventMask,
    /// The event mask for windows imported at startup but not yet mapped
    /// (StructureNotify)
    ImportEventMask,
    /// The event mask selected on the root window in order to act as the
    /// window manager
    /// (SubstructureRedirect | SubstructureNotify | PropertyChange | StructureNotify)
    RootEventMask,
}

/// A handle on a running X11 connection that we can use for issuing X
/// requests.
///
/// XConn is an abstraction layer over the underlying display protocol so
/// that the desktop engine can be driven (and tested) independently of a
/// live server. All low level details of working with X belong behind this
/// trait.
pub trait XConn {
    /// The ID of the window manager root window.
    fn root(&self) -> Xid;
    /// The geometry of the root window: the space windows are sized into.
    fn root_geometry(&self) -> Result<Rect>;
    /// The hidden 1x1 window advertised via _NET_SUPPORTING_WM_CHECK.
    fn supporting_check_window(&self) -> Xid;

    /// Select the substructure-redirect event mask on the root window,
    /// claiming this display for ourselves.
    ///
    /// # Errors
    /// Fails with [Error::AnotherWmRunning][crate::Error::AnotherWmRunning]
    /// if some other process already holds the mask.
    fn become_window_manager(&self) -> Result<()>;

    /// Block and wait for the next event from the X server.
    fn next_event(&self) -> Result<XEvent>;
    /// Flush any pending requests to the X server.
    fn flush(&self);
    /// Flush and wait for the server to have processed everything so far.
    fn sync(&self) -> Result<()>;

    /// Look up the [Xid] of a given atom name, interning it if needed.
    fn intern_atom(&self, atom: &str) -> Result<Xid>;
    /// Look up the string name of a given [Atom] by its [Xid].
    fn atom_name(&self, xid: Xid) -> Result<String>;

    /// Ask the X server for the IDs of all current children of the root.
    fn existing_clients(&self) -> Result<Vec<Xid>>;
    /// Request the [WindowAttributes] for a given client window.
    fn get_window_attributes(&self, client: Xid) -> Result<WindowAttributes>;

    /// Look up a specific property on a given client window.
    fn get_prop(&self, client: Xid, prop_name: &str) -> Result<Option<Prop>>;
    /// Set a specific property on a given client window.
    fn set_prop(&self, client: Xid, prop_name: &str, val: Prop) -> Result<()>;
    /// Get the current ICCCM [WmState] for a given client window.
    fn get_wm_state(&self, client: Xid) -> Result<Option<WmState>>;
    /// Set the ICCCM [WmState] property for a given client window.
    fn set_wm_state(&self, client: Xid, wm_state: WmState) -> Result<()>;

    /// Map the given client window, making it visible.
    fn map(&self, client: Xid) -> Result<()>;
    /// Unmap the given client window, hiding it.
    fn unmap(&self, client: Xid) -> Result<()>;
    /// Set one or more [ClientAttr] for a given client window.
    fn set_client_attributes(&self, client: Xid, attrs: &[ClientAttr]) -> Result<()>;
    /// Set the [ClientConfig] for a given client window.
    fn set_client_config(&self, client: Xid, data: &[ClientConfig]) -> Result<()>;

    /// Set X input focus to be held by the given client window.
    fn focus(&self, client: Xid) -> Result<()>;
    /// Send a [ClientMessage][event::ClientMessage] to a given client.
    fn send_client_message(&self, msg: event::ClientMessage) -> Result<()>;

    /// Grab the specified key codes, intercepting them for processing
    /// within the window manager itself.
    fn grab_keys(&self, key_codes: &[KeyCode]) -> Result<()>;
    /// Release every key grab held by the window manager.
    fn ungrab_keys(&self) -> Result<()>;
    /// The server's keycode to keysym table.
    fn keyboard_mapping(&self) -> Result<KeyboardMapping>;
    /// The server's modifier to keycode table.
    fn modifier_mapping(&self) -> Result<ModifierMapping>;
}

/// Extended functionality for [XConn] impls: the X side of the desktop
/// engine.
///
/// Pure state transitions live on [DesktopSet][crate::pure::DesktopSet] and
/// [ClientStore][crate::pure::ClientStore]; the methods here wrap them with
/// the property publication, mapping and focus traffic that keeps the
/// server in sync with the model. Engine rule violations (bad indices,
/// duplicate names) are logged and swallowed so a racing client can never
/// take the event loop down.
pub trait XConnExt: XConn + Sized {
    /// Build a new [Client] record by querying the server for the window's
    /// attributes and ICCCM/EWMH properties.
    ///
    /// This is the one and only property load for the lifetime of the
    /// record: later PropertyNotify events do not refresh it.
    fn new_client(&self, id: Xid) -> Result<Client> {
        let attrs = self.get_window_attributes(id)?;
        let mut client = Client::new(id, attrs.override_redirect, attrs.geometry, attrs.map_state);

        client.name = self.window_title(id)?;

        if let Ok(Some(Prop::Latin1String(mut strs) | Prop::UTF8String(mut strs))) =
            self.get_prop(id, Atom::WmClass.as_ref())
        {
            if !strs.is_empty() {
                client.res_name = strs.remove(0);
            }
            if !strs.is_empty() {
                client.res_class = strs.remove(0);
            }
        }

        if let Ok(Some(Prop::Atom(protocols))) = self.get_prop(id, Atom::WmProtocols.as_ref()) {
            client.protocols = protocols.into_iter().collect();
        }

        if let Ok(Some(Prop::WmNormalHints(hints))) =
            self.get_prop(id, Atom::WmNormalHints.as_ref())
        {
            client.size_hints = Some(hints);
        }

        if let Ok(Some(Prop::WmHints(hints))) = self.get_prop(id, Atom::WmHints.as_ref()) {
            client.accepts_input = hints.accepts_input;
        }

        if let Ok(Some(Prop::Window(ids))) = self.get_prop(id, Atom::WmTransientFor.as_ref()) {
            client.transient_for = ids.first().copied().filter(|&p| p != id);
        }

        if let Ok(Some(wm_state)) = self.get_wm_state(id) {
            client.wm_state = wm_state;
        }

        Ok(client)
    }

    /// Request the title of a given client window, preferring _NET_WM_NAME
    /// over WM_NAME.
    fn window_title(&self, id: Xid) -> Result<String> {
        for atom in [Atom::NetWmName, Atom::WmName] {
            if let Ok(Some(Prop::UTF8String(strs) | Prop::Latin1String(strs))) =
                self.get_prop(id, atom.as_ref())
            {
                if let Some(name) = strs.into_iter().next() {
                    return Ok(name);
                }
            }
        }

        Ok("".to_string())
    }

    /// Import the children of the root window at startup, taking windows
    /// that are viewable (or that a previous window manager had marked with
    /// WM_STATE) under management.
    ///
    /// Other children are tracked but never placed on a desktop: X apps are
    /// free to create children of the root that they never map, and the
    /// window manager has to ignore them.
    fn import_existing_clients(&self, state: &mut State) -> Result<()> {
        for id in self.existing_clients()? {
            if state.clients.contains(&id) {
                continue;
            }

            let client = match self.new_client(id) {
                Ok(c) => c,
                Err(e) => {
                    debug!(%id, %e, "skipping unreadable window on import");
                    continue;
                }
            };

            let has_wm_state = self.get_wm_state(id).ok().flatten().is_some();
            let manage = !client.override_redirect
                && (client.map_state == MapState::Viewable || has_wm_state);

            debug!(%id, name = %client.name(), manage, "imported existing window");
            state.clients.insert(client);

            if manage {
                state.desktops.append(id);
                self.set_client_attributes(id, &[ClientAttr::ImportEventMask])?;
            }
        }

        Ok(())
    }

    /// Advertise EWMH support: the supporting WM check window, the
    /// supported atom list and the initial desktop / client hints.
    fn install_ewmh_support(&self, state: &mut State) -> Result<()> {
        let root = state.root;
        let check = self.supporting_check_window();

        self.set_prop(
            root,
            Atom::NetSupportingWmCheck.as_ref(),
            Prop::Window(vec![check]),
        )?;
        self.set_prop(
            check,
            Atom::NetSupportingWmCheck.as_ref(),
            Prop::Window(vec![check]),
        )?;
        self.set_prop(
            check,
            Atom::NetWmName.as_ref(),
            Prop::UTF8String(vec![atom::WM_NAME.to_string()]),
        )?;

        let supported = EWMH_SUPPORTED_ATOMS
            .iter()
            .map(|a| a.as_ref().to_string())
            .collect();
        self.set_prop(root, Atom::NetSupported.as_ref(), Prop::Atom(supported))?;

        self.publish_desktop_hints(state)?;
        self.publish_client_lists(state)
    }

    /// Take a window under management: push it onto the current desktop's
    /// stack, subscribe to its events and bring it to the front.
    fn manage_window(&self, id: Xid, state: &mut State) -> Result<()> {
        let Some(client) = state.clients.get(&id) else {
            warn!(%id, "asked to manage an unknown window");
            return Ok(());
        };
        if client.override_redirect {
            trace!(%id, "not managing override redirect window");
            return Ok(());
        }

        state.desktops.insert_at_top(id);
        self.set_client_attributes(id, &[ClientAttr::ClientEventMask])?;
        self.publish_client_lists(state)?;

        if let Some(ix) = state.desktops.index_of_window(&id) {
            self.set_prop(
                id,
                Atom::NetWmDesktop.as_ref(),
                Prop::Cardinal(vec![ix as u32]),
            )?;
            if let Some(client) = state.clients.get_mut(&id) {
                client.desktop_index = ix as u32;
            }
        }

        self.raise_window(id, state)
    }

    /// Drop all state for a destroyed window.
    fn unmanage_window(&self, id: Xid, state: &mut State) -> Result<()> {
        if state.clients.remove(&id).is_none() {
            debug!(%id, "destroyed window was not known");
        }

        match state.desktops.remove_window(&id) {
            Some(index) => {
                self.publish_client_lists(state)?;
                if index == 0 {
                    self.redraw(state)?;
                }
            }
            None => debug!(%id, "destroyed window was not on any desktop"),
        }

        Ok(())
    }

    /// The server has confirmed an unmap: move the window to the Withdrawn
    /// state (ICCCM 4.1.3.1) and let the next window in the stack show.
    fn withdraw_window(&self, id: Xid, state: &mut State) -> Result<()> {
        if !state.desktops.contains_window(&id) {
            trace!(%id, "unmap for a window on no desktop");
            return Ok(());
        }

        let on_current = state.desktops.current().contains(&id);
        self.set_wm_state(id, WmState::Withdrawn)?;
        if let Some(client) = state.clients.get_mut(&id) {
            client.wm_state = WmState::Withdrawn;
            client.map_state = MapState::Unmapped;
        }
        debug!(%id, "window withdrawn");

        if on_current {
            self.redraw(state)?;
        }

        Ok(())
    }

    /// Bring a window's family to the top of the current desktop's stack
    /// and redraw if the window is now the visible one.
    ///
    /// No-op for windows that are not on the current desktop.
    fn raise_window(&self, id: Xid, state: &mut State) -> Result<()> {
        if !state.desktops.current().contains(&id) {
            debug!(%id, "window is not on the current desktop: not raising");
            return Ok(());
        }

        let family = state.clients.family_of(id);
        state.desktops.raise_family(&family);
        self.publish_client_lists(state)?;

        if state.desktops.current().top() == Some(id) {
            self.redraw(state)?;
        }

        Ok(())
    }

    /// Ask a window to close itself by delivering WM_DELETE_WINDOW.
    ///
    /// Windows that do not advertise the protocol are left alone: there is
    /// deliberately no fallback to XDestroyWindow.
    fn close_window(&self, id: Xid, state: &State) -> Result<()> {
        let Some(client) = state.clients.get(&id) else {
            debug!(%id, "close requested for an unknown window");
            return Ok(());
        };

        if client.supports_protocol(Atom::WmDeleteWindow.as_ref()) {
            let msg = ClientMessageKind::DeleteWindow(id).as_message(self)?;
            self.send_client_message(msg)
        } else {
            debug!(%id, "WM_DELETE_WINDOW not supported");
            Ok(())
        }
    }

    /// Hand input focus to a window following the ICCCM input model:
    /// clients with `input = true` get WM_TAKE_FOCUS if they advertise it
    /// ("locally active") or a direct SetInputFocus otherwise ("passive");
    /// anything else is left to manage focus itself.
    fn focus_window(&self, id: Xid, state: &State) -> Result<()> {
        let Some(client) = state.clients.get(&id) else {
            debug!(%id, "focus requested for an unknown window");
            return Ok(());
        };

        if !client.accepts_input {
            trace!(%id, "globally active or no-input client: leaving focus alone");
            return Ok(());
        }

        if client.supports_protocol(Atom::WmTakeFocus.as_ref()) {
            let msg = ClientMessageKind::TakeFocus(id).as_message(self)?;
            self.send_client_message(msg)
        } else {
            self.focus(id)
        }
    }

    /// Move / resize a window to the given geometry.
    fn position_window(&self, id: Xid, r: Rect) -> Result<()> {
        self.set_client_config(id, &[ClientConfig::Position(r)])
    }

    /// Draw the current desktop: size, map and focus the family of the top
    /// of stack window and unmap everything else on the desktop.
    ///
    /// Parents of transients are revealed beneath their dialogs so the
    /// whole family shows and hides as one unit.
    fn redraw(&self, state: &mut State) -> Result<()> {
        let family = match state.desktops.current().top() {
            Some(top) => state.clients.family_of(top),
            None => {
                debug!(root = %state.root, "current desktop is empty: nothing to draw");
                vec![]
            }
        };

        let root_geometry = state.root_geometry;
        let normal_sizer = state.config.normal_window_sizer;

        // parents first so the primary ends up on top
        for &id in family.iter().rev() {
            if let Some(client) = state.clients.get_mut(&id) {
                let sizer = client.sizer(normal_sizer);
                let wanted = sizer.size(client.geometry, root_geometry, client.size_hints.as_ref());
                client.wanted_geometry = wanted;

                if wanted != client.geometry {
                    self.position_window(id, wanted)?;
                }
                trace!(%id, %wanted, "showing window");
                self.map(id)?;
            }
        }

        if let Some(&primary) = family.first() {
            self.focus_window(primary, state)?;
            self.set_prop(
                state.root,
                Atom::NetActiveWindow.as_ref(),
                Prop::Window(vec![primary]),
            )?;
        }

        let to_hide: Vec<Xid> = state
            .desktops
            .current()
            .windows()
            .iter()
            .copied()
            .filter(|id| !family.contains(id))
            .collect();
        for id in to_hide {
            trace!(%id, "hiding window");
            self.unmap(id)?;
        }

        Ok(())
    }

    /// Create a new desktop. Inserting at the front makes the new (empty)
    /// desktop current immediately.
    fn add_desktop(&self, name: &str, index: usize, state: &mut State) -> Result<()> {
        let previous_current = state.desktops.current().stack.clone();

        if let Err(e) = state.desktops.add(name, index) {
            warn!(%e, name, index, "not adding desktop");
            return Ok(());
        }

        if index == 0 {
            for id in previous_current {
                self.unmap(id)?;
            }
            self.publish_desktop_hints(state)?;
            self.publish_client_lists(state)?;
            self.redraw(state)
        } else {
            self.publish_desktop_hints(state)
        }
    }

    /// Delete a desktop, parking its windows on the unassigned desktop.
    fn delete_desktop(&self, index: usize, state: &mut State) -> Result<()> {
        let was_current = index == 0;

        let parked = match state.desktops.delete(index) {
            Ok(parked) => parked,
            Err(e) => {
                warn!(%e, index, "not deleting desktop");
                return Ok(());
            }
        };

        if was_current {
            for id in &parked {
                self.unmap(*id)?;
            }
        }

        self.publish_desktop_hints(state)?;
        self.publish_client_lists(state)?;

        // the parked windows land on top of the unassigned stack, so a
        // redraw is needed whenever the visible desktop was touched
        if was_current || (state.desktops.unassigned_index() == 0 && !parked.is_empty()) {
            self.redraw(state)?;
        }

        Ok(())
    }

    /// Rename a desktop.
    fn rename_desktop(&self, index: usize, new_name: &str, state: &mut State) -> Result<()> {
        if let Err(e) = state.desktops.rename(index, new_name) {
            warn!(%e, index, new_name, "not renaming desktop");
            return Ok(());
        }

        self.publish_desktop_hints(state)
    }

    /// Switch to another desktop: hide the windows of the one being left,
    /// republish the desktop hints and draw the new top of stack.
    fn select_desktop(&self, index: usize, state: &mut State) -> Result<()> {
        let previous_current = state.desktops.current().stack.clone();

        match state.desktops.select(index) {
            Err(e) => {
                warn!(%e, index, "not selecting desktop");
                Ok(())
            }
            Ok(false) => Ok(()),
            Ok(true) => {
                for id in previous_current {
                    self.unmap(id)?;
                }
                self.publish_desktop_hints(state)?;
                self.publish_client_lists(state)?;
                self.redraw(state)
            }
        }
    }

    /// Move a window to the top of another desktop's stack.
    fn set_window_desktop(&self, id: Xid, index: usize, state: &mut State) -> Result<()> {
        let (from, to) = match state.desktops.move_window(id, index) {
            Ok(moved) => moved,
            Err(e) => {
                warn!(%e, %id, index, "not moving window");
                return Ok(());
            }
        };

        if from == 0 && to != 0 {
            self.unmap(id)?;
        }

        self.set_prop(
            id,
            Atom::NetWmDesktop.as_ref(),
            Prop::Cardinal(vec![to as u32]),
        )?;
        if let Some(client) = state.clients.get_mut(&id) {
            client.desktop_index = to as u32;
        }
        self.publish_client_lists(state)?;

        if from == 0 || to == 0 {
            self.redraw(state)?;
        }

        Ok(())
    }

    /// Bring the previously used window back to the top of the stack (an
    /// MRU toggle between the two most recent windows; repeated presses
    /// flip back and forth).
    fn cycle_window(&self, state: &mut State) -> Result<()> {
        let previous = state.desktops.current().windows().get(1).copied();

        match previous {
            Some(id) => self.raise_window(id, state),
            None => Ok(()),
        }
    }

    /// Publish _NET_CLIENT_LIST (managed windows in creation order) and
    /// _NET_CLIENT_LIST_STACKING (the current desktop's MRU stack).
    fn publish_client_lists(&self, state: &State) -> Result<()> {
        let managed: Vec<Xid> = state
            .clients
            .ids()
            .filter(|id| state.desktops.contains_window(id))
            .collect();
        self.set_prop(state.root, Atom::NetClientList.as_ref(), Prop::Window(managed))?;

        let stacking = state.desktops.current().windows().to_vec();
        self.set_prop(
            state.root,
            Atom::NetClientListStacking.as_ref(),
            Prop::Window(stacking),
        )
    }

    /// Publish the desktop list hints and update _NET_WM_DESKTOP for any
    /// window whose desktop index changed since it was last announced.
    ///
    /// _NET_CURRENT_DESKTOP is always 0: selection is modelled by
    /// reordering the desktop list, not by an index.
    fn publish_desktop_hints(&self, state: &mut State) -> Result<()> {
        let names: Vec<String> = state
            .desktops
            .names()
            .into_iter()
            .map(String::from)
            .collect();

        self.set_prop(
            state.root,
            Atom::NetNumberOfDesktops.as_ref(),
            Prop::Cardinal(vec![names.len() as u32]),
        )?;
        self.set_prop(
            state.root,
            Atom::NetDesktopNames.as_ref(),
            Prop::UTF8String(names),
        )?;
        self.set_prop(
            state.root,
            Atom::NetCurrentDesktop.as_ref(),
            Prop::Cardinal(vec![0]),
        )?;

        let mut stale = vec![];
        for (ix, desktop) in state.desktops.iter().enumerate() {
            for id in desktop.windows() {
                let announced = state.clients.get(id).map(|c| c.desktop_index);
                if announced != Some(ix as u32) {
                    stale.push((*id, ix as u32));
                }
            }
        }

        for (id, ix) in stale {
            self.set_prop(id, Atom::NetWmDesktop.as_ref(), Prop::Cardinal(vec![ix]))?;
            if let Some(client) = state.clients.get_mut(&id) {
                client.desktop_index = ix;
            }
        }

        Ok(())
    }
}

// Auto impl XConnExt for all XConn impls
impl<T> XConnExt for T where T: XConn {}
