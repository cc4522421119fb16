//! Core data structures and the window manager event loop
use crate::{
    pure::{sizer::Sizer, ClientStore, DesktopSet, Rect},
    x::{XConn, XConnExt, XEvent},
    Result,
};
use nix::sys::signal::{signal, SigHandler, Signal};
use std::{fmt, ops::Deref};
use tracing::{error, span, trace, Level};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod bindings;
pub mod command;
pub mod handle;
pub mod keysym;

use bindings::{KeyBindings, KeyboardMap};

/// An X11 ID for a given resource
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct Xid(pub(crate) u32);

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Deref for Xid {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<u32> for Xid {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<Xid> for u32 {
    fn from(id: Xid) -> Self {
        id.0
    }
}

/// User facing configuration for the window manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Desktops to create at startup in addition to the unassigned desktop.
    /// The first name listed (or the unassigned desktop when empty) is the
    /// current desktop after startup.
    pub desktop_names: Vec<String>,
    /// The name of the desktop that collects windows when their own desktop
    /// is deleted. Always present, never deletable.
    pub unassigned_name: String,
    /// The sizing policy applied to non transient windows.
    pub normal_window_sizer: Sizer,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            desktop_names: vec![],
            unassigned_name: "Unassigned".to_string(),
            normal_window_sizer: Sizer::HonourableMax,
        }
    }
}

/// Mutable internal state for the window manager.
#[derive(Debug)]
pub struct State {
    /// The config currently in use
    pub config: Config,
    /// Every window known to the window manager, in creation order
    pub clients: ClientStore,
    /// The desktops and their MRU stacks; `desktops[0]` is current
    pub desktops: DesktopSet,
    pub(crate) root: Xid,
    pub(crate) root_geometry: Rect,
}

impl State {
    pub(crate) fn try_new<X: XConn>(config: Config, x: &X) -> Result<Self> {
        let desktops =
            DesktopSet::try_new(config.desktop_names.clone(), config.unassigned_name.clone())?;

        Ok(Self {
            config,
            clients: ClientStore::new(),
            desktops,
            root: x.root(),
            root_geometry: x.root_geometry()?,
        })
    }

    /// The Xid of the root window for the running [WindowManager].
    pub fn root(&self) -> Xid {
        self.root
    }

    /// The geometry of the root window: the area windows are sized into.
    pub fn root_geometry(&self) -> Rect {
        self.root_geometry
    }
}

/// A top level struct holding all of the state required to run as an X11
/// window manager.
pub struct WindowManager<X>
where
    X: XConn,
{
    x: X,
    /// The mutable state of the window manager
    pub state: State,
    key_bindings: KeyBindings<X>,
}

impl<X: XConn> fmt::Debug for WindowManager<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowManager")
            .field("root", &self.state.root)
            .field("state", &self.state)
            .finish()
    }
}

impl<X> WindowManager<X>
where
    X: XConn,
{
    /// Construct a new [WindowManager] with the provided config, key
    /// bindings and X connection.
    pub fn new(config: Config, key_bindings: KeyBindings<X>, x: X) -> Result<Self> {
        let state = State::try_new(config, &x)?;

        Ok(Self {
            x,
            state,
            key_bindings,
        })
    }

    /// Install as the window manager for the current display and run until
    /// told to exit.
    ///
    /// Startup order matters: we have to own SubstructureRedirect on the
    /// root before importing the existing window tree, and the EWMH
    /// properties must be live before any client can sensibly talk to us.
    pub fn run(mut self) -> Result<()> {
        trace!("registering SIGCHLD signal handler");
        if let Err(e) = unsafe { signal(Signal::SIGCHLD, SigHandler::SigIgn) } {
            panic!("unable to set signal handler: {}", e);
        }

        self.x.become_window_manager()?;
        self.x.import_existing_clients(&mut self.state)?;
        self.x.install_ewmh_support(&mut self.state)?;
        self.grab()?;
        self.x.redraw(&mut self.state)?;
        self.x.flush();

        loop {
            match self.x.next_event() {
                Ok(event) => {
                    let span = span!(target: "footwm", Level::DEBUG, "XEvent", %event);
                    let _enter = span.enter();
                    trace!(details = ?event, "event details");

                    if let Err(e) = self.handle_xevent(event) {
                        error!(%e, "error handling event");
                    }
                    self.x.flush();
                }

                Err(e) => error!(%e, "error pulling next x event"),
            }
        }
    }

    fn grab(&mut self) -> Result<()> {
        trace!("building keyboard map and grabbing key bindings");
        let map = KeyboardMap::new(self.x.keyboard_mapping()?, self.x.modifier_mapping()?);
        self.key_bindings.resolve(&map);

        self.x.grab_keys(&self.key_bindings.grab_codes())
    }

    fn handle_xevent(&mut self, event: XEvent) -> Result<()> {
        use XEvent::*;

        let WindowManager {
            x,
            state,
            key_bindings,
        } = self;

        match event {
            ClientMessage(m) => handle::client_message(m, state, x)?,
            ConfigureNotify(e) => handle::configure_notify(e, state, x)?,
            ConfigureRequest(e) => handle::configure_request(e, state, x)?,
            Create {
                id,
                override_redirect,
            } => handle::create_notify(id, override_redirect, state, x)?,
            Destroy(id) => handle::destroy_notify(id, state, x)?,
            Enter(id) => trace!(%id, "pointer entered window"),
            FocusIn(id) => trace!(%id, "window gained focus"),
            FocusOut(id) => trace!(%id, "window lost focus"),
            KeyPress(code) => handle::keypress(code, key_bindings, state, x)?,
            MappingNotify => {
                let map = KeyboardMap::new(x.keyboard_mapping()?, x.modifier_mapping()?);
                handle::mapping_notify(&map, key_bindings, x)?;
            }
            MapNotify(id) => handle::map_notify(id, state, x)?,
            MapRequest(id) => handle::map_request(id, state, x)?,
            PropertyNotify(e) => handle::property_notify(e, state, x)?,
            UnmapNotify(e) => handle::unmap_notify(e, state, x)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{x::mock::MockXConn, Error};

    #[derive(Debug)]
    struct BlockedConn;

    impl MockXConn for BlockedConn {
        fn mock_root_geometry(&self) -> Result<Rect> {
            Ok(Rect::new(0, 0, 800, 600))
        }

        fn mock_become_window_manager(&self) -> Result<()> {
            Err(Error::AnotherWmRunning)
        }
    }

    // Only one client may hold SubstructureRedirect on the root: startup
    // must fail cleanly without touching any other server state.
    #[test]
    fn run_fails_fast_when_another_wm_is_running() {
        let wm = WindowManager::new(Config::default(), KeyBindings::new(), BlockedConn).unwrap();

        assert!(matches!(wm.run(), Err(Error::AnotherWmRunning)));
    }

    #[test]
    fn duplicate_desktop_names_fail_construction() {
        let config = Config {
            desktop_names: vec!["work".into(), "work".into()],
            ..Config::default()
        };

        assert!(matches!(
            WindowManager::new(config, KeyBindings::new(), BlockedConn),
            Err(Error::NonUniqueName { .. })
        ));
    }
}
