//! An [XConn] implementation using the x11rb crate to communicate with the
//! X server.
//!
//! X request errors are delivered to us as error events and logged rather
//! than propagated: windows routinely die between the event that mentions
//! them and our follow up requests, and stale-id errors are part of normal
//! operation for a window manager.
use crate::{
    core::bindings::{KeyCode, KeyboardMapping, ModifierMapping},
    pure::geometry::Rect,
    x::{
        atom::Atom,
        event::{
            ClientEventMask, ClientMessage, ClientMessageData, ConfigureEvent, ConfigureRequest,
            PropertyEvent, UnmapEvent, XEvent,
        },
        property::{
            decode_text_list, encode_text_list, MapState, Prop, TextEncoding, WindowAttributes,
            WmHints, WmNormalHints, WmState,
        },
        ClientAttr, ClientConfig, XConn,
    },
    Error, Result, Xid,
};
use std::{cell::RefCell, collections::HashMap, str::FromStr};
use strum::IntoEnumIterator;
use tracing::{error, trace, warn};
use x11rb::{
    connection::Connection,
    errors::ReplyError,
    protocol::{
        xproto::{
            AtomEnum, ChangeWindowAttributesAux, ClientMessageEvent, ConfigWindow,
            ConfigureWindowAux, ConnectionExt as _, CreateWindowAux, EventMask, Grab, GrabMode,
            InputFocus, MapState as XMapState, ModMask, PropMode, WindowClass,
            CLIENT_MESSAGE_EVENT,
        },
        ErrorKind, Event,
    },
    rust_connection::RustConnection,
    wrapper::ConnectionExt as _,
    CURRENT_TIME,
};

/// A connection to the X server using the x11rb [RustConnection] backend.
pub type RustConn = Conn<RustConnection>;

impl RustConn {
    /// Connect to the display named in `$DISPLAY`.
    pub fn new() -> Result<Self> {
        Self::connect(None)
    }

    /// Connect to a specific display, falling back to `$DISPLAY` for None.
    pub fn connect(display: Option<&str>) -> Result<Self> {
        let (conn, screen) = ::x11rb::connect(display)?;

        Self::new_for_connection(conn, screen)
    }
}

/// Handles communication with an X server via x11rb.
pub struct Conn<C>
where
    C: Connection,
{
    conn: C,
    root: Xid,
    check_win: Xid,
    atoms: HashMap<Atom, u32>,
    atom_names: RefCell<HashMap<u32, String>>,
}

impl<C: Connection> std::fmt::Debug for Conn<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("root", &self.root)
            .field("check_win", &self.check_win)
            .finish()
    }
}

impl<C> Conn<C>
where
    C: Connection,
{
    /// Wrap an established connection, interning the atoms we use and
    /// creating the supporting WM check window.
    pub fn new_for_connection(conn: C, screen: usize) -> Result<Self> {
        let root = Xid::from(conn.setup().roots[screen].root);

        // send all InternAtom requests before fetching any replies
        let cookies = Atom::iter()
            .map(|atom| Ok((atom, conn.intern_atom(false, atom.as_ref().as_bytes())?)))
            .collect::<Result<Vec<_>>>()?;
        let mut atoms = HashMap::new();
        let mut atom_names = HashMap::new();
        for (atom, cookie) in cookies {
            let value = cookie.reply()?.atom;
            atoms.insert(atom, value);
            atom_names.insert(value, atom.as_ref().to_string());
        }

        let check_win = Xid::from(conn.generate_id()?);
        let aux = CreateWindowAux::new().override_redirect(1);
        conn.create_window(
            0, // CopyFromParent
            *check_win,
            *root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            0, // CopyFromParent
            &aux,
        )?;

        Ok(Self {
            conn,
            root,
            check_win,
            atoms,
            atom_names: RefCell::new(atom_names),
        })
    }

    /// Direct access to the underlying connection.
    pub fn connection(&self) -> &C {
        &self.conn
    }

    fn known_atom(&self, atom: Atom) -> u32 {
        // every Atom variant is interned at construction
        self.atoms[&atom]
    }

    fn atom_name(&self, xid: Xid) -> Result<String> {
        if let Some(name) = self.atom_names.borrow().get(&*xid) {
            return Ok(name.clone());
        }

        let name = String::from_utf8_lossy(&self.conn.get_atom_name(*xid)?.reply()?.name)
            .to_string();
        self.atom_names.borrow_mut().insert(*xid, name.clone());

        Ok(name)
    }

    // Read the full value of a property, following the long-offset protocol
    // for values larger than a single request.
    fn read_property(&self, client: Xid, prop: u32) -> Result<Option<(u32, u8, Vec<u8>)>> {
        const CHUNK: u32 = 1024; // in 32-bit multiples

        let mut long_offset = 0;
        let mut type_ = 0;
        let mut format = 0;
        let mut value = Vec::new();

        loop {
            let r = self
                .conn
                .get_property(false, *client, prop, AtomEnum::ANY, long_offset, CHUNK)?
                .reply()?;

            if r.type_ == u32::from(AtomEnum::NONE) {
                return Ok(None);
            }

            type_ = r.type_;
            format = r.format;
            value.extend_from_slice(&r.value);

            if r.bytes_after == 0 {
                break;
            }
            long_offset += CHUNK;
        }

        Ok(Some((type_, format, value)))
    }

    fn convert_event(&self, event: Event) -> Result<Option<XEvent>> {
        match event {
            Event::Error(err) => {
                // expected for stale window ids: log and carry on
                error!(?err, "X error event");
                Ok(None)
            }

            Event::KeyPress(e) => {
                // strip the pointer button bits, keep the modifier bits
                let mask = u16::from(e.state) & 0x00ff;
                Ok(Some(XEvent::KeyPress(KeyCode {
                    mask,
                    code: e.detail,
                })))
            }

            Event::MappingNotify(_) => Ok(Some(XEvent::MappingNotify)),

            Event::CreateNotify(e) => Ok(Some(XEvent::Create {
                id: Xid(e.window),
                override_redirect: e.override_redirect,
            })),

            Event::MapRequest(e) => Ok(Some(XEvent::MapRequest(Xid(e.window)))),

            // For the *Notify structure events we only act on the report
            // delivered for the window itself: the SubstructureNotify
            // selection on the root produces a duplicate with event set to
            // the root window (see man XUnmapEvent).
            Event::MapNotify(e) if e.event == e.window => {
                Ok(Some(XEvent::MapNotify(Xid(e.window))))
            }

            Event::UnmapNotify(e) if e.event == e.window => {
                Ok(Some(XEvent::UnmapNotify(UnmapEvent {
                    id: Xid(e.window),
                    synthetic: e.response_type & 0x80 != 0,
                })))
            }

            Event::DestroyNotify(e) if e.event == e.window => {
                Ok(Some(XEvent::Destroy(Xid(e.window))))
            }

            Event::ConfigureNotify(e) if e.event == e.window => {
                Ok(Some(XEvent::ConfigureNotify(ConfigureEvent {
                    id: Xid(e.window),
                    r: Rect::new(e.x as u32, e.y as u32, e.width as u32, e.height as u32),
                    is_root: Xid(e.window) == self.root,
                })))
            }

            Event::ConfigureRequest(e) => {
                let set = |flag: ConfigWindow| e.value_mask.contains(flag);
                Ok(Some(XEvent::ConfigureRequest(ConfigureRequest {
                    id: Xid(e.window),
                    x: set(ConfigWindow::X).then_some(e.x as i32),
                    y: set(ConfigWindow::Y).then_some(e.y as i32),
                    w: set(ConfigWindow::WIDTH).then_some(e.width as u32),
                    h: set(ConfigWindow::HEIGHT).then_some(e.height as u32),
                })))
            }

            Event::ClientMessage(e) => {
                let dtype = self.atom_name(Xid(e.type_))?;
                let data = match e.format {
                    8 => ClientMessageData::from(e.data.as_data8()),
                    16 => ClientMessageData::from(e.data.as_data16()),
                    32 => ClientMessageData::from(e.data.as_data32()),
                    format => {
                        warn!(format, "dropping client message with invalid format");
                        return Ok(None);
                    }
                };
                Ok(Some(XEvent::ClientMessage(ClientMessage::new(
                    Xid(e.window),
                    ClientEventMask::NoEventMask,
                    dtype,
                    data,
                ))))
            }

            Event::PropertyNotify(e) => Ok(Some(XEvent::PropertyNotify(PropertyEvent {
                id: Xid(e.window),
                atom: self.atom_name(Xid(e.atom))?,
                is_root: Xid(e.window) == self.root,
            }))),

            Event::EnterNotify(e) => Ok(Some(XEvent::Enter(Xid(e.event)))),
            Event::FocusIn(e) => Ok(Some(XEvent::FocusIn(Xid(e.event)))),
            Event::FocusOut(e) => Ok(Some(XEvent::FocusOut(Xid(e.event)))),

            // NOTE: ignoring other event types (including the duplicate
            // substructure reports filtered out above)
            _ => Ok(None),
        }
    }
}

fn event_mask_for(attr: &ClientAttr) -> EventMask {
    match attr {
        ClientAttr::ClientEventMask => {
            EventMask::ENTER_WINDOW | EventMask::FOCUS_CHANGE | EventMask::STRUCTURE_NOTIFY
        }
        ClientAttr::ImportEventMask => EventMask::STRUCTURE_NOTIFY,
        ClientAttr::RootEventMask => {
            EventMask::SUBSTRUCTURE_REDIRECT
                | EventMask::SUBSTRUCTURE_NOTIFY
                | EventMask::PROPERTY_CHANGE
                | EventMask::STRUCTURE_NOTIFY
        }
    }
}

// format 32 properties arrive as raw bytes in native order
fn cardinals_from_bytes(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|b| u32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

// NOTE: implemented for the concrete connection type rather than any
// C: Connection so that this impl can never overlap with the blanket
// MockXConn impl used in tests.
impl XConn for RustConn {
    fn root(&self) -> Xid {
        self.root
    }

    fn root_geometry(&self) -> Result<Rect> {
        let g = self.conn.get_geometry(*self.root)?.reply()?;

        Ok(Rect::new(
            g.x as u32,
            g.y as u32,
            g.width as u32,
            g.height as u32,
        ))
    }

    fn supporting_check_window(&self) -> Xid {
        self.check_win
    }

    fn become_window_manager(&self) -> Result<()> {
        let mask = event_mask_for(&ClientAttr::RootEventMask);
        let aux = ChangeWindowAttributesAux::new().event_mask(mask);

        let res = self
            .conn
            .change_window_attributes(*self.root, &aux)?
            .check();

        match res {
            Ok(()) => {
                self.sync()?;
                Ok(())
            }
            Err(ReplyError::X11Error(e)) if e.error_kind == ErrorKind::Access => {
                Err(Error::AnotherWmRunning)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn next_event(&self) -> Result<XEvent> {
        loop {
            let event = self.conn.wait_for_event()?;
            trace!(?event, "raw event from server");
            if let Some(converted) = self.convert_event(event)? {
                return Ok(converted);
            }
        }
    }

    fn flush(&self) {
        if let Err(e) = self.conn.flush() {
            error!(%e, "unable to flush X connection");
        }
    }

    fn sync(&self) -> Result<()> {
        // a request with a reply forces everything before it to be processed
        self.conn.get_input_focus()?.reply()?;

        Ok(())
    }

    fn intern_atom(&self, atom: &str) -> Result<Xid> {
        if let Ok(known) = Atom::from_str(atom) {
            return Ok(Xid(self.known_atom(known)));
        }

        let value = self.conn.intern_atom(false, atom.as_bytes())?.reply()?.atom;
        self.atom_names
            .borrow_mut()
            .insert(value, atom.to_string());

        Ok(Xid(value))
    }

    fn atom_name(&self, xid: Xid) -> Result<String> {
        Conn::atom_name(self, xid)
    }

    fn existing_clients(&self) -> Result<Vec<Xid>> {
        let children = self.conn.query_tree(*self.root)?.reply()?.children;

        Ok(children
            .into_iter()
            .map(Xid)
            .filter(|&id| id != self.check_win)
            .collect())
    }

    fn get_window_attributes(&self, client: Xid) -> Result<WindowAttributes> {
        let attrs = self.conn.get_window_attributes(*client)?.reply()?;
        let g = self.conn.get_geometry(*client)?.reply()?;

        let map_state = match attrs.map_state {
            XMapState::UNVIEWABLE => MapState::Unviewable,
            XMapState::VIEWABLE => MapState::Viewable,
            _ => MapState::Unmapped,
        };

        Ok(WindowAttributes {
            override_redirect: attrs.override_redirect,
            map_state,
            geometry: Rect::new(g.x as u32, g.y as u32, g.width as u32, g.height as u32),
        })
    }

    fn get_prop(&self, client: Xid, prop_name: &str) -> Result<Option<Prop>> {
        let prop = *self.intern_atom(prop_name)?;
        let Some((type_, _format, value)) = self.read_property(client, prop)? else {
            return Ok(None);
        };

        let prop_type = self.atom_name(Xid(type_))?;
        let prop = match prop_type.as_str() {
            "ATOM" => Prop::Atom(
                cardinals_from_bytes(&value)
                    .into_iter()
                    .map(|a| self.atom_name(Xid(a)))
                    .collect::<Result<Vec<String>>>()?,
            ),
            "WINDOW" => Prop::Window(cardinals_from_bytes(&value).into_iter().map(Xid).collect()),
            "CARDINAL" => Prop::Cardinal(cardinals_from_bytes(&value)),
            "STRING" => Prop::Latin1String(decode_text_list(&value, TextEncoding::Latin1)),
            "UTF8_STRING" => Prop::UTF8String(decode_text_list(&value, TextEncoding::Utf8)),
            "WM_HINTS" => Prop::WmHints(WmHints::from_cardinals(&cardinals_from_bytes(&value))),
            "WM_SIZE_HINTS" => {
                Prop::WmNormalHints(WmNormalHints::from_cardinals(&cardinals_from_bytes(&value)))
            }
            _ => Prop::Bytes(value),
        };

        Ok(Some(prop))
    }

    fn set_prop(&self, client: Xid, name: &str, val: Prop) -> Result<()> {
        let prop = *self.intern_atom(name)?;

        match val {
            Prop::Atom(strs) => {
                let atoms = strs
                    .iter()
                    .map(|s| Ok(*self.intern_atom(s)?))
                    .collect::<Result<Vec<u32>>>()?;
                self.conn
                    .change_property32(PropMode::REPLACE, *client, prop, AtomEnum::ATOM, &atoms)?;
            }
            Prop::Window(ids) => {
                let ids: Vec<u32> = ids.into_iter().map(|id| *id).collect();
                self.conn
                    .change_property32(PropMode::REPLACE, *client, prop, AtomEnum::WINDOW, &ids)?;
            }
            Prop::Cardinal(vals) => {
                self.conn.change_property32(
                    PropMode::REPLACE,
                    *client,
                    prop,
                    AtomEnum::CARDINAL,
                    &vals,
                )?;
            }
            Prop::UTF8String(strs) => {
                self.conn.change_property8(
                    PropMode::REPLACE,
                    *client,
                    prop,
                    self.known_atom(Atom::UTF8String),
                    &encode_text_list(&strs, TextEncoding::Utf8),
                )?;
            }
            Prop::Latin1String(strs) => {
                self.conn.change_property8(
                    PropMode::REPLACE,
                    *client,
                    prop,
                    AtomEnum::STRING,
                    &encode_text_list(&strs, TextEncoding::Latin1),
                )?;
            }
            Prop::Bytes(_) | Prop::WmHints(_) | Prop::WmNormalHints(_) => {
                return Err(Error::InvalidPropertyData(format!(
                    "{name} props are read-only from the WM side"
                )))
            }
        }

        Ok(())
    }

    fn get_wm_state(&self, client: Xid) -> Result<Option<WmState>> {
        let wm_state = self.known_atom(Atom::WmState);
        let r = self
            .conn
            .get_property(false, *client, wm_state, wm_state, 0, 2)?
            .reply()?;

        if r.type_ == u32::from(AtomEnum::NONE) {
            return Ok(None);
        }

        match cardinals_from_bytes(&r.value).first().copied() {
            Some(raw) => match WmState::try_from(raw) {
                Ok(state) => Ok(Some(state)),
                Err(e) => {
                    // garbled data reads as absent
                    warn!(%client, %e, "invalid WM_STATE value");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    fn set_wm_state(&self, client: Xid, wm_state: WmState) -> Result<()> {
        let prop = self.known_atom(Atom::WmState);
        // data is [state, icon window]; we never use icon windows
        let data = [u32::from(wm_state), 0];
        self.conn
            .change_property32(PropMode::REPLACE, *client, prop, prop, &data)?;

        Ok(())
    }

    fn map(&self, client: Xid) -> Result<()> {
        self.conn.map_window(*client)?;

        Ok(())
    }

    fn unmap(&self, client: Xid) -> Result<()> {
        self.conn.unmap_window(*client)?;

        Ok(())
    }

    fn set_client_attributes(&self, client: Xid, attrs: &[ClientAttr]) -> Result<()> {
        for attr in attrs {
            let aux = ChangeWindowAttributesAux::new().event_mask(event_mask_for(attr));
            self.conn.change_window_attributes(*client, &aux)?;
        }

        Ok(())
    }

    fn set_client_config(&self, client: Xid, data: &[ClientConfig]) -> Result<()> {
        let mut aux = ConfigureWindowAux::new();
        for d in data {
            aux = match d {
                ClientConfig::Position(r) => aux
                    .x(r.x as i32)
                    .y(r.y as i32)
                    .width(r.w)
                    .height(r.h),
                ClientConfig::X(v) => aux.x(*v),
                ClientConfig::Y(v) => aux.y(*v),
                ClientConfig::Width(v) => aux.width(*v),
                ClientConfig::Height(v) => aux.height(*v),
            };
        }
        self.conn.configure_window(*client, &aux)?;

        Ok(())
    }

    fn focus(&self, client: Xid) -> Result<()> {
        self.conn
            .set_input_focus(InputFocus::POINTER_ROOT, *client, CURRENT_TIME)?;

        Ok(())
    }

    fn send_client_message(&self, msg: ClientMessage) -> Result<()> {
        let type_ = *self.intern_atom(&msg.dtype)?;
        let data = msg.data.as_u32();

        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window: *msg.id,
            type_,
            data: data.into(),
        };

        // EWMH root messages go to the root window with the substructure
        // masks set; protocol messages go to the client itself
        let (destination, mask) = match msg.mask {
            ClientEventMask::NoEventMask => (*msg.id, EventMask::NO_EVENT),
            ClientEventMask::SubstructureNotifyRedirect => (
                *self.root,
                EventMask::SUBSTRUCTURE_NOTIFY | EventMask::SUBSTRUCTURE_REDIRECT,
            ),
        };

        self.conn.send_event(false, destination, mask, event)?;

        Ok(())
    }

    fn grab_keys(&self, key_codes: &[KeyCode]) -> Result<()> {
        for k in key_codes {
            self.conn.grab_key(
                false, // don't pass grabbed events through to the client
                *self.root,
                ModMask::from(k.mask),
                k.code,
                GrabMode::ASYNC, // don't lock the pointer input while grabbing
                GrabMode::ASYNC, // don't lock the keyboard input while grabbing
            )?;
        }
        self.flush();

        Ok(())
    }

    fn ungrab_keys(&self) -> Result<()> {
        self.conn
            .ungrab_key(Grab::ANY, *self.root, ModMask::ANY)?;

        Ok(())
    }

    fn keyboard_mapping(&self) -> Result<KeyboardMapping> {
        let setup = self.conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let reply = self
            .conn
            .get_keyboard_mapping(min, max - min + 1)?
            .reply()?;

        Ok(KeyboardMapping {
            min_keycode: min,
            keysyms_per_keycode: reply.keysyms_per_keycode as usize,
            keysyms: reply.keysyms,
        })
    }

    fn modifier_mapping(&self) -> Result<ModifierMapping> {
        let reply = self.conn.get_modifier_mapping()?.reply()?;

        Ok(ModifierMapping {
            keycodes_per_modifier: reply.keycodes_per_modifier() as usize,
            keycodes: reply.keycodes,
        })
    }
}

impl<C> Drop for Conn<C>
where
    C: Connection,
{
    fn drop(&mut self) {
        // release grabs and the check window so a crash never leaves the
        // server in a grabbed state
        let _ = self.conn.ungrab_key(Grab::ANY, *self.root, ModMask::ANY);
        let _ = self.conn.destroy_window(*self.check_win);
        let _ = self.conn.flush();
    }
}
