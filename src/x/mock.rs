//! A mock implementation of XConn that is easier to implement for use in
//! tests. This module and its contents are only available when testing.
use crate::{
    core::bindings::{KeyCode, KeyboardMapping, ModifierMapping},
    pure::geometry::Rect,
    x::{
        event::{ClientMessage, XEvent},
        property::{Prop, WindowAttributes, WmState},
        ClientAttr, ClientConfig, XConn,
    },
    Error, Result, Xid,
};
use std::{cell::RefCell, collections::HashMap};

/// All methods on this trait that return a Result will return
/// `Error::UnimplementedMock` by default unless an implementation is
/// provided. `mock_root` returns id 0, `mock_supporting_check_window` id
/// u32::MAX and `mock_flush` is a no-op.
///
/// Any implementation of `MockXConn` automatically implements `XConn` by
/// forwarding `$method` calls on to `mock_$method`.
#[allow(unused_variables)]
pub trait MockXConn {
    fn mock_root(&self) -> Xid {
        Xid(0)
    }

    fn mock_root_geometry(&self) -> Result<Rect> {
        Err(Error::UnimplementedMock)
    }

    fn mock_supporting_check_window(&self) -> Xid {
        Xid(u32::MAX)
    }

    fn mock_become_window_manager(&self) -> Result<()> {
        Ok(())
    }

    fn mock_next_event(&self) -> Result<XEvent> {
        Err(Error::UnimplementedMock)
    }

    fn mock_flush(&self) {}

    fn mock_sync(&self) -> Result<()> {
        Ok(())
    }

    fn mock_intern_atom(&self, atom: &str) -> Result<Xid> {
        Err(Error::UnimplementedMock)
    }

    fn mock_atom_name(&self, xid: Xid) -> Result<String> {
        Err(Error::UnimplementedMock)
    }

    fn mock_existing_clients(&self) -> Result<Vec<Xid>> {
        Err(Error::UnimplementedMock)
    }

    fn mock_get_window_attributes(&self, client: Xid) -> Result<WindowAttributes> {
        Err(Error::UnimplementedMock)
    }

    fn mock_get_prop(&self, client: Xid, prop_name: &str) -> Result<Option<Prop>> {
        Err(Error::UnimplementedMock)
    }

    fn mock_set_prop(&self, client: Xid, name: &str, val: Prop) -> Result<()> {
        Err(Error::UnimplementedMock)
    }

    fn mock_get_wm_state(&self, client: Xid) -> Result<Option<WmState>> {
        Err(Error::UnimplementedMock)
    }

    fn mock_set_wm_state(&self, client: Xid, wm_state: WmState) -> Result<()> {
        Err(Error::UnimplementedMock)
    }

    fn mock_map(&self, client: Xid) -> Result<()> {
        Err(Error::UnimplementedMock)
    }

    fn mock_unmap(&self, client: Xid) -> Result<()> {
        Err(Error::UnimplementedMock)
    }

    fn mock_set_client_attributes(&self, client: Xid, attrs: &[ClientAttr]) -> Result<()> {
        Err(Error::UnimplementedMock)
    }

    fn mock_set_client_config(&self, client: Xid, data: &[ClientConfig]) -> Result<()> {
        Err(Error::UnimplementedMock)
    }

    fn mock_focus(&self, client: Xid) -> Result<()> {
        Err(Error::UnimplementedMock)
    }

    fn mock_send_client_message(&self, msg: ClientMessage) -> Result<()> {
        Err(Error::UnimplementedMock)
    }

    fn mock_grab_keys(&self, key_codes: &[KeyCode]) -> Result<()> {
        Err(Error::UnimplementedMock)
    }

    fn mock_ungrab_keys(&self) -> Result<()> {
        Err(Error::UnimplementedMock)
    }

    fn mock_keyboard_mapping(&self) -> Result<KeyboardMapping> {
        Err(Error::UnimplementedMock)
    }

    fn mock_modifier_mapping(&self) -> Result<ModifierMapping> {
        Err(Error::UnimplementedMock)
    }
}

impl<T> XConn for T
where
    T: MockXConn,
{
    fn root(&self) -> Xid {
        self.mock_root()
    }

    fn root_geometry(&self) -> Result<Rect> {
        self.mock_root_geometry()
    }

    fn supporting_check_window(&self) -> Xid {
        self.mock_supporting_check_window()
    }

    fn become_window_manager(&self) -> Result<()> {
        self.mock_become_window_manager()
    }

    fn next_event(&self) -> Result<XEvent> {
        self.mock_next_event()
    }

    fn flush(&self) {
        self.mock_flush()
    }

    fn sync(&self) -> Result<()> {
        self.mock_sync()
    }

    fn intern_atom(&self, atom: &str) -> Result<Xid> {
        self.mock_intern_atom(atom)
    }

    fn atom_name(&self, xid: Xid) -> Result<String> {
        self.mock_atom_name(xid)
    }

    fn existing_clients(&self) -> Result<Vec<Xid>> {
        self.mock_existing_clients()
    }

    fn get_window_attributes(&self, client: Xid) -> Result<WindowAttributes> {
        self.mock_get_window_attributes(client)
    }

    fn get_prop(&self, client: Xid, prop_name: &str) -> Result<Option<Prop>> {
        self.mock_get_prop(client, prop_name)
    }

    fn set_prop(&self, client: Xid, name: &str, val: Prop) -> Result<()> {
        self.mock_set_prop(client, name, val)
    }

    fn get_wm_state(&self, client: Xid) -> Result<Option<WmState>> {
        self.mock_get_wm_state(client)
    }

    fn set_wm_state(&self, client: Xid, wm_state: WmState) -> Result<()> {
        self.mock_set_wm_state(client, wm_state)
    }

    fn map(&self, client: Xid) -> Result<()> {
        self.mock_map(client)
    }

    fn unmap(&self, client: Xid) -> Result<()> {
        self.mock_unmap(client)
    }

    fn set_client_attributes(&self, client: Xid, attrs: &[ClientAttr]) -> Result<()> {
        self.mock_set_client_attributes(client, attrs)
    }

    fn set_client_config(&self, client: Xid, data: &[ClientConfig]) -> Result<()> {
        self.mock_set_client_config(client, data)
    }

    fn focus(&self, client: Xid) -> Result<()> {
        self.mock_focus(client)
    }

    fn send_client_message(&self, msg: ClientMessage) -> Result<()> {
        self.mock_send_client_message(msg)
    }

    fn grab_keys(&self, key_codes: &[KeyCode]) -> Result<()> {
        self.mock_grab_keys(key_codes)
    }

    fn ungrab_keys(&self) -> Result<()> {
        self.mock_ungrab_keys()
    }

    fn keyboard_mapping(&self) -> Result<KeyboardMapping> {
        self.mock_keyboard_mapping()
    }

    fn modifier_mapping(&self) -> Result<ModifierMapping> {
        self.mock_modifier_mapping()
    }
}

/// A single X side effect recorded by [RecordingXConn].
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Map(Xid),
    Unmap(Xid),
    Focus(Xid),
    Position(Xid, Rect),
    SetWmState(Xid, WmState),
    SetProp(Xid, String, Prop),
    Message(Xid, String),
    GrabKeys(usize),
    UngrabKeys,
}

/// An in memory [XConn] that serves canned window state and records every
/// side effecting request made against it.
#[derive(Debug, Default)]
pub struct RecordingXConn {
    pub attrs: RefCell<HashMap<Xid, WindowAttributes>>,
    pub props: RefCell<HashMap<(Xid, String), Prop>>,
    pub wm_states: RefCell<HashMap<Xid, WmState>>,
    pub tree: RefCell<Vec<Xid>>,
    pub ops: RefCell<Vec<Op>>,
}

pub const ROOT_GEOMETRY: Rect = Rect::new(0, 0, 2000, 1000);

impl RecordingXConn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a window with the given attributes and properties.
    pub fn add_window<'a>(
        &self,
        id: Xid,
        attrs: WindowAttributes,
        props: impl IntoIterator<Item = (&'a str, Prop)>,
    ) {
        self.attrs.borrow_mut().insert(id, attrs);
        for (name, prop) in props {
            self.props
                .borrow_mut()
                .insert((id, name.to_string()), prop);
        }
        self.tree.borrow_mut().push(id);
    }

    /// The side effects recorded so far, clearing the log.
    pub fn take_ops(&self) -> Vec<Op> {
        self.ops.borrow_mut().drain(..).collect()
    }

    /// A root property as most recently written by the code under test.
    pub fn root_prop(&self, name: &str) -> Option<Prop> {
        self.props
            .borrow()
            .get(&(self.mock_root(), name.to_string()))
            .cloned()
    }

    fn record(&self, op: Op) {
        self.ops.borrow_mut().push(op);
    }
}

impl MockXConn for RecordingXConn {
    fn mock_root_geometry(&self) -> Result<Rect> {
        Ok(ROOT_GEOMETRY)
    }

    fn mock_intern_atom(&self, atom: &str) -> Result<Xid> {
        // a deterministic fake value derived from the name
        let sum: u32 = atom.bytes().map(|b| b as u32).sum();
        Ok(Xid(0x1000 + sum))
    }

    fn mock_existing_clients(&self) -> Result<Vec<Xid>> {
        Ok(self.tree.borrow().clone())
    }

    fn mock_get_window_attributes(&self, client: Xid) -> Result<WindowAttributes> {
        self.attrs
            .borrow()
            .get(&client)
            .copied()
            .ok_or(Error::UnknownClient(client))
    }

    fn mock_get_prop(&self, client: Xid, prop_name: &str) -> Result<Option<Prop>> {
        Ok(self
            .props
            .borrow()
            .get(&(client, prop_name.to_string()))
            .cloned())
    }

    fn mock_set_prop(&self, client: Xid, name: &str, val: Prop) -> Result<()> {
        self.record(Op::SetProp(client, name.to_string(), val.clone()));
        self.props
            .borrow_mut()
            .insert((client, name.to_string()), val);

        Ok(())
    }

    fn mock_get_wm_state(&self, client: Xid) -> Result<Option<WmState>> {
        Ok(self.wm_states.borrow().get(&client).copied())
    }

    fn mock_set_wm_state(&self, client: Xid, wm_state: WmState) -> Result<()> {
        self.record(Op::SetWmState(client, wm_state));
        self.wm_states.borrow_mut().insert(client, wm_state);

        Ok(())
    }

    fn mock_map(&self, client: Xid) -> Result<()> {
        self.record(Op::Map(client));
        Ok(())
    }

    fn mock_unmap(&self, client: Xid) -> Result<()> {
        self.record(Op::Unmap(client));
        Ok(())
    }

    fn mock_set_client_attributes(&self, _client: Xid, _attrs: &[ClientAttr]) -> Result<()> {
        Ok(())
    }

    fn mock_set_client_config(&self, client: Xid, data: &[ClientConfig]) -> Result<()> {
        for d in data {
            if let ClientConfig::Position(r) = d {
                self.record(Op::Position(client, *r));
            }
        }

        Ok(())
    }

    fn mock_focus(&self, client: Xid) -> Result<()> {
        self.record(Op::Focus(client));
        Ok(())
    }

    fn mock_send_client_message(&self, msg: ClientMessage) -> Result<()> {
        self.record(Op::Message(msg.id, msg.dtype));
        Ok(())
    }

    fn mock_grab_keys(&self, key_codes: &[KeyCode]) -> Result<()> {
        self.record(Op::GrabKeys(key_codes.len()));
        Ok(())
    }

    fn mock_ungrab_keys(&self) -> Result<()> {
        self.record(Op::UngrabKeys);
        Ok(())
    }

    fn mock_keyboard_mapping(&self) -> Result<KeyboardMapping> {
        Ok(KeyboardMapping::default())
    }

    fn mock_modifier_mapping(&self) -> Result<ModifierMapping> {
        Ok(ModifierMapping::default())
    }
}
