//! Data types for working with X events
use crate::{
    core::bindings::KeyCode,
    pure::geometry::Rect,
    x::{Atom, XConn},
    Error, Result, Xid,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Wrapper around the low level X event types that the window manager acts
/// on.
///
/// Backends filter the raw X event stream down to these variants: structure
/// notifications are only reported for the window itself (not the duplicate
/// substructure events the root window selection generates) which mirrors
/// the `event == window` check described in the XUnmapEvent man page.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum XEvent {
    /// A message has been sent to a particular client
    ClientMessage(ClientMessage),
    /// A client's position, size or stacking order has changed
    ConfigureNotify(ConfigureEvent),
    /// A client is requesting to be repositioned
    ConfigureRequest(ConfigureRequest),
    /// A new window has been created
    Create {
        /// The ID of the newly created window
        id: Xid,
        /// Whether the window has asked never to be managed
        override_redirect: bool,
    },
    /// A client window has been destroyed
    Destroy(Xid),
    /// The mouse pointer has entered a client window
    Enter(Xid),
    /// A client has gained input focus
    FocusIn(Xid),
    /// A client has lost input focus
    FocusOut(Xid),
    /// A grabbed key combination has been entered by the user
    KeyPress(KeyCode),
    /// The keyboard or modifier mapping has changed
    MappingNotify,
    /// The server has mapped a window
    MapNotify(Xid),
    /// A client window is requesting to be positioned and rendered on the screen
    MapRequest(Xid),
    /// A client property has changed in some way
    PropertyNotify(PropertyEvent),
    /// A client is being unmapped
    UnmapNotify(UnmapEvent),
}

impl std::fmt::Display for XEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use XEvent::*;

        match self {
            ClientMessage(_) => write!(f, "ClientMessage"),
            ConfigureNotify(_) => write!(f, "ConfigureNotify"),
            ConfigureRequest(_) => write!(f, "ConfigureRequest"),
            Create { .. } => write!(f, "Create"),
            Destroy(_) => write!(f, "Destroy"),
            Enter(_) => write!(f, "Enter"),
            FocusIn(_) => write!(f, "FocusIn"),
            FocusOut(_) => write!(f, "FocusOut"),
            KeyPress(_) => write!(f, "KeyPress"),
            MappingNotify => write!(f, "MappingNotify"),
            MapNotify(_) => write!(f, "MapNotify"),
            MapRequest(_) => write!(f, "MapRequest"),
            PropertyNotify(_) => write!(f, "PropertyNotify"),
            UnmapNotify(_) => write!(f, "UnmapNotify"),
        }
    }
}

/// Known client message formats that the window manager sends itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClientMessageKind {
    /// Ask a client to close itself (WM_DELETE_WINDOW)
    DeleteWindow(Xid),
    /// Offer a client input focus (WM_TAKE_FOCUS, "locally active" clients)
    TakeFocus(Xid),
}

impl ClientMessageKind {
    /// Build a [ClientMessage] in the WM_PROTOCOLS format described by
    /// ICCCM 4.2.8: `data.l[0]` carries the protocol atom, `data.l[1]` the
    /// timestamp.
    pub fn as_message<X>(&self, x: &X) -> Result<ClientMessage>
    where
        X: XConn,
    {
        let proto_msg = |id: Xid, atom: Atom| {
            let proto = Atom::WmProtocols.as_ref();
            let data = &[*x.intern_atom(atom.as_ref())?, 0, 0, 0, 0];

            Ok(ClientMessage::new(
                id,
                ClientEventMask::NoEventMask,
                proto,
                data.into(),
            ))
        };

        match self {
            ClientMessageKind::DeleteWindow(id) => proto_msg(*id, Atom::WmDeleteWindow),
            ClientMessageKind::TakeFocus(id) => proto_msg(*id, Atom::WmTakeFocus),
        }
    }
}

/// Event masks used when sending client events.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClientEventMask {
    /// No Mask: the event is delivered to the named window itself
    NoEventMask,
    /// SubstructureNotify | SubstructureRedirect: the EWMH convention for
    /// messages addressed to the window manager via the root window
    SubstructureNotifyRedirect,
}

/// The raw data contained in a [ClientMessage].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientMessageData {
    /// Slice of u8
    U8([u8; 20]),
    /// Slice of u16
    U16([u16; 10]),
    /// Slice of u32
    U32([u32; 5]),
}

impl ClientMessageData {
    /// Convert this client message data into u32s, the format used for all
    /// of the messages footwm consumes.
    pub fn as_u32(&self) -> [u32; 5] {
        match self {
            Self::U32(data) => *data,
            Self::U16(data) => {
                let mut out = [0; 5];
                for (i, chunk) in data.chunks(2).enumerate() {
                    out[i] = ((chunk[1] as u32) << 16) | chunk[0] as u32;
                }
                out
            }
            Self::U8(data) => {
                let mut out = [0; 5];
                for (i, chunk) in data.chunks(4).enumerate() {
                    out[i] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                }
                out
            }
        }
    }
}

impl From<[u32; 5]> for ClientMessageData {
    fn from(data: [u32; 5]) -> Self {
        Self::U32(data)
    }
}

impl From<&[u32; 5]> for ClientMessageData {
    fn from(data: &[u32; 5]) -> Self {
        Self::U32(*data)
    }
}

impl From<[u16; 10]> for ClientMessageData {
    fn from(data: [u16; 10]) -> Self {
        Self::U16(data)
    }
}

impl From<[u8; 20]> for ClientMessageData {
    fn from(data: [u8; 20]) -> Self {
        Self::U8(data)
    }
}

impl TryFrom<(u8, [u8; 20])> for ClientMessageData {
    type Error = Error;

    fn try_from((format, raw): (u8, [u8; 20])) -> Result<Self> {
        match format {
            8 => Ok(Self::U8(raw)),
            16 => {
                let mut data = [0u16; 10];
                for (i, chunk) in raw.chunks(2).enumerate() {
                    data[i] = u16::from_le_bytes([chunk[0], chunk[1]]);
                }
                Ok(Self::U16(data))
            }
            32 => {
                let mut data = [0u32; 5];
                for (i, chunk) in raw.chunks(4).enumerate() {
                    data[i] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                }
                Ok(Self::U32(data))
            }
            format => Err(Error::InvalidClientMessage { format }),
        }
    }
}

/// A client message that needs to be parsed and handled based on its type.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientMessage {
    /// The window named in the message (for EWMH root messages this is the
    /// target window, not the root)
    pub id: Xid,
    /// The mask to use when sending the event
    pub mask: ClientEventMask,
    /// The message type being sent
    pub dtype: String,
    /// The raw data being sent in this message
    pub data: ClientMessageData,
}

impl ClientMessage {
    /// Build a new ClientMessage for sending or dispatch.
    pub fn new(
        id: Xid,
        mask: ClientEventMask,
        dtype: impl Into<String>,
        data: ClientMessageData,
    ) -> Self {
        Self {
            id,
            mask,
            dtype: dtype.into(),
            data,
        }
    }
}

/// A notification that a window's geometry has changed.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigureEvent {
    /// The ID of the window that changed
    pub id: Xid,
    /// The new window size and position
    pub r: Rect,
    /// Is this window the root window?
    pub is_root: bool,
}

/// A client request to be moved and / or resized.
///
/// Only the fields named in the request's value mask are populated.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigureRequest {
    /// The ID of the window requesting the change
    pub id: Xid,
    /// Requested x coordinate
    pub x: Option<i32>,
    /// Requested y coordinate
    pub y: Option<i32>,
    /// Requested width
    pub w: Option<u32>,
    /// Requested height
    pub h: Option<u32>,
}

/// A property change on a known client.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyEvent {
    /// The ID of the window that had a property changed
    pub id: Xid,
    /// The name of the property that changed
    pub atom: String,
    /// Is this window the root window?
    pub is_root: bool,
}

/// A window being unmapped, either by the server or by the client itself.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnmapEvent {
    /// The ID of the window being unmapped
    pub id: Xid,
    /// True when the event was sent by the client (XWithdrawWindow style
    /// synthetic events) rather than generated by the server
    pub synthetic: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test]
    fn u32_data_passes_through() {
        let data = ClientMessageData::from([1, 2, 3, 4, 5]);

        assert_eq!(data.as_u32(), [1, 2, 3, 4, 5]);
    }

    #[test_case(8; "format 8")]
    #[test_case(16; "format 16")]
    #[test_case(32; "format 32")]
    #[test]
    fn valid_formats_are_accepted(format: u8) {
        assert!(ClientMessageData::try_from((format, [0u8; 20])).is_ok());
    }

    #[test]
    fn invalid_formats_are_rejected() {
        assert!(matches!(
            ClientMessageData::try_from((17, [0u8; 20])),
            Err(Error::InvalidClientMessage { format: 17 })
        ));
    }
}
