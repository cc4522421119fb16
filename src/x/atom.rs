//! Atoms used by the window manager and its clients
use strum::{AsRefStr, Display, EnumIter, EnumString};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A footwm internal representation of the X atoms we interact with.
///
/// Atom names are shared between all X11 API libraries so this enum gives us
/// a little bit of type safety around their use. Implementors of
/// [XConn][crate::x::XConn] should accept any variant of [Atom] that they are
/// passed by client code and intern anything else on demand.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(AsRefStr, EnumString, EnumIter, Display, Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Atom {
    /// ATOM
    #[strum(serialize = "ATOM")]
    Atom,
    /// CARDINAL
    #[strum(serialize = "CARDINAL")]
    Cardinal,
    /// FOOT_COMMANDV: the string-vector command protocol carried on the root
    /// window (so named because, like argv, it is a vector of strings)
    #[strum(serialize = "FOOT_COMMANDV")]
    FootCommandV,
    /// STRING (latin-1 text)
    #[strum(serialize = "STRING")]
    String,
    /// UTF8_STRING
    #[strum(serialize = "UTF8_STRING")]
    UTF8String,
    /// WINDOW
    #[strum(serialize = "WINDOW")]
    Window,
    /// WM_CLASS
    #[strum(serialize = "WM_CLASS")]
    WmClass,
    /// WM_DELETE_WINDOW
    #[strum(serialize = "WM_DELETE_WINDOW")]
    WmDeleteWindow,
    /// WM_HINTS
    #[strum(serialize = "WM_HINTS")]
    WmHints,
    /// WM_NAME
    #[strum(serialize = "WM_NAME")]
    WmName,
    /// WM_NORMAL_HINTS
    #[strum(serialize = "WM_NORMAL_HINTS")]
    WmNormalHints,
    /// WM_PROTOCOLS
    #[strum(serialize = "WM_PROTOCOLS")]
    WmProtocols,
    /// WM_STATE
    #[strum(serialize = "WM_STATE")]
    WmState,
    /// WM_TAKE_FOCUS
    #[strum(serialize = "WM_TAKE_FOCUS")]
    WmTakeFocus,
    /// WM_TRANSIENT_FOR
    #[strum(serialize = "WM_TRANSIENT_FOR")]
    WmTransientFor,
    /// _NET_ACTIVE_WINDOW
    #[strum(serialize = "_NET_ACTIVE_WINDOW")]
    NetActiveWindow,
    /// _NET_CLIENT_LIST
    #[strum(serialize = "_NET_CLIENT_LIST")]
    NetClientList,
    /// _NET_CLIENT_LIST_STACKING
    #[strum(serialize = "_NET_CLIENT_LIST_STACKING")]
    NetClientListStacking,
    /// _NET_CLOSE_WINDOW
    #[strum(serialize = "_NET_CLOSE_WINDOW")]
    NetCloseWindow,
    /// _NET_CURRENT_DESKTOP
    #[strum(serialize = "_NET_CURRENT_DESKTOP")]
    NetCurrentDesktop,
    /// _NET_DESKTOP_NAMES
    #[strum(serialize = "_NET_DESKTOP_NAMES")]
    NetDesktopNames,
    /// _NET_NUMBER_OF_DESKTOPS
    #[strum(serialize = "_NET_NUMBER_OF_DESKTOPS")]
    NetNumberOfDesktops,
    /// _NET_SUPPORTED
    #[strum(serialize = "_NET_SUPPORTED")]
    NetSupported,
    /// _NET_SUPPORTING_WM_CHECK
    #[strum(serialize = "_NET_SUPPORTING_WM_CHECK")]
    NetSupportingWmCheck,
    /// _NET_WM_DESKTOP
    #[strum(serialize = "_NET_WM_DESKTOP")]
    NetWmDesktop,
    /// _NET_WM_FULL_PLACEMENT
    #[strum(serialize = "_NET_WM_FULL_PLACEMENT")]
    NetWmFullPlacement,
    /// _NET_WM_NAME
    #[strum(serialize = "_NET_WM_NAME")]
    NetWmName,
}

/// The subset of EWMH that footwm implements, advertised via _NET_SUPPORTED.
///
/// Desktop creation / deletion / renaming has no EWMH verbs which is why the
/// FOOT_COMMANDV protocol exists alongside this list.
pub const EWMH_SUPPORTED_ATOMS: &[Atom] = &[
    Atom::NetActiveWindow,
    Atom::NetClientList,
    Atom::NetClientListStacking,
    Atom::NetCloseWindow,
    Atom::NetCurrentDesktop,
    Atom::NetDesktopNames,
    Atom::NetNumberOfDesktops,
    Atom::NetSupportingWmCheck,
    Atom::NetWmDesktop,
    Atom::NetWmFullPlacement,
    Atom::NetWmName,
];

/// The name the window manager publishes on the supporting WM check window.
pub const WM_NAME: &str = "footwm";

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn atom_names_round_trip() {
        for atom in Atom::iter() {
            assert_eq!(Atom::from_str(atom.as_ref()), Ok(atom));
        }
    }

    #[test]
    fn supported_atoms_are_net_atoms() {
        for atom in EWMH_SUPPORTED_ATOMS {
            assert!(atom.as_ref().starts_with("_NET_"));
        }
    }
}
