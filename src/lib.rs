//! footwm: a minimalist X11 window manager built around virtual desktops.
//!
//! Windows are grouped into named desktops, each desktop keeps its windows in
//! a most-recently-used stack and only the top of the current desktop's stack
//! is visible: sized to fill the root window, mapped and focused. There is no
//! chrome at all (no titlebars, no borders, no mouse gestures); everything is
//! driven by the keyboard and by a small string-vector command protocol
//! carried on a root window property.
//!
//! The crate is split the same way the state is:
//!   - [pure]: the side effect free model (clients, desktops, sizing policy)
//!   - [x]: the [XConn][x::XConn] abstraction over the X server and the
//!     desktop engine operations built on top of it
//!   - [core]: the window manager event loop, event handlers, key bindings
//!     and the `FOOT_COMMANDV` command protocol
//!   - [x11rb]: the concrete [XConn][x::XConn] implementation
#![warn(
    clippy::complexity,
    clippy::correctness,
    clippy::style,
    future_incompatible,
    missing_debug_implementations,
    rust_2018_idioms
)]

pub mod core;
pub mod pure;
pub mod x;
pub mod x11rb;

pub use crate::core::Xid;

/// A Result where the error type is a footwm [Error]
pub type Result<T> = std::result::Result<T, Error>;

/// Error variants from the core crate and the X backend.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Another window manager already holds SubstructureRedirect on the root
    /// window. Only one window manager can run per display.
    #[error("another window manager is already running")]
    AnotherWmRunning,

    /// Unable to establish a connection to the X server
    #[error(transparent)]
    Connect(#[from] ::x11rb::errors::ConnectError),

    /// The X11 connection broke
    #[error(transparent)]
    Connection(#[from] ::x11rb::errors::ConnectionError),

    /// Data received in a client message had an invalid format
    #[error("invalid client message data: format = {format}")]
    InvalidClientMessage {
        /// The format received
        format: u8,
    },

    /// A FOOT_COMMANDV property write could not be parsed
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// A property contained data that could not be interpreted as its
    /// advertised type
    #[error("invalid property data: {0}")]
    InvalidPropertyData(String),

    /// Desktop names must be unique within the desktop list
    #[error("desktop name already in use: {name}")]
    NonUniqueName {
        /// The offending name
        name: String,
    },

    /// Could not get X11 request reply
    #[error(transparent)]
    Reply(#[from] ::x11rb::errors::ReplyError),

    /// Could not get X11 request reply or generate a new resource id
    #[error(transparent)]
    ReplyOrId(#[from] ::x11rb::errors::ReplyOrIdError),

    /// The unassigned desktop must always exist so it can never be deleted
    #[error("the '{name}' desktop cannot be deleted")]
    UndeletableDesktop {
        /// Name of the protected desktop
        name: String,
    },

    /// A mock method was called that has no implementation provided
    #[error("mock method not implemented")]
    UnimplementedMock,

    /// A window id that is not in the client store
    #[error("client {0} is not known")]
    UnknownClient(Xid),

    /// A desktop index that is out of range
    #[error("no desktop at index {index}")]
    UnknownDesktop {
        /// The requested index
        index: usize,
    },

    /// An attempt to use a key name that is not part of the keysym table
    #[error("'{0}' is not a known key name")]
    UnknownKeyName(String),
}
