//! Side effect free state: the window records, the desktops and the sizing
//! policies. Everything in this module can be driven and tested without an
//! X server.
pub mod client;
pub mod desktop;
pub mod geometry;
pub mod sizer;

pub use client::{Client, ClientStore};
pub use desktop::{Desktop, DesktopSet};
pub use geometry::{Point, Rect};
pub use sizer::Sizer;
