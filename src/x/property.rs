//! Data types for working with X window properties
use crate::{pure::geometry::{Point, Rect}, Error, Result, Xid};
use bitflags::bitflags;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Know property types for window properties.
///
/// The data carried here is the decoded, typed form of what the X server
/// hands back: the raw format-8/16/32 payloads are converted by the active
/// [XConn][crate::x::XConn] implementation.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prop {
    /// A list of interned atoms, resolved to their string names
    Atom(Vec<String>),
    /// Raw bytes for when the prop type is unknown
    Bytes(Vec<u8>),
    /// A list of cardinal numbers
    Cardinal(Vec<u32>),
    /// A list of latin-1 encoded strings (ICCCM XA_STRING text)
    Latin1String(Vec<String>),
    /// A list of UTF-8 encoded strings (UTF8_STRING text)
    UTF8String(Vec<String>),
    /// A list of window ids
    Window(Vec<Xid>),
    /// An ICCCM WM_HINTS property
    WmHints(WmHints),
    /// An ICCCM WM_NORMAL_HINTS property
    WmNormalHints(WmNormalHints),
}

/// The encoding in use for an X text property.
///
/// Per ICCCM 2.7.1 the target atom decides the encoding: `XA_STRING` is
/// latin-1 and `UTF8_STRING` is utf-8. String lists are NUL separated in
/// both encodings.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    /// XA_STRING: one byte per character, latin-1 code points
    Latin1,
    /// UTF8_STRING
    Utf8,
}

/// Encode a list of strings as a NUL separated text property payload.
///
/// Characters outside of latin-1 are replaced with '?' when encoding for
/// `XA_STRING`: the round-trip guarantee only holds for strings that are
/// representable in the target encoding.
pub fn encode_text_list<S: AsRef<str>>(strs: &[S], encoding: TextEncoding) -> Vec<u8> {
    let encode = |s: &str| -> Vec<u8> {
        match encoding {
            TextEncoding::Utf8 => s.bytes().collect(),
            TextEncoding::Latin1 => s
                .chars()
                .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
                .collect(),
        }
    };

    let mut encoded: Vec<Vec<u8>> = strs.iter().map(|s| encode(s.as_ref())).collect();

    match encoded.len() {
        0 => vec![],
        1 => encoded.remove(0),
        _ => encoded.join(&0u8),
    }
}

/// Decode a NUL separated text property payload into a list of strings.
///
/// A single trailing NUL is treated as a terminator rather than an empty
/// final element. Invalid utf-8 decodes lossily.
pub fn decode_text_list(bytes: &[u8], encoding: TextEncoding) -> Vec<String> {
    let bytes = match bytes.split_last() {
        Some((0, rest)) => rest,
        _ => bytes,
    };

    if bytes.is_empty() {
        return vec![];
    }

    bytes
        .split(|&b| b == 0)
        .map(|chunk| match encoding {
            TextEncoding::Utf8 => String::from_utf8_lossy(chunk).to_string(),
            TextEncoding::Latin1 => chunk.iter().map(|&b| b as char).collect(),
        })
        .collect()
}

/// An ICCCM 4.1.3.1 client life-cycle state, held both in the window model
/// and in the WM_STATE property of managed windows.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WmState {
    /// The window is not visible to the user in any form
    Withdrawn,
    /// The window is viewable
    Normal,
    /// The window is iconified
    Iconic,
}

impl From<WmState> for u32 {
    fn from(s: WmState) -> u32 {
        match s {
            WmState::Withdrawn => 0,
            WmState::Normal => 1,
            WmState::Iconic => 3,
        }
    }
}

impl TryFrom<u32> for WmState {
    type Error = Error;

    fn try_from(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(Self::Withdrawn),
            1 => Ok(Self::Normal),
            3 => Ok(Self::Iconic),
            n => Err(Error::InvalidPropertyData(format!(
                "{n} is not a valid WM_STATE"
            ))),
        }
    }
}

/// The current map state of a client window as reported by the server.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapState {
    /// The window is unmapped
    Unmapped,
    /// The window is mapped but an ancestor is unmapped
    Unviewable,
    /// The window is mapped and viewable
    Viewable,
}

/// The subset of XWindowAttributes that the window manager acts on.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAttributes {
    /// Whether the window has asked never to be managed
    pub override_redirect: bool,
    /// The server side map state of the window
    pub map_state: MapState,
    /// The current geometry of the window
    pub geometry: Rect,
}

bitflags! {
    /// Which WM_NORMAL_HINTS fields were supplied by the client.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SizeHintFlags: u32 {
        /// User specified x, y
        const US_POSITION = 1 << 0;
        /// User specified width, height
        const US_SIZE     = 1 << 1;
        /// Program specified position
        const P_POSITION  = 1 << 2;
        /// Program specified size
        const P_SIZE      = 1 << 3;
        /// Program specified minimum size
        const P_MIN_SIZE  = 1 << 4;
        /// Program specified maximum size
        const P_MAX_SIZE  = 1 << 5;
        /// Program specified resize increments
        const P_RESIZE_INC = 1 << 6;
        /// Program specified min and max aspect ratios
        const P_ASPECT    = 1 << 7;
        /// Program specified base size
        const P_BASE_SIZE = 1 << 8;
        /// Program specified window gravity
        const P_WIN_GRAVITY = 1 << 9;
    }
}

// serde derives can not see through the struct that bitflags generates, so
// the flags serialize as their raw bits
#[cfg(feature = "serde")]
impl Serialize for SizeHintFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for SizeHintFlags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        u32::deserialize(deserializer).map(Self::from_bits_truncate)
    }
}

/// A parsed ICCCM WM_NORMAL_HINTS property.
///
/// The resize-increment, aspect and win-gravity fields are recognized and
/// retained but not enforced by any of the sizing policies.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WmNormalHints {
    /// Which fields below were actually set by the client
    pub flags: SizeHintFlags,
    /// User / program specified position
    pub position: Option<Point>,
    /// Minimum (width, height)
    pub min: Option<(u32, u32)>,
    /// Maximum (width, height)
    pub max: Option<(u32, u32)>,
    /// Resize (width, height) increments
    pub inc: Option<(u32, u32)>,
    /// Base (width, height)
    pub base: Option<(u32, u32)>,
    /// Window gravity
    pub win_gravity: Option<u32>,
}

impl WmNormalHints {
    /// Parse the raw 32bit values of a WM_NORMAL_HINTS property.
    ///
    /// The wire layout is: flags, x, y, width, height (both deprecated),
    /// min w/h, max w/h, w/h inc, min aspect num/den, max aspect num/den,
    /// base w/h, win gravity. Truncated payloads from older clients are
    /// padded with zeros.
    pub fn from_cardinals(raw: &[u32]) -> Self {
        let mut vals = [0u32; 18];
        for (v, r) in vals.iter_mut().zip(raw.iter()) {
            *v = *r;
        }

        let flags = SizeHintFlags::from_bits_truncate(vals[0]);
        let pair = |flag: SizeHintFlags, w: u32, h: u32| flags.contains(flag).then_some((w, h));

        Self {
            flags,
            position: flags
                .intersects(SizeHintFlags::US_POSITION | SizeHintFlags::P_POSITION)
                .then_some(Point::new(vals[1], vals[2])),
            min: pair(SizeHintFlags::P_MIN_SIZE, vals[5], vals[6]),
            max: pair(SizeHintFlags::P_MAX_SIZE, vals[7], vals[8]),
            inc: pair(SizeHintFlags::P_RESIZE_INC, vals[9], vals[10]),
            base: pair(SizeHintFlags::P_BASE_SIZE, vals[15], vals[16]),
            win_gravity: flags
                .contains(SizeHintFlags::P_WIN_GRAVITY)
                .then_some(vals[17]),
        }
    }

    /// The (width, height) this client is pinned to, if its minimum and
    /// maximum sizes are both set and equal.
    pub fn fixed_size(&self) -> Option<(u32, u32)> {
        match (self.min, self.max) {
            (Some(min), Some(max)) if min == max && min.0 > 0 && min.1 > 0 => Some(min),
            _ => None,
        }
    }

    /// Whether the client asked for a specific size of its own.
    pub fn requests_own_size(&self) -> bool {
        self.flags
            .intersects(SizeHintFlags::P_SIZE | SizeHintFlags::US_SIZE)
    }
}

/// The parts of ICCCM WM_HINTS that drive the focus model.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WmHints {
    /// Does this client want the window manager to assign it input focus?
    /// (ICCCM 4.1.7 input field; defaults to true when the flag is unset)
    pub accepts_input: bool,
}

impl Default for WmHints {
    fn default() -> Self {
        Self {
            accepts_input: true,
        }
    }
}

impl WmHints {
    const INPUT_HINT: u32 = 1 << 0;

    /// Parse the raw 32bit values of a WM_HINTS property.
    pub fn from_cardinals(raw: &[u32]) -> Self {
        match (raw.first(), raw.get(1)) {
            (Some(&flags), Some(&input)) if flags & Self::INPUT_HINT != 0 => Self {
                accepts_input: input != 0,
            },
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case(vec!["one".into(), "two".into()]; "two strings")]
    #[test_case(vec!["desktop".into()]; "single string")]
    #[test_case(vec![]; "empty list")]
    #[test_case(vec!["caf\u{e9}".into(), "na\u{ef}ve".into()]; "latin-1 accents")]
    #[test]
    fn latin1_text_lists_round_trip(strs: Vec<String>) {
        let encoded = encode_text_list(&strs, TextEncoding::Latin1);

        assert_eq!(decode_text_list(&encoded, TextEncoding::Latin1), strs);
    }

    #[test_case(vec!["one".into(), "two".into()]; "two strings")]
    #[test_case(vec!["\u{65e5}\u{672c}".into()]; "multi-byte")]
    #[test_case(vec!["a".into(), "".into(), "b".into()]; "embedded empty element")]
    #[test]
    fn utf8_text_lists_round_trip(strs: Vec<String>) {
        let encoded = encode_text_list(&strs, TextEncoding::Utf8);

        assert_eq!(decode_text_list(&encoded, TextEncoding::Utf8), strs);
    }

    #[test]
    fn trailing_nul_is_a_terminator() {
        assert_eq!(
            decode_text_list(b"work\0play\0", TextEncoding::Utf8),
            vec!["work".to_string(), "play".to_string()]
        );
    }

    #[test]
    fn non_latin1_chars_are_replaced() {
        let encoded = encode_text_list(&["\u{65e5}x"], TextEncoding::Latin1);

        assert_eq!(encoded, vec![b'?', b'x']);
    }

    #[test]
    fn wm_state_round_trips() {
        for state in [WmState::Withdrawn, WmState::Normal, WmState::Iconic] {
            assert_eq!(WmState::try_from(u32::from(state)).unwrap(), state);
        }
    }

    #[test]
    fn wm_state_rejects_unknown_values() {
        assert!(WmState::try_from(2).is_err());
    }

    #[test]
    fn normal_hints_fixed_size() {
        let mut raw = [0u32; 18];
        raw[0] = (SizeHintFlags::P_MIN_SIZE | SizeHintFlags::P_MAX_SIZE).bits();
        raw[5] = 640;
        raw[6] = 480;
        raw[7] = 640;
        raw[8] = 480;

        let hints = WmNormalHints::from_cardinals(&raw);

        assert_eq!(hints.fixed_size(), Some((640, 480)));
        assert!(!hints.requests_own_size());
    }

    #[test]
    fn normal_hints_min_ne_max_is_not_fixed() {
        let mut raw = [0u32; 18];
        raw[0] = (SizeHintFlags::P_MIN_SIZE | SizeHintFlags::P_MAX_SIZE).bits();
        raw[5] = 100;
        raw[6] = 100;
        raw[7] = 1000;
        raw[8] = 1000;

        assert_eq!(WmNormalHints::from_cardinals(&raw).fixed_size(), None);
    }

    #[test_case(SizeHintFlags::P_SIZE, true; "program size")]
    #[test_case(SizeHintFlags::US_SIZE, true; "user size")]
    #[test_case(SizeHintFlags::P_MIN_SIZE, false; "min only")]
    #[test]
    fn normal_hints_own_size(flag: SizeHintFlags, expected: bool) {
        let raw = [flag.bits(), 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];

        assert_eq!(WmNormalHints::from_cardinals(&raw).requests_own_size(), expected);
    }

    #[test]
    fn truncated_normal_hints_parse() {
        let hints = WmNormalHints::from_cardinals(&[SizeHintFlags::P_MIN_SIZE.bits(), 0, 0, 0, 0, 20]);

        assert_eq!(hints.min, Some((20, 0)));
    }

    #[test_case(&[], true; "no hints at all")]
    #[test_case(&[0, 0], true; "input flag unset")]
    #[test_case(&[1, 1], true; "input true")]
    #[test_case(&[1, 0], false; "input false")]
    #[test]
    fn wm_hints_input(raw: &[u32], expected: bool) {
        assert_eq!(WmHints::from_cardinals(raw).accepts_input, expected);
    }
}
