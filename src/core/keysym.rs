//! A curated keysym table covering the keys footwm bindings can name.
//!
//! Latin-1 keysyms are numerically equal to their unicode code points so
//! single character names are computed rather than stored; everything else
//! comes from this table (the X11 keysymdef names, unprefixed).

/// Named (non latin-1) keysyms known to the binding parser.
pub(crate) const KEYSYMS: &[(&str, u32)] = &[
    ("BackSpace", 0xff08),
    ("Tab", 0xff09),
    ("Return", 0xff0d),
    ("Pause", 0xff13),
    ("Scroll_Lock", 0xff14),
    ("Escape", 0xff1b),
    ("Home", 0xff50),
    ("Left", 0xff51),
    ("Up", 0xff52),
    ("Right", 0xff53),
    ("Down", 0xff54),
    ("Prior", 0xff55),
    ("Next", 0xff56),
    ("End", 0xff57),
    ("Insert", 0xff63),
    ("Menu", 0xff67),
    ("Num_Lock", 0xff7f),
    ("KP_Enter", 0xff8d),
    ("KP_Home", 0xff95),
    ("KP_Left", 0xff96),
    ("KP_Up", 0xff97),
    ("KP_Right", 0xff98),
    ("KP_Down", 0xff99),
    ("KP_Prior", 0xff9a),
    ("KP_Next", 0xff9b),
    ("KP_End", 0xff9c),
    ("KP_Insert", 0xff9e),
    ("KP_Delete", 0xff9f),
    ("KP_Multiply", 0xffaa),
    ("KP_Add", 0xffab),
    ("KP_Subtract", 0xffad),
    ("KP_Decimal", 0xffae),
    ("KP_Divide", 0xffaf),
    ("KP_0", 0xffb0),
    ("KP_1", 0xffb1),
    ("KP_2", 0xffb2),
    ("KP_3", 0xffb3),
    ("KP_4", 0xffb4),
    ("KP_5", 0xffb5),
    ("KP_6", 0xffb6),
    ("KP_7", 0xffb7),
    ("KP_8", 0xffb8),
    ("KP_9", 0xffb9),
    ("F1", 0xffbe),
    ("F2", 0xffbf),
    ("F3", 0xffc0),
    ("F4", 0xffc1),
    ("F5", 0xffc2),
    ("F6", 0xffc3),
    ("F7", 0xffc4),
    ("F8", 0xffc5),
    ("F9", 0xffc6),
    ("F10", 0xffc7),
    ("F11", 0xffc8),
    ("F12", 0xffc9),
    ("Shift_L", 0xffe1),
    ("Shift_R", 0xffe2),
    ("Control_L", 0xffe3),
    ("Control_R", 0xffe4),
    ("Caps_Lock", 0xffe5),
    ("Shift_Lock", 0xffe6),
    ("Meta_L", 0xffe7),
    ("Meta_R", 0xffe8),
    ("Alt_L", 0xffe9),
    ("Alt_R", 0xffea),
    ("Super_L", 0xffeb),
    ("Super_R", 0xffec),
    ("Hyper_L", 0xffed),
    ("Hyper_R", 0xffee),
    ("space", 0x20),
    ("Delete", 0xffff),
];

/// Resolve a key name to its keysym value.
///
/// Single latin-1 characters resolve to themselves; anything else must be
/// in the named table.
pub fn keysym_from_name(name: &str) -> Option<u32> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        let cp = c as u32;
        if (0x20..0x100).contains(&cp) {
            return Some(cp);
        }
    }

    KEYSYMS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(_, sym)| sym)
}

/// The inverse of [keysym_from_name]: the canonical name for a keysym.
pub fn name_from_keysym(sym: u32) -> Option<String> {
    if (0x20..0x100).contains(&sym) && sym != 0x20 {
        return char::from_u32(sym).map(|c| c.to_string());
    }

    KEYSYMS
        .iter()
        .find(|(_, s)| *s == sym)
        .map(|&(name, _)| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("a", Some(0x61); "lowercase letter")]
    #[test_case("A", Some(0x41); "uppercase letter")]
    #[test_case("1", Some(0x31); "digit")]
    #[test_case("space", Some(0x20); "space by name")]
    #[test_case("F1", Some(0xffbe); "function key")]
    #[test_case("KP_5", Some(0xffb5); "keypad digit")]
    #[test_case("Alt_L", Some(0xffe9); "modifier")]
    #[test_case("NoSuchKey", None; "unknown name")]
    #[test]
    fn lookup(name: &str, expected: Option<u32>) {
        assert_eq!(keysym_from_name(name), expected);
    }

    #[test]
    fn names_round_trip() {
        for (name, sym) in KEYSYMS {
            // latin-1 syms canonicalise to the single character name
            if *sym >= 0x100 || *sym == 0x20 {
                assert_eq!(name_from_keysym(*sym).as_deref(), Some(*name));
            }
            assert_eq!(keysym_from_name(name), Some(*sym));
        }
    }
}
