//! Setting up and responding to user defined key bindings
use crate::{
    core::{
        keysym::{keysym_from_name, name_from_keysym},
        State,
    },
    x::XConn,
    Error, Result,
};
use std::{collections::HashMap, fmt};
use tracing::{debug, trace, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Some action to be run by a user key binding
pub type KeyEventHandler<X> = Box<dyn FnMut(&mut State, &X) -> Result<()>>;

/// A u16 X key-code bitmask
pub type KeyCodeMask = u16;

/// A u8 X key-code enum value
pub type KeyCodeValue = u8;

const SHIFT_MASK: KeyCodeMask = 1 << 0;
const LOCK_MASK: KeyCodeMask = 1 << 1;
const CONTROL_MASK: KeyCodeMask = 1 << 2;
const N_MODIFIER_ROWS: usize = 8;

/// A key press and held modifiers
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct KeyCode {
    /// The held modifier mask
    pub mask: KeyCodeMask,
    /// The key code that was held
    pub code: KeyCodeValue,
}

impl KeyCode {
    /// Create a new [KeyCode] from this one that removes the given mask
    pub fn ignoring_modifier(&self, mask: KeyCodeMask) -> KeyCode {
        KeyCode {
            mask: self.mask & !mask,
            code: self.code,
        }
    }
}

/// Known modifier keys for bindings
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum ModifierKey {
    /// Control
    Ctrl,
    /// Alt (or Meta): located by searching the modifier table
    Alt,
    /// Shift
    Shift,
    /// Meta / super / windows
    Meta,
    /// Caps lock, usually only useful as an ignored modifier
    CapsLock,
    /// Num lock, usually only useful as an ignored modifier
    NumLock,
    /// Scroll lock, usually only useful as an ignored modifier
    ScrollLock,
}

impl TryFrom<&str> for ModifierKey {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        match s {
            "C" => Ok(Self::Ctrl),
            "A" => Ok(Self::Alt),
            "S" => Ok(Self::Shift),
            "M" => Ok(Self::Meta),
            _ => Err(Error::UnknownKeyName(s.into())),
        }
    }
}

/// The server's keycode to keysym table: for each keycode, the keysyms for
/// each shift level (column 0 unshifted, column 1 shifted).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyboardMapping {
    /// The lowest keycode in use
    pub min_keycode: u8,
    /// The number of keysym columns per keycode
    pub keysyms_per_keycode: usize,
    /// keysyms_per_keycode entries for each keycode from min_keycode up
    pub keysyms: Vec<u32>,
}

impl KeyboardMapping {
    fn iter(&self) -> impl Iterator<Item = (u8, &[u32])> {
        self.keysyms
            .chunks(self.keysyms_per_keycode.max(1))
            .enumerate()
            .map(|(i, syms)| (self.min_keycode.wrapping_add(i as u8), syms))
    }
}

/// The server's modifier table: up to keycodes_per_modifier keycodes for
/// each of the eight modifier rows (Shift, Lock, Control, Mod1..Mod5).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModifierMapping {
    /// The number of keycode slots per modifier row
    pub keycodes_per_modifier: usize,
    /// 8 * keycodes_per_modifier keycodes, zero for unused slots
    pub keycodes: Vec<u8>,
}

impl ModifierMapping {
    fn row(&self, index: usize) -> &[u8] {
        let n = self.keycodes_per_modifier;
        self.keycodes
            .get(index * n..(index + 1) * n)
            .unwrap_or(&[])
    }
}

/// Keysym / keycode / modifier resolution built from the server's keyboard
/// and modifier mappings.
///
/// The "soft" modifiers (Alt, Super, NumLock, ScrollLock) have no fixed
/// modifier bit: they are located by searching the modifier rows for the
/// keycodes carrying their canonical keysyms. A keyboard without one of
/// them resolves its mask to zero and bindings using it simply never match.
#[derive(Debug, Clone, Default)]
pub struct KeyboardMap {
    keysyms: Vec<(u8, Vec<u32>)>,
    alt_mask: KeyCodeMask,
    super_mask: KeyCodeMask,
    num_lock_mask: KeyCodeMask,
    scroll_lock_mask: KeyCodeMask,
}

impl KeyboardMap {
    /// Build the lookup tables from the raw server mappings.
    pub fn new(kb: KeyboardMapping, mods: ModifierMapping) -> Self {
        let keysyms: Vec<(u8, Vec<u32>)> =
            kb.iter().map(|(code, syms)| (code, syms.to_vec())).collect();

        let syms_for = |code: u8| {
            keysyms
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, syms)| syms.as_slice())
                .unwrap_or(&[])
        };

        let find_mask = |names: &[&str]| -> KeyCodeMask {
            let targets: Vec<u32> = names.iter().filter_map(|n| keysym_from_name(n)).collect();
            for row_ix in 0..N_MODIFIER_ROWS {
                let hit = mods
                    .row(row_ix)
                    .iter()
                    .filter(|&&code| code != 0)
                    .any(|&code| syms_for(code).iter().any(|s| targets.contains(s)));
                if hit {
                    return 1 << row_ix;
                }
            }

            0
        };

        let alt_mask = find_mask(&["Alt_L", "Alt_R", "Meta_L", "Meta_R"]);
        let super_mask = find_mask(&["Super_L", "Super_R"]);
        let num_lock_mask = find_mask(&["Num_Lock"]);
        let scroll_lock_mask = find_mask(&["Scroll_Lock"]);

        debug!(
            alt = alt_mask,
            super_ = super_mask,
            num_lock = num_lock_mask,
            scroll_lock = scroll_lock_mask,
            "resolved soft modifier masks"
        );

        Self {
            keysyms,
            alt_mask,
            super_mask,
            num_lock_mask,
            scroll_lock_mask,
        }
    }

    /// The modifier bit currently carrying the given modifier key.
    pub fn mask_for(&self, m: ModifierKey) -> KeyCodeMask {
        match m {
            ModifierKey::Shift => SHIFT_MASK,
            ModifierKey::CapsLock => LOCK_MASK,
            ModifierKey::Ctrl => CONTROL_MASK,
            ModifierKey::Alt => self.alt_mask,
            ModifierKey::Meta => self.super_mask,
            ModifierKey::NumLock => self.num_lock_mask,
            ModifierKey::ScrollLock => self.scroll_lock_mask,
        }
    }

    /// Resolve a key name to its keycode and the modifier mask needed to
    /// produce it: shifted glyphs pick up Shift, keypad variants pick up
    /// NumLock.
    pub fn resolve(&self, name: &str) -> Result<(KeyCodeValue, KeyCodeMask)> {
        let sym = keysym_from_name(name).ok_or_else(|| Error::UnknownKeyName(name.into()))?;

        for (code, syms) in &self.keysyms {
            if syms.first() == Some(&sym) {
                return Ok((*code, 0));
            }
        }

        for (code, syms) in &self.keysyms {
            if syms.iter().skip(1).any(|&s| s == sym) {
                let mask = if name.starts_with("KP_") {
                    self.num_lock_mask
                } else {
                    SHIFT_MASK
                };
                return Ok((*code, mask));
            }
        }

        Err(Error::UnknownKeyName(name.into()))
    }

    /// The inverse of [resolve][KeyboardMap::resolve]: the key name a
    /// (keycode, modifier mask) pair produces.
    pub fn keysym_name(&self, k: KeyCode) -> Option<String> {
        let syms = self
            .keysyms
            .iter()
            .find(|(code, _)| *code == k.code)
            .map(|(_, syms)| syms.as_slice())?;

        let shifted = k.mask & SHIFT_MASK != 0
            || (k.mask & self.num_lock_mask != 0
                && syms
                    .get(1)
                    .and_then(|&s| name_from_keysym(s))
                    .is_some_and(|n| n.starts_with("KP_")));

        let column = if shifted { 1 } else { 0 };
        syms.get(column)
            .or_else(|| syms.first())
            .and_then(|&s| name_from_keysym(s))
    }
}

/// A user facing key binding: the key name, the modifiers that must be held
/// and the modifiers whose state does not matter.
///
/// X requires one grab per concrete modifier combination so each ignored
/// modifier doubles the number of grabs installed for the binding.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    /// The key name ("a", "F1", "KP_5", "Return", ...)
    pub keysym: String,
    /// Modifiers that must be held
    pub mods: Vec<ModifierKey>,
    /// Modifiers whose state is irrelevant
    pub ignored: Vec<ModifierKey>,
}

impl KeySpec {
    /// The lock style modifiers ignored by default for every binding.
    pub fn default_ignored() -> Vec<ModifierKey> {
        vec![
            ModifierKey::NumLock,
            ModifierKey::CapsLock,
            ModifierKey::ScrollLock,
        ]
    }

    /// Parse a binding of the form `"M-S-Return"`: dash separated modifier
    /// codes (C / A / S / M) followed by a key name.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts: Vec<&str> = s.split('-').collect();
        let keysym = parts.pop().filter(|p| !p.is_empty()).map(String::from);

        let keysym = match keysym {
            Some(k) if keysym_from_name(&k).is_some() => k,
            _ => return Err(Error::UnknownKeyName(s.into())),
        };

        let mods = parts
            .into_iter()
            .map(ModifierKey::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            keysym,
            mods,
            ignored: Self::default_ignored(),
        })
    }

    /// Every concrete (keycode, mask) pair that should be grabbed and
    /// dispatched for this binding: the literal combination plus the power
    /// set of the ignored modifiers.
    pub fn key_codes(&self, map: &KeyboardMap) -> Result<Vec<KeyCode>> {
        let (code, base_mask) = map.resolve(&self.keysym)?;

        let mut required = base_mask;
        for m in &self.mods {
            required |= map.mask_for(*m);
        }

        let mut ignored_masks: Vec<KeyCodeMask> = self
            .ignored
            .iter()
            .map(|m| map.mask_for(*m))
            .filter(|&m| m != 0 && m & required == 0)
            .collect();
        ignored_masks.sort_unstable();
        ignored_masks.dedup();

        let mut codes = vec![KeyCode {
            code,
            mask: required,
        }];
        for mask in ignored_masks {
            for i in 0..codes.len() {
                codes.push(KeyCode {
                    code,
                    mask: codes[i].mask | mask,
                });
            }
        }

        Ok(codes)
    }
}

/// User defined key bindings and the dispatch table resolved from them.
///
/// The resolved table is rebuilt from the retained specs whenever the
/// server reports a keyboard mapping change.
pub struct KeyBindings<X>
where
    X: XConn,
{
    bindings: Vec<(KeySpec, KeyEventHandler<X>)>,
    table: HashMap<KeyCode, usize>,
}

impl<X: XConn> fmt::Debug for KeyBindings<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBindings")
            .field("specs", &self.bindings.iter().map(|(s, _)| s).collect::<Vec<_>>())
            .field("resolved", &self.table.len())
            .finish()
    }
}

impl<X: XConn> Default for KeyBindings<X> {
    fn default() -> Self {
        Self::new()
    }
}

impl<X: XConn> KeyBindings<X> {
    /// Create an empty set of bindings.
    pub fn new() -> Self {
        Self {
            bindings: vec![],
            table: HashMap::new(),
        }
    }

    /// Attach a handler to a key spec.
    pub fn bind(&mut self, spec: KeySpec, handler: KeyEventHandler<X>) {
        self.bindings.push((spec, handler));
    }

    /// The number of bound specs.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether any bindings have been registered.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// (Re)build the dispatch table against the given keyboard map.
    ///
    /// Specs that fail to resolve (unknown keys on this keyboard) are
    /// logged and skipped rather than failing the rest of the table.
    pub fn resolve(&mut self, map: &KeyboardMap) {
        self.table.clear();

        for (ix, (spec, _)) in self.bindings.iter().enumerate() {
            match spec.key_codes(map) {
                Ok(codes) => {
                    for code in codes {
                        if let Some(prev) = self.table.insert(code, ix) {
                            warn!(?spec, prev, "key binding shadows an earlier binding");
                        }
                    }
                }
                Err(e) => warn!(?spec, %e, "unable to resolve key binding"),
            }
        }
    }

    /// The full set of key codes that need grabbing, in a stable order.
    pub fn grab_codes(&self) -> Vec<KeyCode> {
        let mut codes: Vec<KeyCode> = self.table.keys().copied().collect();
        codes.sort_unstable_by_key(|k| (k.code, k.mask));

        codes
    }

    /// Run the handler bound to the given key code, if any.
    pub(crate) fn run(&mut self, code: KeyCode, state: &mut State, x: &X) -> Result<()> {
        match self.table.get(&code) {
            Some(&ix) => (self.bindings[ix].1)(state, x),
            None => {
                trace!(?code, "no binding for key code");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    // keycode -> [unshifted, shifted]
    const KEYSYMS: &[(u8, [u32; 2])] = &[
        (10, [0x31, 0x21]),     // 1 / !
        (38, [0x61, 0x41]),     // a / A
        (36, [0xff0d, 0]),      // Return
        (50, [0xffe1, 0]),      // Shift_L
        (37, [0xffe3, 0]),      // Control_L
        (64, [0xffe9, 0]),      // Alt_L
        (66, [0xffe5, 0]),      // Caps_Lock
        (77, [0xff7f, 0]),      // Num_Lock
        (87, [0xff9c, 0xffb1]), // KP_End / KP_1
        (133, [0xffeb, 0]),     // Super_L
    ];

    fn test_map() -> KeyboardMap {
        let min_keycode = KEYSYMS.iter().map(|(c, _)| *c).min().unwrap();
        let max_keycode = KEYSYMS.iter().map(|(c, _)| *c).max().unwrap();

        let mut keysyms = vec![];
        for code in min_keycode..=max_keycode {
            let syms = KEYSYMS
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, syms)| *syms)
                .unwrap_or([0, 0]);
            keysyms.extend(syms);
        }

        let kb = KeyboardMapping {
            min_keycode,
            keysyms_per_keycode: 2,
            keysyms,
        };

        // Shift, Lock, Control, Mod1, Mod2, Mod3, Mod4, Mod5
        let mods = ModifierMapping {
            keycodes_per_modifier: 2,
            keycodes: vec![
                50, 0, // Shift
                66, 0, // Lock
                37, 0, // Control
                64, 0, // Mod1: Alt
                77, 0, // Mod2: NumLock
                0, 0, // Mod3
                133, 0, // Mod4: Super
                0, 0, // Mod5
            ],
        };

        KeyboardMap::new(kb, mods)
    }

    #[test]
    fn soft_modifiers_are_located() {
        let map = test_map();

        assert_eq!(map.mask_for(ModifierKey::Alt), 1 << 3);
        assert_eq!(map.mask_for(ModifierKey::NumLock), 1 << 4);
        assert_eq!(map.mask_for(ModifierKey::Meta), 1 << 6);
        assert_eq!(map.mask_for(ModifierKey::ScrollLock), 0);
    }

    #[test_case("a", 38, 0; "unshifted letter")]
    #[test_case("A", 38, SHIFT_MASK; "shifted letter")]
    #[test_case("1", 10, 0; "digit")]
    #[test_case("!", 10, SHIFT_MASK; "shifted digit")]
    #[test_case("Return", 36, 0; "named key")]
    #[test_case("KP_1", 87, 1 << 4; "keypad digit picks up numlock")]
    #[test]
    fn resolve(name: &str, code: u8, mask: u16) {
        assert_eq!(test_map().resolve(name).unwrap(), (code, mask));
    }

    #[test]
    fn resolve_unknown_key_fails() {
        assert!(matches!(
            test_map().resolve("NoSuchKey"),
            Err(Error::UnknownKeyName(_))
        ));
    }

    #[test_case(KeyCode { code: 38, mask: 0 }, Some("a"); "unshifted")]
    #[test_case(KeyCode { code: 38, mask: SHIFT_MASK }, Some("A"); "shifted")]
    #[test_case(KeyCode { code: 87, mask: 1 << 4 }, Some("KP_1"); "keypad with numlock")]
    #[test_case(KeyCode { code: 87, mask: 0 }, Some("KP_End"); "keypad without numlock")]
    #[test_case(KeyCode { code: 200, mask: 0 }, None; "unknown keycode")]
    #[test]
    fn keysym_name(k: KeyCode, expected: Option<&str>) {
        assert_eq!(test_map().keysym_name(k).as_deref(), expected);
    }

    #[test]
    fn key_codes_cover_the_ignored_power_set() {
        let spec = KeySpec {
            keysym: "a".into(),
            mods: vec![ModifierKey::Meta],
            ignored: vec![ModifierKey::NumLock, ModifierKey::CapsLock],
        };

        let mut codes = spec.key_codes(&test_map()).unwrap();
        codes.sort_unstable_by_key(|k| k.mask);

        let m = 1 << 6;
        let num = 1 << 4;
        let lock = LOCK_MASK;
        let expected = vec![
            KeyCode { code: 38, mask: m },
            KeyCode { code: 38, mask: m | lock },
            KeyCode { code: 38, mask: m | num },
            KeyCode { code: 38, mask: m | num | lock },
        ];

        assert_eq!(codes, expected);
    }

    #[test]
    fn missing_ignored_modifiers_do_not_multiply_grabs() {
        let spec = KeySpec {
            keysym: "a".into(),
            mods: vec![],
            ignored: vec![ModifierKey::ScrollLock],
        };

        let codes = spec.key_codes(&test_map()).unwrap();

        assert_eq!(codes, vec![KeyCode { code: 38, mask: 0 }]);
    }

    #[test_case("M-S-Return", "Return", &[ModifierKey::Meta, ModifierKey::Shift]; "two mods")]
    #[test_case("A-F1", "F1", &[ModifierKey::Alt]; "single mod")]
    #[test_case("x", "x", &[]; "bare key")]
    #[test]
    fn parse(s: &str, keysym: &str, mods: &[ModifierKey]) {
        let spec = KeySpec::parse(s).unwrap();

        assert_eq!(spec.keysym, keysym);
        assert_eq!(spec.mods, mods);
        assert_eq!(spec.ignored, KeySpec::default_ignored());
    }

    #[test_case("M-"; "trailing dash")]
    #[test_case("Q-x"; "unknown modifier")]
    #[test_case("M-NotAKey"; "unknown key")]
    #[test]
    fn parse_errors(s: &str) {
        assert!(KeySpec::parse(s).is_err());
    }
}
