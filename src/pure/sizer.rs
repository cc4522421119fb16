//! Sizing policies for deciding window geometry
use crate::{pure::geometry::Rect, x::property::WmNormalHints};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A pure policy mapping (current geometry, available geometry, size hints)
/// to the geometry a window should be given when it is drawn.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sizer {
    /// Respect the strongest of the client's size hints: a fixed
    /// (min == max) size wins, a requested size is kept and centered, and
    /// anything else gets the whole available area. This is the default for
    /// normal windows.
    #[default]
    HonourableMax,
    /// Always use the whole available area, ignoring hints.
    BrutalMax,
    /// Keep the window's own width and height and center it. Used for
    /// transients so dialogs float over their parents.
    Transient,
}

impl Sizer {
    /// Compute the geometry to give a window.
    ///
    /// Aspect ratios, resize increments and win-gravity are recognized in
    /// [WmNormalHints] but not applied here.
    pub fn size(&self, current: Rect, available: Rect, hints: Option<&WmNormalHints>) -> Rect {
        match self {
            Sizer::BrutalMax => available,
            Sizer::Transient => current.centered_in(&available),
            Sizer::HonourableMax => match hints {
                Some(h) => {
                    if let Some((w, height)) = h.fixed_size() {
                        Rect::new(0, 0, w, height).centered_in(&available)
                    } else if h.requests_own_size() {
                        current.centered_in(&available)
                    } else {
                        available
                    }
                }
                None => available,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x::property::SizeHintFlags;
    use simple_test_case::test_case;

    const AVAILABLE: Rect = Rect::new(0, 0, 1000, 800);
    const CURRENT: Rect = Rect::new(5, 5, 200, 100);

    fn hints(flags: SizeHintFlags, min: Option<(u32, u32)>, max: Option<(u32, u32)>) -> WmNormalHints {
        WmNormalHints {
            flags,
            min,
            max,
            ..Default::default()
        }
    }

    #[test]
    fn brutal_max_ignores_hints() {
        let h = hints(
            SizeHintFlags::P_MIN_SIZE | SizeHintFlags::P_MAX_SIZE,
            Some((10, 10)),
            Some((10, 10)),
        );

        assert_eq!(Sizer::BrutalMax.size(CURRENT, AVAILABLE, Some(&h)), AVAILABLE);
    }

    #[test]
    fn transient_keeps_size_and_centers() {
        let sized = Sizer::Transient.size(CURRENT, AVAILABLE, None);

        assert_eq!(sized, Rect::new(400, 350, 200, 100));
    }

    #[test]
    fn honourable_fixed_size_wins() {
        let h = hints(
            SizeHintFlags::P_MIN_SIZE | SizeHintFlags::P_MAX_SIZE | SizeHintFlags::P_SIZE,
            Some((640, 480)),
            Some((640, 480)),
        );

        let sized = Sizer::HonourableMax.size(CURRENT, AVAILABLE, Some(&h));

        assert_eq!(sized, Rect::new(180, 160, 640, 480));
    }

    #[test]
    fn honourable_own_size_centers_current() {
        let h = hints(SizeHintFlags::P_SIZE, None, None);

        let sized = Sizer::HonourableMax.size(CURRENT, AVAILABLE, Some(&h));

        assert_eq!(sized, Rect::new(400, 350, 200, 100));
    }

    #[test_case(None; "no hints")]
    #[test_case(Some(hints(SizeHintFlags::P_MIN_SIZE, Some((10, 10)), None)); "min only")]
    #[test]
    fn honourable_defaults_to_available(h: Option<WmNormalHints>) {
        assert_eq!(
            Sizer::HonourableMax.size(CURRENT, AVAILABLE, h.as_ref()),
            AVAILABLE
        );
    }
}
