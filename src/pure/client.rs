//! Per window state tracked by the window manager
use crate::{
    pure::{geometry::Rect, sizer::Sizer},
    x::property::{MapState, WmNormalHints, WmState},
    Xid,
};
use indexmap::IndexMap;
use std::collections::HashSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The WM side record of a single X window.
///
/// One record exists for every known child of the root window, managed or
/// not: override-redirect windows are tracked here but never placed in a
/// desktop stack.
///
/// The ICCCM property fields (`name`, `res_name` / `res_class`, `protocols`,
/// `size_hints`, `accepts_input`, `transient_for`) are a cache loaded when
/// the record is created and invalidated only by destroying the window:
/// runtime PropertyNotify updates are deliberately not observed.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub(crate) id: Xid,
    pub(crate) override_redirect: bool,
    pub(crate) geometry: Rect,
    pub(crate) wanted_geometry: Rect,
    pub(crate) map_state: MapState,
    pub(crate) name: String,
    pub(crate) res_name: String,
    pub(crate) res_class: String,
    pub(crate) protocols: HashSet<String>,
    pub(crate) size_hints: Option<WmNormalHints>,
    pub(crate) accepts_input: bool,
    pub(crate) transient_for: Option<Xid>,
    pub(crate) family: Vec<Xid>,
    pub(crate) desktop_index: u32,
    pub(crate) wm_state: WmState,
}

impl Client {
    /// Create a new record from the state reported by the server.
    ///
    /// The family is initialised to the window alone: it is extended with
    /// the transient parent chain when the record is added to a
    /// [ClientStore].
    pub fn new(id: Xid, override_redirect: bool, geometry: Rect, map_state: MapState) -> Self {
        Self {
            id,
            override_redirect,
            geometry,
            wanted_geometry: geometry,
            map_state,
            name: String::new(),
            res_name: String::new(),
            res_class: String::new(),
            protocols: HashSet::new(),
            size_hints: None,
            accepts_input: true,
            transient_for: None,
            family: vec![id],
            // sentinel: no _NET_WM_DESKTOP has been announced yet
            desktop_index: u32::MAX,
            wm_state: WmState::Withdrawn,
        }
    }

    /// The server assigned id of this window.
    pub fn id(&self) -> Xid {
        self.id
    }

    /// The window title, preferring _NET_WM_NAME over WM_NAME.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The last geometry reported for this window by the server.
    pub fn geometry(&self) -> Rect {
        self.geometry
    }

    /// The geometry the window manager wants this window to have.
    ///
    /// Reconciliation re-requests the move / resize on every
    /// ConfigureNotify until the two geometries agree.
    pub fn wanted_geometry(&self) -> Rect {
        self.wanted_geometry
    }

    /// The window this one is transient for, if any.
    pub fn transient_for(&self) -> Option<Xid> {
        self.transient_for
    }

    /// The family of windows that show and hide together: the window itself
    /// followed by its chain of transient parents. `family[0]` is always the
    /// window itself.
    pub fn family(&self) -> &[Xid] {
        &self.family
    }

    /// The current ICCCM life-cycle state of the window.
    pub fn wm_state(&self) -> WmState {
        self.wm_state
    }

    /// Whether this window advertises the named protocol in WM_PROTOCOLS.
    pub fn supports_protocol(&self, name: &str) -> bool {
        self.protocols.contains(name)
    }

    /// The sizing policy applied when this window is drawn: transients
    /// always position-only, anything else uses the configured policy.
    pub fn sizer(&self, normal: Sizer) -> Sizer {
        if self.transient_for.is_some() {
            Sizer::Transient
        } else {
            normal
        }
    }
}

/// All windows known to the window manager, keyed by window id in creation
/// order.
///
/// Creation order is load bearing: it is what _NET_CLIENT_LIST publishes.
#[derive(Debug, Default, Clone)]
pub struct ClientStore {
    inner: IndexMap<Xid, Client>,
}

impl ClientStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record to the store, resolving its family chain against the
    /// windows currently known.
    ///
    /// A transient whose parent is not (yet) known keeps the degenerate
    /// `[self]` family.
    pub fn insert(&mut self, mut client: Client) {
        client.family = match client
            .transient_for
            .and_then(|p| self.inner.get(&p))
        {
            Some(parent) => {
                let mut family = vec![client.id];
                family.extend(parent.family.iter().copied());
                family
            }
            None => vec![client.id],
        };

        self.inner.insert(client.id, client);
    }

    /// Remove and return the record for the given window.
    pub fn remove(&mut self, id: &Xid) -> Option<Client> {
        self.inner.shift_remove(id)
    }

    /// Look up a record.
    pub fn get(&self, id: &Xid) -> Option<&Client> {
        self.inner.get(id)
    }

    /// Look up a record for mutation.
    pub fn get_mut(&mut self, id: &Xid) -> Option<&mut Client> {
        self.inner.get_mut(id)
    }

    /// Whether the given window is known.
    pub fn contains(&self, id: &Xid) -> bool {
        self.inner.contains_key(id)
    }

    /// All known window ids in creation order.
    pub fn ids(&self) -> impl Iterator<Item = Xid> + '_ {
        self.inner.keys().copied()
    }

    /// All records in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.inner.values()
    }

    /// The family for the given window: the stored chain, or the window
    /// alone if it is unknown.
    pub fn family_of(&self, id: Xid) -> Vec<Xid> {
        self.inner
            .get(&id)
            .map(|c| c.family.clone())
            .unwrap_or_else(|| vec![id])
    }

    /// The number of known windows.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(id: u32, transient_for: Option<u32>) -> Client {
        let mut c = Client::new(Xid(id), false, Rect::default(), MapState::Unmapped);
        c.transient_for = transient_for.map(Xid);
        c
    }

    #[test]
    fn family_starts_as_self() {
        let c = client(1, None);

        assert_eq!(c.family(), &[Xid(1)]);
    }

    #[test]
    fn transient_family_includes_parent_chain() {
        let mut store = ClientStore::new();
        store.insert(client(1, None));
        store.insert(client(2, Some(1)));
        store.insert(client(3, Some(2)));

        assert_eq!(store.family_of(Xid(3)), vec![Xid(3), Xid(2), Xid(1)]);
    }

    #[test]
    fn transient_with_unknown_parent_has_degenerate_family() {
        let mut store = ClientStore::new();
        store.insert(client(2, Some(1)));

        assert_eq!(store.family_of(Xid(2)), vec![Xid(2)]);
    }

    #[test]
    fn ids_are_in_creation_order_after_removal() {
        let mut store = ClientStore::new();
        for id in [5, 3, 9, 1] {
            store.insert(client(id, None));
        }
        store.remove(&Xid(9));

        let ids: Vec<Xid> = store.ids().collect();

        assert_eq!(ids, vec![Xid(5), Xid(3), Xid(1)]);
    }

    #[test]
    fn transient_sizer_for_transients() {
        let normal = Sizer::HonourableMax;

        assert_eq!(client(1, Some(2)).sizer(normal), Sizer::Transient);
        assert_eq!(client(1, None).sizer(normal), normal);
    }
}
