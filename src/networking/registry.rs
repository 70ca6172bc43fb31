use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::Mutex;

use super::{
    aggregate::{restricted_permissions_per_sg, unrestricted_permissions_per_sg, PermissionsPerSg},
    permission::IpPermissionInfo,
};
use crate::tgb::BindingKey;

/// Which aggregated view drives reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    Unrestricted,
    Restricted,
}

#[derive(Debug, Default)]
struct State {
    permissions: HashMap<BindingKey, PermissionsPerSg>,
    /// Entries of deleted bindings being garbage collected. Excluded from
    /// every view.
    evicting: HashSet<BindingKey>,
}

impl State {
    fn live_entries(&self) -> impl Iterator<Item = &PermissionsPerSg> {
        self.permissions
            .iter()
            .filter(|(key, _)| !self.evicting.contains(*key))
            .map(|(_, permissions)| permissions)
    }

    fn view(&self, view: View) -> PermissionsPerSg {
        match view {
            View::Unrestricted => unrestricted_permissions_per_sg(self.live_entries()),
            View::Restricted => restricted_permissions_per_sg(self.live_entries()),
        }
    }
}

/// Per-binding ingress permissions keyed by target security group.
///
/// All access goes through one mutex which is never held across an await.
#[derive(Debug, Default)]
pub struct PermissionRegistry {
    state: Mutex<State>,
}

impl PermissionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the entry of `key` and returns the security groups touched
    /// by either the old or the new entry.
    pub fn replace(&self, key: BindingKey, permissions: PermissionsPerSg) -> BTreeSet<String> {
        let mut state = self.state.lock();
        state.evicting.remove(&key);
        let mut affected = permissions.keys().cloned().collect::<BTreeSet<_>>();
        if let Some(old) = state.permissions.insert(key, permissions) {
            affected.extend(old.into_keys());
        }
        affected
    }

    #[must_use]
    pub fn contains(&self, key: &BindingKey) -> bool {
        self.state.lock().permissions.contains_key(key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<BindingKey> {
        self.state.lock().permissions.keys().cloned().collect()
    }

    /// Aggregated desired permissions of every security group.
    #[must_use]
    pub fn view(&self, view: View) -> PermissionsPerSg {
        self.state.lock().view(view)
    }

    /// Aggregated desired permissions of one security group.
    #[must_use]
    pub fn desired_for(&self, sg_id: &str, view: View) -> Vec<IpPermissionInfo> {
        self.state
            .lock()
            .view(view)
            .remove(sg_id)
            .unwrap_or_default()
    }

    /// Marks every entry not in `live` as evicting and returns the evicted
    /// keys with the security groups whose desired state changed because
    /// of it.
    pub fn begin_eviction(
        &self,
        live: &HashSet<BindingKey>,
        view: View,
    ) -> (Vec<BindingKey>, BTreeSet<String>) {
        let mut state = self.state.lock();
        let stale = state
            .permissions
            .keys()
            .filter(|key| !live.contains(*key) && !state.evicting.contains(*key))
            .cloned()
            .collect::<Vec<_>>();
        if stale.is_empty() {
            return (stale, BTreeSet::new());
        }

        let referenced = stale
            .iter()
            .filter_map(|key| state.permissions.get(key))
            .flat_map(|permissions| permissions.keys().cloned())
            .collect::<BTreeSet<_>>();
        let before = state.view(view);
        state.evicting.extend(stale.iter().cloned());
        let after = state.view(view);

        let changed = referenced
            .into_iter()
            .filter(|sg_id| before.get(sg_id) != after.get(sg_id))
            .collect();
        (stale, changed)
    }

    /// Drops evicted entries, or restores them when the sweep failed so the
    /// next sweep retries. Entries recomputed meanwhile are left alone.
    pub fn finish_eviction(&self, keys: &[BindingKey], success: bool) {
        let mut state = self.state.lock();
        for key in keys {
            if !state.evicting.remove(key) {
                continue;
            }
            if success {
                state.permissions.remove(key);
            }
        }
    }
}
