//! Rotation sync between plots.
//!
//! A [`LinkGroup`] holds one mailbox per member and no reference to the plots
//! themselves. A rotating plot broadcasts its per-event drag step, every other
//! member's mailbox receives it, and each member drains its own mailbox when
//! it next renders. Dropping or unlinking a plot removes its mailbox.
//!
//! Software plots rotate by adding to their angles, so their mailbox folds
//! every step into one pending sum and stays bounded while the plot is not
//! rendering. Hardware plots compose rotation matrices and keep each step.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Member identifier inside a link group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkMemberId(u64);

/// A drag step in pixels, as handed to [`crate::SurfacePlot::rotate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationDelta {
    pub dx: f64,
    pub dy: f64,
}

impl RotationDelta {
    fn merge(&mut self, other: RotationDelta) {
        self.dx += other.dx;
        self.dy += other.dy;
    }
}

#[derive(Debug, Default)]
struct Mailbox {
    additive: bool,
    deltas: Vec<RotationDelta>,
}

impl Mailbox {
    fn push(&mut self, delta: RotationDelta) {
        match self.deltas.last_mut() {
            Some(pending) if self.additive => pending.merge(delta),
            _ => self.deltas.push(delta),
        }
    }
}

#[derive(Debug, Default)]
struct LinkGroupState {
    next_member_id: u64,
    mailboxes: BTreeMap<LinkMemberId, Mailbox>,
}

/// Shared group of plots whose rotations stay in sync.
#[derive(Debug, Clone, Default)]
pub struct LinkGroup {
    inner: Rc<RefCell<LinkGroupState>>,
}

impl LinkGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered plots.
    pub fn len(&self) -> usize {
        self.inner.borrow().mailboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a member. An `additive` member receives at most one summed delta.
    pub(crate) fn register_member(&self, additive: bool) -> LinkMemberId {
        let mut state = self.inner.borrow_mut();
        state.next_member_id = state.next_member_id.wrapping_add(1);
        let id = LinkMemberId(state.next_member_id);
        state.mailboxes.insert(
            id,
            Mailbox {
                additive,
                deltas: Vec::new(),
            },
        );
        id
    }

    /// Switch how `member` queues deltas, folding what is already queued.
    pub(crate) fn set_additive(&self, member: LinkMemberId, additive: bool) {
        let mut state = self.inner.borrow_mut();
        let Some(mailbox) = state.mailboxes.get_mut(&member) else {
            return;
        };
        mailbox.additive = additive;
        if additive {
            for delta in std::mem::take(&mut mailbox.deltas) {
                mailbox.push(delta);
            }
        }
    }

    /// Number of deltas waiting for `member`.
    pub fn pending(&self, member: LinkMemberId) -> usize {
        self.inner
            .borrow()
            .mailboxes
            .get(&member)
            .map_or(0, |mailbox| mailbox.deltas.len())
    }

    pub(crate) fn unregister_member(&self, id: LinkMemberId) {
        self.inner.borrow_mut().mailboxes.remove(&id);
    }

    /// Queue `delta` for every member except `source`.
    pub(crate) fn broadcast(&self, source: LinkMemberId, delta: RotationDelta) {
        let mut state = self.inner.borrow_mut();
        for (_, mailbox) in state.mailboxes.iter_mut().filter(|(id, _)| **id != source) {
            mailbox.push(delta);
        }
    }

    /// Take every delta queued for `member`, oldest first.
    pub(crate) fn drain(&self, member: LinkMemberId) -> Vec<RotationDelta> {
        self.inner
            .borrow_mut()
            .mailboxes
            .get_mut(&member)
            .map(|mailbox| std::mem::take(&mut mailbox.deltas))
            .unwrap_or_default()
    }

    pub(crate) fn same_group(&self, other: &LinkGroup) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A plot's membership in a group.
#[derive(Debug, Clone)]
pub(crate) struct LinkBinding {
    pub group: LinkGroup,
    pub member: LinkMemberId,
}

impl LinkBinding {
    pub fn join(group: &LinkGroup, additive: bool) -> Self {
        let member = group.register_member(additive);
        tracing::debug!(?member, additive, members = group.len(), "joined link group");
        Self {
            group: group.clone(),
            member,
        }
    }

    pub fn leave(&self) {
        self.group.unregister_member(self.member);
        tracing::debug!(member = ?self.member, "left link group");
    }

    pub fn broadcast(&self, delta: RotationDelta) {
        self.group.broadcast(self.member, delta);
    }

    pub fn drain(&self) -> Vec<RotationDelta> {
        self.group.drain(self.member)
    }

    pub fn set_additive(&self, additive: bool) {
        self.group.set_additive(self.member, additive);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_skips_source() {
        let group = LinkGroup::new();
        let a = group.register_member(false);
        let b = group.register_member(false);
        let c = group.register_member(false);

        group.broadcast(a, RotationDelta { dx: 1.0, dy: 2.0 });
        group.broadcast(a, RotationDelta { dx: 3.0, dy: 0.0 });

        assert!(group.drain(a).is_empty());
        assert_eq!(group.drain(b).len(), 2);
        let c_deltas = group.drain(c);
        assert_eq!(c_deltas[0], RotationDelta { dx: 1.0, dy: 2.0 });
        assert_eq!(c_deltas[1], RotationDelta { dx: 3.0, dy: 0.0 });

        // drained mailboxes are empty until the next broadcast
        assert!(group.drain(b).is_empty());
    }

    #[test]
    fn test_additive_mailbox_holds_one_sum() {
        let group = LinkGroup::new();
        let leader = group.register_member(false);
        let software = group.register_member(true);
        let hardware = group.register_member(false);

        for _ in 0..100 {
            group.broadcast(leader, RotationDelta { dx: 1.0, dy: -0.5 });
        }
        assert_eq!(group.pending(software), 1);
        assert_eq!(group.pending(hardware), 100);
        assert_eq!(
            group.drain(software),
            vec![RotationDelta { dx: 100.0, dy: -50.0 }]
        );
        assert_eq!(group.pending(software), 0);

        // switching to additive folds the backlog
        group.set_additive(hardware, true);
        assert_eq!(group.pending(hardware), 1);
        assert_eq!(
            group.drain(hardware),
            vec![RotationDelta { dx: 100.0, dy: -50.0 }]
        );
    }

    #[test]
    fn test_removed_members_receive_nothing() {
        let group = LinkGroup::new();
        let a = group.register_member(false);
        let b = group.register_member(false);
        assert_eq!(group.len(), 2);

        group.unregister_member(b);
        group.broadcast(a, RotationDelta { dx: 1.0, dy: 1.0 });
        assert!(group.drain(b).is_empty());
        assert_eq!(group.len(), 1);

        // removing twice is harmless
        group.unregister_member(b);
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_member_ids_are_unique() {
        let group = LinkGroup::new();
        let a = group.register_member(false);
        group.unregister_member(a);
        let b = group.register_member(false);
        assert_ne!(a, b);
        assert!(group.same_group(&group.clone()));
        assert!(!group.same_group(&LinkGroup::new()));
    }
}
