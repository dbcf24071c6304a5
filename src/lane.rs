//! The lane bitset used to classify the urgency of a pending update.
//!
//! There's no prior `Revision`/priority counter to adapt this from directly,
//! so this module is new code written in the surrounding idiom (a small
//! `Copy` newtype wrapping an integer, `Default` deriving to the empty/zero
//! value) rather than ported from an existing file.

use std::ops::{BitOr, BitOrAssign};

/// One bit per urgency class a pending update can carry, plus two modifier
/// bits (`SYNC`, `VIEW_TRANSITION`) that do not participate in ordinary
/// priority resolution.
///
/// Bit order (lowest to highest), matching the external interface's lane
/// encoding: `Default`, `UserBlocking`, `UserVisible`, `Background`, `Sync`,
/// `ViewTransition`.
#[derive(Clone, Copy, Default, Eq, PartialEq)]
pub struct Lanes(u8);

impl Lanes {
    pub const NONE: Lanes = Lanes(0);
    pub const DEFAULT: Lanes = Lanes(1 << 0);
    pub const USER_BLOCKING: Lanes = Lanes(1 << 1);
    pub const USER_VISIBLE: Lanes = Lanes(1 << 2);
    pub const BACKGROUND: Lanes = Lanes(1 << 3);
    pub const SYNC: Lanes = Lanes(1 << 4);
    pub const VIEW_TRANSITION: Lanes = Lanes(1 << 5);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Lanes) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Lanes) -> bool {
        self.0 & other.0 != 0
    }

    /// OR-merges `other` into `self`. Used by `scheduleUpdate`'s coalescing
    /// path and by a reducer hook recording a pending commit.
    pub fn merge(&mut self, other: Lanes) {
        self.0 |= other.0;
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// `lanes → priority`: among the priority bits actually set, resolve to
    /// the *least urgent* one. This is deliberately not "lowest bit position"
    /// arithmetic: `Background` (bit 3) outranks `UserVisible` (bit 2) which
    /// outranks `UserBlocking` (bit 1) in this resolution, the opposite of
    /// their bit positions, so that a batch someone deferred to background
    /// never gets silently promoted just because a more urgent lane is also
    /// set on the same coroutine.
    pub fn resolve_priority(self) -> Option<Priority> {
        if self.contains(Lanes::BACKGROUND) {
            Some(Priority::Background)
        } else if self.contains(Lanes::USER_VISIBLE) {
            Some(Priority::UserVisible)
        } else if self.contains(Lanes::USER_BLOCKING) {
            Some(Priority::UserBlocking)
        } else if self.contains(Lanes::SYNC) {
            Some(Priority::Sync)
        } else if self.contains(Lanes::DEFAULT) {
            Some(Priority::UserBlocking)
        } else {
            None
        }
    }
}

impl BitOr for Lanes {
    type Output = Lanes;
    fn bitor(self, rhs: Lanes) -> Lanes {
        Lanes(self.0 | rhs.0)
    }
}

impl BitOrAssign for Lanes {
    fn bitor_assign(&mut self, rhs: Lanes) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Debug for Lanes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = Vec::new();
        for (bit, name) in [
            (Lanes::DEFAULT, "Default"),
            (Lanes::USER_BLOCKING, "UserBlocking"),
            (Lanes::USER_VISIBLE, "UserVisible"),
            (Lanes::BACKGROUND, "Background"),
            (Lanes::SYNC, "Sync"),
            (Lanes::VIEW_TRANSITION, "ViewTransition"),
        ] {
            if self.contains(bit) {
                names.push(name);
            }
        }
        write!(f, "Lanes({})", names.join("|"))
    }
}

/// The priority a host scheduler actually understands, distinct from the
/// internal lane bitset (several lanes can resolve to the same priority).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Priority {
    UserBlocking,
    UserVisible,
    Background,
    Sync,
}

impl Priority {
    /// `priority → lanes`: a single bit set for the requested priority.
    pub fn lanes(self) -> Lanes {
        match self {
            Priority::UserBlocking => Lanes::USER_BLOCKING,
            Priority::UserVisible => Lanes::USER_VISIBLE,
            Priority::Background => Lanes::BACKGROUND,
            Priority::Sync => Lanes::SYNC,
        }
    }
}

/// `scheduleUpdate`'s options parameter: the priority a pending update
/// resolves to, plus the modifier lanes that ride alongside it without
/// participating in priority resolution themselves.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UpdateOptions {
    pub priority: Priority,
    pub view_transition: bool,
}

impl UpdateOptions {
    pub fn new(priority: Priority) -> UpdateOptions {
        UpdateOptions { priority, view_transition: false }
    }

    pub fn view_transition(priority: Priority) -> UpdateOptions {
        UpdateOptions { priority, view_transition: true }
    }

    /// The full lane set this options value resolves to: the priority bit
    /// plus any modifier bits requested.
    pub fn lanes(self) -> Lanes {
        let mut lanes = self.priority.lanes();
        if self.view_transition {
            lanes.merge(Lanes::VIEW_TRANSITION);
        }
        lanes
    }
}

impl From<Priority> for UpdateOptions {
    fn from(priority: Priority) -> UpdateOptions {
        UpdateOptions::new(priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_dominates_uservisible_dominates_userblocking() {
        let lanes = Lanes::USER_BLOCKING | Lanes::BACKGROUND;
        assert_eq!(lanes.resolve_priority(), Some(Priority::Background));

        let lanes = Lanes::USER_BLOCKING | Lanes::USER_VISIBLE;
        assert_eq!(lanes.resolve_priority(), Some(Priority::UserVisible));
    }

    #[test]
    fn merge_is_monotonic_or() {
        let mut lanes = Lanes::NONE;
        lanes.merge(Lanes::USER_BLOCKING);
        lanes.merge(Lanes::BACKGROUND);
        assert!(lanes.contains(Lanes::USER_BLOCKING));
        assert!(lanes.contains(Lanes::BACKGROUND));
    }

    #[test]
    fn empty_lanes_have_no_priority() {
        assert_eq!(Lanes::NONE.resolve_priority(), None);
    }
}
