//! Collector state word
//!
//! The barriers branch on a single byte of collector state, set and
//! cleared by the collector at phase transitions:
//!
//! ```text
//! bit 0  MARKING        concurrent marking active, SATB logging required
//! bit 1  HAS_FORWARDED  some objects may be forwarded, slots may need healing
//! bit 2  EVACUATION     collection-set objects are being relocated
//! ```
//!
//! Updates use `AcqRel` read-modify-write; barrier reads use `Acquire`, so
//! a mutator that sees a flag also sees whatever the collector published
//! before setting it (collection-set membership, forwarding words).

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Collector phase flags
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct GcStateFlags(u8);

impl GcStateFlags {
    pub const IDLE: GcStateFlags = GcStateFlags(0);
    pub const MARKING: GcStateFlags = GcStateFlags(1 << 0);
    pub const HAS_FORWARDED: GcStateFlags = GcStateFlags(1 << 1);
    pub const EVACUATION: GcStateFlags = GcStateFlags(1 << 2);

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: GcStateFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn union(self, other: GcStateFlags) -> GcStateFlags {
        GcStateFlags(self.0 | other.0)
    }

    #[inline]
    pub const fn is_idle(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for GcStateFlags {
    type Output = GcStateFlags;

    fn bitor(self, rhs: GcStateFlags) -> GcStateFlags {
        self.union(rhs)
    }
}

impl fmt::Debug for GcStateFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_idle() {
            return write!(f, "IDLE");
        }
        let names = [
            (GcStateFlags::MARKING, "MARKING"),
            (GcStateFlags::HAS_FORWARDED, "HAS_FORWARDED"),
            (GcStateFlags::EVACUATION, "EVACUATION"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Shared collector state
#[derive(Debug, Default)]
pub struct GcState {
    bits: AtomicU8,
}

impl GcState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current flags
    #[inline]
    pub fn load(&self) -> GcStateFlags {
        GcStateFlags(self.bits.load(Ordering::Acquire))
    }

    /// Is any of `flags` set
    #[inline]
    pub fn is_any(&self, flags: GcStateFlags) -> bool {
        self.bits.load(Ordering::Acquire) & flags.bits() != 0
    }

    /// Set or clear `flags`, returning the previous state
    pub fn set(&self, flags: GcStateFlags, value: bool) -> GcStateFlags {
        let previous = if value {
            self.bits.fetch_or(flags.bits(), Ordering::AcqRel)
        } else {
            self.bits.fetch_and(!flags.bits(), Ordering::AcqRel)
        };
        GcStateFlags(previous)
    }

    #[inline]
    pub fn is_marking(&self) -> bool {
        self.is_any(GcStateFlags::MARKING)
    }

    #[inline]
    pub fn has_forwarded(&self) -> bool {
        self.is_any(GcStateFlags::HAS_FORWARDED)
    }

    #[inline]
    pub fn is_evacuating(&self) -> bool {
        self.is_any(GcStateFlags::EVACUATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear() {
        let state = GcState::new();
        assert!(state.load().is_idle());

        let previous = state.set(GcStateFlags::MARKING | GcStateFlags::HAS_FORWARDED, true);
        assert!(previous.is_idle());
        assert!(state.is_marking());
        assert!(state.has_forwarded());
        assert!(!state.is_evacuating());

        state.set(GcStateFlags::MARKING, false);
        assert!(!state.is_marking());
        assert!(state.has_forwarded());
    }

    #[test]
    fn test_debug_lists_flags() {
        let flags = GcStateFlags::MARKING | GcStateFlags::EVACUATION;
        assert_eq!(format!("{:?}", flags), "MARKING | EVACUATION");
        assert_eq!(format!("{:?}", GcStateFlags::IDLE), "IDLE");
    }
}
