use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A set of readiness conditions a participant wants on a descriptor.
///
/// Combine flags with `|`:
///
/// ```rust,ignore
/// let both = Interest::READABLE | Interest::WRITABLE;
/// assert!(both.contains(Interest::WRITABLE));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Interest(u8);

impl Interest {
    /// No interest. A descriptor with this mask is not tracked.
    pub const NONE: Interest = Interest(0);

    /// The descriptor can be read without blocking.
    pub const READABLE: Interest = Interest(0b001);

    /// The descriptor can be written without blocking.
    pub const WRITABLE: Interest = Interest(0b010);

    /// The descriptor has an exceptional condition (e.g. out-of-band data).
    pub const EXCEPTIONAL: Interest = Interest(0b100);

    /// Every single flag, in dispatch order.
    pub const FLAGS: [Interest; 3] = [Self::READABLE, Self::WRITABLE, Self::EXCEPTIONAL];

    /// Returns `true` if every flag in `other` is set in `self`.
    pub const fn contains(self, other: Interest) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// Returns `true` if no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `self` with the flags of `other` added.
    pub const fn with(self, other: Interest) -> Interest {
        Interest(self.0 | other.0)
    }

    /// Returns `self` with the flags of `other` removed.
    pub const fn without(self, other: Interest) -> Interest {
        Interest(self.0 & !other.0)
    }

    /// Iterates the individual flags set in `self`.
    pub fn iter(self) -> impl Iterator<Item = Interest> {
        Self::FLAGS.into_iter().filter(move |f| self.contains(*f))
    }
}

impl BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        self.with(rhs)
    }
}

impl BitOrAssign for Interest {
    fn bitor_assign(&mut self, rhs: Interest) {
        *self = self.with(rhs);
    }
}

impl fmt::Debug for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }

        let names: Vec<&str> = self
            .iter()
            .map(|flag| match flag {
                Interest::READABLE => "READABLE",
                Interest::WRITABLE => "WRITABLE",
                _ => "EXCEPTIONAL",
            })
            .collect();

        f.write_str(&names.join(" | "))
    }
}
