//! Slot identifiers.
//!
//! A slot names one logical timeout. The set of slots is fixed at compile
//! time, either as an enum declared with [`timeout_slots!`](crate::timeout_slots)
//! or as the bounded numeric [`SlotIndex`].

use sched_common::error::{SchedError, SchedResult};
use std::fmt;

/// A compile-time enumerated set of timeout slots.
///
/// Implementors guarantee `index()` is always in `0..COUNT` and that
/// `from_index(slot.index()) == Some(slot)`.
pub trait Slot: Copy + Eq + fmt::Debug {
    /// Number of slots in the set.
    const COUNT: usize;

    /// Position of this slot in the registry.
    fn index(self) -> usize;

    /// Slot at `index`, or `None` if out of range.
    fn from_index(index: usize) -> Option<Self>;
}

/// Numeric slot identifier bounded by `N`.
///
/// For applications that number their timeouts instead of naming them.
/// Out-of-range indices are rejected at construction, so registry
/// operations never see one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotIndex<const N: usize>(usize);

impl<const N: usize> SlotIndex<N> {
    /// Build an index, checked at compile time when used in a const context.
    ///
    /// # Panics
    ///
    /// Panics if `index >= N`.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        assert!(index < N, "slot index out of range");
        Self(index)
    }

    /// Build an index from untrusted input.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::SlotOutOfRange`] if `index >= N`.
    pub const fn try_new(index: usize) -> SchedResult<Self> {
        if index < N {
            Ok(Self(index))
        } else {
            Err(SchedError::SlotOutOfRange { index, count: N })
        }
    }

    /// Raw index.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl<const N: usize> TryFrom<usize> for SlotIndex<N> {
    type Error = SchedError;

    fn try_from(index: usize) -> SchedResult<Self> {
        Self::try_new(index)
    }
}

impl<const N: usize> fmt::Display for SlotIndex<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot[{}]", self.0)
    }
}

impl<const N: usize> Slot for SlotIndex<N> {
    const COUNT: usize = N;

    fn index(self) -> usize {
        self.0
    }

    fn from_index(index: usize) -> Option<Self> {
        Self::try_new(index).ok()
    }
}

/// Declare an enum of named timeout slots.
///
/// Generates the enum, its [`Slot`] implementation, an `ALL` array in
/// index order, a `COUNT` constant usable as a registry size, and
/// `as_str()` / `Display` returning the variant name.
///
/// ```
/// use sched_common::ManualClock;
/// use sched_core::{timeout_slots, TimeoutRegistry};
///
/// timeout_slots! {
///     pub enum AppTimeout {
///         Heartbeat,
///         Retry,
///     }
/// }
///
/// let clock = ManualClock::new(1);
/// let mut registry = TimeoutRegistry::<AppTimeout, { AppTimeout::COUNT }, _>::new(&clock);
/// registry.arm(AppTimeout::Retry, 250);
/// assert!(registry.is_active(AppTimeout::Retry));
/// assert_eq!(AppTimeout::Retry.to_string(), "Retry");
/// ```
#[macro_export]
macro_rules! timeout_slots {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Number of slots.
            pub const COUNT: usize = [$(stringify!($variant)),+].len();

            /// Every slot, in index order.
            pub const ALL: [$name; [$(stringify!($variant)),+].len()] = [$($name::$variant),+];

            /// Variant name.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => stringify!($variant) ),+
                }
            }
        }

        impl $crate::slot::Slot for $name {
            const COUNT: usize = $name::COUNT;

            fn index(self) -> usize {
                self as usize
            }

            fn from_index(index: usize) -> ::core::option::Option<Self> {
                $name::ALL.get(index).copied()
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}
