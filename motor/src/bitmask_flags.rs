//! Bit sets for waypoint tags.
//!
//! A tag enum declared through [`define_bitmask_flags!`] uses its discriminant as the bit index,
//! e.g. [`WaypointFlag`](crate::path::WaypointFlag) stored in a `BitmaskFlags<u8>`.

use num_traits::{One, PrimInt};

/// Implemented by tag enums declared with [`define_bitmask_flags!`].
pub trait FlagBitmask {
    type Storage: PrimInt;

    fn bit_index(&self) -> u8;

    fn mask(&self) -> Self::Storage {
        // NOTE: `bit_index()` must be < number of bits in `Storage`.
        Self::Storage::one() << (self.bit_index() as usize)
    }
}

#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub struct BitmaskFlags<T: PrimInt> {
    pub bits: T,
}

impl<T: PrimInt> BitmaskFlags<T> {
    pub fn add<U: FlagBitmask<Storage = T>>(&mut self, tag: U) {
        self.bits = self.bits | tag.mask();
    }

    pub fn has<U: FlagBitmask<Storage = T>>(&self, tag: U) -> bool {
        (self.bits & tag.mask()) != T::zero()
    }

    /// True when at least one of `tags` is set; an empty slice matches nothing.
    pub fn has_any<U: FlagBitmask<Storage = T> + Copy>(&self, tags: &[U]) -> bool {
        let wanted = tags.iter().fold(T::zero(), |acc, t| acc | t.mask());
        (self.bits & wanted) != T::zero()
    }
}

/// Declare a `#[repr(u8)]` tag enum and implement `FlagBitmask` for it.
#[macro_export]
macro_rules! define_bitmask_flags {
    ($(#[$meta:meta])* $name:ident, $storage:ty, { $($(#[$vmeta:meta])* $variant:ident),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vmeta])* $variant),*
        }

        impl $crate::bitmask_flags::FlagBitmask for $name {
            type Storage = $storage;

            fn bit_index(&self) -> u8 {
                *self as u8
            }
        }
    };
}
