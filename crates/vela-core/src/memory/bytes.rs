// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Strongly-typed byte counts and power-of-two alignment helpers.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

/// An integral quantity of memory, in bytes.
///
/// `Bytes` never mixes implicitly with raw counts: converting to and from `u64`
/// is always spelled out with [`Bytes::new`] and [`Bytes::count`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Pod,
    Zeroable,
    Serialize,
    Deserialize,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Bytes(u64);

impl Bytes {
    /// Zero bytes.
    pub const ZERO: Self = Self(0);

    /// Wraps a raw byte count.
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    /// `count` kibibytes.
    pub const fn kib(count: u64) -> Self {
        Self(count * 1024)
    }

    /// `count` mebibytes.
    pub const fn mib(count: u64) -> Self {
        Self(count * 1024 * 1024)
    }

    /// The raw number of bytes.
    pub const fn count(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is zero bytes.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Rounds up to the next multiple of `alignment`, which must be a power of two.
    pub const fn align_up(self, alignment: Bytes) -> Self {
        Self(align_up(self.0, alignment.0))
    }

    /// Like [`Bytes::align_up`], but returns `None` if the rounded value does not fit in a `u64`.
    pub const fn checked_align_up(self, alignment: Bytes) -> Option<Self> {
        match checked_align_up(self.0, alignment.0) {
            Some(aligned) => Some(Self(aligned)),
            None => None,
        }
    }

    /// Returns `true` if this value is a multiple of `alignment`.
    pub const fn is_aligned_to(self, alignment: Bytes) -> bool {
        is_aligned(self.0, alignment.0)
    }

    /// Adds two byte counts, returning `None` on overflow.
    pub const fn checked_add(self, other: Bytes) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    /// Subtracts, clamping at zero.
    pub const fn saturating_sub(self, other: Bytes) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Add for Bytes {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Bytes {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Bytes {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Bytes {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Mul<u64> for Bytes {
    type Output = Self;

    fn mul(self, rhs: u64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} B", self.0)
    }
}

/// Rounds `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a non-zero power of two.
#[inline]
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Rounds `value` up to the next multiple of `alignment`, or `None` on overflow.
#[inline]
pub const fn checked_align_up(value: u64, alignment: u64) -> Option<u64> {
    debug_assert!(alignment.is_power_of_two());
    match value.checked_add(alignment - 1) {
        Some(padded) => Some(padded & !(alignment - 1)),
        None => None,
    }
}

/// Returns `true` if `value` is a multiple of `alignment` (a power of two).
#[inline]
pub const fn is_aligned(value: u64, alignment: u64) -> bool {
    debug_assert!(alignment.is_power_of_two());
    value & (alignment - 1) == 0
}
