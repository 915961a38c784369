//! Session snapshot.
//!
//! Only session-level state lives here: a cursor position the host
//! steers with its input. Device memory is not part of the format. The
//! blob is two bytes, x then y, each masked to 0-31 on restore.

use tracing::warn;

use crate::error::{X16Error, X16Result};

pub const SNAPSHOT_SIZE: usize = 2;

const FIELD_MASK: u8 = 0x1F;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SessionState {
    x: u8,
    y: u8,
}

impl SessionState {
    #[must_use]
    pub const fn new(x: u8, y: u8) -> Self {
        Self {
            x: x & FIELD_MASK,
            y: y & FIELD_MASK,
        }
    }

    #[must_use]
    pub const fn x(self) -> u8 {
        self.x
    }

    #[must_use]
    pub const fn y(self) -> u8 {
        self.y
    }

    /// Move the cursor, wrapping at the field width.
    pub fn nudge(&mut self, dx: i8, dy: i8) {
        self.x = self.x.wrapping_add_signed(dx) & FIELD_MASK;
        self.y = self.y.wrapping_add_signed(dy) & FIELD_MASK;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Write the snapshot into the front of `buf`.
    ///
    /// # Errors
    ///
    /// Returns `X16Error::Size` if `buf` is shorter than `SNAPSHOT_SIZE`.
    pub fn serialize(self, buf: &mut [u8]) -> X16Result<()> {
        let Some(out) = buf.get_mut(..SNAPSHOT_SIZE) else {
            return Err(X16Error::Size {
                expected: SNAPSHOT_SIZE,
                actual: buf.len(),
            });
        };
        out.copy_from_slice(&self.to_bytes());
        Ok(())
    }

    #[must_use]
    pub const fn to_bytes(self) -> [u8; SNAPSHOT_SIZE] {
        [self.x, self.y]
    }

    /// Restore from a buffer of exactly `SNAPSHOT_SIZE` bytes. On error the
    /// current state is untouched.
    ///
    /// # Errors
    ///
    /// Returns `X16Error::Size` for any other length.
    pub fn deserialize(&mut self, buf: &[u8]) -> X16Result<()> {
        *self = Self::from_bytes(buf)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `X16Error::Size` unless `buf` is exactly `SNAPSHOT_SIZE` bytes.
    pub fn from_bytes(buf: &[u8]) -> X16Result<Self> {
        let &[x, y] = buf else {
            warn!(len = buf.len(), "rejected snapshot");
            return Err(X16Error::Size {
                expected: SNAPSHOT_SIZE,
                actual: buf.len(),
            });
        };
        Ok(Self::new(x, y))
    }
}
