// Copyright 2025 Pika Contributors
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

pub use pika_err::*;

/// Physical sector granularity of a disk image. File systems on top of a
/// block device may address the volume in larger units, but the device
/// itself always transfers whole 512-byte sectors.
pub const SECTOR_SIZE: usize = 512;

pub trait BlockDevice {
    /// Read `buffer.len() / SECTOR_SIZE` whole sectors starting at
    /// `first_sector`, filling `buffer` completely.
    ///
    /// `buffer.len()` must be a multiple of [`SECTOR_SIZE`]; anything else is
    /// [`IoError::InvalidArgument`]. A read that cannot be satisfied in full
    /// is [`IoError::OutOfRange`], never a short transfer.
    fn read(&self, first_sector: u64, buffer: &mut [u8]) -> Result<()>;
}
