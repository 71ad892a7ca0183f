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

/// A directory entry as surfaced to callers, with the on-disk 8.3 name
/// recombined into its human-readable `NAME.EXT` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Reconstructed name, at most twelve bytes (`NAME8.EXT`). Comparison
    /// against it is byte-exact; case is not normalized.
    pub name: String,
    /// Size in bytes. Directories carry 0 here.
    pub size: u32,
    /// First cluster of the entry's data, seed of its cluster chain.
    pub first_cluster: u16,
    pub attributes: Attributes,
}

impl Entry {
    pub fn is_directory(&self) -> bool {
        self.attributes.directory
    }
}

/// Attribute flags of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attributes {
    pub read_only: bool,
    pub hidden: bool,
    pub system: bool,
    pub directory: bool,
    pub archive: bool,
}

/// Origin of a seek offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// From the start of the file.
    Set,
    /// From the current position.
    Cur,
    /// From the end of the file.
    End,
}
