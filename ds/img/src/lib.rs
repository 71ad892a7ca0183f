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

use std::{fs::File, io, os::unix::fs::FileExt, path::Path};

use pika_ds::{BlockDevice, Error, IoError, Result, SECTOR_SIZE};

/// A read-only disk image backed by a flat file whose contents are the
/// bit-exact layout of a volume.
///
/// The image file is owned by the handle and released on drop. Positional
/// reads leave no cursor behind, so a single handle can serve interleaved
/// readers as long as the caller serializes access.
pub struct ImageFile {
    file: File,
}

impl ImageFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(|error| match error.kind() {
            io::ErrorKind::NotFound => Error::Io(IoError::NotFound),
            _ => Error::Io(IoError::Other(error)),
        })?;
        Ok(Self { file })
    }
}

impl BlockDevice for ImageFile {
    fn read(&self, first_sector: u64, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() % SECTOR_SIZE != 0 {
            return Err(Error::Io(IoError::InvalidArgument));
        }
        self.file
            .read_exact_at(buffer, first_sector * SECTOR_SIZE as u64)
            .map_err(|error| match error.kind() {
                io::ErrorKind::UnexpectedEof => Error::Io(IoError::OutOfRange),
                _ => Error::Io(IoError::Other(error)),
            })
    }
}
