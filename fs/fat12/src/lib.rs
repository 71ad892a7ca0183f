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

use log::error;
use pika_ds::{BlockDevice, SECTOR_SIZE};
use pika_fs::{Attributes, Entry, Error, FsError, IoError, Result, Whence};
use zerocopy::{
    little_endian::{U16, U32},
    FromBytes, FromZeros, IntoBytes, KnownLayout,
};

/// First byte of a directory slot past which no further slots are in use.
const ENTRY_TERMINATOR: u8 = 0x00;
/// First byte of a directory slot whose file has been deleted.
const ENTRY_DELETED: u8 = 0xE5;

const ATTR_READ_ONLY: u8 = 0x01;
const ATTR_HIDDEN: u8 = 0x02;
const ATTR_SYSTEM: u8 = 0x04;
const ATTR_DIRECTORY: u8 = 0x10;
const ATTR_ARCHIVE: u8 = 0x20;

/// FAT12 entry values inside this range point at the next cluster of a
/// chain. Everything outside terminates the chain: 0x000 free, 0x001
/// reserved, 0xFF7 bad, 0xFF8..=0xFFF end of chain.
const FAT_DATA_MIN: u16 = 0x002;
const FAT_DATA_MAX: u16 = 0xFEF;

/// An opened FAT12 volume.
///
/// Opening reads the boot sector, derives the region layout, and loads the
/// file allocation table; all of it is immutable afterwards. The volume
/// borrows its block device, so the device has to outlive it.
pub struct Volume<'d, D: BlockDevice> {
    device: &'d D,
    /// Sector of the block device where the volume begins. All region
    /// starts below are relative to it.
    first_sector: u64,

    bytes_per_sector: u32,
    sectors_per_cluster: u32,
    root_start: u64,
    sectors_per_root: u32,
    data_start: u64,
    /// Number of usable data clusters; valid cluster numbers are
    /// `2..2 + cluster_count`.
    cluster_count: u32,

    /// Authoritative copy of the file allocation table (the first one; the
    /// second has been checked against it and dropped).
    fat: Vec<u8>,

    oem_name: [u8; 8],
    volume_label: [u8; 11],
    serial_number: u32,
}

impl<'d, D: BlockDevice> Volume<'d, D> {
    /// Open the FAT12 volume starting at `first_sector` of `device`.
    ///
    /// The boot sector is validated before any geometry is derived; a
    /// boot record whose fields cannot describe a well-formed volume is
    /// rejected as [`FsError::Inconsistent`], as is a volume whose two FAT
    /// copies disagree.
    pub fn open(device: &'d D, first_sector: u64) -> Result<Self> {
        let mut boot_sector = BootSector::new_zeroed();
        device.read(first_sector, boot_sector.as_mut_bytes())?;

        let bytes_per_sector = boot_sector.bytes_per_sector.get() as u32;
        if !bytes_per_sector.is_power_of_two() || !(512..=4096).contains(&bytes_per_sector) {
            error!("Bytes per sector ({bytes_per_sector}) shall be a power of 2 within [512, 4096]");
            return Err(Error::Fs(FsError::Inconsistent));
        }
        let sectors_per_cluster = boot_sector.sectors_per_cluster as u32;
        if !sectors_per_cluster.is_power_of_two() || sectors_per_cluster > 128 {
            error!("Sectors per cluster ({sectors_per_cluster}) shall be a power of 2 within [1, 128]");
            return Err(Error::Fs(FsError::Inconsistent));
        }
        let fat_count = boot_sector.fat_count as u32;
        if fat_count != 1 && fat_count != 2 {
            error!("Number of FATs ({fat_count}) shall be 1 or 2");
            return Err(Error::Fs(FsError::Inconsistent));
        }
        let reserved_sectors = boot_sector.reserved_sectors.get() as u32;
        if reserved_sectors == 0 {
            error!("Reserved sector count shall not be 0");
            return Err(Error::Fs(FsError::Inconsistent));
        }
        let sectors_per_fat = boot_sector.sectors_per_fat.get() as u32;
        if sectors_per_fat == 0 {
            error!("Sectors per FAT shall not be 0");
            return Err(Error::Fs(FsError::Inconsistent));
        }

        // The 16-bit sector total is authoritative unless zero.
        let total_sectors = if boot_sector.logical_sectors16.get() != 0 {
            boot_sector.logical_sectors16.get() as u32
        } else {
            boot_sector.logical_sectors32.get()
        };
        let root_dir_capacity = boot_sector.root_dir_capacity.get() as u32;
        let sectors_per_root = (root_dir_capacity * 32).div_ceil(bytes_per_sector);

        let fat1_start = reserved_sectors as u64;
        let fat2_start = fat1_start + sectors_per_fat as u64;
        let root_start = fat1_start + (fat_count * sectors_per_fat) as u64;
        let data_start = root_start + sectors_per_root as u64;

        let layout_sectors = reserved_sectors + fat_count * sectors_per_fat + sectors_per_root;
        if total_sectors < layout_sectors {
            error!(
                "Sector total ({total_sectors}) shall cover the reserved, FAT and root directory regions ({layout_sectors})"
            );
            return Err(Error::Fs(FsError::Inconsistent));
        }
        let cluster_count = (total_sectors - layout_sectors) / sectors_per_cluster;

        let device_sectors = (bytes_per_sector as usize / SECTOR_SIZE) as u64;
        let fat_bytes = (sectors_per_fat * bytes_per_sector) as usize;
        let mut fat = vec![0u8; fat_bytes];
        device.read(first_sector + fat1_start * device_sectors, &mut fat)?;
        if fat_count == 2 {
            let mut fat_mirror = vec![0u8; fat_bytes];
            device.read(first_sector + fat2_start * device_sectors, &mut fat_mirror)?;
            if fat != fat_mirror {
                error!("FAT copies shall be identical");
                return Err(Error::Fs(FsError::Inconsistent));
            }
        }

        Ok(Self {
            device,
            first_sector,
            bytes_per_sector,
            sectors_per_cluster,
            root_start,
            sectors_per_root,
            data_start,
            cluster_count,
            fat,
            oem_name: boot_sector.oem_name,
            volume_label: boot_sector.volume_label,
            serial_number: boot_sector.serial_number.get(),
        })
    }

    /// Open a directory for enumeration. Only the root directory exists on
    /// FAT12 as a fixed region, and only the root path literals `"/"` and
    /// `"\\"` are accepted.
    ///
    /// The whole root region is snapshotted into the returned handle; the
    /// region is capped at a few kilobytes by the 16-bit slot capacity.
    pub fn open_dir(&self, path: &str) -> Result<RootDir> {
        if path != "/" && path != "\\" {
            return Err(Error::Fs(FsError::NotFound));
        }

        let mut slots = vec![0u8; (self.sectors_per_root * self.bytes_per_sector) as usize];
        self.read_sectors(self.root_start, &mut slots)?;
        Ok(RootDir {
            slots,
            position: 0,
            exhausted: false,
        })
    }

    /// Open the root directory entry named `name` (byte-exact match of the
    /// reconstructed 8.3 form) for reading.
    pub fn open_file(&self, name: &str) -> Result<File<'_, 'd, D>> {
        let entry = self
            .open_dir("/")?
            .find(|entry| entry.name == name)
            .ok_or(Error::Fs(FsError::NotFound))?;
        if entry.is_directory() {
            return Err(Error::Fs(FsError::IsDirectory));
        }

        let chain = self.cluster_chain(entry.first_cluster)?;
        Ok(File {
            volume: self,
            chain,
            size: entry.size,
            position: 0,
        })
    }

    /// Collect the cluster chain seeded at `first_cluster`.
    ///
    /// A seed outside the data region yields an empty chain (directory
    /// entries of zero-length files carry cluster 0). Chains that leave the
    /// data region or exceed the cluster count of the volume (a cycle, on a
    /// well-formed FAT an impossibility) are rejected.
    fn cluster_chain(&self, first_cluster: u16) -> Result<Vec<u16>> {
        let cluster_limit = 2 + self.cluster_count;
        if (first_cluster as u32) < 2 || first_cluster as u32 >= cluster_limit {
            return Ok(Vec::new());
        }

        let mut chain = Vec::new();
        for cluster in FatEntries::new(&self.fat, first_cluster) {
            if cluster as u32 >= cluster_limit {
                error!("Cluster {cluster} shall lie within the {} data clusters", self.cluster_count);
                return Err(Error::Fs(FsError::Inconsistent));
            }
            if chain.len() >= self.cluster_count as usize {
                error!("Cluster chain shall not exceed the {} clusters of the volume", self.cluster_count);
                return Err(Error::Fs(FsError::Inconsistent));
            }
            chain.push(cluster);
        }
        Ok(chain)
    }

    /// Read whole volume sectors into `buffer`, translating to the 512-byte
    /// granularity of the block device.
    fn read_sectors(&self, volume_sector: u64, buffer: &mut [u8]) -> Result<()> {
        let device_sectors = (self.bytes_per_sector as usize / SECTOR_SIZE) as u64;
        self.device
            .read(self.first_sector + volume_sector * device_sectors, buffer)
    }

    pub fn bytes_per_sector(&self) -> u32 {
        self.bytes_per_sector
    }

    pub fn sectors_per_cluster(&self) -> u32 {
        self.sectors_per_cluster
    }

    /// Number of usable data clusters.
    pub fn cluster_count(&self) -> u32 {
        self.cluster_count
    }

    /// Capacity of the data region in bytes.
    pub fn available_bytes(&self) -> u64 {
        self.cluster_count as u64 * self.sectors_per_cluster as u64 * self.bytes_per_sector as u64
    }

    /// OEM name from the boot sector, trailing padding removed.
    pub fn oem_name(&self) -> String {
        trim_padding(&self.oem_name)
    }

    /// Volume label from the boot sector, trailing padding removed.
    pub fn volume_label(&self) -> String {
        trim_padding(&self.volume_label)
    }

    pub fn serial_number(&self) -> u32 {
        self.serial_number
    }
}

/// An enumeration cursor over the root directory region, snapshotted at
/// open. Yields live entries only; deleted slots are skipped and the
/// terminator slot ends the iteration for good.
pub struct RootDir {
    slots: Vec<u8>,
    position: usize,
    exhausted: bool,
}

impl Iterator for RootDir {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        if self.exhausted {
            return None;
        }

        while (self.position + 1) * size_of::<DirEntry>() <= self.slots.len() {
            let slot = &self.slots[self.position * size_of::<DirEntry>()..][..size_of::<DirEntry>()];
            let entry = DirEntry::read_from_bytes(slot).unwrap();
            if entry.name[0] == ENTRY_TERMINATOR {
                break;
            }
            self.position += 1;
            if entry.name[0] == ENTRY_DELETED {
                continue;
            }
            return Some(entry.decode());
        }

        self.exhausted = true;
        None
    }
}

/// A read cursor over one file's cluster chain.
///
/// The cursor owns its (possibly empty) chain and borrows the volume it was
/// opened on. Positions are byte offsets; seeking beyond either end is
/// permitted and reads from there return nothing.
pub struct File<'v, 'd, D: BlockDevice> {
    volume: &'v Volume<'d, D>,
    chain: Vec<u16>,
    size: u32,
    position: i64,
}

impl<D: BlockDevice> File<'_, '_, D> {
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    /// Move the cursor and return the new position. The position is not
    /// clamped to the file.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> i64 {
        self.position = match whence {
            Whence::Set => offset,
            Whence::Cur => self.position.saturating_add(offset),
            Whence::End => (self.size as i64).saturating_add(offset),
        };
        self.position
    }

    /// Read up to `elem_count` elements of `elem_size` bytes each into
    /// `buffer`, stopping early at the end of the file.
    ///
    /// Returns the number of COMPLETED elements, `bytes_read / elem_size`;
    /// a trailing partial element is consumed from the cursor but not
    /// counted. `buffer` must hold `elem_size * elem_count` bytes and
    /// neither count may be zero.
    pub fn read(&mut self, buffer: &mut [u8], elem_size: usize, elem_count: usize) -> Result<usize> {
        if elem_size == 0 || elem_count == 0 {
            return Err(Error::Io(IoError::InvalidArgument));
        }
        let wanted = elem_size
            .checked_mul(elem_count)
            .ok_or(Error::Io(IoError::InvalidArgument))?;
        if buffer.len() < wanted {
            return Err(Error::Io(IoError::InvalidArgument));
        }

        let cluster_bytes =
            (self.volume.sectors_per_cluster * self.volume.bytes_per_sector) as i64;
        let mut scratch = vec![0u8; cluster_bytes as usize];
        let mut loaded: Option<usize> = None;
        let mut copied = 0;
        while copied < wanted && self.position >= 0 && (self.position as u64) < self.size as u64 {
            let chain_index = (self.position / cluster_bytes) as usize;
            let Some(&cluster) = self.chain.get(chain_index) else {
                // chain ran out before `size` bytes; treat like end of file
                break;
            };
            if loaded != Some(chain_index) {
                let cluster_start = self.volume.data_start
                    + (cluster as u64 - 2) * self.volume.sectors_per_cluster as u64;
                self.volume.read_sectors(cluster_start, &mut scratch)?;
                loaded = Some(chain_index);
            }

            let cluster_offset = (self.position % cluster_bytes) as usize;
            let run = (wanted - copied)
                .min(cluster_bytes as usize - cluster_offset)
                .min((self.size as u64 - self.position as u64) as usize);
            buffer[copied..copied + run]
                .copy_from_slice(&scratch[cluster_offset..cluster_offset + run]);
            copied += run;
            self.position += run as i64;
        }

        Ok(copied / elem_size)
    }
}

/// Iterator over a cluster chain as recorded in the 12-bit packed FAT,
/// starting at (and always yielding) the seed cluster.
struct FatEntries<'a> {
    fat: &'a [u8],
    next: Option<u16>,
}

impl<'a> FatEntries<'a> {
    fn new(fat: &'a [u8], first_cluster: u16) -> Self {
        Self {
            fat,
            next: Some(first_cluster),
        }
    }
}

impl Iterator for FatEntries<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        let cluster = self.next?;
        self.next = match fat_entry(self.fat, cluster) {
            Some(entry) if (FAT_DATA_MIN..=FAT_DATA_MAX).contains(&entry) => Some(entry),
            _ => None,
        };
        Some(cluster)
    }
}

/// Decode the 12-bit FAT entry at `index`: the entry spans the two bytes at
/// offset `index * 3 / 2`, split on a nibble. Even indices take the low
/// byte plus the low nibble of the high byte, odd indices the high nibble
/// of the low byte plus the high byte.
fn fat_entry(fat: &[u8], index: u16) -> Option<u16> {
    let offset = index as usize + (index as usize >> 1);
    let lo = *fat.get(offset)? as u16;
    let hi = *fat.get(offset + 1)? as u16;
    Some(if index & 1 == 0 {
        (hi & 0x0F) << 8 | lo
    } else {
        hi << 4 | lo >> 4
    })
}

/// Recombine the space-padded name and extension fields of a directory
/// entry into the `NAME.EXT` form. The name ends at its first padding
/// space; the dot only appears when the extension is non-empty.
fn reconstruct_name(name: &[u8; 8], extension: &[u8; 3]) -> String {
    let name_len = name.iter().position(|&c| c == b' ').unwrap_or(name.len());
    let ext_len = extension
        .iter()
        .position(|&c| c == b' ' || c == 0)
        .unwrap_or(extension.len());

    let mut raw = Vec::with_capacity(name_len + 1 + ext_len);
    raw.extend_from_slice(&name[..name_len]);
    if ext_len > 0 {
        raw.push(b'.');
        raw.extend_from_slice(&extension[..ext_len]);
    }
    String::from_utf8_lossy(&raw).into_owned()
}

fn trim_padding(raw: &[u8]) -> String {
    let end = raw
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |index| index + 1);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, KnownLayout)]
struct BootSector {
    /// Jump instruction to the boot code; not interpreted.
    jump_code: [u8; 3],
    /// Name of the system that formatted the volume; informational only.
    oem_name: [u8; 8],

    /// Count of bytes per sector: 512, 1024, 2048 or 4096.
    bytes_per_sector: U16,
    /// Number of sectors per allocation unit, a power of 2 within
    /// [1, 128].
    sectors_per_cluster: u8,
    /// Number of sectors in the reserved region, starting at the first
    /// sector of the volume (which holds this boot sector). Never 0.
    reserved_sectors: U16,
    /// Count of file allocation tables. 2 on practically every volume; a
    /// single FAT is permitted but loses the redundancy check.
    fat_count: u8,
    /// Count of 32-byte entry slots the root directory region is sized
    /// for. The slot bytes are an even multiple of the sector size on
    /// well-formed volumes.
    root_dir_capacity: U16,
    /// 16-bit total count of sectors in all four regions of the volume;
    /// 0 if and only if the count does not fit and `logical_sectors32`
    /// holds it instead.
    logical_sectors16: U16,
    /// Media descriptor; legacy, mirrored in the low byte of FAT[0].
    media_descriptor: u8,
    /// Count of sectors occupied by ONE FAT.
    sectors_per_fat: U16,

    /// CHS geometry for interrupt 0x13; not interpreted.
    chs_sectors_per_track: U16,
    chs_heads: U16,
    /// Count of sectors preceding this volume on partitioned media.
    hidden_sectors: U32,
    /// 32-bit sector total, authoritative when `logical_sectors16` is 0.
    logical_sectors32: U32,

    /// Interrupt 0x13 drive number.
    drive_number: u8,
    reserved: u8,
    /// 0x29 when the serial number, label and type fields below are
    /// present.
    ext_boot_signature: u8,
    /// Volume serial number, typically derived from the format time.
    serial_number: U32,
    /// Volume label, matching the label entry of the root directory;
    /// "NO NAME    " when unset.
    volume_label: [u8; 11],
    /// "FAT12   " and friends; informational, does not determine the FAT
    /// type.
    fs_type_label: [u8; 8],

    boot_code: [u8; 448],
    /// 0x55 0xAA.
    signature_word: [u8; 2],
}

#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, KnownLayout)]
struct DirEntry {
    /// Space-padded base name. The first byte doubles as the slot
    /// sentinel: 0x00 terminates the directory, 0xE5 marks a deleted
    /// slot.
    name: [u8; 8],
    /// Space-padded extension.
    extension: [u8; 3],
    /// ATTR_* flag byte.
    attributes: u8,
    reserved: u8,
    /// Creation stamp, tenths of a second.
    creation_time_tenths: u8,
    /// Timestamps; carried but not interpreted.
    creation_time: U16,
    creation_date: U16,
    access_date: U16,
    /// High word of the first cluster; always 0 on FAT12 and ignored.
    first_cluster_high: U16,
    modification_time: U16,
    modification_date: U16,
    /// Low word of the first cluster, the seed of the entry's chain.
    first_cluster_low: U16,
    /// Size in bytes.
    size: U32,
}

impl DirEntry {
    fn decode(&self) -> Entry {
        Entry {
            name: reconstruct_name(&self.name, &self.extension),
            size: self.size.get(),
            first_cluster: self.first_cluster_low.get(),
            attributes: Attributes {
                read_only: self.attributes & ATTR_READ_ONLY != 0,
                hidden: self.attributes & ATTR_HIDDEN != 0,
                system: self.attributes & ATTR_SYSTEM != 0,
                directory: self.attributes & ATTR_DIRECTORY != 0,
                archive: self.attributes & ATTR_ARCHIVE != 0,
            },
        }
    }
}
