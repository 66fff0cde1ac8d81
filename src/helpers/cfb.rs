//! OLE Compound File Binary (CFB) reader.
//!
//! Legacy `.xls` workbooks keep their BIFF8 stream in a compound file, and
//! password protected OOXML packages are wrapped in one as well.

use crate::helpers::bytes::decode_utf16;
use crate::helpers::bytes::u16_at;
use crate::helpers::bytes::u32_at;
use crate::helpers::bytes::u32_iter;
use crate::helpers::bytes::u64_at;
use crate::spreadsheet::SpreadsheetError;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use thiserror::Error;

/// Sector ids above this mark free sectors and chain ends
const MAX_REG_SECT: u32 = 0xFFFF_FFFA;
const HEADER_SIZE: usize = 512;
const SIGNATURE: u64 = 0xE11A_B1A1_E011_CFD0;
const MINI_SECTOR_SIZE: usize = 64;
const DIRECTORY_ENTRY_SIZE: usize = 128;
const ROOT_ENTRY: u8 = 5;

/// Errors specific to compound file parsing
#[derive(Error, Debug)]
pub enum CfbError {
    #[error("The file is corrupted or has an invalid compound file structure")]
    FileFormatError,

    #[error("Invalid OLE signature (not an office document?)")]
    OleSignatureError,

    #[error("Invalid sector size '2 ^ {1}' for major version '{0}'")]
    SectorSizeError(u16, u16),

    #[error("Broken sector chain at sector {0}")]
    SectorChainError(u32),

    #[error("Empty root directory")]
    RootDirectoryError,
}

/// An opened compound file, held in memory
pub(crate) struct Cfb {
    /// Streams and storages by name, in directory order
    directories: Vec<(String, Directory)>,
    file_allocation_table: Vec<u32>,
    sectors: Sectors,
    mini_file_allocation_table: Vec<u32>,
    /// Content of the root entry, cut into 64-byte sectors
    mini_sectors: Sectors,
    /// Streams shorter than this live in the mini stream
    mini_stream_cutoff: usize,
}

impl Cfb {
    /// Reads and indexes a whole compound file
    pub(crate) fn new<RS: Read + Seek>(reader: &mut RS) -> Result<Cfb, SpreadsheetError> {
        reader.seek(SeekFrom::Start(0))?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        if data.len() < HEADER_SIZE {
            Err(CfbError::FileFormatError)?
        }

        let header = Header::new(&data[..HEADER_SIZE])?;
        let sector_size = header.sector_size()?;
        let sectors = Sectors {
            data,
            size: sector_size,
            offset: sector_size,
        };
        let file_allocation_table = Self::load_file_allocation_table(&sectors, &header)?;
        let directories = Self::load_directories(&file_allocation_table, &sectors, &header)?;
        let mini_file_allocation_table = if header.mini_file_allocation_table_count > 0 {
            let table = read_chain(&file_allocation_table, &sectors, header.mini_file_allocation_table_start)?;
            u32_iter(&table).collect()
        } else {
            Vec::new()
        };
        let mini_sectors = match directories.first() {
            Some((_, root)) if root.kind == ROOT_ENTRY && root.size > 0 => {
                let mut data = read_chain(&file_allocation_table, &sectors, root.start)?;
                data.truncate(root.size);
                Sectors {
                    data,
                    size: MINI_SECTOR_SIZE,
                    offset: 0,
                }
            }
            _ => Sectors {
                data: Vec::new(),
                size: MINI_SECTOR_SIZE,
                offset: 0,
            },
        };

        Ok(Cfb {
            directories,
            file_allocation_table,
            sectors,
            mini_file_allocation_table,
            mini_sectors,
            mini_stream_cutoff: header.mini_stream_cutoff,
        })
    }

    /// Looks an entry up by name; names compare case-insensitively
    fn directory(&self, name: &str) -> Option<&Directory> {
        self.directories
            .iter()
            .find(|(entry, _)| entry.eq_ignore_ascii_case(name))
            .map(|(_, directory)| directory)
    }

    /// Checks if a stream or storage exists
    pub(crate) fn exists(&self, name: &str) -> bool {
        self.directory(name).is_some()
    }

    /// Reads the content of a stream, None when it does not exist
    pub(crate) fn read(&self, name: &str) -> Result<Option<Vec<u8>>, SpreadsheetError> {
        let Some(directory) = self.directory(name) else {
            return Ok(None);
        };
        let mut bytes = if directory.size < self.mini_stream_cutoff {
            read_chain(&self.mini_file_allocation_table, &self.mini_sectors, directory.start)?
        } else {
            read_chain(&self.file_allocation_table, &self.sectors, directory.start)?
        };
        if bytes.len() < directory.size {
            Err(CfbError::FileFormatError)?
        }
        bytes.truncate(directory.size);
        Ok(Some(bytes))
    }

    /// Collects the file allocation table from the sectors the DIFAT lists
    fn load_file_allocation_table(sectors: &Sectors, header: &Header) -> Result<Vec<u32>, SpreadsheetError> {
        // The header holds the first 109 DIFAT entries, further ones are chained
        let mut difat: Vec<u32> = u32_iter(&sectors.data[76..HEADER_SIZE]).collect();
        let mut index = header.difat_start;
        let mut count = 0usize;
        while index <= MAX_REG_SECT {
            if count >= header.difat_count.max(1) * 2 + sectors.count() {
                Err(CfbError::SectorChainError(index))?
            }
            difat.extend(u32_iter(sectors.get(index)?));
            index = difat.pop().ok_or(CfbError::SectorChainError(index))?;
            count += 1;
        }

        let mut file_allocation_table = Vec::new();
        for index in difat.into_iter().filter(|index| *index <= MAX_REG_SECT) {
            file_allocation_table.extend(u32_iter(sectors.get(index)?));
        }
        if file_allocation_table.is_empty() {
            Err(CfbError::FileFormatError)?
        }
        Ok(file_allocation_table)
    }

    fn load_directories(
        file_allocation_table: &[u32],
        sectors: &Sectors,
        header: &Header,
    ) -> Result<Vec<(String, Directory)>, SpreadsheetError> {
        let bytes = read_chain(file_allocation_table, sectors, header.directory_start)?;
        let directories: Vec<(String, Directory)> = bytes
            .chunks_exact(DIRECTORY_ENTRY_SIZE)
            .filter_map(|entry| Directory::new(entry, header.major_version))
            .collect();
        match directories.first() {
            Some((_, root)) if root.kind == ROOT_ENTRY => Ok(directories),
            _ => Err(CfbError::RootDirectoryError)?,
        }
    }
}

/// Follows a sector chain and concatenates the sectors
fn read_chain(table: &[u32], sectors: &Sectors, start: u32) -> Result<Vec<u8>, SpreadsheetError> {
    let mut content = Vec::new();
    let mut index = start;
    let mut steps = 0usize;
    while index <= MAX_REG_SECT {
        if steps > table.len() {
            Err(CfbError::SectorChainError(index))?
        }
        content.extend_from_slice(sectors.get(index)?);
        index = *table
            .get(index as usize)
            .ok_or(CfbError::SectorChainError(index))?;
        steps += 1;
    }
    Ok(content)
}

/// Fixed-size sectors laid out after an optional header
struct Sectors {
    data: Vec<u8>,
    size: usize,
    /// Position of sector 0
    offset: usize,
}

impl Sectors {
    fn get(&self, index: u32) -> Result<&[u8], CfbError> {
        let start = (index as usize)
            .checked_mul(self.size)
            .and_then(|start| start.checked_add(self.offset))
            .filter(|start| *start < self.data.len())
            .ok_or(CfbError::SectorChainError(index))?;
        let end = self.data.len().min(start + self.size);
        Ok(&self.data[start..end])
    }

    fn count(&self) -> usize {
        self.data.len().saturating_sub(self.offset) / self.size
    }
}

/// Compound file header fields
struct Header {
    major_version: u16,
    sector_shift: u16,
    directory_start: u32,
    mini_stream_cutoff: usize,
    mini_file_allocation_table_start: u32,
    mini_file_allocation_table_count: usize,
    difat_start: u32,
    difat_count: usize,
}

impl Header {
    fn new(data: &[u8]) -> Result<Self, CfbError> {
        let field = |at: usize| u32_at(data, at).ok_or(CfbError::FileFormatError);
        if u64_at(data, 0) != Some(SIGNATURE) {
            Err(CfbError::OleSignatureError)?
        }
        Ok(Header {
            major_version: u16_at(data, 26).ok_or(CfbError::FileFormatError)?,
            sector_shift: u16_at(data, 30).ok_or(CfbError::FileFormatError)?,
            directory_start: field(48)?,
            mini_stream_cutoff: field(56)? as usize,
            mini_file_allocation_table_start: field(60)?,
            mini_file_allocation_table_count: field(64)? as usize,
            difat_start: field(68)?,
            difat_count: field(72)? as usize,
        })
    }

    fn sector_size(&self) -> Result<usize, CfbError> {
        match (self.major_version, self.sector_shift) {
            (3, 9) => Ok(512),
            // Version 4 pads the 512-byte header to a whole 4096-byte sector
            (4, 12) => Ok(4096),
            (version, shift) => Err(CfbError::SectorSizeError(version, shift)),
        }
    }
}

/// A directory entry: where a stream starts and how long it is
#[derive(Debug)]
struct Directory {
    kind: u8,
    start: u32,
    size: usize,
}

impl Directory {
    /// Parses a 128-byte entry, None for unused slots
    fn new(bytes: &[u8], major_version: u16) -> Option<(String, Directory)> {
        let kind = bytes[66];
        if kind == 0 {
            return None;
        }
        let length = usize::from(u16_at(bytes, 64)?).min(64);
        let name = decode_utf16(&bytes[..length]);
        let name = match name.find('\0') {
            Some(position) => name[..position].to_owned(),
            None => name,
        };
        let start = u32_at(bytes, 116)?;
        let mut size = u64_at(bytes, 120)?;
        if major_version == 3 {
            // Version 3 files may leave garbage in the high half
            size &= 0xFFFF_FFFF;
        }
        let size = usize::try_from(size).ok()?;
        Some((name, Directory { kind, start, size }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
    const FREE_SECT: u32 = 0xFFFF_FFFF;
    const FAT_SECT: u32 = 0xFFFF_FFFD;
    const NO_STREAM: u32 = 0xFFFF_FFFF;
    const SECTOR_SIZE: usize = 512;
    const MINI_STREAM_CUTOFF: usize = 4096;

    fn put_u16(buffer: &mut [u8], at: usize, value: u16) {
        buffer[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn put_u32(buffer: &mut [u8], at: usize, value: u32) {
        buffer[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn pad(bytes: &mut Vec<u8>, size: usize) {
        let length = bytes.len().div_ceil(size) * size;
        bytes.resize(length, 0);
    }

    fn entry(name: &str, kind: u8, start: u32, size: usize, child: u32, right: u32) -> [u8; DIRECTORY_ENTRY_SIZE] {
        let mut entry = [0u8; DIRECTORY_ENTRY_SIZE];
        let units: Vec<u16> = name.encode_utf16().collect();
        for (position, unit) in units.iter().enumerate() {
            put_u16(&mut entry, position * 2, *unit);
        }
        put_u16(&mut entry, 64, ((units.len() + 1) * 2) as u16);
        entry[66] = kind;
        entry[67] = 1;
        put_u32(&mut entry, 68, NO_STREAM);
        put_u32(&mut entry, 72, right);
        put_u32(&mut entry, 76, child);
        put_u32(&mut entry, 116, start);
        put_u32(&mut entry, 120, size as u32);
        entry
    }

    /// Builds a version 3 compound file holding the given streams
    pub(crate) fn compound_file(streams: &[(&str, &[u8])]) -> Vec<u8> {
        // Short streams go to the mini stream
        let mut mini_stream = Vec::<u8>::new();
        let mut mini_fat = Vec::<u32>::new();
        let mut starts = vec![END_OF_CHAIN; streams.len()];
        for (position, (_, content)) in streams.iter().enumerate() {
            if content.is_empty() || content.len() >= MINI_STREAM_CUTOFF {
                continue;
            }
            let first = mini_fat.len();
            let count = content.len().div_ceil(MINI_SECTOR_SIZE);
            for index in 0..count {
                mini_fat.push(if index + 1 < count { (first + index + 1) as u32 } else { END_OF_CHAIN });
            }
            starts[position] = first as u32;
            mini_stream.extend_from_slice(content);
            pad(&mut mini_stream, MINI_SECTOR_SIZE);
        }

        let mut directory = Vec::<u8>::new();
        let mut mini_fat_bytes: Vec<u8> = mini_fat.iter().flat_map(|next| next.to_le_bytes()).collect();
        pad(&mut mini_fat_bytes, SECTOR_SIZE);
        let mut mini_stream_bytes = mini_stream.clone();
        pad(&mut mini_stream_bytes, SECTOR_SIZE);
        let big_streams: Vec<(usize, Vec<u8>)> = streams
            .iter()
            .enumerate()
            .filter(|(_, (_, content))| content.len() >= MINI_STREAM_CUTOFF)
            .map(|(position, (_, content))| {
                let mut bytes = content.to_vec();
                pad(&mut bytes, SECTOR_SIZE);
                (position, bytes)
            })
            .collect();

        let directory_sectors = (streams.len() + 1).div_ceil(SECTOR_SIZE / DIRECTORY_ENTRY_SIZE);
        let other_sectors = directory_sectors
            + mini_fat_bytes.len() / SECTOR_SIZE
            + mini_stream_bytes.len() / SECTOR_SIZE
            + big_streams.iter().map(|(_, bytes)| bytes.len() / SECTOR_SIZE).sum::<usize>();
        let mut fat_sectors = 1;
        while fat_sectors * (SECTOR_SIZE / 4) < fat_sectors + other_sectors {
            fat_sectors += 1;
        }

        let mut fat = vec![FREE_SECT; fat_sectors * (SECTOR_SIZE / 4)];
        fat[..fat_sectors].fill(FAT_SECT);
        let mut next = fat_sectors;
        let mut allocate = |count: usize| -> u32 {
            if count == 0 {
                return END_OF_CHAIN;
            }
            let first = next;
            for index in first..first + count {
                fat[index] = if index + 1 < first + count { (index + 1) as u32 } else { END_OF_CHAIN };
            }
            next += count;
            first as u32
        };
        let directory_start = allocate(directory_sectors);
        let mini_fat_start = allocate(mini_fat_bytes.len() / SECTOR_SIZE);
        let mini_stream_start = allocate(mini_stream_bytes.len() / SECTOR_SIZE);
        for (position, bytes) in &big_streams {
            starts[*position] = allocate(bytes.len() / SECTOR_SIZE);
        }

        let child = if streams.is_empty() { NO_STREAM } else { 1 };
        directory.extend_from_slice(&entry("Root Entry", ROOT_ENTRY, mini_stream_start, mini_stream.len(), child, NO_STREAM));
        for (position, (name, content)) in streams.iter().enumerate() {
            let right = if position + 1 < streams.len() { (position + 2) as u32 } else { NO_STREAM };
            directory.extend_from_slice(&entry(name, 2, starts[position], content.len(), NO_STREAM, right));
        }
        pad(&mut directory, SECTOR_SIZE);

        let mut header = vec![0u8; HEADER_SIZE];
        header[..8].copy_from_slice(&SIGNATURE.to_le_bytes());
        put_u16(&mut header, 24, 0x003E);
        put_u16(&mut header, 26, 3);
        put_u16(&mut header, 28, 0xFFFE);
        put_u16(&mut header, 30, 9);
        put_u16(&mut header, 32, 6);
        put_u32(&mut header, 44, fat_sectors as u32);
        put_u32(&mut header, 48, directory_start);
        put_u32(&mut header, 56, MINI_STREAM_CUTOFF as u32);
        put_u32(&mut header, 60, mini_fat_start);
        put_u32(&mut header, 64, (mini_fat_bytes.len() / SECTOR_SIZE) as u32);
        put_u32(&mut header, 68, END_OF_CHAIN);
        for slot in 0..109 {
            let value = if slot < fat_sectors { slot as u32 } else { FREE_SECT };
            put_u32(&mut header, 76 + slot * 4, value);
        }

        let mut file = header;
        file.extend(fat.iter().flat_map(|next| next.to_le_bytes()));
        file.extend(directory);
        file.extend(mini_fat_bytes);
        file.extend(mini_stream_bytes);
        for (_, bytes) in big_streams {
            file.extend(bytes);
        }
        file
    }

    #[test]
    fn reads_short_and_long_streams() {
        let short = b"short stream content".to_vec();
        let long: Vec<u8> = (0..5000u32).map(|value| (value % 251) as u8).collect();
        let bytes = compound_file(&[("Workbook", &long), ("\u{5}SummaryInformation", &short), ("Empty", &[])]);
        let cfb = Cfb::new(&mut Cursor::new(bytes)).unwrap();

        assert!(cfb.exists("Workbook"));
        assert!(cfb.exists("workbook"));
        assert!(!cfb.exists("Book"));
        assert_eq!(cfb.read("Workbook").unwrap(), Some(long));
        assert_eq!(cfb.read("\u{5}SummaryInformation").unwrap(), Some(short));
        assert_eq!(cfb.read("Empty").unwrap(), Some(Vec::new()));
        assert_eq!(cfb.read("Missing").unwrap(), None);
    }

    #[test]
    fn rejects_non_compound_files() {
        let result = Cfb::new(&mut Cursor::new(b"PK\x03\x04".to_vec()));
        assert!(matches!(result, Err(SpreadsheetError::CfbError(CfbError::FileFormatError))));

        let result = Cfb::new(&mut Cursor::new(vec![0u8; 1024]));
        assert!(matches!(result, Err(SpreadsheetError::CfbError(CfbError::OleSignatureError))));
    }

    #[test]
    fn rejects_cyclic_chains() {
        let mut bytes = compound_file(&[("Workbook", &[7u8; 4096])]);
        // Point the last workbook sector back to its first one
        let fat_entry = |sector: usize| HEADER_SIZE + sector * 4;
        let first = u32_at(&bytes, HEADER_SIZE + SECTOR_SIZE + DIRECTORY_ENTRY_SIZE + 116).unwrap() as usize;
        put_u32(&mut bytes, fat_entry(first + 7), first as u32);
        let cfb = Cfb::new(&mut Cursor::new(bytes)).unwrap();
        assert!(matches!(cfb.read("Workbook"), Err(SpreadsheetError::CfbError(CfbError::SectorChainError(_)))));
    }

    #[test]
    fn rejects_bad_sector_size() {
        let mut bytes = compound_file(&[("Workbook", b"x")]);
        put_u16(&mut bytes, 30, 10);
        let result = Cfb::new(&mut Cursor::new(bytes));
        assert!(matches!(result, Err(SpreadsheetError::CfbError(CfbError::SectorSizeError(3, 10)))));
    }
}
