//! OLE Compound File Binary (CFB) container reader.
//! Legacy `.xls` workbooks keep their BIFF8 record stream in a `Workbook`
//! (or `Book`) entry of this container.

use crate::error::SheetError;
use crate::helpers::string::to_u16;
use crate::helpers::string::to_u64;
use crate::helpers::string::to_usize;
use crate::helpers::string::to_usize_iter;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::ops::Range;
use thiserror::Error;

// Ids above this value are markers (free, end of chain, FAT, DIFAT)
const MAX_REG_SECT: usize = 0xFFFFFFFB;
// Streams below this size live in the mini stream
const MINI_STREAM_CUTOFF: usize = 4096;
const SIGNATURE: u64 = 0xE11A_B1A1_E011_CFD0;

#[derive(Error, Debug)]
pub(crate) enum CfbError {
    #[error("Compound file structure is corrupted")]
    FileFormatError,

    #[error("Not an OLE compound file")]
    OleSignatureError,

    #[error("Unsupported sector shift {1} for version {0}")]
    SectorSizeError(u16, u16),

    #[error("DIFAT has {1} sectors, header declares {0}")]
    DifatCountError(usize, usize),

    #[error("FAT has {1} sectors, header declares {0}")]
    FatCountError(usize, usize),

    #[error("Sector chain is broken at sector '{0}'")]
    SectorChainError(usize),

    #[error("Compound file has no root entry")]
    RootDirectoryError,
}

/// A whole compound file loaded in memory, with its directory indexed by name.
pub(crate) struct Cfb {
    directories: HashMap<String, Directory>,
    fat: Vec<usize>,
    sectors: Sectors,
    minifat: Vec<usize>,
    mini_sectors: Sectors,
}

impl Cfb {
    pub(crate) fn new<RS: Read + Seek>(reader: &mut RS) -> Result<Cfb, SheetError> {
        let size = reader.seek(SeekFrom::End(0))?;
        if size < 512 {
            Err(CfbError::FileFormatError)?;
        }
        reader.seek(SeekFrom::Start(0))?;
        let mut data: Vec<u8> = vec![0u8; size as usize];
        reader.read_exact(&mut data)?;

        let header = Header::new(&data[..512])?;
        let sectors = Sectors { data, size: header.sector_size()? };
        let fat = Self::load_fat(&sectors, &header)?;
        let directories = Self::load_directories(&fat, &sectors, header.directory_shift)?;
        let minifat = Self::load_minifat(&fat, &sectors, &header)?;
        let mini_sectors = match directories.get("Root Entry") {
            Some(root) => Self::load_mini_sectors(&fat, &sectors, root)?,
            None => Sectors { data: Vec::new(), size: 64 },
        };

        Ok(Cfb {
            directories,
            fat,
            sectors,
            minifat,
            mini_sectors,
        })
    }

    pub(crate) fn exists(&self, name: &str) -> bool {
        self.directories.contains_key(name)
    }

    /// Reads a stream entry, `None` when the entry does not exist
    pub(crate) fn read(&self, name: &str) -> Result<Option<Vec<u8>>, SheetError> {
        if let Some(directory) = self.directories.get(name) {
            let mut bytes = if directory.count < MINI_STREAM_CUTOFF {
                Self::read_bytes(&self.minifat, &self.mini_sectors, directory.index)?
            } else {
                Self::read_bytes(&self.fat, &self.sectors, directory.index)?
            };
            bytes.truncate(directory.count);
            Ok(Some(bytes))
        } else {
            Ok(None)
        }
    }

    fn load_fat(sectors: &Sectors, header: &Header) -> Result<Vec<usize>, SheetError> {
        let mut difat = Vec::<usize>::new();
        difat.extend(to_usize_iter(sectors.slice(76..512)?));

        let mut count = 0usize;
        let mut index = header.difat_shift;
        while index < MAX_REG_SECT {
            difat.extend(to_usize_iter(sectors.get(index)?));
            // The last entry of a DIFAT sector chains to the next one
            index = difat.pop().ok_or(CfbError::FileFormatError)?;
            count += 1;
            if count > header.difat_count {
                break;
            }
        }
        if count != header.difat_count {
            Err(CfbError::DifatCountError(header.difat_count, count))?
        }

        let mut fat: Vec<usize> = Vec::new();
        let mut count = 0usize;
        for index in difat {
            if index < MAX_REG_SECT {
                fat.extend(to_usize_iter(sectors.get(index)?));
                count += 1;
            }
        }
        if count != header.fat_count {
            Err(CfbError::FatCountError(header.fat_count, count))?
        }

        Ok(fat)
    }

    fn load_directories(fat: &[usize], sectors: &Sectors, index: usize) -> Result<HashMap<String, Directory>, SheetError> {
        let bytes = Self::read_bytes(fat, sectors, index)?;
        let directories: HashMap<String, Directory> = bytes.chunks_exact(128).map(Directory::new).collect();
        if directories.is_empty() {
            Err(CfbError::RootDirectoryError)?
        }
        Ok(directories)
    }

    fn load_minifat(fat: &[usize], sectors: &Sectors, header: &Header) -> Result<Vec<usize>, SheetError> {
        Ok(if header.minifat_sector_count > 0 {
            let minifat = Self::read_bytes(fat, sectors, header.minifat_sector_shift)?;
            to_usize_iter(&minifat).collect()
        } else {
            Vec::new()
        })
    }

    /// The root entry's stream holds the 64-byte mini sectors
    fn load_mini_sectors(fat: &[usize], sectors: &Sectors, root: &Directory) -> Result<Sectors, SheetError> {
        let mut data = Self::read_bytes(fat, sectors, root.index)?;
        data.truncate(root.count);
        Ok(Sectors { data, size: 64 })
    }

    /// Follows a sector chain from `index` and concatenates its sectors
    fn read_bytes(fat: &[usize], sectors: &Sectors, index: usize) -> Result<Vec<u8>, SheetError> {
        let mut content: Vec<u8> = Vec::new();
        let mut index = index;
        let mut visited = 0usize;
        while index < MAX_REG_SECT {
            content.extend(sectors.get(index)?);
            index = *fat.get(index).ok_or(CfbError::SectorChainError(index))?;
            visited += 1;
            if visited > fat.len() {
                Err(CfbError::SectorChainError(index))?
            }
        }
        Ok(content)
    }
}

/// Raw sector storage; for regular sectors the header occupies the first slot.
#[derive(Debug)]
struct Sectors {
    data: Vec<u8>,
    size: usize,
}

impl Sectors {
    fn get(&self, index: usize) -> Result<&[u8], SheetError> {
        // Mini sectors start at offset 0, regular sectors after the 512-byte header
        let skip = if self.size == 64 { 0 } else { 1 };
        let source = (index + skip) * self.size;
        let target = self.data.len().min(source + self.size);
        if source < target {
            Ok(&self.data[source..target])
        } else {
            Err(CfbError::SectorChainError(index))?
        }
    }

    fn slice(&self, range: Range<usize>) -> Result<&[u8], SheetError> {
        self.data.get(range).ok_or_else(|| CfbError::FileFormatError.into())
    }
}

#[derive(Debug)]
struct Header {
    signature: u64,
    major_version: u16,
    sector_shift: u16,
    fat_count: usize,
    directory_shift: usize,
    minifat_sector_shift: usize,
    minifat_sector_count: usize,
    difat_shift: usize,
    difat_count: usize,
}

impl Header {
    fn new(data: &[u8]) -> Result<Self, SheetError> {
        let header = Header {
            signature: to_u64(&data[0..8]),
            major_version: to_u16(&data[26..28]),
            sector_shift: to_u16(&data[30..32]),
            fat_count: to_usize(&data[44..48]),
            directory_shift: to_usize(&data[48..52]),
            minifat_sector_shift: to_usize(&data[60..64]),
            minifat_sector_count: to_usize(&data[64..68]),
            difat_shift: to_usize(&data[68..72]),
            difat_count: to_usize(&data[72..76]),
        };

        if header.signature != SIGNATURE {
            Err(CfbError::OleSignatureError)?;
        }

        Ok(header)
    }

    fn sector_size(&self) -> Result<usize, SheetError> {
        if self.major_version == 3 && self.sector_shift == 0x0009 {
            Ok(512)
        } else if self.major_version == 4 && self.sector_shift == 0x000C {
            // Version 4 pads the 512-byte header to a full 4096-byte sector
            Ok(4096)
        } else {
            Err(CfbError::SectorSizeError(self.major_version, self.sector_shift))?
        }
    }
}

#[derive(Debug)]
struct Directory {
    index: usize,
    count: usize,
}

impl Directory {
    fn new(bytes: &[u8]) -> (String, Directory) {
        let size = (to_u16(&bytes[64..66]) as usize).min(64);
        let (name, _, _) = UTF_16LE.decode(&bytes[..size]);
        let name = match name.find('\0') {
            Some(position) => name[..position].to_owned(),
            None => name.to_string(),
        };

        let index = to_usize(&bytes[116..120]);
        let count = to_u64(&bytes[120..128]) as usize;
        (name, Directory { index, count })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
    const FREE_SECT: u32 = 0xFFFF_FFFF;
    const FAT_SECT: u32 = 0xFFFF_FFFD;

    fn directory_entry(name: &str, start: u32, size: u64, kind: u8) -> Vec<u8> {
        let mut entry = vec![0u8; 128];
        let units: Vec<u8> = name.encode_utf16().chain([0]).flat_map(u16::to_le_bytes).collect();
        entry[..units.len()].copy_from_slice(&units);
        entry[64..66].copy_from_slice(&(units.len() as u16).to_le_bytes());
        entry[66] = kind;
        entry[116..120].copy_from_slice(&start.to_le_bytes());
        entry[120..128].copy_from_slice(&size.to_le_bytes());
        entry
    }

    /// Builds a version 3 compound file holding one regular-sized stream.
    pub(crate) fn compound_file(stream_name: &str, stream: &[u8]) -> Vec<u8> {
        let mut stream = stream.to_vec();
        if stream.len() < MINI_STREAM_CUTOFF {
            stream.resize(MINI_STREAM_CUTOFF, 0);
        }
        let stream_sectors = stream.len().div_ceil(512);

        let mut header = vec![0u8; 512];
        header[0..8].copy_from_slice(&SIGNATURE.to_le_bytes());
        header[24..26].copy_from_slice(&0x003Eu16.to_le_bytes());
        header[26..28].copy_from_slice(&3u16.to_le_bytes());
        header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
        header[30..32].copy_from_slice(&9u16.to_le_bytes());
        header[32..34].copy_from_slice(&6u16.to_le_bytes());
        header[44..48].copy_from_slice(&1u32.to_le_bytes());
        header[48..52].copy_from_slice(&1u32.to_le_bytes());
        header[56..60].copy_from_slice(&(MINI_STREAM_CUTOFF as u32).to_le_bytes());
        header[60..64].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
        header[68..72].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
        for slot in header[76..512].chunks_exact_mut(4) {
            slot.copy_from_slice(&FREE_SECT.to_le_bytes());
        }
        header[76..80].copy_from_slice(&0u32.to_le_bytes());

        // Sector 0: FAT, sector 1: directory, sectors 2..: the stream
        let mut fat = vec![FAT_SECT, END_OF_CHAIN];
        for sector in 0..stream_sectors {
            let id = 2 + sector as u32;
            fat.push(if sector + 1 == stream_sectors { END_OF_CHAIN } else { id + 1 });
        }
        assert!(fat.len() <= 128, "test stream too large for a single FAT sector");
        fat.resize(128, FREE_SECT);

        let mut directory = Vec::new();
        directory.extend(directory_entry("Root Entry", END_OF_CHAIN, 0, 5));
        directory.extend(directory_entry(stream_name, 2, stream.len() as u64, 2));
        directory.resize(512, 0);

        let mut file = header;
        file.extend(fat.iter().flat_map(|id| id.to_le_bytes()));
        file.extend(directory);
        file.extend(&stream);
        file.resize(512 * (3 + stream_sectors), 0);
        file
    }

    #[test]
    fn reads_regular_stream() {
        let payload: Vec<u8> = (0..5000u32).map(|value| (value % 251) as u8).collect();
        let file = compound_file("Workbook", &payload);
        let cfb = Cfb::new(&mut Cursor::new(file)).unwrap();
        assert!(cfb.exists("Workbook"));
        assert!(!cfb.exists("EncryptedPackage"));
        assert_eq!(cfb.read("Workbook").unwrap().unwrap(), payload);
        assert!(cfb.read("Book").unwrap().is_none());
    }

    #[test]
    fn rejects_non_ole_files() {
        let error = Cfb::new(&mut Cursor::new(vec![0u8; 1024])).err().unwrap();
        assert!(matches!(error, SheetError::CfbHelperError(CfbError::OleSignatureError)));
        let error = Cfb::new(&mut Cursor::new(vec![0u8; 10])).err().unwrap();
        assert!(matches!(error, SheetError::CfbHelperError(CfbError::FileFormatError)));
    }
}
