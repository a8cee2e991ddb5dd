//! An in-memory byte buffer that can stand in for a BIN file on disk

use std::io;
use std::io::{Read, Seek, SeekFrom};

#[derive(Debug, Clone, Default)]
pub struct SeekableVec {
    bytes: Vec<u8>,
    position: u64,
}

impl SeekableVec {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, position: 0 }
    }
}

impl Read for SeekableVec {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let position = (self.position.min(self.bytes.len() as u64)) as usize;
        let len = buf.len().min(self.bytes.len() - position);
        buf[..len].copy_from_slice(&self.bytes[position..position + len]);
        self.position += len as u64;
        Ok(len)
    }
}

impl Seek for SeekableVec {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_position = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(offset) => (self.bytes.len() as u64).checked_add_signed(offset),
            SeekFrom::Current(offset) => self.position.checked_add_signed(offset),
        };

        match new_position {
            Some(position) => {
                self.position = position;
                Ok(position)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "attempted to seek to a negative position",
            )),
        }
    }
}
