//! Byte-level access to the BIN files referenced by a CUE sheet, generic over
//! any seekable byte stream

use crate::{DiscError, DiscResult};
use std::collections::HashMap;
use std::io;
use std::io::{BufReader, Read, Seek, SeekFrom};

// Sentinel stream position that forces the next read to seek
const POSITION_UNKNOWN: u64 = u64::MAX;

#[derive(Debug)]
struct BinFile<F: Read + Seek> {
    file: BufReader<F>,
    position: u64,
    len: u64,
}

#[derive(Debug)]
pub struct CdBinFiles<F: Read + Seek> {
    files: HashMap<String, BinFile<F>>,
}

impl<F: Read + Seek> CdBinFiles<F> {
    /// Open every named BIN file through `open_fn` and record its length.
    ///
    /// # Errors
    ///
    /// Propagates any error from `open_fn` or from measuring a file's length.
    pub fn create<OpenFn>(
        file_names: impl IntoIterator<Item = String>,
        open_fn: OpenFn,
    ) -> DiscResult<Self>
    where
        OpenFn: Fn(&str) -> io::Result<F>,
    {
        let mut files = HashMap::new();
        for file_name in file_names {
            let file = open_fn(&file_name)
                .map_err(|source| DiscError::BinOpen { path: file_name.clone(), source })?;
            let mut file = BufReader::new(file);
            let len = file
                .seek(SeekFrom::End(0))
                .map_err(|source| DiscError::BinOpen { path: file_name.clone(), source })?;

            files.insert(file_name, BinFile { file, position: POSITION_UNKNOWN, len });
        }

        Ok(Self { files })
    }

    pub fn file_len(&self, file_name: &str) -> Option<u64> {
        self.files.get(file_name).map(|file| file.len)
    }

    /// Read exactly `out.len()` bytes starting at `byte_addr`.
    ///
    /// On a short or failed read the remainder of `out` is zero-filled before
    /// the error is returned, so the buffer is fully initialized on every exit
    /// path.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from the underlying stream, or an
    /// `UnexpectedEof` read error if the file ends before `out` is full.
    ///
    /// # Panics
    ///
    /// Panics if `file_name` was not part of the CUE sheet this was opened
    /// with; the disc layer only passes track file names.
    pub fn read_bytes(&mut self, file_name: &str, byte_addr: u64, out: &mut [u8]) -> DiscResult<()> {
        let bin_file = self
            .files
            .get_mut(file_name)
            .expect("Track file was not opened on load; this is a bug");

        // Only seek if the stream is not already at the desired position
        if bin_file.position != byte_addr {
            bin_file.position = POSITION_UNKNOWN;
            if let Err(source) = bin_file.file.seek(SeekFrom::Start(byte_addr)) {
                out.fill(0);
                return Err(DiscError::DiscReadIo(source));
            }
            bin_file.position = byte_addr;
        }

        let mut filled = 0;
        while filled < out.len() {
            match bin_file.file.read(&mut out[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    out[filled..].fill(0);
                    bin_file.position = POSITION_UNKNOWN;
                    return Err(DiscError::DiscReadIo(err));
                }
            }
        }

        bin_file.position = byte_addr + filled as u64;

        if filled < out.len() {
            out[filled..].fill(0);
            return Err(DiscError::DiscReadIo(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("hit end of file '{file_name}' at byte {}", byte_addr + filled as u64),
            )));
        }

        Ok(())
    }
}
