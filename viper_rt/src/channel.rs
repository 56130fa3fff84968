// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Numbered file channels with BASIC-style result codes.
//!
//! Every operation returns an [`ErrCode`] instead of trapping; callers that want a trap convert
//! with `RtTrap::from`.

use hashbrown::HashMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::vec::Vec;

use crate::trap::{RtTrap, TrapKind};

/// `errno` recorded when a seek target is not representable.
pub const ERANGE: i32 = 34;

/// Channel result code.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrCode {
    /// Success.
    None = 0,
    /// The file does not exist.
    FileNotFound = 1,
    /// End of input.
    Eof = 2,
    /// Host I/O failure.
    IoError = 3,
    /// Channel state does not allow the operation.
    InvalidOperation = 4,
}

impl ErrCode {
    /// Numeric value.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    fn from_io(e: &io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::FileNotFound,
            io::ErrorKind::UnexpectedEof => Self::Eof,
            _ => Self::IoError,
        }
    }
}

impl fmt::Display for ErrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "Err_None",
            Self::FileNotFound => "Err_FileNotFound",
            Self::Eof => "Err_EOF",
            Self::IoError => "Err_IOError",
            Self::InvalidOperation => "Err_InvalidOperation",
        };
        f.write_str(name)
    }
}

impl core::error::Error for ErrCode {}

impl From<ErrCode> for RtTrap {
    fn from(e: ErrCode) -> Self {
        let kind = match e {
            ErrCode::FileNotFound => TrapKind::FileNotFound,
            ErrCode::Eof => TrapKind::Eof,
            ErrCode::IoError => TrapKind::IoError,
            ErrCode::None | ErrCode::InvalidOperation => TrapKind::InvalidOperation,
        };
        Self::new(kind).with_code(e.code())
    }
}

/// How a channel is opened.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Read only; the file must exist.
    Input,
    /// Write, truncating or creating.
    Output,
    /// Write at the end, creating if needed.
    Append,
    /// Read and write bytes; created if missing.
    Binary,
}

#[derive(Debug)]
struct Channel {
    file: File,
    mode: OpenMode,
}

/// Open channels keyed by channel number.
#[derive(Debug, Default)]
pub struct ChannelTable {
    channels: HashMap<i32, Channel>,
    errno: i32,
}

impl ChannelTable {
    /// No channels open.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Host error number recorded by the most recent failing operation (0 if none).
    #[must_use]
    pub fn errno(&self) -> i32 {
        self.errno
    }

    fn fail(&mut self, code: ErrCode, errno: i32) -> ErrCode {
        self.errno = errno;
        code
    }

    fn io_fail(&mut self, e: &io::Error) -> ErrCode {
        self.fail(ErrCode::from_io(e), e.raw_os_error().unwrap_or(0))
    }

    fn get(&mut self, ch: i32) -> Result<&mut Channel, ErrCode> {
        if !self.channels.contains_key(&ch) {
            self.errno = 0;
            return Err(ErrCode::InvalidOperation);
        }
        self.channels.get_mut(&ch).ok_or(ErrCode::InvalidOperation)
    }

    /// Opens `path` on channel `ch`. Reopening a busy channel fails.
    pub fn open(&mut self, path: impl AsRef<Path>, mode: OpenMode, ch: i32) -> Result<(), ErrCode> {
        if self.channels.contains_key(&ch) {
            return Err(self.fail(ErrCode::InvalidOperation, 0));
        }
        let mut opts = OpenOptions::new();
        match mode {
            OpenMode::Input => opts.read(true),
            OpenMode::Output => opts.write(true).create(true).truncate(true),
            OpenMode::Append => opts.append(true).create(true),
            OpenMode::Binary => opts.read(true).write(true).create(true).truncate(false),
        };
        let file = opts.open(path.as_ref()).map_err(|e| self.io_fail(&e))?;
        tracing::debug!(channel = ch, ?mode, "channel opened");
        self.channels.insert(ch, Channel { file, mode });
        Ok(())
    }

    /// Closes channel `ch`.
    pub fn close(&mut self, ch: i32) -> Result<(), ErrCode> {
        let mut c = self
            .channels
            .remove(&ch)
            .ok_or(ErrCode::InvalidOperation)?;
        c.file.flush().map_err(|e| self.io_fail(&e))?;
        tracing::debug!(channel = ch, "channel closed");
        Ok(())
    }

    /// Closes every channel, ignoring flush failures.
    pub fn close_all(&mut self) {
        self.channels.clear();
    }

    /// Writes `bytes` followed by a newline.
    pub fn print(&mut self, ch: i32, bytes: &[u8]) -> Result<(), ErrCode> {
        let c = self.get(ch)?;
        if c.mode == OpenMode::Input {
            return Err(self.fail(ErrCode::InvalidOperation, 0));
        }
        let r = c.file.write_all(bytes).and_then(|()| c.file.write_all(b"\n"));
        r.map_err(|e| self.io_fail(&e))
    }

    fn read_one(&mut self, ch: i32) -> Result<Option<u8>, ErrCode> {
        let c = self.get(ch)?;
        if matches!(c.mode, OpenMode::Output | OpenMode::Append) {
            return Err(self.fail(ErrCode::InvalidOperation, 0));
        }
        let mut b = [0_u8; 1];
        match c.file.read(&mut b) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(b[0])),
            Err(e) => Err(self.io_fail(&e)),
        }
    }

    /// Reads one line without its terminator (`\n` or `\r\n`). `Eof` when nothing is left.
    pub fn line_input(&mut self, ch: i32) -> Result<Vec<u8>, ErrCode> {
        let mut line = Vec::new();
        let mut saw_any = false;
        while let Some(b) = self.read_one(ch)? {
            saw_any = true;
            if b == b'\n' {
                break;
            }
            line.push(b);
        }
        if !saw_any {
            return Err(self.fail(ErrCode::Eof, 0));
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(line)
    }

    /// Reads one byte. `Eof` at end of file.
    pub fn read_byte(&mut self, ch: i32) -> Result<u8, ErrCode> {
        match self.read_one(ch)? {
            Some(b) => Ok(b),
            None => Err(self.fail(ErrCode::Eof, 0)),
        }
    }

    /// Returns `true` when the read position is at or past the end.
    pub fn eof(&mut self, ch: i32) -> Result<bool, ErrCode> {
        let c = self.get(ch)?;
        let pos = c.file.stream_position();
        let len = c.file.metadata().map(|m| m.len());
        match (pos, len) {
            (Ok(pos), Ok(len)) => Ok(pos >= len),
            (Err(e), _) | (_, Err(e)) => Err(self.io_fail(&e)),
        }
    }

    /// Moves to byte offset `pos`. Negative offsets fail with `errno = ERANGE`.
    pub fn seek(&mut self, ch: i32, pos: i64) -> Result<(), ErrCode> {
        self.get(ch)?;
        let Ok(target) = u64::try_from(pos) else {
            return Err(self.fail(ErrCode::InvalidOperation, ERANGE));
        };
        let c = self.get(ch)?;
        match c.file.seek(SeekFrom::Start(target)) {
            Ok(_) => Ok(()),
            Err(e) => Err(self.io_fail(&e)),
        }
    }

    /// Current byte offset.
    pub fn tell(&mut self, ch: i32) -> Result<i64, ErrCode> {
        let c = self.get(ch)?;
        match c.file.stream_position() {
            Ok(p) => i64::try_from(p).map_err(|_| self.fail(ErrCode::InvalidOperation, ERANGE)),
            Err(e) => Err(self.io_fail(&e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(std::format!("viper_rt_{}_{name}", std::process::id()));
        p
    }

    #[test]
    fn lines_trim_crlf_and_end_with_eof() {
        let path = scratch("lines.txt");
        std::fs::write(&path, b"one\r\ntwo\nthree").unwrap();
        let mut t = ChannelTable::new();
        t.open(&path, OpenMode::Input, 1).unwrap();
        assert_eq!(t.line_input(1).unwrap(), b"one");
        assert_eq!(t.line_input(1).unwrap(), b"two");
        assert!(!t.eof(1).unwrap());
        assert_eq!(t.line_input(1).unwrap(), b"three");
        assert!(t.eof(1).unwrap());
        assert_eq!(t.line_input(1), Err(ErrCode::Eof));
        t.close(1).unwrap();
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn empty_file_reports_eof() {
        let path = scratch("empty.bin");
        std::fs::write(&path, b"").unwrap();
        let mut t = ChannelTable::new();
        t.open(&path, OpenMode::Input, 2).unwrap();
        assert_eq!(t.read_byte(2), Err(ErrCode::Eof));
        assert_eq!(t.line_input(2), Err(ErrCode::Eof));
        t.close(2).unwrap();
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn print_seek_tell_round_trip() {
        let path = scratch("rw.bin");
        let mut t = ChannelTable::new();
        t.open(&path, OpenMode::Output, 3).unwrap();
        t.print(3, b"hello").unwrap();
        assert_eq!(t.tell(3).unwrap(), 6);
        t.close(3).unwrap();

        t.open(&path, OpenMode::Binary, 3).unwrap();
        t.seek(3, 1).unwrap();
        assert_eq!(t.read_byte(3).unwrap(), b'e');
        assert_eq!(t.tell(3).unwrap(), 2);
        assert_eq!(t.seek(3, -1), Err(ErrCode::InvalidOperation));
        assert_eq!(t.errno(), ERANGE);
        t.close(3).unwrap();
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn misuse_is_reported() {
        let mut t = ChannelTable::new();
        assert_eq!(
            t.open(scratch("missing/nope.txt"), OpenMode::Input, 1),
            Err(ErrCode::FileNotFound)
        );
        assert_eq!(t.close(9), Err(ErrCode::InvalidOperation));
        assert_eq!(t.read_byte(9), Err(ErrCode::InvalidOperation));
        let trap = RtTrap::from(ErrCode::Eof);
        assert_eq!(trap.kind, TrapKind::Eof);
        assert_eq!(trap.code, 2);
    }
}
