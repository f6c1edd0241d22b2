//! Host implementations of the core's HAL traits over std.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tortuga_common::errors::{ErrorCode, ErrorInfo};
use tortuga_runtime::io::{Platform, ReadOutcome, Storage, Stream};

// =====================================================================
// Console streams
// =====================================================================

pub struct StdinStream {
    reader: BufReader<std::io::Stdin>,
}

impl StdinStream {
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(std::io::stdin()),
        }
    }
}

impl Default for StdinStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for StdinStream {
    fn read_char(&mut self) -> ReadOutcome {
        let mut byte = [0u8; 1];
        match self.reader.read(&mut byte) {
            Ok(0) => ReadOutcome::Eof,
            Ok(_) => ReadOutcome::Char(byte[0]),
            Err(_) => ReadOutcome::Eof,
        }
    }

    fn can_read(&self) -> bool {
        !self.reader.buffer().is_empty()
    }

    fn write(&mut self, _text: &str) {}

    fn read_line(&mut self) -> Option<Result<String, ()>> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                while line.ends_with(['\n', '\r']) {
                    line.pop();
                }
                Some(Ok(line))
            }
            Err(_) => None,
        }
    }
}

pub struct StdoutStream;

impl Stream for StdoutStream {
    fn read_char(&mut self) -> ReadOutcome {
        ReadOutcome::Eof
    }

    fn can_read(&self) -> bool {
        false
    }

    fn write(&mut self, text: &str) {
        print!("{text}");
    }

    fn flush(&mut self) {
        let _ = std::io::stdout().flush();
    }
}

// =====================================================================
// Filesystem storage
// =====================================================================

struct FileStream {
    reader: Option<std::cell::RefCell<BufReader<File>>>,
    writer: Option<File>,
}

impl Stream for FileStream {
    fn read_char(&mut self) -> ReadOutcome {
        let Some(reader) = self.reader.as_mut() else {
            return ReadOutcome::Eof;
        };
        let mut byte = [0u8; 1];
        match reader.get_mut().read(&mut byte) {
            Ok(0) => ReadOutcome::Eof,
            Ok(_) => ReadOutcome::Char(byte[0]),
            Err(_) => ReadOutcome::Eof,
        }
    }

    fn can_read(&self) -> bool {
        match &self.reader {
            Some(reader) => {
                let mut reader = reader.borrow_mut();
                matches!(reader.fill_buf(), Ok(buf) if !buf.is_empty())
            }
            None => false,
        }
    }

    fn write(&mut self, text: &str) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.write_all(text.as_bytes());
        }
    }

    fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
    }

    fn len(&self) -> u64 {
        match (&self.reader, &self.writer) {
            (Some(r), _) => r.borrow().get_ref().metadata().map(|m| m.len()).unwrap_or(0),
            (None, Some(w)) => w.metadata().map(|m| m.len()).unwrap_or(0),
            _ => 0,
        }
    }
}

/// Files under a base directory.
pub struct FsStorage {
    base: PathBuf,
}

impl FsStorage {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.base.join(path)
    }
}

impl Storage for FsStorage {
    fn open_read(&mut self, path: &str) -> Result<Box<dyn Stream>, ErrorInfo> {
        let file = File::open(self.resolve(path))
            .map_err(|_| ErrorInfo::new(ErrorCode::FileNotFound).with_arg(path))?;
        Ok(Box::new(FileStream {
            reader: Some(std::cell::RefCell::new(BufReader::new(file))),
            writer: None,
        }))
    }

    fn open_write(&mut self, path: &str, append: bool) -> Result<Box<dyn Stream>, ErrorInfo> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(self.resolve(path))
            .map_err(|_| ErrorInfo::new(ErrorCode::DiskTrouble).with_arg(path))?;
        Ok(Box::new(FileStream {
            reader: None,
            writer: Some(file),
        }))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn delete(&mut self, path: &str) -> Result<(), ErrorInfo> {
        std::fs::remove_file(self.resolve(path))
            .map_err(|_| ErrorInfo::new(ErrorCode::FileNotFound).with_arg(path))
    }
}

// =====================================================================
// Platform
// =====================================================================

pub struct StdPlatform {
    rng_state: u64,
}

impl StdPlatform {
    pub fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x5eed);
        Self {
            rng_state: seed | 1,
        }
    }
}

impl Default for StdPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for StdPlatform {
    fn sleep_ms(&mut self, ms: u64) {
        std::thread::sleep(std::time::Duration::from_millis(ms));
    }

    fn random(&mut self, bound: u32) -> u32 {
        self.rng_state = self
            .rng_state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.rng_state >> 33) as u32) % bound.max(1)
    }

    fn clock_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
