//! The I/O facade: swappable reader/writer streams, the dribble mirror, a
//! fixed-capacity open-stream table, and the cooperative flag set.
//!
//! The interpreter core never touches the host directly; everything goes
//! through the [`Stream`], [`Storage`] and [`Platform`] traits so tests run
//! against in-memory implementations and the CLI wires in std.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tortuga_common::errors::{ErrorCode, ErrorInfo};
use tortuga_heap::Node;
use tracing::debug;

/// Default open-stream table capacity.
pub const DEFAULT_MAX_STREAMS: usize = 8;

/// One character read from a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Char(u8),
    Eof,
    /// The cooperative BRK flag was observed mid-read.
    Interrupted,
}

/// A byte stream with independent read and write positions.
pub trait Stream {
    fn read_char(&mut self) -> ReadOutcome;
    fn can_read(&self) -> bool;
    fn write(&mut self, text: &str);
    fn flush(&mut self) {}
    fn len(&self) -> u64 {
        0
    }
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_pos(&self) -> u64 {
        0
    }

    /// Reposition the read cursor. False when the stream cannot seek or the
    /// position is out of range.
    fn set_read_pos(&mut self, _pos: u64) -> bool {
        false
    }

    fn write_pos(&self) -> u64 {
        self.len()
    }

    fn set_write_pos(&mut self, _pos: u64) -> bool {
        false
    }

    /// Read up to a newline (consumed, not included). `None` means EOF with
    /// nothing read; `Some(Err(()))` an interrupt.
    fn read_line(&mut self) -> Option<Result<String, ()>> {
        let mut line = String::new();
        loop {
            match self.read_char() {
                ReadOutcome::Char(b'\n') => return Some(Ok(line)),
                ReadOutcome::Char(c) => line.push(c as char),
                ReadOutcome::Eof => {
                    if line.is_empty() {
                        return None;
                    }
                    return Some(Ok(line));
                }
                ReadOutcome::Interrupted => return Some(Err(())),
            }
        }
    }
}

// =====================================================================
// Host ability traits
// =====================================================================

/// File storage as the core sees it.
pub trait Storage {
    fn open_read(&mut self, path: &str) -> Result<Box<dyn Stream>, ErrorInfo>;
    fn open_write(&mut self, path: &str, append: bool) -> Result<Box<dyn Stream>, ErrorInfo>;
    fn exists(&self, path: &str) -> bool;
    fn delete(&mut self, path: &str) -> Result<(), ErrorInfo>;
}

/// Hardware odds and ends.
pub trait Platform {
    fn sleep_ms(&mut self, ms: u64);
    /// Uniform in `0..bound` (bound >= 1).
    fn random(&mut self, bound: u32) -> u32;
    fn clock_ms(&self) -> u64;
}

// =====================================================================
// Cooperative flags
// =====================================================================

/// One-bit flags settable by the host interrupt/input layer, polled by the
/// evaluator between instructions.
#[derive(Clone, Default)]
pub struct Flags {
    brk: Arc<AtomicBool>,
    pause: Arc<AtomicBool>,
    freeze: Arc<AtomicBool>,
}

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_brk(&self) {
        self.brk.store(true, Ordering::Relaxed);
    }

    pub fn take_brk(&self) -> bool {
        self.brk.swap(false, Ordering::Relaxed)
    }

    pub fn set_pause(&self) {
        self.pause.store(true, Ordering::Relaxed);
    }

    pub fn take_pause(&self) -> bool {
        self.pause.swap(false, Ordering::Relaxed)
    }

    pub fn set_freeze(&self, on: bool) {
        self.freeze.store(on, Ordering::Relaxed);
    }

    pub fn frozen(&self) -> bool {
        self.freeze.load(Ordering::Relaxed)
    }
}

// =====================================================================
// The facade
// =====================================================================

struct OpenFile {
    name: Node,
    stream: Box<dyn Stream>,
}

/// Reader/writer indirection over the console pair and the open-file table.
/// `None` as a selector means the console.
pub struct IoFacade {
    console_in: Box<dyn Stream>,
    console_out: Box<dyn Stream>,
    files: Vec<Option<OpenFile>>,
    reader: Option<usize>,
    writer: Option<usize>,
    dribble: Option<usize>,
    pub flags: Flags,
}

impl IoFacade {
    pub fn new(
        console_in: Box<dyn Stream>,
        console_out: Box<dyn Stream>,
        max_streams: usize,
    ) -> Self {
        Self {
            console_in,
            console_out,
            files: (0..max_streams).map(|_| None).collect(),
            reader: None,
            writer: None,
            dribble: None,
            flags: Flags::new(),
        }
    }

    // -- writing ----------------------------------------------------------

    /// Write through the current writer. Console writes mirror to dribble.
    pub fn write(&mut self, text: &str) {
        match self.writer {
            Some(slot) => {
                if let Some(file) = self.files[slot].as_mut() {
                    file.stream.write(text);
                }
            }
            None => {
                self.console_out.write(text);
                if let Some(slot) = self.dribble {
                    if let Some(file) = self.files[slot].as_mut() {
                        file.stream.write(text);
                    }
                }
            }
        }
    }

    pub fn write_line(&mut self, text: &str) {
        self.write(text);
        self.write("\n");
    }

    /// Console-only write, for prompts and trace output.
    pub fn write_console(&mut self, text: &str) {
        self.console_out.write(text);
        if let Some(slot) = self.dribble {
            if let Some(file) = self.files[slot].as_mut() {
                file.stream.write(text);
            }
        }
    }

    pub fn flush(&mut self) {
        self.console_out.flush();
    }

    // -- reading ----------------------------------------------------------

    pub fn read_char(&mut self) -> ReadOutcome {
        if self.flags.take_brk() {
            return ReadOutcome::Interrupted;
        }
        match self.reader {
            Some(slot) => match self.files[slot].as_mut() {
                Some(file) => file.stream.read_char(),
                None => ReadOutcome::Eof,
            },
            None => self.console_in.read_char(),
        }
    }

    pub fn read_line(&mut self) -> Option<Result<String, ()>> {
        if self.flags.take_brk() {
            return Some(Err(()));
        }
        match self.reader {
            Some(slot) => match self.files[slot].as_mut() {
                Some(file) => file.stream.read_line(),
                None => None,
            },
            None => self.console_in.read_line(),
        }
    }

    /// Read a line from the console regardless of the reader selection;
    /// the REPL prompt always talks to the console.
    pub fn read_console_line(&mut self) -> Option<Result<String, ()>> {
        if self.flags.take_brk() {
            return Some(Err(()));
        }
        self.console_in.read_line()
    }

    pub fn can_read(&self) -> bool {
        match self.reader {
            Some(slot) => self.files[slot]
                .as_ref()
                .map(|f| f.stream.can_read())
                .unwrap_or(false),
            None => self.console_in.can_read(),
        }
    }

    // -- stream table -----------------------------------------------------

    /// Register an opened stream under its pathname atom.
    pub fn open(&mut self, name: Node, stream: Box<dyn Stream>) -> Result<(), ErrorInfo> {
        if self.slot_of(name).is_some() {
            return Err(ErrorInfo::new(ErrorCode::FileAlreadyOpen));
        }
        let Some(slot) = self.files.iter().position(Option::is_none) else {
            return Err(ErrorInfo::new(ErrorCode::NoFileBuffers));
        };
        self.files[slot] = Some(OpenFile { name, stream });
        debug!(slot, "stream opened");
        Ok(())
    }

    pub fn is_open(&self, name: Node) -> bool {
        self.slot_of(name).is_some()
    }

    pub fn close(&mut self, name: Node) -> bool {
        let Some(slot) = self.slot_of(name) else {
            return false;
        };
        if let Some(mut file) = self.files[slot].take() {
            file.stream.flush();
        }
        if self.reader == Some(slot) {
            self.reader = None;
        }
        if self.writer == Some(slot) {
            self.writer = None;
        }
        if self.dribble == Some(slot) {
            self.dribble = None;
        }
        debug!(slot, "stream closed");
        true
    }

    pub fn close_all(&mut self) {
        for slot in 0..self.files.len() {
            if let Some(mut file) = self.files[slot].take() {
                file.stream.flush();
            }
        }
        self.reader = None;
        self.writer = None;
        self.dribble = None;
    }

    /// Select the read source: an open stream's name, or `None` for console.
    pub fn set_reader(&mut self, name: Option<Node>) -> Result<(), ErrorInfo> {
        self.reader = self.resolve(name)?;
        Ok(())
    }

    pub fn set_writer(&mut self, name: Option<Node>) -> Result<(), ErrorInfo> {
        self.writer = self.resolve(name)?;
        Ok(())
    }

    pub fn set_dribble(&mut self, name: Option<Node>) -> Result<(), ErrorInfo> {
        self.dribble = self.resolve(name)?;
        Ok(())
    }

    /// Current reader's name atom (`None` for the console).
    pub fn reader_name(&self) -> Option<Node> {
        self.reader
            .and_then(|slot| self.files[slot].as_ref())
            .map(|f| f.name)
    }

    pub fn writer_name(&self) -> Option<Node> {
        self.writer
            .and_then(|slot| self.files[slot].as_ref())
            .map(|f| f.name)
    }

    pub fn dribble_name(&self) -> Option<Node> {
        self.dribble
            .and_then(|slot| self.files[slot].as_ref())
            .map(|f| f.name)
    }

    /// Stream name atoms, traced as GC roots with the rest of the root set.
    pub fn stream_names(&self) -> Vec<Node> {
        self.files
            .iter()
            .flatten()
            .map(|f| f.name)
            .collect()
    }

    fn resolve(&self, name: Option<Node>) -> Result<Option<usize>, ErrorInfo> {
        match name {
            None => Ok(None),
            Some(n) => self
                .slot_of(n)
                .map(Some)
                .ok_or_else(|| ErrorInfo::new(ErrorCode::FileNotOpen)),
        }
    }

    fn slot_of(&self, name: Node) -> Option<usize> {
        self.files
            .iter()
            .position(|f| f.as_ref().is_some_and(|f| f.name == name))
    }
}

// =====================================================================
// In-memory implementations (tests and the sub-REPL)
// =====================================================================

/// A readable in-memory stream over fixed input.
pub struct SliceReader {
    data: Vec<u8>,
    pos: usize,
}

impl SliceReader {
    pub fn new(text: &str) -> Self {
        Self {
            data: text.as_bytes().to_vec(),
            pos: 0,
        }
    }
}

impl Stream for SliceReader {
    fn read_char(&mut self) -> ReadOutcome {
        match self.data.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                ReadOutcome::Char(b)
            }
            None => ReadOutcome::Eof,
        }
    }

    fn can_read(&self) -> bool {
        self.pos < self.data.len()
    }

    fn write(&mut self, _text: &str) {}

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_pos(&self) -> u64 {
        self.pos as u64
    }

    fn set_read_pos(&mut self, pos: u64) -> bool {
        if pos <= self.data.len() as u64 {
            self.pos = pos as usize;
            true
        } else {
            false
        }
    }
}

/// A write-capturing in-memory stream with shared contents.
#[derive(Clone, Default)]
pub struct SharedWriter {
    data: Rc<RefCell<String>>,
}

impl SharedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.data.borrow().clone()
    }
}

impl Stream for SharedWriter {
    fn read_char(&mut self) -> ReadOutcome {
        ReadOutcome::Eof
    }

    fn can_read(&self) -> bool {
        false
    }

    fn write(&mut self, text: &str) {
        self.data.borrow_mut().push_str(text);
    }

    fn len(&self) -> u64 {
        self.data.borrow().len() as u64
    }
}

/// An in-memory read/write stream backing [`MemStorage`] files.
struct MemFile {
    data: Rc<RefCell<Vec<u8>>>,
    read_pos: usize,
}

impl Stream for MemFile {
    fn read_char(&mut self) -> ReadOutcome {
        let byte = self.data.borrow().get(self.read_pos).copied();
        match byte {
            Some(b) => {
                self.read_pos += 1;
                ReadOutcome::Char(b)
            }
            None => ReadOutcome::Eof,
        }
    }

    fn can_read(&self) -> bool {
        self.read_pos < self.data.borrow().len()
    }

    fn write(&mut self, text: &str) {
        self.data.borrow_mut().extend_from_slice(text.as_bytes());
    }

    fn len(&self) -> u64 {
        self.data.borrow().len() as u64
    }

    fn read_pos(&self) -> u64 {
        self.read_pos as u64
    }

    fn set_read_pos(&mut self, pos: u64) -> bool {
        if pos <= self.data.borrow().len() as u64 {
            self.read_pos = pos as usize;
            true
        } else {
            false
        }
    }
}

/// Map-backed storage for tests.
#[derive(Clone, Default)]
pub struct MemStorage {
    files: Rc<RefCell<HashMap<String, Rc<RefCell<Vec<u8>>>>>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self, path: &str) -> Option<String> {
        self.files
            .borrow()
            .get(path)
            .map(|d| String::from_utf8_lossy(&d.borrow()).into_owned())
    }

    pub fn write_file(&self, path: &str, contents: &str) {
        self.files.borrow_mut().insert(
            path.to_string(),
            Rc::new(RefCell::new(contents.as_bytes().to_vec())),
        );
    }
}

impl Storage for MemStorage {
    fn open_read(&mut self, path: &str) -> Result<Box<dyn Stream>, ErrorInfo> {
        let data = self
            .files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| ErrorInfo::new(ErrorCode::FileNotFound).with_arg(path))?;
        Ok(Box::new(MemFile { data, read_pos: 0 }))
    }

    fn open_write(&mut self, path: &str, append: bool) -> Result<Box<dyn Stream>, ErrorInfo> {
        let mut files = self.files.borrow_mut();
        let data = files
            .entry(path.to_string())
            .or_insert_with(|| Rc::new(RefCell::new(Vec::new())))
            .clone();
        if !append {
            data.borrow_mut().clear();
        }
        let read_pos = data.borrow().len();
        Ok(Box::new(MemFile { data, read_pos }))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn delete(&mut self, path: &str) -> Result<(), ErrorInfo> {
        self.files
            .borrow_mut()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| ErrorInfo::new(ErrorCode::FileNotFound).with_arg(path))
    }
}

/// Deterministic platform for tests: no sleeping, linear-congruential random.
pub struct TestPlatform {
    state: u64,
    pub slept_ms: u64,
}

impl TestPlatform {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
            slept_ms: 0,
        }
    }
}

impl Platform for TestPlatform {
    fn sleep_ms(&mut self, ms: u64) {
        self.slept_ms += ms;
    }

    fn random(&mut self, bound: u32) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.state >> 33) as u32) % bound.max(1)
    }

    fn clock_ms(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tortuga_heap::Heap;

    fn facade() -> (IoFacade, SharedWriter) {
        let out = SharedWriter::new();
        let facade = IoFacade::new(
            Box::new(SliceReader::new("")),
            Box::new(out.clone()),
            DEFAULT_MAX_STREAMS,
        );
        (facade, out)
    }

    #[test]
    fn test_console_write() {
        let (mut io, out) = facade();
        io.write_line("hello");
        assert_eq!(out.contents(), "hello\n");
    }

    #[test]
    fn test_writer_redirection_and_dribble() {
        let mut heap = Heap::new();
        let (mut io, console) = facade();
        let log = SharedWriter::new();
        let name = heap.atom("log.txt");
        io.open(name, Box::new(log.clone())).unwrap();

        // Dribble mirrors console writes only.
        io.set_dribble(Some(name)).unwrap();
        io.write("a");
        assert_eq!(console.contents(), "a");
        assert_eq!(log.contents(), "a");

        io.set_dribble(None).unwrap();
        io.set_writer(Some(name)).unwrap();
        io.write("b");
        assert_eq!(console.contents(), "a");
        assert_eq!(log.contents(), "ab");
    }

    #[test]
    fn test_stream_table_capacity() {
        let mut heap = Heap::new();
        let out = SharedWriter::new();
        let mut io = IoFacade::new(
            Box::new(SliceReader::new("")),
            Box::new(out.clone()),
            2,
        );
        for name in ["a", "b"] {
            let n = heap.atom(name);
            io.open(n, Box::new(SharedWriter::new())).unwrap();
        }
        let n = heap.atom("c");
        let err = io.open(n, Box::new(SharedWriter::new())).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoFileBuffers);
    }

    #[test]
    fn test_double_open_rejected() {
        let mut heap = Heap::new();
        let (mut io, _) = facade();
        let n = heap.atom("f");
        io.open(n, Box::new(SharedWriter::new())).unwrap();
        let err = io.open(n, Box::new(SharedWriter::new())).unwrap_err();
        assert_eq!(err.code, ErrorCode::FileAlreadyOpen);
    }

    #[test]
    fn test_close_clears_selectors() {
        let mut heap = Heap::new();
        let (mut io, _) = facade();
        let n = heap.atom("f");
        io.open(n, Box::new(SliceReader::new("x"))).unwrap();
        io.set_reader(Some(n)).unwrap();
        assert_eq!(io.reader_name(), Some(n));
        assert!(io.close(n));
        assert_eq!(io.reader_name(), None);
        assert!(io.set_reader(Some(n)).is_err());
    }

    #[test]
    fn test_brk_interrupts_read() {
        let (mut io, _) = facade();
        io.flags.set_brk();
        assert_eq!(io.read_char(), ReadOutcome::Interrupted);
        // Flag is consumed.
        assert_eq!(io.read_char(), ReadOutcome::Eof);
    }

    #[test]
    fn test_mem_storage_roundtrip() {
        let mut storage = MemStorage::new();
        {
            let mut s = storage.open_write("f.lg", false).unwrap();
            s.write("print 1\n");
        }
        let mut s = storage.open_read("f.lg").unwrap();
        assert_eq!(s.read_line(), Some(Ok("print 1".to_string())));
        assert_eq!(s.read_line(), None);
        assert!(storage.exists("f.lg"));
        storage.delete("f.lg").unwrap();
        assert!(!storage.exists("f.lg"));
    }
}
