//! Asynchronous file loading.
//!
//! The core never reads files itself on the main flow: it submits a
//! `LoadRequest` and later drains `LoadCompletion`s. `FsLoader` does the work
//! on one worker thread per file; `ManualLoader` leaves the I/O to the host.

use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use memmap2::Mmap;
use tracing::{debug, info, warn};

use crate::app::domain::document::{DocumentId, WindowId};
use crate::app::infrastructure::error::{AppError, Result};

/// How a completed load is merged into its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Regular open. `multiple` is set when several files were opened at
    /// once; such loads never change the active tab.
    Open { multiple: bool },
    /// Re-read the file of the `target` tab.
    Reload { target: DocumentId },
    /// Re-decode the file of the `target` tab with a forced encoding.
    EnforceEncoding { target: DocumentId },
}

impl LoadMode {
    /// The tab whose content the result replaces, if any.
    pub fn target(&self) -> Option<DocumentId> {
        match *self {
            Self::Reload { target } | Self::EnforceEncoding { target } => Some(target),
            Self::Open { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub ticket: u64,
    pub window: WindowId,
    pub path: PathBuf,
    pub forced_encoding: Option<String>,
    pub mode: LoadMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded {
        text: String,
        encoding: String,
        size_bytes: u64,
    },
    /// Above the size ceiling; nothing was read.
    Oversized,
    Missing,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadCompletion {
    pub request: LoadRequest,
    pub outcome: LoadOutcome,
}

pub trait Loader {
    fn submit(&mut self, request: LoadRequest);

    /// Completions that arrived since the last call, in arrival order.
    fn poll(&mut self) -> Vec<LoadCompletion>;
}

/// Pluggable byte/text conversion.
pub trait TextCodec: Send + Sync {
    /// Decode `bytes`, honoring `forced` when given. Returns the text and the
    /// canonical name of the encoding used.
    fn decode(&self, bytes: &[u8], forced: Option<&str>) -> Result<(String, String)>;

    fn encode(&self, text: &str, encoding: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
}

impl Encoding {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().replace('_', "-").as_str() {
            "UTF-8" | "UTF8" => Some(Self::Utf8),
            "UTF-16LE" | "UTF-16" => Some(Self::Utf16Le),
            "UTF-16BE" => Some(Self::Utf16Be),
            "ISO-8859-1" | "LATIN1" | "LATIN-1" => Some(Self::Latin1),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
            Self::Latin1 => "ISO-8859-1",
        }
    }
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

/// UTF-8 (BOM aware), UTF-16 with BOM, and ISO-8859-1 as the fallback for
/// bytes that are not valid UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicCodec;

impl BasicCodec {
    fn detect(bytes: &[u8]) -> Encoding {
        if bytes.starts_with(UTF16LE_BOM) {
            Encoding::Utf16Le
        } else if bytes.starts_with(UTF16BE_BOM) {
            Encoding::Utf16Be
        } else if std::str::from_utf8(bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)).is_ok() {
            Encoding::Utf8
        } else {
            Encoding::Latin1
        }
    }

    fn decode_as(bytes: &[u8], encoding: Encoding) -> String {
        match encoding {
            Encoding::Utf8 => {
                String::from_utf8_lossy(bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)).into_owned()
            }
            Encoding::Utf16Le => decode_utf16(bytes.strip_prefix(UTF16LE_BOM).unwrap_or(bytes), u16::from_le_bytes),
            Encoding::Utf16Be => decode_utf16(bytes.strip_prefix(UTF16BE_BOM).unwrap_or(bytes), u16::from_be_bytes),
            Encoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units = bytes.chunks_exact(2).map(|c| unit([c[0], c[1]]));
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

impl TextCodec for BasicCodec {
    fn decode(&self, bytes: &[u8], forced: Option<&str>) -> Result<(String, String)> {
        let encoding = match forced {
            Some(name) => Encoding::parse(name)
                .ok_or_else(|| AppError::Load(format!("unsupported encoding {}", name)))?,
            None => Self::detect(bytes),
        };
        Ok((Self::decode_as(bytes, encoding), encoding.name().to_string()))
    }

    fn encode(&self, text: &str, encoding: &str) -> Result<Vec<u8>> {
        let parsed = Encoding::parse(encoding).ok_or_else(|| AppError::Encoding(encoding.to_string()))?;
        match parsed {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Utf16Le => {
                let mut out = UTF16LE_BOM.to_vec();
                out.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
                Ok(out)
            }
            Encoding::Utf16Be => {
                let mut out = UTF16BE_BOM.to_vec();
                out.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
                Ok(out)
            }
            Encoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| AppError::Encoding(parsed.name().to_string())))
                .collect(),
        }
    }
}

/// Read and decode one file. Runs on a worker thread.
pub fn load_file(path: &Path, forced: Option<&str>, max_bytes: u64, codec: &dyn TextCodec) -> LoadOutcome {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LoadOutcome::Missing,
        Err(e) => return LoadOutcome::Failed(e.to_string()),
    };
    let size_bytes = match file.metadata() {
        Ok(meta) if !meta.is_file() => return LoadOutcome::Failed(format!("{} is not a regular file", path.display())),
        Ok(meta) => meta.len(),
        Err(e) => return LoadOutcome::Failed(e.to_string()),
    };
    if size_bytes > max_bytes {
        return LoadOutcome::Oversized;
    }

    let decoded = if size_bytes == 0 {
        codec.decode(&[], forced)
    } else {
        // SAFETY: the map is read-only and dropped before this function
        // returns. A concurrent truncation by another process can still
        // fault; the same holds for any mmap-based reader.
        match unsafe { Mmap::map(&file) } {
            Ok(map) => codec.decode(&map, forced),
            Err(e) => return LoadOutcome::Failed(e.to_string()),
        }
    };

    match decoded {
        Ok((text, encoding)) => LoadOutcome::Loaded { text, encoding, size_bytes },
        Err(e) => LoadOutcome::Failed(e.to_string()),
    }
}

pub struct FsLoader {
    codec: Arc<dyn TextCodec>,
    max_bytes: u64,
    tx: Sender<LoadCompletion>,
    rx: Receiver<LoadCompletion>,
}

impl FsLoader {
    pub fn new(codec: Arc<dyn TextCodec>, max_bytes: u64) -> Self {
        let (tx, rx) = mpsc::channel();
        Self { codec, max_bytes, tx, rx }
    }

    /// Block until one completion is available. For hosts without an event
    /// loop of their own.
    pub fn wait(&mut self) -> Option<LoadCompletion> {
        self.rx.recv().ok()
    }
}

impl Loader for FsLoader {
    fn submit(&mut self, request: LoadRequest) {
        info!(ticket = request.ticket, path = %request.path.display(), "load started");
        let codec = Arc::clone(&self.codec);
        let max_bytes = self.max_bytes;
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = load_file(&request.path, request.forced_encoding.as_deref(), max_bytes, codec.as_ref());
            if tx.send(LoadCompletion { request, outcome }).is_err() {
                warn!("load finished after the loader was dropped");
            }
        });
    }

    fn poll(&mut self) -> Vec<LoadCompletion> {
        let done: Vec<_> = self.rx.try_iter().collect();
        for completion in &done {
            debug!(ticket = completion.request.ticket, "load finished");
        }
        done
    }
}

/// Loader whose completions are supplied by the host, in any order.
#[derive(Debug, Default)]
pub struct ManualLoader {
    pending: Vec<LoadRequest>,
    ready: VecDeque<LoadCompletion>,
}

impl ManualLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &[LoadRequest] {
        &self.pending
    }

    /// Finish the request with `ticket`. Returns false when no such request
    /// is pending.
    pub fn complete(&mut self, ticket: u64, outcome: LoadOutcome) -> bool {
        let Some(pos) = self.pending.iter().position(|r| r.ticket == ticket) else {
            return false;
        };
        let request = self.pending.remove(pos);
        self.ready.push_back(LoadCompletion { request, outcome });
        true
    }
}

impl Loader for ManualLoader {
    fn submit(&mut self, request: LoadRequest) {
        self.pending.push(request);
    }

    fn poll(&mut self) -> Vec<LoadCompletion> {
        self.ready.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    #[test]
    fn test_detect_utf8_and_strip_bom() {
        let codec = BasicCodec;
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend("héllo".as_bytes());
        assert_eq!(codec.decode(&bytes, None).unwrap(), ("héllo".to_string(), "UTF-8".to_string()));
    }

    #[test]
    fn test_invalid_utf8_falls_back_to_latin1() {
        let (text, encoding) = BasicCodec.decode(&[b'c', 0xE9], None).unwrap();
        assert_eq!(text, "cé");
        assert_eq!(encoding, "ISO-8859-1");
    }

    #[test]
    fn test_utf16_both_orders() {
        let codec = BasicCodec;
        for name in ["UTF-16LE", "UTF-16BE"] {
            let bytes = codec.encode("añb", name).unwrap();
            assert_eq!(codec.decode(&bytes, None).unwrap(), ("añb".to_string(), name.to_string()));
        }
    }

    #[test]
    fn test_forced_encoding() {
        let bytes = "é".as_bytes();
        let (text, encoding) = BasicCodec.decode(bytes, Some("latin1")).unwrap();
        assert_eq!(text, "Ã©");
        assert_eq!(encoding, "ISO-8859-1");
        assert!(BasicCodec.decode(bytes, Some("KOI8-R")).is_err());
    }

    #[test]
    fn test_latin1_cannot_encode_wide_chars() {
        let err = BasicCodec.encode("€", "ISO-8859-1").unwrap_err();
        assert!(matches!(err, AppError::Encoding(ref e) if e == "ISO-8859-1"));
    }

    #[test]
    fn test_load_file_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "line one\nline two").unwrap();

        match load_file(&path, None, 1024, &BasicCodec) {
            LoadOutcome::Loaded { text, encoding, size_bytes } => {
                assert_eq!(text, "line one\nline two");
                assert_eq!(encoding, "UTF-8");
                assert_eq!(size_bytes, 17);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(load_file(&path, None, 4, &BasicCodec), LoadOutcome::Oversized);
        assert_eq!(load_file(&dir.path().join("nope"), None, 1024, &BasicCodec), LoadOutcome::Missing);
    }

    #[test]
    fn test_load_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            load_file(&path, None, 1024, &BasicCodec),
            LoadOutcome::Loaded { ref text, size_bytes: 0, .. } if text.is_empty()
        ));
    }

    #[test]
    fn test_fs_loader_delivers_completion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.txt");
        fs::write(&path, "x").unwrap();

        let mut loader = FsLoader::new(Arc::new(BasicCodec), 1024);
        loader.submit(LoadRequest {
            ticket: 9,
            window: WindowId(1),
            path: path.clone(),
            forced_encoding: None,
            mode: LoadMode::Open { multiple: false },
        });
        let mut done = Vec::new();
        for _ in 0..200 {
            done = loader.poll();
            if !done.is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].request.ticket, 9);
        assert!(matches!(done[0].outcome, LoadOutcome::Loaded { .. }));
    }

    #[test]
    fn test_manual_loader_any_order() {
        let mut loader = ManualLoader::new();
        for ticket in 1..=2 {
            loader.submit(LoadRequest {
                ticket,
                window: WindowId(1),
                path: PathBuf::from(format!("/f{}", ticket)),
                forced_encoding: None,
                mode: LoadMode::Open { multiple: true },
            });
        }
        assert!(loader.complete(2, LoadOutcome::Missing));
        assert!(!loader.complete(2, LoadOutcome::Missing));
        assert!(loader.complete(1, LoadOutcome::Oversized));
        let tickets: Vec<_> = loader.poll().iter().map(|c| c.request.ticket).collect();
        assert_eq!(tickets, vec![2, 1]);
        assert!(loader.pending().is_empty());
    }
}
