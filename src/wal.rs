use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{error, warn};

use crate::model::Event;

/// Frame one event as `[u32 len][bincode payload][u32 crc32]`, little endian.
fn write_frame(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "event too large for WAL frame"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(())
}

/// Read one frame and its size on disk. `Ok(None)` means clean EOF or a
/// torn/corrupt tail.
fn read_frame(reader: &mut impl Read) -> io::Result<Option<(Event, u64)>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut payload = vec![0u8; len];
    let mut crc_buf = [0u8; 4];
    for buf in [&mut payload[..], &mut crc_buf[..]] {
        match reader.read_exact(buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!("WAL ends with a truncated frame; discarding it");
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
    }

    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        warn!("WAL frame failed CRC check; stopping replay");
        return Ok(None);
    }
    match bincode::deserialize::<Event>(&payload) {
        Ok(event) => Ok(Some((event, 8 + len as u64))),
        Err(e) => {
            warn!("WAL frame failed to decode ({e}); stopping replay");
            Ok(None)
        }
    }
}

/// Intact frames in file order plus the byte length they occupy.
fn scan(path: &Path) -> io::Result<(Vec<Event>, u64)> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(e),
    };
    let mut reader = BufReader::new(file);
    let mut events = Vec::new();
    let mut valid_len = 0;
    while let Some((event, size)) = read_frame(&mut reader)? {
        events.push(event);
        valid_len += size;
    }
    Ok((events, valid_len))
}

/// Append-only booking journal.
///
/// Every catalog save, availability override, block and booking state change
/// is one frame. Appends go out in batches, one fsync each. A batch that fails
/// to write is cut back off the file, so the log only ever holds whole,
/// acknowledged frames (plus at most one torn frame after a crash, which
/// `open` trims).
pub struct Wal {
    file: File,
    path: PathBuf,
    /// Bytes known durable; everything past this is a failed or torn write.
    durable_len: u64,
    /// Set when a failed write could not be cut back off the file.
    poisoned: Option<String>,
    appends_since_compact: u64,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)?;
        }
        let (_, valid_len) = scan(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let on_disk = file.metadata()?.len();
        if on_disk > valid_len {
            warn!(on_disk, valid_len, "trimming unreadable WAL tail");
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        Ok(Self {
            file,
            path: path.to_path_buf(),
            durable_len: valid_len,
            poisoned: None,
            appends_since_compact: 0,
        })
    }

    /// Append and fsync a single event.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_batch(&[event]).pop().unwrap_or(Ok(()))
    }

    /// Frame `events` and make them durable with one fsync. One result per
    /// event: an event that fails to encode is left out and only its own
    /// result is an error. If the write or fsync fails the log is cut back to
    /// its length before the batch and every event fails.
    pub fn append_batch(&mut self, events: &[&Event]) -> Vec<io::Result<()>> {
        if let Some(reason) = &self.poisoned {
            return events
                .iter()
                .map(|_| Err(io::Error::other(format!("WAL unusable: {reason}"))))
                .collect();
        }

        let mut buf = Vec::new();
        let mut results: Vec<io::Result<()>> =
            events.iter().map(|event| write_frame(&mut buf, event)).collect();
        if buf.is_empty() {
            return results;
        }

        match self.write_synced(&buf) {
            Ok(()) => {
                self.durable_len += buf.len() as u64;
                self.appends_since_compact += results.iter().filter(|r| r.is_ok()).count() as u64;
            }
            Err(e) => {
                self.truncate_to_durable();
                for r in results.iter_mut().filter(|r| r.is_ok()) {
                    *r = Err(io::Error::new(e.kind(), e.to_string()));
                }
            }
        }
        results
    }

    fn write_synced(&mut self, buf: &[u8]) -> io::Result<()> {
        self.file.write_all(buf)?;
        self.file.sync_all()
    }

    /// Cut off anything past the last durable frame.
    fn truncate_to_durable(&mut self) {
        let cut = self
            .file
            .set_len(self.durable_len)
            .and_then(|()| self.file.sync_all());
        if let Err(e) = cut {
            error!("WAL truncate after failed write: {e}; refusing further appends");
            self.poisoned = Some(e.to_string());
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    fn compact_tmp_path(path: &Path) -> PathBuf {
        path.with_extension("wal.tmp")
    }

    /// Write a snapshot to the side file and fsync it. Slow; the live log
    /// keeps accepting appends meanwhile.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(Self::compact_tmp_path(path))?);
        for event in events {
            write_frame(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the snapshot over the live log and reopen for append.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        fs::rename(Self::compact_tmp_path(&self.path), &self.path)?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.durable_len = self.file.metadata()?.len();
        self.poisoned = None;
        self.appends_since_compact = 0;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    /// Every intact event in file order. A missing file is an empty log.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        scan(path).map(|(events, _)| events)
    }
}
