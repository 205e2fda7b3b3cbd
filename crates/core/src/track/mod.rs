use std::fs;
use std::path::{Path, PathBuf};

use bincode::{Decode, Encode};

use crate::note::Note;
use crate::{LoopbeatError, Result};

pub const TRACK_EXTENSION: &str = "bytes";
const TRACK_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Encode, Decode)]
struct TrackFile {
    version: u32,
    notes: Vec<Note>,
}

/// Encodes an ordered note list into the binary track format.
pub fn encode_track(notes: &[Note]) -> Result<Vec<u8>> {
    let file = TrackFile {
        version: TRACK_FORMAT_VERSION,
        notes: notes.to_vec(),
    };
    Ok(bincode::encode_to_vec(&file, bincode::config::standard())?)
}

/// Parses a track previously produced by [`encode_track`], e.g. one bundled
/// with the game rather than read from the tracks directory.
pub fn decode_track(bytes: &[u8]) -> Result<Vec<Note>> {
    let (file, _) =
        bincode::decode_from_slice::<TrackFile, _>(bytes, bincode::config::standard())?;
    if file.version != TRACK_FORMAT_VERSION {
        return Err(LoopbeatError::msg(format!(
            "unsupported track format version {}",
            file.version
        )));
    }
    Ok(file.notes)
}

/// Directory of persisted tracks, keyed by track name.
#[derive(Debug, Clone)]
pub struct TrackStore {
    dir: PathBuf,
}

impl TrackStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        let name = name.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(LoopbeatError::InvalidTrackName);
        }
        Ok(self.dir.join(format!("{name}.{TRACK_EXTENSION}")))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|path| path.is_file()).unwrap_or(false)
    }

    pub fn save(&self, name: &str, notes: &[Note]) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        let bytes = encode_track(notes)?;
        fs::create_dir_all(&self.dir)?;
        fs::write(&path, bytes)?;
        tracing::info!(?path, notes = notes.len(), "saved track");
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<Vec<Note>> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            tracing::warn!(?path, "track not found");
            return Err(LoopbeatError::TrackNotFound(name.to_string()));
        }

        let bytes = fs::read(&path)?;
        let notes = decode_track(&bytes)?;
        tracing::info!(?path, notes = notes.len(), "loaded track");
        Ok(notes)
    }
}
