/// Result alias that carries the custom [`LoopbeatError`] type.
pub type Result<T> = std::result::Result<T, LoopbeatError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum LoopbeatError {
    /// Free-form failure that does not belong to a more specific variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// A song descriptor carried values the engine cannot work with.
    #[error("invalid song: {0}")]
    InvalidSong(String),
    /// Configuration that would leave the judgment core in an unusable state.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("track `{0}` not found")]
    TrackNotFound(String),
    #[error("track name cannot be blank")]
    InvalidTrackName,
    #[error("failed to encode track: {0}")]
    TrackEncode(#[from] bincode::error::EncodeError),
    #[error("failed to decode track: {0}")]
    TrackDecode(#[from] bincode::error::DecodeError),
    /// Saving would drop persisted notes that were skipped on load.
    #[error("track would lose {0} note(s) that could not be loaded")]
    LossySave(usize),
    /// A rejected authoring edit surfaced through a fallible host operation.
    #[error(transparent)]
    Edit(#[from] EditError),
}

impl LoopbeatError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for LoopbeatError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for LoopbeatError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Reasons an authoring edit is rejected. A rejected edit leaves the
/// timeline exactly as it was.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("a note already sits at lane {lane}, beat {beat_pos} in bar {bar}")]
    DuplicatePlacement { lane: usize, beat_pos: f64, bar: u32 },
    #[error("lane {lane} is outside 0..{lane_count}")]
    LaneOutOfRange { lane: usize, lane_count: usize },
    #[error("beat position {beat_pos} is outside 0..{beats_per_bar}")]
    BeatPosOutOfRange { beat_pos: f64, beats_per_bar: u32 },
    #[error("start {start} is not valid for this note")]
    InvalidStart { start: f64 },
    #[error("stop {stop} is not valid for this note")]
    InvalidStop { stop: f64 },
    #[error("no note with handle {0}")]
    UnknownNote(u64),
    #[error("no note is selected")]
    NothingSelected,
}
