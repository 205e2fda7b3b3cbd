use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use loopbeat_core::{
    AppConfig, BeatClock, EditorSession, LaneInput, LanePress, LoopbeatError, PlayEvent,
    PlaySession, PlaybackClock, Song, TimelineModel, TrackStore,
};
use tracing_subscriber::EnvFilter;

fn main() -> loopbeat_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Expand { song } => run_expand(&config, &song),
        Commands::Play { song, presses, fps } => run_play(&config, &song, presses.as_deref(), fps),
        Commands::Edit { song, op } => run_edit(&config, &song, op),
    }
}

fn load_config(path: Option<&Path>) -> loopbeat_core::Result<AppConfig> {
    match path {
        Some(path) if path.is_file() => AppConfig::load(path),
        Some(path) => {
            tracing::warn!(?path, "config file not found, using defaults");
            Ok(AppConfig::default())
        }
        None => Ok(AppConfig::default()),
    }
}

fn load_timeline(config: &AppConfig, song: &Song) -> loopbeat_core::Result<TimelineModel> {
    let store = TrackStore::new(&config.tracks_dir);
    let notes = match store.load(&song.track_name) {
        Ok(notes) => notes,
        Err(LoopbeatError::TrackNotFound(name)) => {
            tracing::info!(track = %name, "starting from an empty track");
            Vec::new()
        }
        Err(err) => return Err(err),
    };
    Ok(TimelineModel::from_notes(
        song.beats_per_bar(),
        config.editor.lane_count,
        notes,
    ))
}

fn run_expand(config: &AppConfig, song_path: &Path) -> loopbeat_core::Result<()> {
    let song = Song::load(song_path)?;
    let timeline = load_timeline(config, &song)?;
    let expander = config.play.expander();
    tracing::info!(title = %song.title, notes = timeline.len(), "expanding track");

    for (index, (_, note)) in timeline.iter().enumerate() {
        let expansion = expander.expand(note, song.beats_per_bar(), song.tempo());
        println!(
            "#{index} lane {} pos {} [{}, {}] fade {:.3}s/{:.3}s hits {:?}",
            note.lane,
            note.beat_pos,
            note.start,
            note.stop,
            expansion.fade_in_seconds,
            expansion.fade_out_seconds,
            expansion.hit_instants,
        );
    }
    Ok(())
}

fn run_play(
    config: &AppConfig,
    song_path: &Path,
    presses_path: Option<&Path>,
    fps: u32,
) -> loopbeat_core::Result<()> {
    if fps == 0 {
        return Err(LoopbeatError::InvalidConfig("fps must be positive".to_string()));
    }

    let song = Song::load(song_path)?;
    let timeline = load_timeline(config, &song)?;
    let mut session = PlaySession::from_config(&song, &timeline, config)?;

    let mut presses = match presses_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str::<Vec<LanePress>>(&text)?
        }
        None => autoplay_presses(config, &song, &timeline),
    };
    presses.sort_by(|a, b| a.time.total_cmp(&b.time));
    tracing::info!(title = %song.title, presses = presses.len(), fps, "starting play");

    let mut input = LaneInput::new();
    let (_, receiver) = input.subscribe();
    let mut queued = presses.into_iter().peekable();

    let step = 1.0 / f64::from(fps);
    let mut playback = PlaybackClock::default();
    let mut time = playback.time_seconds;
    while !session.is_finished() {
        while let Some(press) = queued.next_if(|press| press.time <= time) {
            input.dispatch(press);
        }
        for press in receiver.try_iter() {
            if let Some(event) = session.press(press) {
                log_event(&event);
            }
        }
        for event in session.tick(time) {
            log_event(&event);
        }
        time = playback.advance(step);
    }

    let tally = session.tally();
    for (label, count) in &tally.hits {
        println!("{label}: {count}");
    }
    println!("Miss: {}", tally.misses);
    println!("Max combo: {}", tally.max_combo);
    Ok(())
}

/// A press exactly on every hit instant of every note.
fn autoplay_presses(config: &AppConfig, song: &Song, timeline: &TimelineModel) -> Vec<LanePress> {
    let clock = BeatClock::for_song(song, config.play.sync_offset);
    let expander = config.play.expander();
    timeline
        .iter()
        .flat_map(|(_, note)| {
            expander
                .expand(note, song.beats_per_bar(), song.tempo())
                .hit_instants
                .into_iter()
                .map(move |beat| LanePress {
                    lane: note.lane,
                    time: clock.time_at_beat(beat) + config.play.hit_offset,
                })
        })
        .collect()
}

fn log_event(event: &PlayEvent) {
    match event {
        PlayEvent::Hit { id, lane, judgment } => tracing::info!(
            instance = %id,
            lane,
            label = %judgment.label,
            late = judgment.late,
            "hit"
        ),
        PlayEvent::Miss {
            id,
            lane,
            hit_instant,
        } => tracing::info!(instance = %id, lane, hit_instant, "miss"),
        other => tracing::debug!(?other, "play event"),
    }
}

fn run_edit(config: &AppConfig, song_path: &Path, op: EditOp) -> loopbeat_core::Result<()> {
    let song = Song::load(song_path)?;
    let timeline = load_timeline(config, &song)?;
    let mut editor = EditorSession::new(song, timeline, config.editor.phrase_bars);

    match op {
        EditOp::Add {
            lane,
            beat_pos,
            bar,
        } => {
            editor.set_bar(bar);
            let handle = editor.place(lane, beat_pos)?;
            tracing::info!(%handle, lane, beat_pos, bar, "placed note");
        }
        EditOp::SetStart { note, value } => {
            select_by_index(&mut editor, note)?;
            editor.set_selected_start(value)?;
        }
        EditOp::SetStop { note, value } => {
            select_by_index(&mut editor, note)?;
            editor.set_selected_stop(value)?;
        }
        EditOp::Remove { note } => {
            select_by_index(&mut editor, note)?;
            let removed = editor.remove_selected()?;
            tracing::info!(?removed, "removed note");
        }
        EditOp::Bar { bar } => {
            editor.set_bar(bar);
            for (handle, note) in editor.notes_in_current_bar() {
                println!(
                    "{handle}: lane {} pos {} [{}, {}]",
                    note.lane, note.beat_pos, note.start, note.stop
                );
            }
            return Ok(());
        }
    }

    editor.save(&TrackStore::new(&config.tracks_dir))?;
    Ok(())
}

fn select_by_index(editor: &mut EditorSession, index: usize) -> loopbeat_core::Result<()> {
    let handle = editor
        .timeline()
        .handle_at(index)
        .ok_or_else(|| LoopbeatError::msg(format!("no note at index {index}")))?;
    editor.select(handle)?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Loopbeat rhythm game core host", long_about = None)]
struct Cli {
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the hit instants of every note in a song's track.
    Expand {
        /// Song descriptor (JSON).
        #[arg(long)]
        song: PathBuf,
    },
    /// Play a track against recorded presses, or autoplay it.
    Play {
        #[arg(long)]
        song: PathBuf,
        /// JSON list of `{"lane": .., "time": ..}` presses.
        #[arg(long)]
        presses: Option<PathBuf>,
        /// Ticks per second of song time.
        #[arg(long, default_value_t = 120)]
        fps: u32,
    },
    /// Edit a song's track and save it back.
    Edit {
        #[arg(long)]
        song: PathBuf,
        #[command(subcommand)]
        op: EditOp,
    },
}

#[derive(Subcommand, Debug)]
enum EditOp {
    /// Place a note in a bar.
    Add {
        #[arg(long)]
        lane: usize,
        #[arg(long)]
        beat_pos: f64,
        #[arg(long)]
        bar: u32,
    },
    /// Move the start of the note at a track index.
    SetStart {
        #[arg(long)]
        note: usize,
        #[arg(long, allow_hyphen_values = true)]
        value: f64,
    },
    /// Move the stop of the note at a track index.
    SetStop {
        #[arg(long)]
        note: usize,
        #[arg(long, allow_hyphen_values = true)]
        value: f64,
    },
    Remove {
        #[arg(long)]
        note: usize,
    },
    /// List the notes visible in a bar.
    Bar {
        #[arg(long)]
        bar: u32,
    },
}
