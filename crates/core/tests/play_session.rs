use loopbeat_core::{
    AppConfig, BeatClock, LaneInput, LanePress, Lifecycle, PlayEvent, PlaySession,
    PlaybackClock, Song, TimelineModel, TrackStore,
};

fn song() -> Song {
    Song::new(120.0, 4, 4, 0.0)
        .unwrap()
        .with_title("Loop")
        .with_track_name("loop")
}

fn authored_timeline() -> TimelineModel {
    let mut timeline = TimelineModel::new(4, 4);
    let kick = timeline.add_note(0, 0.0, 1).unwrap();
    timeline.set_stop(kick, 12.0).unwrap();
    let snare = timeline.add_note(1, 2.0, 1).unwrap();
    timeline.set_stop(snare, 14.0).unwrap();
    timeline
}

#[test]
fn authored_track_plays_through_saved_and_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrackStore::new(dir.path());
    let song = song();
    store.save(&song.track_name, &authored_timeline().to_notes()).unwrap();

    let notes = store.load(&song.track_name).unwrap();
    let timeline = TimelineModel::from_notes(song.beats_per_bar(), 4, notes);
    let config = AppConfig::default();
    let mut session = PlaySession::from_config(&song, &timeline, &config).unwrap();

    // Kick hits at 4, 8, 12; snare at 6, 10, 14.
    let clock = BeatClock::for_song(&song, config.play.sync_offset);
    let mut input = LaneInput::new();
    let (_, presses) = input.subscribe();
    for (lane, beat) in [(0, 4.02), (1, 6.2), (0, 8.0), (1, 10.0), (0, 11.8)] {
        input.dispatch(LanePress {
            lane,
            time: clock.time_at_beat(beat),
        });
    }
    let mut presses: Vec<LanePress> = presses.try_iter().collect();

    let mut events = Vec::new();
    let mut playback = PlaybackClock::default();
    let mut time = playback.time_seconds;
    while !session.is_finished() && time < 20.0 {
        while presses.first().is_some_and(|press| press.time <= time) {
            let press = presses.remove(0);
            events.extend(session.press(press));
        }
        events.extend(session.tick(time));
        time = playback.advance(1.0 / 120.0);
    }

    assert!(session.is_finished());
    let tally = session.tally();
    assert_eq!(tally.count("Perfect"), 3);
    assert_eq!(tally.count("Good"), 2);
    assert_eq!(tally.misses, 1);
    assert_eq!(tally.max_combo, 5);

    let despawned = events
        .iter()
        .filter(|event| matches!(event, PlayEvent::Despawned { .. }))
        .count();
    assert_eq!(despawned, 2);

    let fading = events
        .iter()
        .filter(|event| {
            matches!(
                event,
                PlayEvent::Lifecycle {
                    state: Lifecycle::FadingOut,
                    ..
                }
            )
        })
        .count();
    assert_eq!(fading, 2);
}
