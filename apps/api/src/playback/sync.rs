use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Tracks further than this from the video clock (seconds) are re-seeked.
pub const DRIFT_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemKind {
    Vocals,
    Music,
    Original,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StemTrack {
    pub stem_id: String,
    pub kind: StemKind,
    pub volume: f64,
    pub muted: bool,
}

impl StemTrack {
    pub fn new(stem_id: impl Into<String>, kind: StemKind) -> Self {
        Self {
            stem_id: stem_id.into(),
            kind,
            volume: 1.0,
            muted: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSegment {
    pub segment_id: String,
    pub start: f64,
    pub end: f64,
}

impl VoiceSegment {
    fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SyncAction {
    Seek { stem_id: String, to: f64 },
    SetVolume { stem_id: String, volume: f64 },
    /// Start the replacement audio `offset` seconds in.
    StartSegment { segment_id: String, offset: f64 },
    /// Pause the replacement audio and rewind it to 0.
    StopSegment { segment_id: String },
}

fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Level the player should use for `track`: silent when muted or when a
/// vocals track is ducked, otherwise the track's own volume.
fn audible_volume(track: &StemTrack, ducked: bool) -> f64 {
    if track.muted || (ducked && track.kind == StemKind::Vocals) {
        0.0
    } else {
        track.volume
    }
}

/// Decides, tick by tick, what a player must do to keep stems aligned with
/// the video and voice segments switched in and out.
#[derive(Debug, Default)]
pub struct SyncPlanner {
    tracks: Vec<StemTrack>,
    segments: Vec<VoiceSegment>,
    active: HashSet<String>,
    ducked: bool,
}

impl SyncPlanner {
    pub fn new(tracks: Vec<StemTrack>, segments: Vec<VoiceSegment>) -> Self {
        let tracks = tracks
            .into_iter()
            .map(|t| StemTrack {
                volume: clamp_volume(t.volume),
                ..t
            })
            .collect();
        Self {
            tracks,
            segments,
            active: HashSet::new(),
            ducked: false,
        }
    }

    pub fn tracks(&self) -> &[StemTrack] {
        &self.tracks
    }

    pub fn is_active(&self, segment_id: &str) -> bool {
        self.active.contains(segment_id)
    }

    /// `positions` maps stem id to that track's current time. Tracks with no
    /// reported position are left alone.
    pub fn tick(&mut self, video_time: f64, positions: &HashMap<String, f64>) -> Vec<SyncAction> {
        let mut actions = Vec::new();

        for track in self.tracks.iter().filter(|t| !t.muted) {
            if let Some(pos) = positions.get(&track.stem_id) {
                if (pos - video_time).abs() > DRIFT_THRESHOLD {
                    actions.push(SyncAction::Seek {
                        stem_id: track.stem_id.clone(),
                        to: video_time,
                    });
                }
            }
        }

        for segment in &self.segments {
            let inside = segment.contains(video_time);
            let active = self.active.contains(&segment.segment_id);
            if inside && !active {
                self.active.insert(segment.segment_id.clone());
                actions.push(SyncAction::StartSegment {
                    segment_id: segment.segment_id.clone(),
                    offset: video_time - segment.start,
                });
            } else if !inside && active {
                self.active.remove(&segment.segment_id);
                actions.push(SyncAction::StopSegment {
                    segment_id: segment.segment_id.clone(),
                });
            }
        }

        self.reconcile_ducking(&mut actions);
        actions
    }

    /// Vocals are silenced while any segment plays and restored afterwards.
    /// Muted vocals stay silent either way.
    fn reconcile_ducking(&mut self, actions: &mut Vec<SyncAction>) {
        let should_duck = !self.active.is_empty();
        if should_duck == self.ducked {
            return;
        }
        self.ducked = should_duck;
        for track in self
            .tracks
            .iter()
            .filter(|t| t.kind == StemKind::Vocals && !t.muted)
        {
            actions.push(SyncAction::SetVolume {
                stem_id: track.stem_id.clone(),
                volume: audible_volume(track, should_duck),
            });
        }
    }

    /// Returns the volume change to apply, if any. A muted or ducked track
    /// keeps the new level for when it becomes audible again.
    pub fn set_volume(&mut self, stem_id: &str, volume: f64) -> Option<SyncAction> {
        let ducked = self.ducked;
        let track = self.tracks.iter_mut().find(|t| t.stem_id == stem_id)?;
        track.volume = clamp_volume(volume);
        if track.muted || (ducked && track.kind == StemKind::Vocals) {
            return None;
        }
        Some(SyncAction::SetVolume {
            stem_id: track.stem_id.clone(),
            volume: track.volume,
        })
    }

    /// Mutes or unmutes a stem. `None` for an unknown stem.
    pub fn set_muted(&mut self, stem_id: &str, muted: bool) -> Option<SyncAction> {
        let ducked = self.ducked;
        let track = self.tracks.iter_mut().find(|t| t.stem_id == stem_id)?;
        track.muted = muted;
        Some(SyncAction::SetVolume {
            stem_id: track.stem_id.clone(),
            volume: audible_volume(track, ducked),
        })
    }

    pub fn add_segment(&mut self, segment: VoiceSegment) {
        self.segments.retain(|s| s.segment_id != segment.segment_id);
        self.segments.push(segment);
    }

    pub fn remove_segment(&mut self, segment_id: &str) -> Vec<SyncAction> {
        self.segments.retain(|s| s.segment_id != segment_id);
        let mut actions = Vec::new();
        if self.active.remove(segment_id) {
            actions.push(SyncAction::StopSegment {
                segment_id: segment_id.to_string(),
            });
            self.reconcile_ducking(&mut actions);
        }
        actions
    }

    /// Stops every active segment and restores vocals. Used on pause.
    pub fn stop_all(&mut self) -> Vec<SyncAction> {
        let mut ids: Vec<String> = self.active.drain().collect();
        ids.sort();
        let mut actions: Vec<SyncAction> = ids
            .into_iter()
            .map(|segment_id| SyncAction::StopSegment { segment_id })
            .collect();
        self.reconcile_ducking(&mut actions);
        actions
    }
}
