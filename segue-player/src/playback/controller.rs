//! Playback decision loop
//!
//! One task owns every piece of playback state: the playlist, both
//! channels, the crossfade scheduler, the gap detector and the task
//! dispatcher. Commands, task completions and timer ticks are serialized
//! through a single `select!` loop, so no decision ever races another.
//! The HTTP layer talks to it through [`PlayerHandle`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{debug, info, warn};
use uuid::Uuid;

use segue_common::events::{EngineActivity, PlaybackState, PlayerEvent};
use segue_common::{EngineParams, Track, TrackSource};

use crate::error::{Error, Result};
use crate::playback::{
    ChannelPair, CrossfadeScheduler, GapAction, GapDetector, GapStatus, PlaylistState, TickEffect,
};
use crate::remote::RemoteClient;
use crate::state::{EngineSnapshot, NowPlaying, SharedState};
use crate::tasks::{slots, TaskDelivery, TaskDispatcher, TaskOutcome, TaskPayload, TaskTicket};

/// Deadlines for the dispatcher slots
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const PLAYLISTS_TIMEOUT: Duration = Duration::from_secs(5);
const PLAYLIST_TRACKS_TIMEOUT: Duration = Duration::from_secs(15);
const METADATA_TIMEOUT: Duration = Duration::from_secs(15);
const PREFETCH_TIMEOUT: Duration = Duration::from_secs(120);
const SCAN_TIMEOUT: Duration = Duration::from_secs(600);
const SERVER_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// How often the remote server is probed while one is configured
const SERVER_PROBE_PERIOD: Duration = Duration::from_secs(15);

/// Silence this close to the end of a track advances instead of seeking
const NEAR_END_GUARD: Duration = Duration::from_secs(12);

/// Requests accepted by the decision loop
///
/// Every variant that can fail carries a oneshot reply so HTTP handlers
/// get a synchronous verdict while the loop stays the only mutator.
#[derive(Debug)]
pub enum ControllerCommand {
    Play {
        index: Option<usize>,
        reply: oneshot::Sender<Result<()>>,
    },
    Pause {
        reply: oneshot::Sender<Result<()>>,
    },
    Toggle {
        reply: oneshot::Sender<Result<PlaybackState>>,
    },
    Next {
        reply: oneshot::Sender<Result<usize>>,
    },
    Previous {
        reply: oneshot::Sender<Result<usize>>,
    },
    JumpTo {
        index: usize,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        reply: oneshot::Sender<Result<()>>,
    },
    Seek {
        position: Duration,
        reply: oneshot::Sender<Result<()>>,
    },
    SetVolume {
        volume: f32,
        reply: oneshot::Sender<Result<f32>>,
    },
    ReplacePlaylist {
        tracks: Vec<Track>,
        autoplay: bool,
        reply: oneshot::Sender<Result<usize>>,
    },
    Enqueue {
        tracks: Vec<Track>,
        reply: oneshot::Sender<Result<usize>>,
    },
    ClearPlaylist {
        reply: oneshot::Sender<Result<()>>,
    },
    Playlist {
        reply: oneshot::Sender<Result<Vec<Track>>>,
    },
    Search {
        column: String,
        query: String,
        reply: oneshot::Sender<Result<TaskTicket>>,
    },
    ListPlaylists {
        reply: oneshot::Sender<Result<TaskTicket>>,
    },
    LoadPlaylist {
        playlist_id: i64,
        autoplay: bool,
        reply: oneshot::Sender<Result<TaskTicket>>,
    },
    ScanLibrary {
        folder: Option<String>,
        reply: oneshot::Sender<Result<TaskTicket>>,
    },
    CheckServer {
        reply: oneshot::Sender<Result<TaskTicket>>,
    },
    Shutdown,
}

/// Cloneable handle for sending commands to the decision loop
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<ControllerCommand>,
}

impl PlayerHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> ControllerCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .map_err(|_| Error::PlayerGone("playback controller is not running".to_string()))?;
        rx.await
            .map_err(|_| Error::PlayerGone("playback controller dropped the request".to_string()))?
    }

    /// Start or resume playback, optionally jumping to a playlist index
    pub async fn play(&self, index: Option<usize>) -> Result<()> {
        self.request(|reply| ControllerCommand::Play { index, reply })
            .await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(|reply| ControllerCommand::Pause { reply }).await
    }

    /// Toggle play/pause; returns the resulting state
    pub async fn toggle(&self) -> Result<PlaybackState> {
        self.request(|reply| ControllerCommand::Toggle { reply }).await
    }

    /// Advance to the next track; returns the new playlist index
    pub async fn next(&self) -> Result<usize> {
        self.request(|reply| ControllerCommand::Next { reply }).await
    }

    /// Go back one track (restarts the first track when already there)
    pub async fn previous(&self) -> Result<usize> {
        self.request(|reply| ControllerCommand::Previous { reply })
            .await
    }

    pub async fn jump_to(&self, index: usize) -> Result<()> {
        self.request(|reply| ControllerCommand::JumpTo { index, reply })
            .await
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| ControllerCommand::Stop { reply }).await
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.request(|reply| ControllerCommand::Seek { position, reply })
            .await
    }

    /// Set master volume; returns the clamped value
    pub async fn set_volume(&self, volume: f32) -> Result<f32> {
        self.request(|reply| ControllerCommand::SetVolume { volume, reply })
            .await
    }

    /// Replace the playlist; returns the new track count
    pub async fn replace_playlist(&self, tracks: Vec<Track>, autoplay: bool) -> Result<usize> {
        self.request(|reply| ControllerCommand::ReplacePlaylist {
            tracks,
            autoplay,
            reply,
        })
        .await
    }

    /// Append tracks without touching the playback position
    pub async fn enqueue(&self, tracks: Vec<Track>) -> Result<usize> {
        self.request(|reply| ControllerCommand::Enqueue { tracks, reply })
            .await
    }

    pub async fn clear_playlist(&self) -> Result<()> {
        self.request(|reply| ControllerCommand::ClearPlaylist { reply })
            .await
    }

    /// Snapshot of the current playlist contents
    pub async fn playlist(&self) -> Result<Vec<Track>> {
        self.request(|reply| ControllerCommand::Playlist { reply })
            .await
    }

    /// Kick off a library search; results arrive as a SearchCompleted event
    pub async fn search(&self, column: String, query: String) -> Result<TaskTicket> {
        self.request(|reply| ControllerCommand::Search {
            column,
            query,
            reply,
        })
        .await
    }

    pub async fn list_playlists(&self) -> Result<TaskTicket> {
        self.request(|reply| ControllerCommand::ListPlaylists { reply })
            .await
    }

    /// Load a server playlist into the queue, optionally starting playback
    pub async fn load_playlist(&self, playlist_id: i64, autoplay: bool) -> Result<TaskTicket> {
        self.request(|reply| ControllerCommand::LoadPlaylist {
            playlist_id,
            autoplay,
            reply,
        })
        .await
    }

    /// Ask the remote server to rescan its library
    pub async fn scan_library(&self, folder: Option<String>) -> Result<TaskTicket> {
        self.request(|reply| ControllerCommand::ScanLibrary { folder, reply })
            .await
    }

    pub async fn check_server(&self) -> Result<TaskTicket> {
        self.request(|reply| ControllerCommand::CheckServer { reply })
            .await
    }

    /// Ask the loop to exit. Best effort; no reply.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ControllerCommand::Shutdown);
    }
}

/// The playback decision loop
pub struct PlaybackController {
    params: EngineParams,
    playlist: PlaylistState,
    channels: ChannelPair,
    scheduler: CrossfadeScheduler,
    gap: GapDetector,
    tasks: TaskDispatcher<TaskPayload>,
    remote: Option<RemoteClient>,
    spool_dir: PathBuf,
    shared: Arc<SharedState>,
    master_volume: f32,
    state: PlaybackState,
    activity: EngineActivity,
    /// Start playback when the in-flight playlist load completes
    autoplay_on_load: bool,
    /// Track the prefetch slot is currently spooling, to avoid resubmits
    prefetch_target: Option<Uuid>,
    tick_count: u64,
    commands: Option<mpsc::UnboundedReceiver<ControllerCommand>>,
}

impl PlaybackController {
    /// Build the controller and its command handle.
    ///
    /// `channels` carries the two audio sinks; `remote` is None when no
    /// library server is configured (local-only operation).
    pub fn new(
        params: EngineParams,
        channels: ChannelPair,
        remote: Option<RemoteClient>,
        spool_dir: PathBuf,
        shared: Arc<SharedState>,
    ) -> (Self, PlayerHandle) {
        let params = params.clamped();
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            scheduler: CrossfadeScheduler::new(&params),
            gap: GapDetector::new(&params),
            params,
            playlist: PlaylistState::new(),
            channels,
            tasks: TaskDispatcher::new(),
            remote,
            spool_dir,
            shared,
            master_volume: 1.0,
            state: PlaybackState::Stopped,
            activity: EngineActivity::Inactive,
            autoplay_on_load: false,
            prefetch_target: None,
            tick_count: 0,
            commands: Some(rx),
        };
        (controller, PlayerHandle { tx })
    }

    /// Run the decision loop until shutdown.
    ///
    /// Everything that mutates playback state happens inside this loop;
    /// the commit sequence of a transition is never interleaved with a
    /// command or a task completion.
    pub async fn run(mut self) {
        let mut commands = match self.commands.take() {
            Some(rx) => rx,
            None => {
                warn!("controller started twice; refusing to run");
                return;
            }
        };
        let mut deliveries = match self.tasks.take_delivery_rx() {
            Some(rx) => rx,
            None => {
                warn!("task delivery channel already taken; refusing to run");
                return;
            }
        };

        let tick_interval = self.params.gap_sampling_interval();
        let mut ticker = time::interval(tick_interval);
        let mut probe_ticker = time::interval(SERVER_PROBE_PERIOD);

        info!(
            tick_ms = tick_interval.as_millis() as u64,
            remote = self.remote.is_some(),
            "playback controller running"
        );

        loop {
            tokio::select! {
                maybe_cmd = commands.recv() => {
                    match maybe_cmd {
                        Some(ControllerCommand::Shutdown) | None => break,
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }
                Some(delivery) = deliveries.recv() => {
                    self.handle_delivery(delivery).await;
                }
                _ = ticker.tick() => {
                    self.handle_tick().await;
                }
                _ = probe_ticker.tick(), if self.remote.is_some() => {
                    let _ = self.submit_probe();
                }
            }
        }

        self.channels.stop_both();
        info!("playback controller stopped");
    }

    async fn handle_command(&mut self, cmd: ControllerCommand) {
        match cmd {
            ControllerCommand::Play { index, reply } => {
                let _ = reply.send(self.cmd_play(index).await);
            }
            ControllerCommand::Pause { reply } => {
                let _ = reply.send(self.cmd_pause().await);
            }
            ControllerCommand::Toggle { reply } => {
                let _ = reply.send(self.cmd_toggle().await);
            }
            ControllerCommand::Next { reply } => {
                let _ = reply.send(self.cmd_next().await);
            }
            ControllerCommand::Previous { reply } => {
                let _ = reply.send(self.cmd_previous().await);
            }
            ControllerCommand::JumpTo { index, reply } => {
                let _ = reply.send(self.cmd_jump(index).await.map(|_| ()));
            }
            ControllerCommand::Stop { reply } => {
                let _ = reply.send(self.cmd_stop().await);
            }
            ControllerCommand::Seek { position, reply } => {
                let _ = reply.send(self.cmd_seek(position).await);
            }
            ControllerCommand::SetVolume { volume, reply } => {
                let _ = reply.send(self.cmd_set_volume(volume).await);
            }
            ControllerCommand::ReplacePlaylist {
                tracks,
                autoplay,
                reply,
            } => {
                let _ = reply.send(self.cmd_replace_playlist(tracks, autoplay).await);
            }
            ControllerCommand::Enqueue { tracks, reply } => {
                let _ = reply.send(self.cmd_enqueue(tracks).await);
            }
            ControllerCommand::ClearPlaylist { reply } => {
                let _ = reply.send(self.cmd_clear().await);
            }
            ControllerCommand::Playlist { reply } => {
                let _ = reply.send(Ok(self.playlist.tracks().to_vec()));
            }
            ControllerCommand::Search {
                column,
                query,
                reply,
            } => {
                let _ = reply.send(self.submit_search(column, query));
            }
            ControllerCommand::ListPlaylists { reply } => {
                let _ = reply.send(self.submit_list_playlists());
            }
            ControllerCommand::LoadPlaylist {
                playlist_id,
                autoplay,
                reply,
            } => {
                let _ = reply.send(self.submit_load_playlist(playlist_id, autoplay));
            }
            ControllerCommand::ScanLibrary { folder, reply } => {
                let _ = reply.send(self.submit_scan(folder));
            }
            ControllerCommand::CheckServer { reply } => {
                let _ = reply.send(self.submit_probe());
            }
            ControllerCommand::Shutdown => {}
        }
    }

    // ---- playback commands ----

    async fn cmd_play(&mut self, index: Option<usize>) -> Result<()> {
        if let Some(index) = index {
            return self.cmd_jump(index).await.map(|_| ());
        }
        match self.state {
            PlaybackState::Playing => Ok(()),
            PlaybackState::Paused => {
                self.channels.resume_both();
                self.set_state(PlaybackState::Playing).await;
                self.publish_snapshot().await;
                Ok(())
            }
            PlaybackState::Stopped => {
                if self.playlist.is_empty() {
                    return Err(Error::TrackIndexOutOfRange { index: 0, len: 0 });
                }
                let index = self.playlist.current_index().unwrap_or(0);
                self.start_fresh(index).await.map(|_| ())
            }
        }
    }

    async fn cmd_pause(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Playing => {
                self.channels.pause_both();
                self.set_state(PlaybackState::Paused).await;
                self.publish_snapshot().await;
                Ok(())
            }
            PlaybackState::Paused => Ok(()),
            PlaybackState::Stopped => Err(Error::NothingPlaying),
        }
    }

    async fn cmd_toggle(&mut self) -> Result<PlaybackState> {
        match self.state {
            PlaybackState::Playing => self.cmd_pause().await?,
            PlaybackState::Paused | PlaybackState::Stopped => self.cmd_play(None).await?,
        }
        Ok(self.state)
    }

    /// Validate the index before reporting the current track interrupted;
    /// a rejected jump must not disturb playback or emit anything.
    async fn cmd_jump(&mut self, index: usize) -> Result<usize> {
        if self.playlist.get(index).is_none() {
            return Err(Error::TrackIndexOutOfRange {
                index,
                len: self.playlist.len(),
            });
        }
        self.note_interrupted();
        self.start_fresh(index).await
    }

    async fn cmd_next(&mut self) -> Result<usize> {
        let index = self.playlist.next_index().ok_or(Error::TrackIndexOutOfRange {
            index: self.playlist.current_index().map(|i| i + 1).unwrap_or(0),
            len: self.playlist.len(),
        })?;
        self.note_interrupted();
        self.start_fresh(index).await
    }

    async fn cmd_previous(&mut self) -> Result<usize> {
        let index = self
            .playlist
            .previous_index()
            .ok_or(Error::TrackIndexOutOfRange {
                index: 0,
                len: self.playlist.len(),
            })?;
        self.note_interrupted();
        self.start_fresh(index).await
    }

    async fn cmd_stop(&mut self) -> Result<()> {
        if self.state == PlaybackState::Stopped {
            return Ok(());
        }
        self.note_interrupted();
        self.quiesce("stopped");
        self.set_state(PlaybackState::Stopped).await;
        self.publish_snapshot().await;
        Ok(())
    }

    async fn cmd_seek(&mut self, position: Duration) -> Result<()> {
        if !self.scheduler.is_idle() {
            return Err(Error::TransitionBusy);
        }
        if self.channels.active().loaded_track().is_none() {
            return Err(Error::NothingPlaying);
        }
        let mut target = position;
        if let Some(total) = self.channels.active().duration() {
            target = target.min(total);
        }
        self.channels.active_mut().seek(target)?;
        self.gap.reset(self.channels.active_id());
        if let Some(track) = self.playlist.current() {
            self.emit(PlayerEvent::PositionUpdate {
                track_id: track.id,
                position_ms: target.as_millis() as u64,
                duration_ms: self
                    .channels
                    .active()
                    .duration()
                    .map(|d| d.as_millis() as u64),
                timestamp: Utc::now(),
            });
        }
        self.publish_snapshot().await;
        Ok(())
    }

    async fn cmd_set_volume(&mut self, volume: f32) -> Result<f32> {
        let clamped = volume.clamp(0.0, 1.0);
        self.master_volume = clamped;
        self.channels.apply_master(clamped);
        self.shared.set_volume(clamped).await;
        self.emit(PlayerEvent::VolumeChanged {
            volume: clamped,
            timestamp: Utc::now(),
        });
        Ok(clamped)
    }

    async fn cmd_replace_playlist(&mut self, tracks: Vec<Track>, autoplay: bool) -> Result<usize> {
        if self.state != PlaybackState::Stopped {
            self.note_interrupted();
            self.quiesce("playlist replaced");
            self.set_state(PlaybackState::Stopped).await;
        }
        self.playlist.replace(tracks);
        self.scheduler.note_playlist_changed();
        self.prefetch_target = None;
        let count = self.playlist.len();
        info!(count, "playlist replaced");
        self.emit(PlayerEvent::PlaylistChanged {
            track_count: count,
            timestamp: Utc::now(),
        });
        if autoplay && !self.playlist.is_empty() {
            self.start_fresh(0).await?;
        }
        self.publish_snapshot().await;
        Ok(count)
    }

    async fn cmd_enqueue(&mut self, tracks: Vec<Track>) -> Result<usize> {
        self.playlist.enqueue(tracks);
        self.scheduler.note_playlist_changed();
        let count = self.playlist.len();
        self.emit(PlayerEvent::PlaylistChanged {
            track_count: count,
            timestamp: Utc::now(),
        });
        self.maybe_prefetch_next();
        self.publish_snapshot().await;
        Ok(count)
    }

    async fn cmd_clear(&mut self) -> Result<()> {
        if self.state != PlaybackState::Stopped {
            self.note_interrupted();
            self.quiesce("playlist cleared");
            self.set_state(PlaybackState::Stopped).await;
        }
        self.playlist.clear();
        self.scheduler.note_playlist_changed();
        self.prefetch_target = None;
        self.emit(PlayerEvent::PlaylistChanged {
            track_count: 0,
            timestamp: Utc::now(),
        });
        self.publish_snapshot().await;
        Ok(())
    }

    /// Stop whatever is in flight and start the given playlist index on the
    /// active channel. The order is fixed: cancel the transition, reset the
    /// gap detector, stop both channels, then load.
    async fn start_fresh(&mut self, index: usize) -> Result<usize> {
        if self.playlist.get(index).is_none() {
            return Err(Error::TrackIndexOutOfRange {
                index,
                len: self.playlist.len(),
            });
        }
        self.quiesce("superseded by jump");
        let track = self.playlist.jump_to(index)?.clone();
        if let Err(e) = self
            .scheduler
            .begin_track(&mut self.channels, &track, self.master_volume)
        {
            warn!(index, error = %e, "failed to start track");
            self.set_state(PlaybackState::Stopped).await;
            self.publish_snapshot().await;
            return Err(e);
        }
        info!(index, track = %track.display_name(), "started track");
        self.set_state(PlaybackState::Playing).await;
        self.emit(PlayerEvent::TrackStarted {
            track_id: track.id,
            index,
            title: track.display_name(),
            timestamp: Utc::now(),
        });
        self.kick_followup_tasks();
        self.publish_snapshot().await;
        Ok(index)
    }

    /// Cancel any transition, clear silence tracking, silence both channels
    fn quiesce(&mut self, reason: &str) {
        if self.scheduler.cancel(&mut self.channels, self.master_volume) {
            self.emit(PlayerEvent::TransitionCancelled {
                reason: reason.to_string(),
                timestamp: Utc::now(),
            });
        }
        self.gap.reset_all();
        self.channels.stop_both();
    }

    /// Emit TrackFinished(completed=false) for the track about to be cut off
    fn note_interrupted(&self) {
        if self.state == PlaybackState::Stopped {
            return;
        }
        if let (Some(index), Some(track)) = (self.playlist.current_index(), self.playlist.current())
        {
            self.emit(PlayerEvent::TrackFinished {
                track_id: track.id,
                index,
                completed: false,
                timestamp: Utc::now(),
            });
        }
    }

    // ---- periodic evaluation ----

    async fn handle_tick(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let interval = self.params.gap_sampling_interval();
        let next = self.playlist.next_track().cloned();
        let effect =
            self.scheduler
                .tick(&mut self.channels, next.as_ref(), interval, self.master_volume);
        match effect {
            TickEffect::None | TickEffect::FadeStep { .. } => {}
            TickEffect::Armed { from, to } => {
                self.emit(PlayerEvent::TransitionStarted {
                    from_track: from,
                    to_track: to,
                    curve: self.scheduler.curve(),
                    window_seconds: self.scheduler.window_seconds(),
                    timestamp: Utc::now(),
                });
            }
            TickEffect::ArmFailed { track_id, reason } => {
                self.emit(PlayerEvent::TransitionCancelled {
                    reason: format!("standby load failed for {track_id}: {reason}"),
                    timestamp: Utc::now(),
                });
            }
            TickEffect::Committed => self.on_transition_committed().await,
            TickEffect::Finished => self.on_track_finished().await,
        }

        if self.state == PlaybackState::Playing && self.scheduler.is_idle() {
            let lane = self.channels.active_id();
            if self.channels.active().loaded_track().is_some() {
                let level = self.channels.active().level_db();
                if let Some(GapAction::SkipAhead(offset)) = self.gap.sample(lane, level, interval)
                {
                    self.on_gap_skip(offset).await;
                }
            }
        }

        self.tick_count = self.tick_count.wrapping_add(1);
        let ticks_per_second = (1000 / (interval.as_millis().max(1) as u64)).max(1);
        if self.state == PlaybackState::Playing && self.tick_count % ticks_per_second == 0 {
            if let Some(track) = self.playlist.current() {
                self.emit(PlayerEvent::PositionUpdate {
                    track_id: track.id,
                    position_ms: self.channels.active().position().as_millis() as u64,
                    duration_ms: self
                        .channels
                        .active()
                        .duration()
                        .map(|d| d.as_millis() as u64),
                    timestamp: Utc::now(),
                });
            }
        }
        self.publish_snapshot().await;
    }

    /// The fade ran to completion: the standby channel has already been
    /// promoted by the scheduler, so align the playlist and bookkeeping.
    async fn on_transition_committed(&mut self) {
        if let (Some(index), Some(track)) = (self.playlist.current_index(), self.playlist.current())
        {
            self.emit(PlayerEvent::TrackFinished {
                track_id: track.id,
                index,
                completed: true,
                timestamp: Utc::now(),
            });
        }
        if let Err(e) = self.playlist.advance() {
            warn!(error = %e, "transition committed without a playlist successor");
            return;
        }
        self.gap.reset_all();
        if let (Some(index), Some(track)) = (self.playlist.current_index(), self.playlist.current())
        {
            let track_id = track.id;
            let title = track.display_name();
            info!(index, track = %title, "transition committed");
            self.emit(PlayerEvent::TransitionCommitted {
                track_id,
                timestamp: Utc::now(),
            });
            self.emit(PlayerEvent::TrackStarted {
                track_id,
                index,
                title,
                timestamp: Utc::now(),
            });
        }
        self.kick_followup_tasks();
        self.publish_snapshot().await;
    }

    /// The active track drained with no transition armed (no next track,
    /// a cue curve, or a track shorter than the window).
    async fn on_track_finished(&mut self) {
        if let (Some(index), Some(track)) = (self.playlist.current_index(), self.playlist.current())
        {
            self.emit(PlayerEvent::TrackFinished {
                track_id: track.id,
                index,
                completed: true,
                timestamp: Utc::now(),
            });
            self.playlist.mark_played(index);
        }
        self.gap.reset_all();
        match self.playlist.next_index() {
            Some(next) => {
                if let Err(e) = self.start_fresh(next).await {
                    warn!(index = next, error = %e, "could not start next track");
                }
            }
            None => {
                info!("playlist finished");
                self.channels.stop_both();
                self.set_state(PlaybackState::Stopped).await;
                self.publish_snapshot().await;
            }
        }
    }

    async fn on_gap_skip(&mut self, offset: Duration) {
        let lane = self.channels.active_id();
        let Some(track_id) = self.channels.active().loaded_track() else {
            return;
        };
        let position = self.channels.active().position();
        let duration = self.channels.active().duration();

        if let Some(total) = duration {
            if total.saturating_sub(position) < NEAR_END_GUARD {
                info!(
                    position_s = position.as_secs_f64(),
                    "silence near track end, advancing"
                );
                self.on_track_finished().await;
                return;
            }
        }

        let mut target = position + offset;
        if let Some(total) = duration {
            target = target.min(total.saturating_sub(Duration::from_secs(1)));
        }
        match self.channels.active_mut().seek(target) {
            Ok(()) => {
                self.gap.reset(lane);
                info!(
                    from_s = position.as_secs_f64(),
                    to_s = target.as_secs_f64(),
                    "skipped silence"
                );
                self.emit(PlayerEvent::GapSkipped {
                    track_id,
                    from_ms: position.as_millis() as u64,
                    to_ms: target.as_millis() as u64,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                warn!(error = %e, "gap skip seek failed");
                self.gap.reset(lane);
            }
        }
    }

    // ---- background tasks ----

    fn remote_client(&self) -> Result<RemoteClient> {
        self.remote
            .clone()
            .ok_or_else(|| Error::Config("no remote server configured".to_string()))
    }

    fn submit_search(&mut self, column: String, query: String) -> Result<TaskTicket> {
        let client = self.remote_client()?;
        let ticket = self.tasks.submit(slots::SEARCH, SEARCH_TIMEOUT, async move {
            let hits = client.search(&column, &query).await?;
            Ok(TaskPayload::Search {
                column,
                query,
                hits,
            })
        });
        Ok(ticket)
    }

    fn submit_list_playlists(&mut self) -> Result<TaskTicket> {
        let client = self.remote_client()?;
        let ticket = self
            .tasks
            .submit(slots::PLAYLISTS, PLAYLISTS_TIMEOUT, async move {
                let playlists = client.playlists().await?;
                Ok(TaskPayload::Playlists(playlists))
            });
        Ok(ticket)
    }

    fn submit_load_playlist(&mut self, playlist_id: i64, autoplay: bool) -> Result<TaskTicket> {
        let client = self.remote_client()?;
        self.autoplay_on_load = autoplay;
        let ticket = self
            .tasks
            .submit(slots::PLAYLIST_TRACKS, PLAYLIST_TRACKS_TIMEOUT, async move {
                let (name, tracks) = client.playlist_tracks(playlist_id).await?;
                Ok(TaskPayload::PlaylistTracks {
                    playlist_id,
                    name,
                    tracks,
                })
            });
        Ok(ticket)
    }

    fn submit_scan(&mut self, folder: Option<String>) -> Result<TaskTicket> {
        let client = self.remote_client()?;
        let ticket = self
            .tasks
            .submit(slots::SCAN_LIBRARY, SCAN_TIMEOUT, async move {
                let summary = client.scan_library(folder.as_deref()).await?;
                Ok(TaskPayload::Scan(summary))
            });
        Ok(ticket)
    }

    fn submit_probe(&mut self) -> Result<TaskTicket> {
        let client = self.remote_client()?;
        let ticket = self
            .tasks
            .submit(slots::SERVER_STATUS, SERVER_STATUS_TIMEOUT, async move {
                let reachable = client.probe().await;
                Ok(TaskPayload::ServerStatus { reachable })
            });
        Ok(ticket)
    }

    /// Kicked after every track start: resolve metadata for the current
    /// track and spool the upcoming remote track.
    fn kick_followup_tasks(&mut self) {
        self.maybe_resolve_metadata();
        self.maybe_prefetch_next();
    }

    fn maybe_resolve_metadata(&mut self) {
        let Ok(client) = self.remote_client() else {
            return;
        };
        let Some(track) = self.playlist.current() else {
            return;
        };
        if track.metadata.is_some() {
            return;
        }
        let TrackSource::Remote { path, .. } = &track.source else {
            return;
        };
        let track_id = track.id;
        let path = path.clone();
        self.tasks.submit(slots::METADATA, METADATA_TIMEOUT, async move {
            let metadata = client.metadata(&path).await?;
            Ok(TaskPayload::Metadata { track_id, metadata })
        });
    }

    fn maybe_prefetch_next(&mut self) {
        let Ok(client) = self.remote_client() else {
            return;
        };
        let next = match self.playlist.next_track() {
            Some(track) => track.clone(),
            None => return,
        };
        if next.cached.is_some() || !matches!(next.source, TrackSource::Remote { .. }) {
            return;
        }
        if self.prefetch_target == Some(next.id) && self.tasks.is_busy(slots::PREFETCH) {
            return;
        }
        self.prefetch_target = Some(next.id);
        let spool = self.spool_dir.clone();
        debug!(track = %next.display_name(), "prefetching upcoming track");
        self.tasks.submit(slots::PREFETCH, PREFETCH_TIMEOUT, async move {
            let path = client.prefetch(&next, &spool).await?;
            Ok(TaskPayload::Prefetched {
                track_id: next.id,
                path,
            })
        });
    }

    async fn handle_delivery(&mut self, delivery: TaskDelivery<TaskPayload>) {
        let Some(delivery) = self.tasks.accept(delivery) else {
            return;
        };
        match delivery.outcome {
            TaskOutcome::Completed(payload) => self.on_payload(payload).await,
            TaskOutcome::Failed(error) => {
                warn!(slot = %delivery.slot, error = %error, "background task failed");
                if delivery.slot == slots::SERVER_STATUS {
                    self.shared.set_server_reachable(false).await;
                    self.emit(PlayerEvent::ServerStatusChanged {
                        reachable: false,
                        timestamp: Utc::now(),
                    });
                }
                if delivery.slot == slots::PREFETCH {
                    self.prefetch_target = None;
                }
                self.emit(PlayerEvent::TaskFailed {
                    slot: delivery.slot,
                    error: error.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
    }

    async fn on_payload(&mut self, payload: TaskPayload) {
        match payload {
            TaskPayload::Search {
                column,
                query,
                hits,
            } => {
                let results = match &self.remote {
                    Some(client) => hits
                        .into_iter()
                        .map(|hit| hit.into_track(client.base_url()))
                        .collect(),
                    None => Vec::new(),
                };
                self.emit(PlayerEvent::SearchCompleted {
                    column,
                    query,
                    results,
                    timestamp: Utc::now(),
                });
            }
            TaskPayload::Playlists(playlists) => {
                debug!(count = playlists.len(), "playlists listed");
                self.emit(PlayerEvent::PlaylistsListed {
                    playlists,
                    timestamp: Utc::now(),
                });
            }
            TaskPayload::PlaylistTracks {
                playlist_id,
                name,
                tracks,
            } => {
                info!(playlist_id, name = %name, count = tracks.len(), "playlist loaded");
                let autoplay = std::mem::take(&mut self.autoplay_on_load);
                if let Err(e) = self.cmd_replace_playlist(tracks, autoplay).await {
                    warn!(error = %e, "could not start loaded playlist");
                }
            }
            TaskPayload::Metadata { track_id, metadata } => {
                let title = metadata.title.clone();
                let artist = metadata.artist.clone();
                if let Some(track) = self.playlist.find(track_id) {
                    if track.duration_secs.is_none() {
                        track.duration_secs = metadata.duration_secs;
                    }
                    track.metadata = Some(metadata);
                }
                self.emit(PlayerEvent::MetadataResolved {
                    track_id,
                    title,
                    artist,
                    timestamp: Utc::now(),
                });
                self.publish_snapshot().await;
            }
            TaskPayload::Prefetched { track_id, path } => {
                debug!(%track_id, path = %path.display(), "prefetch complete");
                if let Some(track) = self.playlist.find(track_id) {
                    track.cached = Some(path);
                }
            }
            TaskPayload::Scan(summary) => {
                info!(success = summary.success, message = %summary.message, "library scan finished");
                self.emit(PlayerEvent::LibraryScanCompleted {
                    message: summary.message,
                    timestamp: Utc::now(),
                });
            }
            TaskPayload::ServerStatus { reachable } => {
                let previous = self.shared.server_reachable().await;
                self.shared.set_server_reachable(reachable).await;
                if previous != reachable {
                    info!(reachable, "remote server status changed");
                    self.emit(PlayerEvent::ServerStatusChanged {
                        reachable,
                        timestamp: Utc::now(),
                    });
                }
            }
        }
    }

    // ---- state publication ----

    fn emit(&self, event: PlayerEvent) {
        self.shared.broadcast_event(event);
    }

    async fn set_state(&mut self, next: PlaybackState) {
        if self.state == next {
            return;
        }
        let old = self.state;
        self.state = next;
        self.shared.set_playback_state(next).await;
        self.emit(PlayerEvent::PlaybackStateChanged {
            old_state: old,
            new_state: next,
            timestamp: Utc::now(),
        });
    }

    fn current_activity(&self) -> EngineActivity {
        if !self.scheduler.is_idle() {
            return EngineActivity::TransitionActive;
        }
        match self.gap.status(self.channels.active_id()) {
            GapStatus::Triggered => EngineActivity::SkipTriggered,
            GapStatus::Building { .. } => EngineActivity::SilenceBuilding,
            GapStatus::Inactive => EngineActivity::Inactive,
        }
    }

    async fn publish_snapshot(&mut self) {
        let activity = self.current_activity();
        if activity != self.activity {
            self.activity = activity;
            self.emit(PlayerEvent::ActivityChanged {
                activity,
                timestamp: Utc::now(),
            });
        }
        let snapshot = EngineSnapshot {
            activity,
            transition: self.scheduler.state(),
            gap: self.gap.status(self.channels.active_id()),
            active_channel: self.channels.active_id(),
            playlist_len: self.playlist.len(),
            busy_slots: self.tasks.busy_slots(),
        };
        self.shared.set_engine_snapshot(snapshot).await;
        self.shared.set_now_playing(self.now_playing()).await;
    }

    fn now_playing(&self) -> Option<NowPlaying> {
        let index = self.playlist.current_index()?;
        let track = self.playlist.current()?;
        let duration_ms = self
            .channels
            .active()
            .duration()
            .map(|d| d.as_millis() as u64)
            .or_else(|| track.duration_secs.map(|s| (s * 1000.0) as u64));
        Some(NowPlaying {
            track_id: track.id,
            index,
            title: track.display_name(),
            artist: track.metadata.as_ref().and_then(|m| m.artist.clone()),
            album: track.metadata.as_ref().and_then(|m| m.album.clone()),
            position_ms: self.channels.active().position().as_millis() as u64,
            duration_ms,
        })
    }
}
