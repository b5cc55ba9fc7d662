//! Player state bound to one media resource.
//!
//! The resource is imperative and event-driven; the UI wants a declarative snapshot. Events are
//! folded into a [`PlaybackSnapshot`] by the pure [`reduce`] function, and transport controls are
//! forwarded to the resource with their inputs clamped.

use std::future::Future;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::constants::constants;
use crate::error::MediaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackPhase {
  #[default]
  Uninitialized,
  Loading,
  Playing,
  Paused,
  Ended,
}

/// Declarative view of the bound resource.
///
/// `error` is orthogonal to `phase`: a resource can report an error in any phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
  pub phase: PlaybackPhase,
  pub is_playing: bool,
  pub current_time: f64,
  /// `None` until the resource reports a finite, positive duration.
  pub duration: Option<f64>,
  pub volume: f64,
  pub is_muted: bool,
  pub is_fullscreen: bool,
  pub is_loading: bool,
  pub playback_rate: f64,
  pub error: Option<String>,
}

impl Default for PlaybackSnapshot {
  fn default() -> Self {
    Self {
      phase: PlaybackPhase::Uninitialized,
      is_playing: false,
      current_time: 0.0,
      duration: None,
      volume: 1.0,
      is_muted: false,
      is_fullscreen: false,
      is_loading: false,
      playback_rate: 1.0,
      error: None,
    }
  }
}

/// Typed resource events, one per resource callback.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
  LoadStart,
  DataLoaded,
  Play,
  Pause,
  TimeUpdate(f64),
  DurationChange(f64),
  VolumeChange { volume: f64, muted: bool },
  Ended,
  Error(String),
  FullscreenChange(bool),
}

/// Clamp a position into `[0, duration]`; with no known duration only the lower bound applies.
pub fn clamp_time(seconds: f64, duration: Option<f64>) -> f64 {
  let t = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
  match duration {
    Some(d) => t.min(d),
    None => t,
  }
}

pub fn clamp_volume(volume: f64) -> f64 {
  if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) }
}

pub fn clamp_rate(rate: f64) -> f64 {
  let c = constants();
  if rate.is_nan() { 1.0 } else { rate.clamp(c.min_playback_rate, c.max_playback_rate) }
}

fn known_duration(seconds: f64) -> Option<f64> {
  (seconds.is_finite() && seconds > 0.0).then_some(seconds)
}

/// Fold one event into a snapshot.
pub fn reduce(snapshot: &PlaybackSnapshot, event: &PlaybackEvent) -> PlaybackSnapshot {
  let mut next = snapshot.clone();
  match event {
    PlaybackEvent::LoadStart => {
      next.phase = PlaybackPhase::Loading;
      next.is_loading = true;
      next.error = None;
    }
    PlaybackEvent::DataLoaded => {
      next.is_loading = false;
      next.phase = if next.is_playing { PlaybackPhase::Playing } else { PlaybackPhase::Paused };
    }
    PlaybackEvent::Play => {
      next.is_playing = true;
      next.phase = PlaybackPhase::Playing;
    }
    PlaybackEvent::Pause => {
      next.is_playing = false;
      if next.phase != PlaybackPhase::Ended {
        next.phase = PlaybackPhase::Paused;
      }
    }
    PlaybackEvent::TimeUpdate(t) => {
      next.current_time = clamp_time(*t, next.duration);
    }
    PlaybackEvent::DurationChange(d) => {
      next.duration = known_duration(*d);
      next.current_time = clamp_time(next.current_time, next.duration);
    }
    PlaybackEvent::VolumeChange { volume, muted } => {
      next.volume = clamp_volume(*volume);
      next.is_muted = *muted;
    }
    PlaybackEvent::Ended => {
      next.is_playing = false;
      next.phase = PlaybackPhase::Ended;
    }
    PlaybackEvent::Error(message) => {
      next.error = Some(message.clone());
      next.is_loading = false;
    }
    PlaybackEvent::FullscreenChange(on) => {
      next.is_fullscreen = *on;
    }
  }
  next
}

/// Properties a resource exposes to its event callbacks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaProperties {
  pub current_time: f64,
  pub duration: f64,
  pub volume: f64,
  pub muted: bool,
  pub fullscreen: bool,
  pub error: Option<String>,
}

/// Translate a raw resource callback (DOM-style event name) into a typed event.
///
/// Callbacks carry no payload; values are read from the resource's properties at dispatch time.
pub fn translate(name: &str, props: &MediaProperties) -> Option<PlaybackEvent> {
  let event = match name {
    "loadstart" => PlaybackEvent::LoadStart,
    "loadeddata" => PlaybackEvent::DataLoaded,
    "play" => PlaybackEvent::Play,
    "pause" => PlaybackEvent::Pause,
    "timeupdate" => PlaybackEvent::TimeUpdate(props.current_time),
    "durationchange" | "loadedmetadata" => PlaybackEvent::DurationChange(props.duration),
    "volumechange" => PlaybackEvent::VolumeChange { volume: props.volume, muted: props.muted },
    "ended" => PlaybackEvent::Ended,
    "error" => PlaybackEvent::Error(props.error.clone().unwrap_or_else(|| "Media playback error".to_string())),
    "fullscreenchange" => PlaybackEvent::FullscreenChange(props.fullscreen),
    _ => return None,
  };
  Some(event)
}

/// Sending half handed to the resource adapter.
#[derive(Debug, Clone)]
pub struct MediaEventSink {
  tx: mpsc::UnboundedSender<PlaybackEvent>,
}

impl MediaEventSink {
  pub fn emit(&self, event: PlaybackEvent) {
    // The controller is gone once the receiver is dropped; late events have nowhere to go.
    let _ = self.tx.send(event);
  }

  /// Emit a raw callback. Unknown names are ignored.
  pub fn emit_raw(&self, name: &str, props: &MediaProperties) {
    match translate(name, props) {
      Some(event) => self.emit(event),
      None => debug!(name, "playback: ignoring unknown media event"),
    }
  }
}

pub fn event_channel() -> (MediaEventSink, mpsc::UnboundedReceiver<PlaybackEvent>) {
  let (tx, rx) = mpsc::unbounded_channel();
  (MediaEventSink { tx }, rx)
}

/// Imperative handle to a playable video.
pub trait MediaResource: Send {
  fn load(&mut self, src: &str);
  fn set_autoplay(&mut self, autoplay: bool);
  fn set_loop(&mut self, looping: bool);
  /// Start playback. May be rejected asynchronously.
  fn play(&mut self) -> impl Future<Output = Result<(), MediaError>> + Send;
  fn pause(&mut self);
  fn set_current_time(&mut self, seconds: f64);
  fn set_volume(&mut self, volume: f64);
  fn set_muted(&mut self, muted: bool);
  fn set_playback_rate(&mut self, rate: f64);
  fn request_fullscreen(&mut self) -> Result<(), MediaError>;
  fn exit_fullscreen(&mut self) -> Result<(), MediaError>;
}

/// Settings applied once, when the resource is attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerOptions {
  pub autoplay: bool,
  pub looping: bool,
  pub muted: bool,
  pub volume: f64,
}

impl Default for PlayerOptions {
  fn default() -> Self {
    Self { autoplay: false, looping: false, muted: false, volume: 1.0 }
  }
}

type ErrorCallback = Box<dyn FnMut(&str) + Send>;

/// Owns one media resource and mirrors it into a snapshot.
///
/// The snapshot lives exactly as long as the attachment: [`attach`](Self::attach) creates it and
/// [`detach`](Self::detach) hands the resource back and drops it.
pub struct PlaybackController<R: MediaResource> {
  resource: R,
  snapshot: PlaybackSnapshot,
  events: mpsc::UnboundedReceiver<PlaybackEvent>,
  on_error: Option<ErrorCallback>,
}

impl<R: MediaResource> PlaybackController<R> {
  pub fn attach(
    mut resource: R,
    src: &str,
    events: mpsc::UnboundedReceiver<PlaybackEvent>,
    options: PlayerOptions,
  ) -> Self {
    let volume = clamp_volume(options.volume);
    resource.set_autoplay(options.autoplay);
    resource.set_loop(options.looping);
    resource.set_muted(options.muted);
    resource.set_volume(volume);
    resource.load(src);
    debug!(src, autoplay = options.autoplay, "playback: resource attached");

    let snapshot = PlaybackSnapshot { volume, is_muted: options.muted, ..PlaybackSnapshot::default() };
    Self { resource, snapshot, events, on_error: None }
  }

  /// Called with the message of every captured playback failure.
  pub fn on_error(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
    self.on_error = Some(Box::new(callback));
    self
  }

  pub fn detach(self) -> R {
    debug!("playback: resource detached");
    self.resource
  }

  pub fn snapshot(&self) -> &PlaybackSnapshot {
    &self.snapshot
  }

  pub fn resource(&self) -> &R {
    &self.resource
  }

  /// Apply one resource event.
  pub fn dispatch(&mut self, event: PlaybackEvent) {
    self.snapshot = reduce(&self.snapshot, &event);
    if let PlaybackEvent::Error(ref message) = event {
      error!(err = %message, "playback: media error");
      self.report(message);
    }
  }

  /// Apply every queued event in arrival order. Returns how many were applied.
  pub fn pump_events(&mut self) -> usize {
    let mut applied = 0;
    while let Ok(event) = self.events.try_recv() {
      self.dispatch(event);
      applied += 1;
    }
    applied
  }

  fn report(&mut self, message: &str) {
    if let Some(ref mut callback) = self.on_error {
      callback(message);
    }
  }

  fn fail(&mut self, err: MediaError) {
    let message = err.to_string();
    warn!(err = %message, "playback: command failed");
    self.snapshot.error = Some(message.clone());
    self.report(&message);
  }

  // --- Transport ---

  pub async fn play(&mut self) {
    if let Err(e) = self.resource.play().await {
      self.fail(e);
    }
  }

  pub fn pause(&mut self) {
    self.resource.pause();
  }

  pub async fn toggle_play(&mut self) {
    if self.snapshot.is_playing {
      self.pause();
    } else {
      self.play().await;
    }
  }

  /// Seek to `seconds`, clamped to `[0, duration]`. Returns the applied position.
  pub fn seek(&mut self, seconds: f64) -> f64 {
    let t = clamp_time(seconds, self.snapshot.duration);
    self.resource.set_current_time(t);
    self.snapshot.current_time = t;
    t
  }

  /// Relative seek from the current position.
  pub fn skip(&mut self, delta: f64) -> f64 {
    self.seek(self.snapshot.current_time + delta)
  }

  pub fn skip_forward(&mut self) -> f64 {
    self.skip(constants().skip_step_secs)
  }

  pub fn skip_backward(&mut self) -> f64 {
    self.skip(-constants().skip_step_secs)
  }

  pub fn set_volume(&mut self, volume: f64) {
    let v = clamp_volume(volume);
    self.resource.set_volume(v);
    self.snapshot.volume = v;
  }

  pub fn toggle_mute(&mut self) {
    let muted = !self.snapshot.is_muted;
    self.resource.set_muted(muted);
    self.snapshot.is_muted = muted;
  }

  pub fn set_playback_rate(&mut self, rate: f64) {
    let r = clamp_rate(rate);
    self.resource.set_playback_rate(r);
    self.snapshot.playback_rate = r;
  }

  /// Best effort. Failures are logged and never touch `error`; the snapshot follows the
  /// resource's `FullscreenChange` event.
  pub fn toggle_fullscreen(&mut self) {
    let result =
      if self.snapshot.is_fullscreen { self.resource.exit_fullscreen() } else { self.resource.request_fullscreen() };
    if let Err(e) = result {
      warn!(err = %e, "playback: fullscreen toggle failed");
    }
  }

  /// Back to the start, paused.
  pub fn reset(&mut self) {
    self.seek(0.0);
    self.pause();
  }
}
