//! Playstate reporting.
//!
//! Once a transport is attached the reporter polls it on a fixed interval
//! and tells the server where playback is. The first report of a session is
//! a start report, the rest are progress reports; `stop` closes the session.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::api::types::{
    duration_to_ticks, PlayMethod, PlaybackProgressInfo, PlaybackStartInfo, PlaybackStopInfo,
};
use crate::api::MediaServer;
use crate::transport::PlayerTransport;

/// Identifies the session being reported on.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub item_id: String,
    pub media_source_id: Option<String>,
    pub play_session_id: String,
    pub play_method: PlayMethod,
}

pub struct ProgressReporter {
    shared: Arc<Shared>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
    transport: Mutex<Option<Weak<dyn PlayerTransport>>>,
}

struct Shared {
    server: Arc<dyn MediaServer>,
    session: SessionInfo,
    audio: watch::Receiver<i32>,
    subtitle: watch::Receiver<i32>,
    started: AtomicBool,
    stopped: AtomicBool,
    last_position: AtomicI64,
}

impl ProgressReporter {
    pub fn new(
        server: Arc<dyn MediaServer>,
        session: SessionInfo,
        audio: watch::Receiver<i32>,
        subtitle: watch::Receiver<i32>,
        interval: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                server,
                session,
                audio,
                subtitle,
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                last_position: AtomicI64::new(0),
            }),
            interval,
            task: Mutex::new(None),
            transport: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Start reporting for `transport`. Re-attaching replaces the previous loop.
    pub fn attach(&self, transport: &Arc<dyn PlayerTransport>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime, progress reporting disabled");
            return;
        };

        let weak = Arc::downgrade(transport);
        *self.transport.lock() = Some(weak.clone());

        let shared = self.shared.clone();
        let period = self.interval;
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(transport) = weak.upgrade() else {
                    debug!("transport dropped, ending progress loop");
                    break;
                };
                let position = transport.position();
                let paused = transport.is_paused();
                drop(transport);
                shared.report(position, paused).await;
            }
        });

        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Send the stop report and end the loop. Only the first call reports.
    pub async fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.shared.started.load(Ordering::SeqCst) {
            return;
        }

        let position = self
            .transport
            .lock()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|t| duration_to_ticks(t.position()))
            .unwrap_or_else(|| self.shared.last_position.load(Ordering::SeqCst));

        let session = &self.shared.session;
        let info = PlaybackStopInfo {
            item_id: Some(session.item_id.clone()),
            media_source_id: session.media_source_id.clone(),
            play_session_id: Some(session.play_session_id.clone()),
            session_id: None,
            position_ticks: Some(position),
        };
        if let Err(e) = self.shared.server.report_playback_stopped(&info).await {
            warn!(item_id = %session.item_id, error = %e, "failed to report playback stop");
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

impl Shared {
    async fn report(&self, position: Duration, paused: bool) {
        let ticks = duration_to_ticks(position);
        self.last_position.store(ticks, Ordering::SeqCst);

        let audio = *self.audio.borrow();
        let subtitle = *self.subtitle.borrow();
        let session = &self.session;

        let result = if !self.started.load(Ordering::SeqCst) {
            let info = PlaybackStartInfo {
                item_id: Some(session.item_id.clone()),
                media_source_id: session.media_source_id.clone(),
                play_session_id: Some(session.play_session_id.clone()),
                session_id: None,
                audio_stream_index: Some(audio),
                subtitle_stream_index: Some(subtitle),
                position_ticks: Some(ticks),
                play_method: Some(session.play_method),
            };
            let result = self.server.report_playback_start(&info).await;
            if result.is_ok() {
                self.started.store(true, Ordering::SeqCst);
            }
            result
        } else {
            let info = PlaybackProgressInfo {
                item_id: Some(session.item_id.clone()),
                media_source_id: session.media_source_id.clone(),
                play_session_id: Some(session.play_session_id.clone()),
                session_id: None,
                audio_stream_index: Some(audio),
                subtitle_stream_index: Some(subtitle),
                position_ticks: Some(ticks),
                is_paused: paused,
                play_method: Some(session.play_method),
            };
            self.server.report_playback_progress(&info).await
        };

        if let Err(e) = result {
            warn!(item_id = %session.item_id, error = %e, "failed to report playback progress");
        }
    }
}
