//! Delivery of the selection outcome back to the host.
//!
//! Embedded mode is a direct in-process sink invocation. Detached mode
//! runs the surface in a separate browsing context and accepts results
//! only through a verified cross-context message protocol: the declared
//! origin must match the configured origin exactly, the payload must match
//! one of the two declared message shapes, and delivery is at-most-once.
//! A liveness poll covers the context closing without ever sending a
//! message; there is no reliable cross-context close event to subscribe to.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tracing::{debug, trace};

use drivepick_common::{PickedFile, Result, SelectionOutcome};

/// Popup window geometry and target name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupFeatures {
    pub width: u32,
    pub height: u32,
    pub left: u32,
    pub top: u32,
    /// Window target name; reusing it prevents stacking duplicate popups.
    pub target: String,
}

/// Popup window width.
const POPUP_WIDTH: u32 = 720;
/// Popup window height.
const POPUP_HEIGHT: u32 = 600;
/// Offset used when the host frame size is unknown.
const POPUP_FALLBACK_OFFSET: u32 = 80;
/// Fixed relative path of the picker page under the popup origin.
const POPUP_PATH: &str = "/picker";
/// Window target name.
const POPUP_TARGET: &str = "drivepick_picker";

/// An open separate browsing context.
pub trait PopupWindow: Send + Sync {
    /// Whether the context has been closed (by the user or by us).
    fn is_closed(&self) -> bool;
    /// Force-close the context.
    fn close(&self);
}

/// Capability for opening popup windows, injected by the host shell.
pub trait PopupHost: Send + Sync {
    /// Open a new browsing context at `url`.
    ///
    /// # Errors
    /// - `ResourceLoad` when the context cannot be opened (e.g., blocked)
    fn open_popup(&self, url: &str, features: &PopupFeatures) -> Result<Box<dyn PopupWindow>>;

    /// Outer width/height of the host window, for centering. `None` when
    /// unknown.
    fn frame_size(&self) -> Option<(u32, u32)>;
}

/// A raw message received from another browsing context.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Origin declared by the transport, verified against the configured
    /// origin.
    pub origin: String,
    /// Unparsed payload.
    pub payload: serde_json::Value,
}

/// The two message shapes of the cross-context protocol. Anything else is
/// discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PickerMessage {
    /// A completed selection.
    #[serde(rename = "RESULT")]
    Result { files: Vec<PickedFile> },
    /// The user cancelled inside the popup.
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

/// Delivery target for the selection outcome.
pub trait ResultSink: Send + Sync {
    /// Deliver the outcome to the host.
    fn deliver(&self, outcome: SelectionOutcome);
}

/// Embedded-mode sink: invokes the host callback directly, at most once.
pub struct CallbackSink {
    callback: Mutex<Option<Box<dyn FnOnce(SelectionOutcome) + Send>>>,
}

impl CallbackSink {
    /// Wrap a host delivery callback.
    pub fn new(callback: impl FnOnce(SelectionOutcome) + Send + 'static) -> Self {
        Self {
            callback: Mutex::new(Some(Box::new(callback))),
        }
    }
}

impl ResultSink for CallbackSink {
    fn deliver(&self, outcome: SelectionOutcome) {
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match callback {
            Some(callback) => callback(outcome),
            None => debug!("Dropping repeated delivery; outcome already delivered"),
        }
    }
}

/// Detached-mode configuration.
#[derive(Debug, Clone)]
pub struct DetachedConfig {
    /// The single origin results are accepted from. The popup is opened
    /// under this origin too.
    pub popup_origin: String,
    /// Liveness poll interval; cancellation-by-closing is detected with
    /// roughly this latency.
    pub poll_interval: Duration,
}

impl DetachedConfig {
    /// Config with the default poll interval for an origin.
    pub fn new(popup_origin: impl Into<String>) -> Self {
        Self {
            popup_origin: popup_origin.into(),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Detached-mode result channel.
///
/// Owns the popup handle, the message receiver and the liveness timer, and
/// releases all three in a single teardown. `wait` resolves at most once
/// per channel.
pub struct DetachedChannel {
    expected_origin: String,
    poll_interval: Duration,
    messages: mpsc::UnboundedReceiver<InboundMessage>,
    popup: Option<Box<dyn PopupWindow>>,
    delivered: bool,
}

impl DetachedChannel {
    /// Open the popup and start the channel.
    ///
    /// The popup lands at `<origin>/picker`, sized and centered relative
    /// to the host frame.
    pub fn open(
        host: &dyn PopupHost,
        config: &DetachedConfig,
        messages: mpsc::UnboundedReceiver<InboundMessage>,
    ) -> Result<Self> {
        let url = format!(
            "{}{}",
            config.popup_origin.trim_end_matches('/'),
            POPUP_PATH
        );
        let features = Self::features(host.frame_size());
        let popup = host.open_popup(&url, &features)?;

        Ok(Self {
            expected_origin: config.popup_origin.clone(),
            poll_interval: config.poll_interval,
            messages,
            popup: Some(popup),
            delivered: false,
        })
    }

    /// Compute centered popup geometry, with a fixed offset fallback.
    fn features(frame: Option<(u32, u32)>) -> PopupFeatures {
        let (left, top) = match frame {
            Some((w, h)) => (
                w.saturating_sub(POPUP_WIDTH) / 2,
                h.saturating_sub(POPUP_HEIGHT) / 2,
            ),
            None => (POPUP_FALLBACK_OFFSET, POPUP_FALLBACK_OFFSET),
        };
        PopupFeatures {
            width: POPUP_WIDTH,
            height: POPUP_HEIGHT,
            left,
            top,
            target: POPUP_TARGET.to_string(),
        }
    }

    /// Wait for the outcome.
    ///
    /// Returns `None` when the channel has already delivered. Otherwise
    /// resolves with the first terminal event: a valid message from the
    /// expected origin, or closure of the popup detected by the liveness
    /// poll. Teardown runs before returning, so later events are ignored.
    pub async fn wait(&mut self) -> Option<SelectionOutcome> {
        if self.delivered {
            return None;
        }

        // First tick only after a full interval; an immediate tick could
        // race a message that is already queued.
        let mut liveness = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        let mut receiving = true;

        let outcome = loop {
            tokio::select! {
                // Biased, messages first: the picker page posts its result
                // and then closes itself, so a queued message must always
                // beat closure detection.
                biased;

                message = self.messages.recv(), if receiving => {
                    match message {
                        Some(message) => {
                            if let Some(outcome) = self.accept(message) {
                                break outcome;
                            }
                        }
                        // Sender gone; closure detection is all that's left.
                        None => receiving = false,
                    }
                }
                _ = liveness.tick() => {
                    let closed = self.popup.as_ref().map_or(true, |p| p.is_closed());
                    if closed {
                        if let Some(outcome) = self.drain_pending() {
                            break outcome;
                        }
                        debug!("Popup closed without a message; synthesizing cancellation");
                        break SelectionOutcome::Cancelled;
                    }
                }
            }
        };

        self.delivered = true;
        self.teardown();
        Some(outcome)
    }

    /// Accept the first valid message still sitting in the queue, if any.
    ///
    /// Run when closure is detected: a result posted just before the popup
    /// closed itself must win over the synthesized cancellation.
    fn drain_pending(&mut self) -> Option<SelectionOutcome> {
        while let Ok(message) = self.messages.try_recv() {
            if let Some(outcome) = self.accept(message) {
                return Some(outcome);
            }
        }
        None
    }

    /// Validate and parse one inbound message.
    ///
    /// Origin mismatch and unknown shapes are discarded quietly; they may
    /// be benign unrelated traffic, not attacks or errors.
    fn accept(&self, message: InboundMessage) -> Option<SelectionOutcome> {
        if message.origin != self.expected_origin {
            trace!(origin = %message.origin, "Discarding message from unexpected origin");
            return None;
        }

        match serde_json::from_value::<PickerMessage>(message.payload) {
            Ok(PickerMessage::Result { files }) => Some(SelectionOutcome::Picked(files)),
            Ok(PickerMessage::Cancelled) => Some(SelectionOutcome::Cancelled),
            Err(_) => {
                trace!("Discarding message with unknown shape");
                None
            }
        }
    }

    /// Release the popup, the receiver and (implicitly) the timer.
    ///
    /// Idempotent; also safe to call from the host on unmount before any
    /// outcome arrived.
    pub fn teardown(&mut self) {
        self.delivered = true;
        self.messages.close();
        if let Some(popup) = self.popup.take() {
            if !popup.is_closed() {
                popup.close();
            }
        }
    }
}

impl Drop for DetachedChannel {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    /// Observable popup state shared between the channel and the test.
    #[derive(Default)]
    struct PopupState {
        closed: AtomicBool,
        close_calls: AtomicU32,
    }

    struct FakePopup(Arc<PopupState>);

    impl PopupWindow for FakePopup {
        fn is_closed(&self) -> bool {
            self.0.closed.load(Ordering::SeqCst)
        }

        fn close(&self) {
            self.0.close_calls.fetch_add(1, Ordering::SeqCst);
            self.0.closed.store(true, Ordering::SeqCst);
        }
    }

    struct FakeHost {
        state: Arc<PopupState>,
        opened: Mutex<Vec<(String, PopupFeatures)>>,
        frame: Option<(u32, u32)>,
    }

    impl FakeHost {
        fn new() -> Self {
            Self {
                state: Arc::new(PopupState::default()),
                opened: Mutex::new(Vec::new()),
                frame: Some((1920, 1080)),
            }
        }
    }

    impl PopupHost for FakeHost {
        fn open_popup(&self, url: &str, features: &PopupFeatures) -> Result<Box<dyn PopupWindow>> {
            self.opened
                .lock()
                .unwrap()
                .push((url.to_string(), features.clone()));
            Ok(Box::new(FakePopup(self.state.clone())))
        }

        fn frame_size(&self) -> Option<(u32, u32)> {
            self.frame
        }
    }

    const ORIGIN: &str = "https://picker.example.com";

    fn channel(
        host: &FakeHost,
    ) -> (
        DetachedChannel,
        mpsc::UnboundedSender<InboundMessage>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = DetachedConfig::new(ORIGIN);
        let channel = DetachedChannel::open(host, &config, rx).unwrap();
        (channel, tx)
    }

    fn result_message(origin: &str) -> InboundMessage {
        InboundMessage {
            origin: origin.to_string(),
            payload: serde_json::json!({
                "type": "RESULT",
                "files": [{
                    "id": "a",
                    "name": "a.png",
                    "mimeType": "image/png",
                    "displayUrl": "https://drive.google.com/thumbnail?id=a&sz=w800"
                }]
            }),
        }
    }

    #[test]
    fn test_popup_url_and_geometry() {
        let host = FakeHost::new();
        let (_channel, _tx) = channel(&host);

        let opened = host.opened.lock().unwrap();
        let (url, features) = &opened[0];
        assert_eq!(url, "https://picker.example.com/picker");
        assert_eq!(features.width, 720);
        assert_eq!(features.height, 600);
        assert_eq!(features.left, (1920 - 720) / 2);
        assert_eq!(features.top, (1080 - 600) / 2);
        assert_eq!(features.target, "drivepick_picker");
    }

    #[test]
    fn test_trailing_slashes_trimmed_from_origin() {
        let host = FakeHost::new();
        let (tx, rx) = mpsc::unbounded_channel::<InboundMessage>();
        drop(tx);
        let config = DetachedConfig::new("https://picker.example.com///");
        let _channel = DetachedChannel::open(&host, &config, rx).unwrap();

        let opened = host.opened.lock().unwrap();
        assert_eq!(opened[0].0, "https://picker.example.com/picker");
    }

    #[test]
    fn test_fallback_offset_without_frame() {
        let features = DetachedChannel::features(None);
        assert_eq!((features.left, features.top), (80, 80));
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_result_is_delivered() {
        let host = FakeHost::new();
        let (mut channel, tx) = channel(&host);

        tx.send(result_message(ORIGIN)).unwrap();

        let outcome = channel.wait().await.unwrap();
        let SelectionOutcome::Picked(files) = outcome else {
            panic!("expected a selection");
        };
        assert_eq!(files[0].id, "a");
        // Teardown closed the popup.
        assert!(host.state.closed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_origin_is_ignored() {
        let host = FakeHost::new();
        let (mut channel, tx) = channel(&host);

        tx.send(result_message("https://evil.example.com")).unwrap();
        // Only closure ends the wait; the foreign message produced nothing.
        host.state.closed.store(true, Ordering::SeqCst);

        let outcome = channel.wait().await.unwrap();
        assert_eq!(outcome, SelectionOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_shape_is_ignored() {
        let host = FakeHost::new();
        let (mut channel, tx) = channel(&host);

        tx.send(InboundMessage {
            origin: ORIGIN.to_string(),
            payload: serde_json::json!({"type": "PING"}),
        })
        .unwrap();
        tx.send(InboundMessage {
            origin: ORIGIN.to_string(),
            payload: serde_json::json!({"type": "CANCELLED"}),
        })
        .unwrap();

        let outcome = channel.wait().await.unwrap();
        assert_eq!(outcome, SelectionOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closure_synthesizes_cancellation() {
        let host = FakeHost::new();
        let (mut channel, _tx) = channel(&host);

        host.state.closed.store(true, Ordering::SeqCst);

        let outcome = channel.wait().await.unwrap();
        assert_eq!(outcome, SelectionOutcome::Cancelled);
        // Already closed by the user; teardown must not close again.
        assert_eq!(host.state.close_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_result_wins_over_closure() {
        // The picker page posts its message and then closes itself, so the
        // message and the closed popup are routinely observed together.
        for _ in 0..200 {
            let host = FakeHost::new();
            let (mut channel, tx) = channel(&host);

            tx.send(result_message(ORIGIN)).unwrap();
            host.state.closed.store(true, Ordering::SeqCst);

            let outcome = channel.wait().await.unwrap();
            let SelectionOutcome::Picked(files) = outcome else {
                panic!("closure detection must not beat a queued result");
            };
            assert_eq!(files[0].id, "a");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_then_closure_delivers_once() {
        let host = FakeHost::new();
        let (mut channel, tx) = channel(&host);

        tx.send(result_message(ORIGIN)).unwrap();
        let first = channel.wait().await;
        assert!(matches!(first, Some(SelectionOutcome::Picked(_))));

        // The popup is now closed (by teardown); a second wait delivers
        // nothing instead of synthesizing a cancellation.
        assert!(host.state.closed.load(Ordering::SeqCst));
        assert_eq!(channel.wait().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_is_idempotent() {
        let host = FakeHost::new();
        let (mut channel, _tx) = channel(&host);

        channel.teardown();
        channel.teardown();

        assert_eq!(host.state.close_calls.load(Ordering::SeqCst), 1);
        assert_eq!(channel.wait().await, None);
    }

    #[test]
    fn test_callback_sink_delivers_once() {
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = count.clone();
        let sink = CallbackSink::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        sink.deliver(SelectionOutcome::Cancelled);
        sink.deliver(SelectionOutcome::Cancelled);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_message_schema_roundtrip() {
        let cancelled: PickerMessage = serde_json::from_str(r#"{"type":"CANCELLED"}"#).unwrap();
        assert!(matches!(cancelled, PickerMessage::Cancelled));

        let json = serde_json::to_value(PickerMessage::Result { files: vec![] }).unwrap();
        assert_eq!(json["type"], "RESULT");
        assert!(json["files"].as_array().unwrap().is_empty());
    }
}
