//! Binary audio frame buffering and debounced commit.
//!
//! The session owns one [`AudioBufferState`] per connection: a byte
//! counter since the last commit and a single re-armable debounce
//! timer. Invariant: at most one timer armed per session; every append
//! resets it.

use std::pin::Pin;
use std::time::Duration;
use tokio::time::Sleep;

pub struct AudioBufferState {
    bytes_since_commit: usize,
    debounce: Duration,
    min_commit_bytes: usize,
    /// The single cancellable, re-armable debounce timer. `None` means
    /// no timer is currently armed, the idle state entered on
    /// construction, after a commit, and after `cancel()`.
    pub timer: Option<Pin<Box<Sleep>>>,
}

/// What the session should do when the debounce timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// Enough bytes have accumulated; commit and trigger a response.
    Commit,
    /// Too little audio buffered yet; re-arm and keep waiting.
    Extend,
}

impl AudioBufferState {
    pub fn new(debounce: Duration, min_commit_bytes: usize) -> Self {
        Self {
            bytes_since_commit: 0,
            debounce,
            min_commit_bytes,
            timer: None,
        }
    }

    /// Records an appended frame and (re)arms the debounce timer.
    /// Adds the frame length to the counter, resets the
    /// timer to fire after `debounce` of inactivity.
    pub fn on_frame_appended(&mut self, frame_len: usize) {
        self.bytes_since_commit += frame_len;
        self.arm();
    }

    fn arm(&mut self) {
        self.timer = Some(Box::pin(tokio::time::sleep(self.debounce)));
    }

    /// Called when the armed timer fires. Returns whether the session
    /// should commit now or extend the wait.
    ///
    /// Below threshold, the timer is left unarmed rather than
    /// re-armed: the byte count hasn't changed since this timer was
    /// set, so a fresh `debounce`-length timer would just fire again
    /// with the same outcome, forever, even after the burst has ended.
    /// The next `on_frame_appended` re-arms it.
    pub fn on_timer_fired(&mut self) -> DebounceOutcome {
        if self.bytes_since_commit >= self.min_commit_bytes {
            DebounceOutcome::Commit
        } else {
            self.timer = None;
            DebounceOutcome::Extend
        }
    }

    /// Zeroes the counter after a commit has been emitted.
    pub fn reset_after_commit(&mut self) {
        self.bytes_since_commit = 0;
        self.timer = None;
    }

    /// Cancels the timer without committing, on `CloseStream`, socket
    /// close, or transition to `Closing`. Buffered upstream bytes are
    /// discarded by upstream on close.
    pub fn cancel(&mut self) {
        self.timer = None;
        self.bytes_since_commit = 0;
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// Resolves when the armed timer fires. Only meant to be polled
    /// behind an `is_armed()` select guard; pending forever with no
    /// timer armed is the correct idle behavior for an unguarded poll.
    pub async fn wait_for_timer(&mut self) {
        if let Some(timer) = self.timer.as_mut() {
            timer.as_mut().await;
        } else {
            std::future::pending::<()>().await;
        }
    }

    pub fn bytes_buffered(&self) -> usize {
        self.bytes_since_commit
    }
}

/// Base64-encodes a raw PCM frame for `input_audio_buffer.append`.
pub fn encode_frame(frame: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(frame)
}

/// Decodes a base64 PCM frame carried by `response.output_audio.delta`.
pub fn decode_frame(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(encoded)
}
