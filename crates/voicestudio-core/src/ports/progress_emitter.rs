//! Progress emitter trait.
//!
//! Long-running server operations announce progress by emitting
//! [`ChannelMessage`]s. The server's implementation fans them out to every
//! open event-channel socket; there is no buffering and no replay.

use crate::channel::ChannelMessage;

/// Sink for progress messages.
///
/// `emit` must not block. Implementations drop messages nobody is
/// listening for.
pub trait ProgressEmitter: Send + Sync {
    fn emit(&self, message: ChannelMessage);
}

/// Discards everything. For tests and CLI contexts without a channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgressEmitter;

impl ProgressEmitter for NoopProgressEmitter {
    fn emit(&self, _message: ChannelMessage) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingEmitter(Mutex<Vec<ChannelMessage>>);

    impl ProgressEmitter for RecordingEmitter {
        fn emit(&self, message: ChannelMessage) {
            self.0.lock().unwrap().push(message);
        }
    }

    #[test]
    fn emitters_are_object_safe() {
        let recording = Arc::new(RecordingEmitter(Mutex::new(Vec::new())));
        let emitters: Vec<Arc<dyn ProgressEmitter>> =
            vec![Arc::new(NoopProgressEmitter), recording.clone()];

        for emitter in &emitters {
            emitter.emit(ChannelMessage::progress("generating", "working", 50));
        }

        let seen = recording.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind(), "progress");
    }
}
