//! Recording notification channel and stub QR codec.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use boxoffice_core::error::{DeskError, Result};
use boxoffice_core::ports::{MessageBody, Notifier, OutboundMessage, PortFuture, QrCodec};
use boxoffice_core::types::ChatId;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Notifier that records every delivered message.
///
/// Deliveries to chats marked with [`fail_deliveries_to`](Self::fail_deliveries_to)
/// fail with [`DeskError::Delivery`] and are not recorded.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    failing: Arc<Mutex<HashSet<ChatId>>>,
}

impl RecordingNotifier {
    /// Empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delivered message, in order
    #[must_use]
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Messages delivered to one chat, in order
    #[must_use]
    pub fn messages_to(&self, chat: ChatId) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.to == chat)
            .cloned()
            .collect()
    }

    /// Last message delivered to one chat
    #[must_use]
    pub fn last_to(&self, chat: ChatId) -> Option<OutboundMessage> {
        self.messages_to(chat).pop()
    }

    /// Text (or caption) of the last message delivered to one chat, empty if none
    #[must_use]
    pub fn last_text_to(&self, chat: ChatId) -> String {
        self.last_to(chat)
            .map(|m| m.text_content().to_owned())
            .unwrap_or_default()
    }

    /// Photos delivered to one chat
    #[must_use]
    pub fn photos_to(&self, chat: ChatId) -> Vec<OutboundMessage> {
        self.messages_to(chat)
            .into_iter()
            .filter(|m| matches!(m.body, MessageBody::Photo { .. }))
            .collect()
    }

    /// Forget recorded messages
    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// Make deliveries to `chat` fail
    pub fn fail_deliveries_to(&self, chat: ChatId) {
        self.failing.lock().unwrap().insert(chat);
    }
}

impl Notifier for RecordingNotifier {
    fn deliver(&self, message: OutboundMessage) -> PortFuture<()> {
        let sent = Arc::clone(&self.sent);
        let failing = Arc::clone(&self.failing);
        Box::pin(async move {
            if failing.lock().unwrap().contains(&message.to) {
                return Err(DeskError::Delivery(format!("chat {} unreachable", message.to)));
            }
            sent.lock().unwrap().push(message);
            Ok(())
        })
    }
}

/// QR codec whose "image" is the payload prefixed with `QR:`.
#[derive(Clone, Default)]
pub struct StubQrCodec {
    broken: Arc<AtomicBool>,
}

impl StubQrCodec {
    /// Marker prefix of stub images
    pub const PREFIX: &'static [u8] = b"QR:";

    /// Working codec
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make rendering fail
    pub fn break_rendering(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    /// Stub image carrying `payload`
    #[must_use]
    pub fn image_of(payload: &str) -> Vec<u8> {
        [Self::PREFIX, payload.as_bytes()].concat()
    }
}

impl QrCodec for StubQrCodec {
    fn render_png(&self, payload: &str) -> Result<Vec<u8>> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(DeskError::Validation("QR rendering disabled".into()));
        }
        Ok(Self::image_of(payload))
    }

    fn decode(&self, image: &[u8]) -> Option<String> {
        let payload = image.strip_prefix(Self::PREFIX)?;
        let text = std::str::from_utf8(payload).ok()?.trim().to_uppercase();
        (!text.is_empty()).then_some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failing_chats_are_not_recorded() {
        let notifier = RecordingNotifier::new();
        notifier.fail_deliveries_to(ChatId::new(2));

        notifier.deliver(OutboundMessage::text(ChatId::new(1), "hello")).await.unwrap();
        let failed = notifier.deliver(OutboundMessage::text(ChatId::new(2), "hello")).await;

        assert!(matches!(failed, Err(DeskError::Delivery(_))));
        assert_eq!(notifier.messages().len(), 1);
        assert_eq!(notifier.last_text_to(ChatId::new(1)), "hello");
    }

    #[test]
    fn stub_codec_reads_its_own_images() {
        let codec = StubQrCodec::new();
        let image = codec.render_png(" ab12cd34ef56 ").unwrap();

        assert_eq!(codec.decode(&image).as_deref(), Some("AB12CD34EF56"));
        assert_eq!(codec.decode(b"not a qr"), None);
    }
}
