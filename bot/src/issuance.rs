//! Ticket issuance: persist, activate, render the QR code, notify.

use crate::{messages, metrics};
use boxoffice_core::error::Result;
use boxoffice_core::ports::{IdGenerator, Notifier, OutboundMessage, QrCodec, RecordStore};
use boxoffice_core::types::{ChatId, Money, NewTicket, Ticket};
use std::sync::Arc;

/// What to issue and to whom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRequest {
    /// Tier name
    pub product_name: String,
    /// Holder name
    pub buyer_name: String,
    /// Holder email
    pub buyer_email: String,
    /// Chat that receives the ticket
    pub buyer_chat: ChatId,
    /// Price paid (zero for free tickets)
    pub final_price: Money,
}

/// Issues tickets and delivers them.
///
/// Only the insert can fail the call. Activation, rendering and delivery
/// problems are logged and the persisted ticket is still returned.
#[derive(Clone)]
pub struct Issuer {
    records: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    qr: Arc<dyn QrCodec>,
    ids: Arc<dyn IdGenerator>,
    operator: ChatId,
}

impl Issuer {
    /// Creates an issuer; `operator` gets a copy of every ticket.
    #[must_use]
    pub fn new(
        records: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        qr: Arc<dyn QrCodec>,
        ids: Arc<dyn IdGenerator>,
        operator: ChatId,
    ) -> Self {
        Self {
            records,
            notifier,
            qr,
            ids,
            operator,
        }
    }

    /// Issues one ticket.
    ///
    /// # Errors
    ///
    /// The record store's error when the ticket row cannot be inserted; nothing
    /// is sent in that case.
    pub async fn issue(&self, request: IssueRequest) -> Result<Ticket> {
        let id = self.ids.ticket_id();
        let mut ticket = match self
            .records
            .insert_ticket(NewTicket {
                id: id.clone(),
                product_name: request.product_name,
                buyer_name: request.buyer_name,
                buyer_email: request.buyer_email,
                buyer_chat: request.buyer_chat,
                final_price: request.final_price,
            })
            .await
        {
            Ok(ticket) => ticket,
            Err(error) => {
                tracing::error!(ticket = %id, %error, "Failed to store ticket");
                return Err(error);
            },
        };

        match self.records.activate_ticket(id.clone()).await {
            Ok(true) => ticket.active = true,
            Ok(false) => tracing::warn!(ticket = %id, "Fresh ticket was not activated"),
            Err(error) => tracing::warn!(ticket = %id, %error, "Failed to activate fresh ticket"),
        }
        ::metrics::counter!(metrics::TICKETS_ISSUED).increment(1);
        tracing::info!(
            ticket = %ticket.id,
            product = %ticket.product_name,
            final_price = ticket.final_price.amount(),
            active = ticket.active,
            "Ticket issued"
        );

        let png = self
            .qr
            .render_png(ticket.id.as_str())
            .map_err(|error| tracing::warn!(ticket = %ticket.id, %error, "QR rendering failed, sending text only"))
            .ok();

        let to_buyer = artifact(request.buyer_chat, png.clone(), messages::ticket_caption(&ticket));
        let to_operator = artifact(self.operator, png, messages::issued_caption(&ticket));
        for message in [to_buyer, to_operator] {
            let to = message.to;
            if let Err(error) = self.notifier.deliver(message).await {
                tracing::error!(ticket = %ticket.id, chat = %to, %error, "Ticket delivery failed");
            }
        }

        Ok(ticket)
    }
}

/// Ticket message: photo with caption, or plain text without a picture
pub(crate) fn artifact(to: ChatId, png: Option<Vec<u8>>, caption: String) -> OutboundMessage {
    match png {
        Some(png) => OutboundMessage::photo(to, png, caption),
        None => OutboundMessage::text(to, caption),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use boxoffice_core::error::DeskError;
    use boxoffice_core::ports::MessageBody;
    use boxoffice_testing::{InMemoryRecordStore, RecordingNotifier, SequentialIds, StubQrCodec, test_clock};

    const OPERATOR: ChatId = ChatId::new(1);
    const BUYER: ChatId = ChatId::new(555);

    struct Fixture {
        records: InMemoryRecordStore,
        notifier: RecordingNotifier,
        qr: StubQrCodec,
        issuer: Issuer,
    }

    fn fixture() -> Fixture {
        let records = InMemoryRecordStore::seeded(Arc::new(test_clock()));
        let notifier = RecordingNotifier::new();
        let qr = StubQrCodec::new();
        let ids = SequentialIds::new().with_ticket_ids(["AB12CD34EF56", "AB12CD34EF56"]);
        let issuer = Issuer::new(
            Arc::new(records.clone()),
            Arc::new(notifier.clone()),
            Arc::new(qr.clone()),
            Arc::new(ids),
            OPERATOR,
        );
        Fixture {
            records,
            notifier,
            qr,
            issuer,
        }
    }

    fn request() -> IssueRequest {
        IssueRequest {
            product_name: "STANDART".into(),
            buyer_name: "Alex Ivanov".into(),
            buyer_email: "alex@example.com".into(),
            buyer_chat: BUYER,
            final_price: Money::new(4250),
        }
    }

    #[tokio::test]
    async fn issued_tickets_are_active_and_delivered_to_both_sides() {
        let f = fixture();

        let ticket = f.issuer.issue(request()).await.unwrap();

        assert!(ticket.active);
        assert!(f.records.ticket("AB12CD34EF56").unwrap().active);

        let to_buyer = f.notifier.photos_to(BUYER);
        assert_eq!(to_buyer.len(), 1);
        assert!(to_buyer[0].text_content().contains("AB12CD34EF56"));
        match &to_buyer[0].body {
            MessageBody::Photo { png, .. } => assert_eq!(png, &StubQrCodec::image_of("AB12CD34EF56")),
            MessageBody::Text(_) => panic!("expected a photo"),
        }
        assert_eq!(f.notifier.photos_to(OPERATOR).len(), 1);
    }

    #[tokio::test]
    async fn failed_insert_sends_nothing() {
        let f = fixture();
        f.issuer.issue(request()).await.unwrap();
        f.notifier.clear();

        // Second call gets the same queued id
        let duplicate = f.issuer.issue(request()).await;

        assert!(matches!(duplicate, Err(DeskError::AlreadyExists(_))));
        assert!(f.notifier.messages().is_empty());
        assert_eq!(f.records.tickets().len(), 1);
    }

    #[tokio::test]
    async fn rendering_failure_falls_back_to_text() {
        let f = fixture();
        f.qr.break_rendering();

        f.issuer.issue(request()).await.unwrap();

        assert!(f.notifier.photos_to(BUYER).is_empty());
        assert!(f.notifier.last_text_to(BUYER).contains("AB12CD34EF56"));
    }

    #[tokio::test]
    async fn delivery_failures_do_not_fail_issuance() {
        let f = fixture();
        f.notifier.fail_deliveries_to(BUYER);

        let ticket = f.issuer.issue(request()).await.unwrap();

        assert!(ticket.active);
        assert_eq!(f.notifier.messages_to(OPERATOR).len(), 1);
    }

    #[tokio::test]
    async fn store_outage_is_reported() {
        let f = fixture();
        f.records.set_unavailable(true);

        let result = f.issuer.issue(request()).await;

        assert!(matches!(result, Err(DeskError::Persistence(_))));
        assert!(f.notifier.messages().is_empty());
    }
}
