//! End-to-end conversations through the dispatcher with in-memory collaborators.

#![allow(clippy::unwrap_used, clippy::panic)]

use boxoffice_bot::command::{Callback, Inbound, SlashCommand};
use boxoffice_bot::dispatcher::{Collaborators, DeskSettings, Dispatcher};
use boxoffice_core::ports::{MessageBody, Notifier, OutboundMessage, PortFuture};
use boxoffice_core::types::{ChatId, DiscountPercent, Money, ReferenceToken, Ticket, TicketId};
use boxoffice_runtime::RuntimeConfig;
use boxoffice_testing::{InMemoryRecordStore, RecordingNotifier, SequentialIds, StubQrCodec, test_clock};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

const OPERATOR: ChatId = ChatId::new(1);
const BUYER: ChatId = ChatId::new(555);
const PASSWORD: &str = "s3cret";

struct Desk {
    dispatcher: Dispatcher,
    records: InMemoryRecordStore,
    notifier: RecordingNotifier,
}

/// Holds every photo upload back by `delay`
struct SlowPhotos {
    inner: RecordingNotifier,
    delay: Duration,
}

impl Notifier for SlowPhotos {
    fn deliver(&self, message: OutboundMessage) -> PortFuture<()> {
        let inner = self.inner.clone();
        let delay = self.delay;
        Box::pin(async move {
            if matches!(message.body, MessageBody::Photo { .. }) {
                tokio::time::sleep(delay).await;
            }
            inner.deliver(message).await
        })
    }
}

impl Desk {
    fn new() -> Self {
        let notifier = RecordingNotifier::new();
        Self::with(Arc::new(notifier.clone()), notifier, RuntimeConfig::default())
    }

    fn with(channel: Arc<dyn Notifier>, notifier: RecordingNotifier, runtime: RuntimeConfig) -> Self {
        let records = InMemoryRecordStore::seeded(Arc::new(test_clock()));
        let ids = SequentialIds::new()
            .with_ticket_ids(["AB12CD34EF56"])
            .with_reference_tokens(["AB12CD34"]);
        let dispatcher = Dispatcher::new(
            Collaborators {
                records: Arc::new(records.clone()),
                notifier: channel,
                qr: Arc::new(StubQrCodec::new()),
                ids: Arc::new(ids),
            },
            DeskSettings {
                operator: OPERATOR,
                password: PASSWORD.into(),
                payment_link: "https://pay.example/desk".into(),
                runtime,
            },
        );
        Self {
            dispatcher,
            records,
            notifier,
        }
    }

    async fn command(&self, from: ChatId, command: SlashCommand) {
        self.dispatcher.dispatch(from, "Alex", Inbound::Command(command)).await;
    }

    async fn text(&self, from: ChatId, text: &str) {
        self.dispatcher.dispatch(from, "Alex", Inbound::Text(text.into())).await;
    }

    /// Presses the button whose label contains `label` on the last message `from` received
    async fn press(&self, from: ChatId, label: &str) {
        let last = self.notifier.last_to(from).unwrap();
        let button = last
            .keyboard
            .iter()
            .find(|button| button.label.contains(label))
            .unwrap_or_else(|| panic!("no button {label:?} in {:?}", last.keyboard));
        let callback = Callback::decode(&button.payload).unwrap();
        self.dispatcher.dispatch(from, "Alex", Inbound::Callback(callback)).await;
    }

    async fn log_in(&self) {
        self.command(OPERATOR, SlashCommand::Admin).await;
        self.text(OPERATOR, PASSWORD).await;
    }

    async fn buy_standard(&self, code: Option<&str>) {
        self.command(BUYER, SlashCommand::Buy).await;
        self.press(BUYER, "STANDART").await;
        match code {
            Some(code) => self.text(BUYER, code).await,
            None => self.press(BUYER, "Пропустить").await,
        }
        self.text(BUYER, "Alex Ivanov").await;
        self.text(BUYER, "alex@example.com").await;
        self.press(BUYER, "Оплатить").await;
        self.press(BUYER, "Я оплатил").await;
    }

    /// Waits for detached deliveries to land
    async fn photos_to(&self, chat: ChatId, expected: usize) -> usize {
        for _ in 0..100 {
            if self.notifier.photos_to(chat).len() >= expected {
                break;
            }
            tokio::task::yield_now().await;
        }
        self.notifier.photos_to(chat).len()
    }
}

fn sale15(records: &InMemoryRecordStore) {
    records.add_discount_code("SALE15", DiscountPercent::new(15).unwrap(), true);
}

fn token() -> ReferenceToken {
    ReferenceToken::parse("AB12CD34").unwrap()
}

#[tokio::test]
async fn discounted_purchase_is_approved_and_delivered() {
    let desk = Desk::new();
    sale15(&desk.records);

    desk.buy_standard(Some("sale15")).await;

    assert_eq!(desk.dispatcher.buyer_step(BUYER).await, None);
    let pending = desk.dispatcher.pending().take(&token()).unwrap();
    assert_eq!(pending.final_price, Money::new(4250));
    assert_eq!(pending.buyer_name, "Alex Ivanov");
    assert!(desk.dispatcher.pending().insert(token(), pending));

    let notice = desk.notifier.last_text_to(OPERATOR);
    assert!(notice.contains("AB12CD34"));
    assert!(notice.contains("4250 ₽"));
    assert!(desk.notifier.last_text_to(BUYER).contains("AB12CD34"));

    desk.press(OPERATOR, "Выдать билет").await;

    let ticket = desk.records.ticket("AB12CD34EF56").unwrap();
    assert!(ticket.active);
    assert_eq!(ticket.final_price, Money::new(4250));
    assert_eq!(ticket.buyer_chat, Some(BUYER));
    assert_eq!(desk.photos_to(BUYER, 1).await, 1);
    assert!(desk.dispatcher.pending().is_empty());
}

#[tokio::test]
async fn second_approval_is_already_processed() {
    let desk = Desk::new();
    desk.buy_standard(None).await;
    let approve = Inbound::Callback(Callback::Approve(token()));

    desk.dispatcher.dispatch(OPERATOR, "Op", approve.clone()).await;
    desk.dispatcher.dispatch(OPERATOR, "Op", approve).await;

    assert!(desk.notifier.last_text_to(OPERATOR).contains("уже обработаны"));
    assert_eq!(desk.records.tickets().len(), 1);
}

#[tokio::test]
async fn buyers_cannot_approve_their_own_payment() {
    let desk = Desk::new();
    desk.buy_standard(None).await;

    desk.dispatcher
        .dispatch(BUYER, "Alex", Inbound::Callback(Callback::Approve(token())))
        .await;

    assert!(desk.notifier.last_text_to(BUYER).contains("не являетесь администратором"));
    assert!(desk.dispatcher.pending().contains(&token()));
    assert!(desk.records.tickets().is_empty());
}

#[tokio::test]
async fn short_names_are_asked_again() {
    let desk = Desk::new();
    desk.command(BUYER, SlashCommand::Buy).await;
    desk.press(BUYER, "STANDART").await;
    desk.press(BUYER, "Пропустить").await;

    desk.text(BUYER, "Al").await;

    assert_eq!(desk.dispatcher.buyer_step(BUYER).await, Some("entering_name"));
    assert!(desk.notifier.last_text_to(BUYER).contains("полное имя"));

    desk.text(BUYER, "Alex Ivanov").await;

    assert_eq!(desk.dispatcher.buyer_step(BUYER).await, Some("entering_email"));
}

#[tokio::test]
async fn unknown_codes_keep_the_buyer_on_the_code_step() {
    let desk = Desk::new();
    desk.command(BUYER, SlashCommand::Buy).await;
    desk.press(BUYER, "VIP").await;

    desk.text(BUYER, "NOPE").await;

    assert_eq!(desk.dispatcher.buyer_step(BUYER).await, Some("waiting_promo_or_skip"));
    assert!(desk.notifier.last_text_to(BUYER).contains("недействителен"));
}

#[tokio::test]
async fn cancel_ends_every_flow_of_the_chat() {
    let desk = Desk::new();
    desk.log_in().await;
    desk.command(OPERATOR, SlashCommand::Buy).await;
    assert!(desk.dispatcher.admin_step(OPERATOR).await.is_some());
    assert!(desk.dispatcher.buyer_step(OPERATOR).await.is_some());

    desk.command(OPERATOR, SlashCommand::Cancel).await;

    assert_eq!(desk.dispatcher.admin_step(OPERATOR).await, None);
    assert_eq!(desk.dispatcher.buyer_step(OPERATOR).await, None);
    assert!(desk.notifier.last_text_to(OPERATOR).contains("отменена"));
}

#[tokio::test]
async fn operator_can_buy_with_the_panel_open() {
    let desk = Desk::new();
    desk.log_in().await;
    desk.command(OPERATOR, SlashCommand::Buy).await;
    desk.press(OPERATOR, "STANDART").await;
    desk.press(OPERATOR, "Пропустить").await;

    desk.text(OPERATOR, "Alex Ivanov").await;
    assert_eq!(desk.dispatcher.buyer_step(OPERATOR).await, Some("entering_email"));
    desk.text(OPERATOR, "alex@example.com").await;

    assert_eq!(desk.dispatcher.buyer_step(OPERATOR).await, Some("confirming_payment"));
    assert_eq!(desk.dispatcher.admin_step(OPERATOR).await, Some("menu"));

    // Once the purchase stops reading text, the panel gets it again
    desk.text(OPERATOR, "hello").await;
    assert!(desk.notifier.last_text_to(OPERATOR).contains("кнопками"));
    assert_eq!(desk.dispatcher.buyer_step(OPERATOR).await, Some("confirming_payment"));
}

#[tokio::test]
async fn slow_uploads_still_finish_free_issuance() {
    let notifier = RecordingNotifier::new();
    let slow = SlowPhotos {
        inner: notifier.clone(),
        delay: Duration::from_millis(300),
    };
    let runtime = RuntimeConfig::default().with_effect_timeout(Duration::from_millis(400));
    let desk = Desk::with(Arc::new(slow), notifier, runtime);
    desk.log_in().await;
    desk.press(OPERATOR, "Ручная выдача").await;
    desk.press(OPERATOR, "STANDART").await;
    desk.text(OPERATOR, "Guest").await;
    desk.text(OPERATOR, "guest@example.com").await;

    desk.press(OPERATOR, "Подтвердить выдачу").await;

    for _ in 0..40 {
        if desk.notifier.last_text_to(OPERATOR).contains("БЕСПЛАТНЫЙ") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let ticket = desk.records.ticket("AB12CD34EF56").unwrap();
    assert!(ticket.active);
    assert_eq!(ticket.final_price, Money::ZERO);
    // Holder copy and operator copy both land in the operator chat
    assert_eq!(desk.notifier.photos_to(OPERATOR).len(), 2);
    assert!(desk.notifier.last_text_to(OPERATOR).contains("БЕСПЛАТНЫЙ"));
    assert_eq!(desk.dispatcher.admin_step(OPERATOR).await, Some("menu"));
}

#[tokio::test]
async fn cancel_outside_a_flow_still_answers() {
    let desk = Desk::new();

    desk.command(BUYER, SlashCommand::Cancel).await;

    assert!(desk.notifier.last_text_to(BUYER).contains("отменена"));
}

#[tokio::test]
async fn strangers_are_kept_out_of_the_panel() {
    let desk = Desk::new();

    desk.command(BUYER, SlashCommand::Admin).await;

    assert_eq!(desk.dispatcher.admin_step(BUYER).await, None);
    assert!(desk.notifier.last_text_to(BUYER).contains("Доступ только"));
}

#[tokio::test]
async fn free_text_outside_a_flow_gets_the_buy_hint() {
    let desk = Desk::new();

    desk.text(BUYER, "hello").await;
    desk.dispatcher.dispatch(BUYER, "Alex", Inbound::Scan(None)).await;

    let replies = desk.notifier.messages_to(BUYER);
    assert_eq!(replies.len(), 2);
    assert!(replies.iter().all(|m| m.text_content().contains("/buy")));
}

#[tokio::test]
async fn welcome_mentions_the_panel_to_the_operator_only() {
    let desk = Desk::new();

    desk.command(BUYER, SlashCommand::Start).await;
    desk.command(OPERATOR, SlashCommand::Start).await;

    assert!(!desk.notifier.last_text_to(BUYER).contains("/admin"));
    assert!(desk.notifier.last_text_to(OPERATOR).contains("/admin"));
}

#[tokio::test]
async fn tickets_are_activated_once() {
    let desk = Desk::new();
    desk.records.put_ticket(Ticket {
        id: TicketId::from_stored("0A1B2C3D4E5F".into()),
        product_name: "VIP".into(),
        buyer_name: "Alex Ivanov".into(),
        buyer_email: "alex@example.com".into(),
        buyer_chat: Some(BUYER),
        final_price: Money::new(15000),
        active: false,
        purchased_at: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
    });
    desk.log_in().await;
    desk.press(OPERATOR, "Проверить").await;
    desk.text(OPERATOR, "0a1b2c3d4e5f").await;
    let status = desk.notifier.last_to(OPERATOR).unwrap();

    desk.press(OPERATOR, "Активировать").await;

    assert!(desk.records.ticket("0A1B2C3D4E5F").unwrap().active);
    assert!(desk.notifier.last_text_to(OPERATOR).contains("успешно активирован"));
    assert_eq!(desk.photos_to(BUYER, 1).await, 1);

    // The same activation button pressed again from a fresh check
    desk.press(OPERATOR, "Проверить").await;
    let Callback::Admin(activate) = Callback::decode(&status.keyboard[0].payload).unwrap() else {
        panic!("first button should activate");
    };
    desk.dispatcher
        .dispatch(OPERATOR, "Op", Inbound::Callback(Callback::Admin(activate)))
        .await;

    assert!(desk.notifier.last_text_to(OPERATOR).contains("Не удалось активировать"));
    assert_eq!(desk.photos_to(BUYER, 2).await, 1);
}

#[tokio::test]
async fn linking_a_product_twice_restores_membership() {
    let desk = Desk::new();
    desk.log_in().await;
    desk.press(OPERATOR, "промокодами").await;
    desk.press(OPERATOR, "Добавить").await;
    desk.text(OPERATOR, "spring 20").await;
    let code = desk.records.discount_code("SPRING").unwrap();
    assert_eq!(code.percent, DiscountPercent::new(20).unwrap());

    desk.press(OPERATOR, "VIP").await;
    assert_eq!(desk.records.link_count(code.id), 1);
    assert!(desk.notifier.last_text_to(OPERATOR).contains("SPRING"));

    desk.press(OPERATOR, "VIP").await;
    assert_eq!(desk.records.link_count(code.id), 0);

    desk.press(OPERATOR, "Готово").await;
    assert_eq!(desk.dispatcher.admin_step(OPERATOR).await, Some("promo_menu"));
}

#[tokio::test]
async fn admin_buttons_need_an_open_panel() {
    let desk = Desk::new();
    desk.log_in().await;
    let menu = desk.notifier.last_to(OPERATOR).unwrap();
    desk.command(OPERATOR, SlashCommand::Cancel).await;

    let callback = Callback::decode(&menu.keyboard[0].payload).unwrap();
    desk.dispatcher.dispatch(OPERATOR, "Op", Inbound::Callback(callback)).await;

    assert!(desk.notifier.last_text_to(OPERATOR).contains("больше не активна"));
    assert_eq!(desk.dispatcher.admin_step(OPERATOR).await, None);
}

#[tokio::test]
async fn shutdown_abandons_pending_payments() {
    let desk = Desk::new();
    desk.buy_standard(None).await;
    assert_eq!(desk.dispatcher.pending().len(), 1);

    desk.dispatcher.shutdown();

    assert!(desk.dispatcher.pending().is_empty());
}
