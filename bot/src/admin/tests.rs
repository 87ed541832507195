#![allow(clippy::unwrap_used, clippy::panic)]

use super::*;
use crate::command::AdminButton;
use boxoffice_core::reducer::Reducer;
use boxoffice_core::types::{DiscountPercent, Money};
use boxoffice_testing::assertions::{assert_effects_count, assert_has_detached_effect};
use boxoffice_testing::effects::run_effects;
use boxoffice_testing::{InMemoryRecordStore, RecordingNotifier, ReducerTest, SequentialIds, StubQrCodec, test_clock};

const OPERATOR: ChatId = ChatId::new(1);
const BUYER: ChatId = ChatId::new(555);
const STRANGER: ChatId = ChatId::new(999);

struct Fixture {
    records: InMemoryRecordStore,
    notifier: RecordingNotifier,
    env: AdminEnvironment,
}

fn fixture() -> Fixture {
    let records = InMemoryRecordStore::seeded(Arc::new(test_clock()));
    let notifier = RecordingNotifier::new();
    let qr = Arc::new(StubQrCodec::new());
    let issuer = Issuer::new(
        Arc::new(records.clone()),
        Arc::new(notifier.clone()),
        qr.clone(),
        Arc::new(SequentialIds::new().with_ticket_ids(["FREE00000001"])),
        OPERATOR,
    );
    let env = AdminEnvironment {
        records: Arc::new(records.clone()),
        notifier: Arc::new(notifier.clone()),
        qr,
        issuer,
        operator: OPERATOR,
        password: "s3cret".into(),
    };
    Fixture { records, notifier, env }
}

fn ticket(id: &str, active: bool) -> Ticket {
    Ticket {
        id: TicketId::from_stored(id.into()),
        product_name: "VIP".into(),
        buyer_name: "Alex Ivanov".into(),
        buyer_email: "alex@example.com".into(),
        buyer_chat: Some(BUYER),
        final_price: Money::new(15000),
        active,
        purchased_at: test_clock_time(),
    }
}

fn test_clock_time() -> chrono::DateTime<chrono::Utc> {
    use boxoffice_core::environment::Clock;
    test_clock().now()
}

async fn drive(state: &mut AdminSession, env: &AdminEnvironment, action: AdminAction) {
    let mut queue = vec![action];
    while let Some(action) = queue.pop() {
        let effects = AdminReducer.reduce(state, action, env);
        queue.extend(run_effects(effects).await);
    }
}

fn text(text: &str) -> AdminAction {
    AdminAction::Text {
        chat: OPERATOR,
        text: text.into(),
    }
}

fn pressed(button: AdminButton) -> AdminAction {
    AdminAction::Pressed { chat: OPERATOR, button }
}

// ============================================================================
// Gate
// ============================================================================

#[tokio::test]
async fn strangers_are_turned_away() {
    let f = fixture();
    let mut state = AdminSession::Idle;

    drive(&mut state, &f.env, AdminAction::Enter { chat: STRANGER }).await;

    assert_eq!(state, AdminSession::Idle);
    assert!(f.notifier.last_text_to(STRANGER).contains("Доступ только"));
}

#[tokio::test]
async fn password_unlocks_the_menu() {
    let f = fixture();
    let mut state = AdminSession::Idle;

    drive(&mut state, &f.env, AdminAction::Enter { chat: OPERATOR }).await;
    assert_eq!(state, AdminSession::AwaitingPassword);

    drive(&mut state, &f.env, text("S3CRET")).await;
    assert_eq!(state, AdminSession::AwaitingPassword);
    assert!(f.notifier.last_text_to(OPERATOR).contains("неверный"));

    drive(&mut state, &f.env, text("s3cret")).await;
    assert_eq!(state, AdminSession::Menu);
    assert_eq!(f.notifier.last_to(OPERATOR).unwrap().keyboard.len(), 5);
}

#[test]
fn buttons_need_a_login() {
    let f = fixture();
    ReducerTest::new(AdminReducer)
        .with_env(f.env)
        .given_state(AdminSession::AwaitingPassword)
        .when_action(pressed(AdminButton::CheckTicket))
        .then_state(|state| assert_eq!(*state, AdminSession::AwaitingPassword))
        .then_effects(|effects| assert_effects_count(effects, 1))
        .run();
}

#[test]
fn cancel_leaves_the_panel() {
    let f = fixture();
    ReducerTest::new(AdminReducer)
        .with_env(f.env)
        .given_state(AdminSession::EnteringPromo)
        .when_action(AdminAction::Cancel { chat: OPERATOR })
        .then_state(|state| assert!(state.is_idle()))
        .then_effects(|effects| assert_effects_count(effects, 0))
        .run();
}

// ============================================================================
// Ticket check
// ============================================================================

#[tokio::test]
async fn inactive_ticket_is_activated_and_holder_notified() {
    let f = fixture();
    f.records.put_ticket(ticket("AB12CD34EF56", false));
    let mut state = AdminSession::CheckingTicket;

    drive(&mut state, &f.env, text(" ab12cd34ef56 ")).await;
    let status = f.notifier.last_to(OPERATOR).unwrap();
    assert!(status.text_content().contains("НЕ АКТИВИРОВАН"));
    assert_eq!(status.keyboard[0].payload, "act:AB12CD34EF56");

    let id = TicketId::from_stored("AB12CD34EF56".into());
    drive(&mut state, &f.env, pressed(AdminButton::Activate(id))).await;

    assert_eq!(state, AdminSession::Menu);
    assert!(f.records.ticket("AB12CD34EF56").unwrap().active);
    assert!(f.notifier.last_text_to(OPERATOR).contains("успешно активирован"));
    let notice = f.notifier.photos_to(BUYER);
    assert_eq!(notice.len(), 1);
    assert!(notice[0].text_content().contains("AB12CD34EF56"));
}

#[test]
fn successful_activation_notifies_in_the_background() {
    let f = fixture();
    ReducerTest::new(AdminReducer)
        .with_env(f.env)
        .given_state(AdminSession::CheckingTicket)
        .when_action(AdminAction::Activated {
            chat: OPERATOR,
            id: TicketId::from_stored("AB12CD34EF56".into()),
            result: Ok(true),
        })
        .then_state(|state| assert_eq!(*state, AdminSession::Menu))
        .then_effects(assert_has_detached_effect)
        .run();
}

#[tokio::test]
async fn active_ticket_cannot_be_activated_again() {
    let f = fixture();
    let before = ticket("AB12CD34EF56", true);
    f.records.put_ticket(before.clone());
    let mut state = AdminSession::CheckingTicket;

    drive(
        &mut state,
        &f.env,
        pressed(AdminButton::Activate(TicketId::from_stored("AB12CD34EF56".into()))),
    )
    .await;

    assert_eq!(state, AdminSession::Menu);
    assert!(f.notifier.last_text_to(OPERATOR).contains("Не удалось активировать"));
    assert_eq!(f.records.ticket("AB12CD34EF56").unwrap(), before);
    assert!(f.notifier.messages_to(BUYER).is_empty());
}

#[tokio::test]
async fn active_ticket_has_no_activation_button() {
    let f = fixture();
    f.records.put_ticket(ticket("AB12CD34EF56", true));
    let mut state = AdminSession::CheckingTicket;

    drive(
        &mut state,
        &f.env,
        AdminAction::Scan {
            chat: OPERATOR,
            payload: Some("AB12CD34EF56".into()),
        },
    )
    .await;

    let status = f.notifier.last_to(OPERATOR).unwrap();
    assert!(status.text_content().contains("АКТИВЕН"));
    assert_eq!(status.keyboard.len(), 1);
}

#[tokio::test]
async fn unreadable_photo_keeps_waiting() {
    let f = fixture();
    let mut state = AdminSession::CheckingTicket;

    drive(
        &mut state,
        &f.env,
        AdminAction::Scan {
            chat: OPERATOR,
            payload: None,
        },
    )
    .await;

    assert_eq!(state, AdminSession::CheckingTicket);
    assert!(f.notifier.last_text_to(OPERATOR).contains("не распознан"));
}

#[tokio::test]
async fn unknown_ticket_is_reported() {
    let f = fixture();
    let mut state = AdminSession::CheckingTicket;

    drive(&mut state, &f.env, text("FFFFFFFFFFFF")).await;

    let reply = f.notifier.last_to(OPERATOR).unwrap();
    assert!(reply.text_content().contains("не найден"));
    assert_eq!(reply.keyboard.len(), 1);
}

// ============================================================================
// Prices
// ============================================================================

#[tokio::test]
async fn price_is_updated_after_a_valid_number() {
    let f = fixture();
    let vip = f.records.product("VIP").unwrap();
    let mut state = AdminSession::Menu;

    drive(&mut state, &f.env, pressed(AdminButton::EditPrices)).await;
    assert_eq!(state, AdminSession::ChoosingPriceProduct);

    drive(&mut state, &f.env, pressed(AdminButton::EditPrice(vip.id))).await;
    assert!(matches!(&state, AdminSession::EnteringPrice { product } if product.name == "VIP"));

    drive(&mut state, &f.env, text("-5")).await;
    assert!(f.notifier.last_text_to(OPERATOR).contains("корректное положительное число"));
    assert_eq!(state.step(), "entering_price");

    drive(&mut state, &f.env, text("16000")).await;
    assert_eq!(state, AdminSession::Menu);
    assert_eq!(f.records.product("VIP").unwrap().price, Money::new(16000));
}

#[tokio::test]
async fn store_outage_returns_to_the_menu() {
    let f = fixture();
    f.records.set_unavailable(true);
    let mut state = AdminSession::Menu;

    drive(&mut state, &f.env, pressed(AdminButton::EditPrices)).await;

    assert_eq!(state, AdminSession::Menu);
    assert!(f.notifier.last_text_to(OPERATOR).contains("Ошибка базы данных"));
}

// ============================================================================
// Discount codes
// ============================================================================

#[tokio::test]
async fn new_code_moves_to_product_linking() {
    let f = fixture();
    let mut state = AdminSession::EnteringPromo;

    drive(&mut state, &f.env, text("sale15 15")).await;

    let AdminSession::LinkingPromoProducts { code } = &state else {
        panic!("expected linking, got {}", state.step());
    };
    assert_eq!(code.code, "SALE15");
    assert_eq!(code.percent.get(), 15);
    // One button per active product plus "done"
    assert_eq!(f.notifier.last_to(OPERATOR).unwrap().keyboard.len(), 4);
}

#[tokio::test]
async fn bad_entries_are_reprompted() {
    let f = fixture();
    f.records.add_discount_code("SALE15", DiscountPercent::new(15).unwrap(), true);

    for (entry, reply) in [
        ("SALE15", "Неверный формат"),
        ("NEW 0", "от 1 до 99"),
        ("sale15 20", "уже существует"),
    ] {
        let mut state = AdminSession::EnteringPromo;
        drive(&mut state, &f.env, text(entry)).await;

        assert_eq!(state, AdminSession::EnteringPromo, "entry {entry}");
        assert!(f.notifier.last_text_to(OPERATOR).contains(reply), "entry {entry}");
    }
}

#[tokio::test]
async fn linking_twice_restores_membership() {
    let f = fixture();
    let code = f.records.add_discount_code("SALE15", DiscountPercent::new(15).unwrap(), true);
    let vip = f.records.product("VIP").unwrap();
    let mut state = AdminSession::LinkingPromoProducts { code: code.clone() };

    drive(&mut state, &f.env, pressed(AdminButton::LinkProduct(vip.id))).await;
    assert_eq!(f.records.link_count(code.id), 1);
    assert!(f.notifier.last_to(OPERATOR).unwrap().keyboard[0].label.starts_with("🟢"));

    drive(&mut state, &f.env, pressed(AdminButton::LinkProduct(vip.id))).await;
    assert_eq!(f.records.link_count(code.id), 0);
    assert!(f.notifier.last_to(OPERATOR).unwrap().keyboard[0].label.starts_with("⚪"));

    drive(&mut state, &f.env, pressed(AdminButton::FinishLinking)).await;
    assert_eq!(state, AdminSession::PromoMenu);
}

#[tokio::test]
async fn list_buttons_flip_the_active_flag() {
    let f = fixture();
    let code = f.records.add_discount_code("SALE15", DiscountPercent::new(15).unwrap(), true);
    let mut state = AdminSession::PromoMenu;

    drive(&mut state, &f.env, pressed(AdminButton::ListPromos)).await;
    assert_eq!(state, AdminSession::ListingPromos);

    drive(
        &mut state,
        &f.env,
        pressed(AdminButton::TogglePromo {
            id: code.id,
            active: false,
        }),
    )
    .await;

    assert_eq!(state, AdminSession::ListingPromos);
    assert!(!f.records.discount_code("SALE15").unwrap().active);
    let list = f.notifier.last_to(OPERATOR).unwrap();
    assert!(list.text_content().starts_with("Промокод деактивирован."));
    assert!(list.keyboard[0].label.contains("Неактивен"));
}

#[tokio::test]
async fn empty_code_list_falls_back_to_the_promo_menu() {
    let f = fixture();
    let mut state = AdminSession::PromoMenu;

    drive(&mut state, &f.env, pressed(AdminButton::ListPromos)).await;

    assert_eq!(state, AdminSession::PromoMenu);
    assert!(f.notifier.last_text_to(OPERATOR).contains("не найдены"));
}

// ============================================================================
// Free tickets
// ============================================================================

#[tokio::test]
async fn free_ticket_goes_to_the_operator() {
    let f = fixture();
    let standart = f.records.product("STANDART").unwrap();
    let mut state = AdminSession::Menu;

    drive(&mut state, &f.env, pressed(AdminButton::IssueTicket)).await;
    drive(&mut state, &f.env, pressed(AdminButton::IssueProduct(standart.id))).await;
    drive(&mut state, &f.env, text("Guest <VIP>")).await;
    drive(&mut state, &f.env, text("not-an-email")).await;
    assert_eq!(state.step(), "entering_issue_email");

    drive(&mut state, &f.env, text("guest@example.com")).await;
    assert_eq!(state.step(), "confirming_issue");

    drive(&mut state, &f.env, text("yes")).await;
    assert!(f.notifier.last_text_to(OPERATOR).contains("Подтвердить выдачу"));

    drive(&mut state, &f.env, pressed(AdminButton::ConfirmIssue)).await;

    assert_eq!(state, AdminSession::Menu);
    let issued = f.records.ticket("FREE00000001").unwrap();
    assert_eq!(issued.final_price, Money::ZERO);
    assert_eq!(issued.buyer_name, "Guest <VIP>");
    assert_eq!(issued.buyer_chat, Some(OPERATOR));
    assert!(issued.active);
    assert!(f.notifier.last_text_to(OPERATOR).contains("Guest &lt;VIP&gt;"));
}

#[tokio::test]
async fn blank_free_ticket_names_are_asked_again() {
    let f = fixture();
    let standart = f.records.product("STANDART").unwrap();
    let mut state = AdminSession::Menu;
    drive(&mut state, &f.env, pressed(AdminButton::IssueTicket)).await;
    drive(&mut state, &f.env, pressed(AdminButton::IssueProduct(standart.id))).await;

    drive(&mut state, &f.env, text("   ")).await;
    assert_eq!(state.step(), "entering_issue_name");

    drive(&mut state, &f.env, text(" Guest ")).await;
    assert!(matches!(&state, AdminSession::EnteringIssueEmail { name, .. } if name == "Guest"));
}

#[tokio::test]
async fn confirm_outside_the_confirmation_screen_is_stale() {
    let f = fixture();
    let mut state = AdminSession::PromoMenu;

    drive(&mut state, &f.env, pressed(AdminButton::ConfirmIssue)).await;

    assert_eq!(state, AdminSession::PromoMenu);
    assert!(f.records.tickets().is_empty());
}
