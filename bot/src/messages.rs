//! Every message the desk sends, as HTML.
//!
//! Anything a user typed is passed through [`escape`] before it is
//! interpolated.

use crate::command::{AdminButton, BuyerButton, Callback};
use crate::pending::PendingTransaction;
use boxoffice_core::ports::{Button, Keyboard, OutboundMessage};
use boxoffice_core::types::{ChatId, DiscountCode, DiscountPercent, Money, Product, ProductId, ReferenceToken, Ticket, TicketId};
use std::fmt::Write as _;

/// Escapes `<`, `>`, `&` and `"` for Telegram's HTML parse mode.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn button(label: impl Into<String>, callback: &Callback) -> Button {
    Button::new(label, callback.encode())
}

fn buyer(label: impl Into<String>, pressed: BuyerButton) -> Button {
    button(label, &Callback::Buyer(pressed))
}

fn admin(label: impl Into<String>, pressed: AdminButton) -> Button {
    button(label, &Callback::Admin(pressed))
}

// ============================================================================
// Shared
// ============================================================================

/// Reply to `/cancel`
#[must_use]
pub fn cancelled(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "❌ Текущая операция отменена.")
}

/// Reply to `/start`
#[must_use]
pub fn welcome(to: ChatId, first_name: &str, is_admin: bool) -> OutboundMessage {
    let mut text = format!(
        "Привет, <b>{}</b>! 👋\n\nЯ бот для продажи билетов. Чтобы начать покупку, используй команду /buy.",
        escape(first_name)
    );
    if is_admin {
        text.push_str("\n\n🔑 <b>Режим Администратора</b>: используй /admin для доступа к меню управления.");
    }
    OutboundMessage::text(to, text)
}

/// Store failure
#[must_use]
pub fn apology(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "⚠️ Сервис временно недоступен. Пожалуйста, попробуйте позже.")
}

/// Text or photo where a button press is expected
#[must_use]
pub fn use_buttons(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "Пожалуйста, воспользуйтесь кнопками выше или нажмите /cancel.")
}

/// Button from an earlier step
#[must_use]
pub fn stale_button(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "⚠️ Эта кнопка больше не активна.")
}

/// Message outside any conversation
#[must_use]
pub fn buy_hint(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "Чтобы купить билет, используйте команду /buy.")
}

// ============================================================================
// Purchase flow
// ============================================================================

/// Empty catalogue
#[must_use]
pub fn no_tiers(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "К сожалению, на данный момент нет доступных тарифов.")
}

/// Tier list with one button per tier
#[must_use]
pub fn tier_list(to: ChatId, products: &[Product]) -> OutboundMessage {
    let mut text = String::from("Выберите желаемый тариф:\n\n");
    let mut keyboard: Keyboard = Vec::with_capacity(products.len() + 1);
    for product in products {
        let _ = write!(
            text,
            "<b>{}</b> - {}\n<i>{}</i>\n\n",
            escape(&product.name),
            product.price,
            escape(&product.description)
        );
        keyboard.push(buyer(
            format!("🎫 {} ({})", product.name, product.price),
            BuyerButton::Product(product.name.clone()),
        ));
    }
    keyboard.push(buyer("❌ Отмена", BuyerButton::Cancel));
    OutboundMessage::text(to, text).with_keyboard(keyboard)
}

/// Unknown or inactive tier
#[must_use]
pub fn tier_unavailable(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "❌ Извините, выбранный тариф недоступен. Начните заново с /buy.")
}

fn code_keyboard() -> Keyboard {
    vec![
        buyer("➡️ Пропустить", BuyerButton::SkipCode),
        buyer("⬅️ Назад к выбору", BuyerButton::BackToProducts),
    ]
}

const NAME_PROMPT: &str = "Введите ваше <b>ИМЯ и ФАМИЛИЮ</b> (как в паспорте):";

/// Discount code prompt after a tier is chosen
#[must_use]
pub fn code_prompt(to: ChatId, product_name: &str, price: Money) -> OutboundMessage {
    let text = format!(
        "Вы выбрали: <b>{}</b> ({price}).\n\n\
         Введите промокод (если есть) или нажмите 'Пропустить', чтобы перейти к оплате.",
        escape(product_name)
    );
    OutboundMessage::text(to, text).with_keyboard(code_keyboard())
}

/// Accepted discount code
#[must_use]
pub fn code_applied(
    to: ChatId,
    code: &str,
    percent: DiscountPercent,
    initial: Money,
    final_price: Money,
) -> OutboundMessage {
    let text = format!(
        "✅ Промокод <b>{}</b> применен!\nСкидка: {percent}\nИтоговая цена: <s>{initial}</s> <b>{final_price}</b>\n\n{NAME_PROMPT}",
        escape(code)
    );
    OutboundMessage::text(to, text)
}

/// Unknown or inactive discount code
#[must_use]
pub fn code_rejected(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(
        to,
        "❌ Промокод недействителен или не найден.\nВведите другой промокод или нажмите 'Пропустить'.",
    )
    .with_keyboard(code_keyboard())
}

/// Continuing without a code
#[must_use]
pub fn code_skipped(to: ChatId, final_price: Money) -> OutboundMessage {
    OutboundMessage::text(
        to,
        format!("Промокод пропущен.\nИтоговая цена: <b>{final_price}</b>\n\n{NAME_PROMPT}"),
    )
}

/// Name under three characters
#[must_use]
pub fn name_too_short(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "Пожалуйста, введите полное имя и фамилию.")
}

/// Email prompt after the name
#[must_use]
pub fn email_prompt(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "Введите ваш <b>EMAIL</b> для получения билета:")
}

/// Email without the expected shape
#[must_use]
pub fn email_invalid(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "❌ Пожалуйста, введите корректный адрес электронной почты.")
}

/// Order summary with the pay button
#[must_use]
pub fn order_summary(
    to: ChatId,
    product_name: &str,
    name: &str,
    email: &str,
    code: Option<&str>,
    final_price: Money,
) -> OutboundMessage {
    let text = format!(
        "<b>ПОДТВЕРЖДЕНИЕ ЗАКАЗА</b>\n\n\
         Тариф: <b>{}</b>\nИмя: {}\nEmail: <code>{}</code>\nПромокод: {}\nИтого: <b>{final_price}</b>\n\n\
         Нажмите 'Оплатить', чтобы получить ссылку.",
        escape(product_name),
        escape(name),
        escape(email),
        code.map_or_else(|| "Нет".to_owned(), escape),
    );
    OutboundMessage::text(to, text).with_keyboard(vec![
        buyer(format!("💳 Оплатить {final_price}"), BuyerButton::Pay),
        buyer("❌ Отмена", BuyerButton::Cancel),
    ])
}

/// Payment link placeholder
#[must_use]
pub fn payment_link(to: ChatId, final_price: Money, link: &str) -> OutboundMessage {
    let text = format!(
        "🔗 <b>Ссылка на оплату {final_price}</b>\n\n{}\n\n\
         После перевода средств нажмите 'Я оплатил'.",
        escape(link)
    );
    OutboundMessage::text(to, text).with_keyboard(vec![
        buyer("✅ Я оплатил", BuyerButton::Paid),
        buyer("❌ Отмена", BuyerButton::Cancel),
    ])
}

/// Buyer's receipt for a submitted payment
#[must_use]
pub fn payment_submitted(to: ChatId, token: &ReferenceToken) -> OutboundMessage {
    OutboundMessage::text(
        to,
        format!(
            "✅ Ваш запрос отправлен администратору. Референс: <code>{token}</code>.\n\
             Мы уведомим вас, как только оплата будет подтверждена и билет выдан."
        ),
    )
}

/// Operator notification with approve / reject buttons
#[must_use]
pub fn payment_notice(to: ChatId, token: &ReferenceToken, transaction: &PendingTransaction) -> OutboundMessage {
    let text = format!(
        "🚨 <b>ТРЕБУЕТСЯ ПОДТВЕРЖДЕНИЕ ОПЛАТЫ</b>\n\n\
         <b>Референс:</b> <code>{token}</code>\n\
         <b>Продукт:</b> {} ({})\n\
         <b>Покупатель:</b> {}\n\
         <b>Email:</b> {}\n\
         <b>ID чата:</b> <code>{}</code>",
        escape(&transaction.product_name),
        transaction.final_price,
        escape(&transaction.buyer_name),
        escape(&transaction.buyer_email),
        transaction.buyer_chat,
    );
    OutboundMessage::text(to, text).with_keyboard(vec![
        button("✅ Выдать билет (Оплачено)", &Callback::Approve(token.clone())),
        button("❌ Отклонить", &Callback::Reject(token.clone())),
    ])
}

// ============================================================================
// Payment approval
// ============================================================================

/// Approval by someone other than the operator
#[must_use]
pub fn not_operator(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "⛔ Вы не являетесь администратором.")
}

/// Token already consumed or never issued
#[must_use]
pub fn unknown_reference(to: ChatId, token: &ReferenceToken) -> OutboundMessage {
    OutboundMessage::text(
        to,
        format!("❌ Ошибка: Детали транзакции <code>{token}</code> не найдены или уже обработаны."),
    )
}

/// Operator's confirmation after approval
#[must_use]
pub fn approved(to: ChatId, buyer_name: &str, final_price: Money) -> OutboundMessage {
    OutboundMessage::text(
        to,
        format!("✅ Билет для <b>{}</b> ({final_price}) успешно выдан!", escape(buyer_name)),
    )
}

/// Issuance failed after approval
#[must_use]
pub fn approval_failed(to: ChatId, token: &ReferenceToken) -> OutboundMessage {
    OutboundMessage::text(
        to,
        format!("❌ Критическая ошибка при выдаче билета для <code>{token}</code>. Подробности в логах."),
    )
}

/// Operator's confirmation after rejection
#[must_use]
pub fn rejected(to: ChatId, token: &ReferenceToken) -> OutboundMessage {
    OutboundMessage::text(to, format!("❌ Транзакция <code>{token}</code> отклонена."))
}

/// Buyer's notice after rejection
#[must_use]
pub fn rejected_to_buyer(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(
        to,
        "❌ Администратор отклонил подтверждение вашей оплаты. Пожалуйста, свяжитесь с поддержкой.",
    )
}

// ============================================================================
// Tickets
// ============================================================================

/// Caption of the ticket sent to the buyer
#[must_use]
pub fn ticket_caption(ticket: &Ticket) -> String {
    format!(
        "🥳 <b>Поздравляем!</b> Ваш билет на мероприятие активирован!\n\n\
         <b>Тариф:</b> {}\n<b>ID Билета:</b> <code>{}</code>\n<b>Дата покупки:</b> {}\n\n\
         Пожалуйста, сохраните этот QR-код. Он потребуется для входа.",
        escape(&ticket.product_name),
        ticket.id,
        ticket.purchased_display(),
    )
}

/// Caption of the operator's copy of an issued ticket
#[must_use]
pub fn issued_caption(ticket: &Ticket) -> String {
    let buyer_chat = ticket
        .buyer_chat
        .map_or_else(|| "—".to_owned(), |chat| chat.to_string());
    format!(
        "🎉 <b>Билет Успешно Выдан!</b> 🎉\n\n\
         🆔 <b>ID Билета:</b> <code>{}</code>\n🎫 <b>Тариф:</b> {}\n👤 <b>Покупатель:</b> {}\n\
         📧 <b>Email:</b> {}\n💰 <b>Цена:</b> {}\n\nQR-код отправлен покупателю {buyer_chat}.",
        ticket.id,
        escape(&ticket.product_name),
        escape(&ticket.buyer_name),
        escape(&ticket.buyer_email),
        ticket.final_price,
    )
}

// ============================================================================
// Administrator panel
// ============================================================================

fn back_to_menu() -> Button {
    admin("🔙 В главное меню", AdminButton::MainMenu)
}

fn menu_keyboard() -> Keyboard {
    vec![
        admin("🔍 Проверить/Активировать билет", AdminButton::CheckTicket),
        admin("💲 Управление ценами", AdminButton::EditPrices),
        admin("🎁 Управление промокодами", AdminButton::Promos),
        admin("🎫 Ручная выдача билета", AdminButton::IssueTicket),
        admin("🚪 Выход", AdminButton::Exit),
    ]
}

fn promo_keyboard() -> Keyboard {
    vec![
        admin("➕ Добавить промокод", AdminButton::AddPromo),
        admin("📋 Список промокодов", AdminButton::ListPromos),
        back_to_menu(),
    ]
}

/// `/admin` from anyone but the operator
#[must_use]
pub fn access_denied(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "⛔ Доступ только для главного администратора.")
}

/// Password prompt
#[must_use]
pub fn password_prompt(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "🔑 Введите пароль администратора:")
}

/// Wrong password
#[must_use]
pub fn wrong_password(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "❌ Пароль неверный. Попробуйте снова или нажмите /cancel.")
}

/// First menu after login
#[must_use]
pub fn logged_in(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "✅ Пароль верный. Добро пожаловать в панель администратора!")
        .with_keyboard(menu_keyboard())
}

/// Main menu
#[must_use]
pub fn main_menu(to: ChatId) -> OutboundMessage {
    main_menu_after(to, "")
}

/// Main menu preceded by the outcome of the last step
#[must_use]
pub fn main_menu_after(to: ChatId, outcome: &str) -> OutboundMessage {
    let mut text = String::from(outcome);
    if !text.is_empty() {
        text.push_str("\n\n");
    }
    text.push_str("⚙️ <b>Панель администратора</b>\nВыберите действие:");
    OutboundMessage::text(to, text).with_keyboard(menu_keyboard())
}

/// Leaving the panel
#[must_use]
pub fn exited(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "🚪 Выход из режима администратора.")
}

/// Ticket check prompt
#[must_use]
pub fn check_prompt(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "🔍 <b>Проверка билета</b>\nОтправьте QR-код или введите ID билета:")
        .with_keyboard(vec![back_to_menu()])
}

/// Blank ticket id
#[must_use]
pub fn ticket_id_required(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "❌ Введите ID билета или отправьте QR-код.")
}

/// Photo without a readable code
#[must_use]
pub fn qr_not_recognised(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "❌ QR-код не распознан. Попробуйте снова или введите ID вручную.")
}

/// Lookup miss
#[must_use]
pub fn ticket_not_found(to: ChatId, id: &TicketId) -> OutboundMessage {
    OutboundMessage::text(to, format!("❌ <b>Билет ID: <code>{id}</code></b> не найден."))
        .with_keyboard(vec![back_to_menu()])
}

/// Lookup hit; inactive tickets get an activation button
#[must_use]
pub fn ticket_status(to: ChatId, ticket: &Ticket) -> OutboundMessage {
    let status = if ticket.active {
        "🟢 <b>АКТИВЕН</b>"
    } else {
        "🔴 <b>НЕ АКТИВИРОВАН</b>"
    };
    let text = format!(
        "🎫 <b>Статус билета</b>\n\n\
         <b>ID:</b> <code>{}</code>\n<b>Продукт:</b> {}\n<b>Покупатель:</b> {} ({})\n\
         <b>Цена:</b> {}\n<b>Статус:</b> {status}\n<b>Дата покупки:</b> {}",
        ticket.id,
        escape(&ticket.product_name),
        escape(&ticket.buyer_name),
        escape(&ticket.buyer_email),
        ticket.final_price,
        ticket.purchased_display(),
    );
    let mut keyboard = Vec::with_capacity(2);
    if !ticket.active {
        keyboard.push(admin("✅ Активировать билет", AdminButton::Activate(ticket.id.clone())));
    }
    keyboard.push(back_to_menu());
    OutboundMessage::text(to, text).with_keyboard(keyboard)
}

/// Successful activation
#[must_use]
pub fn activated(to: ChatId, id: &TicketId) -> OutboundMessage {
    main_menu_after(
        to,
        &format!(
            "✅ <b>Билет ID: <code>{id}</code></b> успешно активирован!\n\
             Покупателю отправлено подтверждение (если доступен chat_id)."
        ),
    )
}

/// Activation refused (already active)
#[must_use]
pub fn activation_failed(to: ChatId, id: &TicketId) -> OutboundMessage {
    main_menu_after(
        to,
        &format!(
            "❌ Не удалось активировать <b>Билет ID: <code>{id}</code></b>. \
             Он либо уже активен, либо произошла ошибка БД."
        ),
    )
}

/// Apology that lands back on the main menu
#[must_use]
pub fn menu_apology(to: ChatId) -> OutboundMessage {
    main_menu_after(to, "⚠️ Ошибка базы данных. Попробуйте позже.")
}

fn product_buttons(products: &[Product], pressed: impl Fn(ProductId) -> AdminButton) -> Keyboard {
    let mut keyboard: Keyboard = products
        .iter()
        .map(|p| admin(format!("{} ({})", p.name, p.price), pressed(p.id)))
        .collect();
    keyboard.push(back_to_menu());
    keyboard
}

/// Nothing to edit
#[must_use]
pub fn no_products_to_edit(to: ChatId) -> OutboundMessage {
    main_menu_after(to, "❌ Нет доступных продуктов для редактирования.")
}

/// Product choice for price editing
#[must_use]
pub fn price_products(to: ChatId, products: &[Product]) -> OutboundMessage {
    OutboundMessage::text(
        to,
        "💲 <b>Редактирование цен</b>\nВыберите продукт, цену которого хотите изменить:",
    )
    .with_keyboard(product_buttons(products, AdminButton::EditPrice))
}

/// Product id that no longer resolves
#[must_use]
pub fn product_not_found(to: ChatId) -> OutboundMessage {
    main_menu_after(to, "❌ Продукт не найден.")
}

/// New price prompt
#[must_use]
pub fn price_prompt(to: ChatId, product: &Product) -> OutboundMessage {
    OutboundMessage::text(
        to,
        format!(
            "✍️ Вы выбрали <b>{}</b> (текущая цена: <b>{}</b>).\nВведите новую цену (только число):",
            escape(&product.name),
            product.price
        ),
    )
}

/// Price input that is not a non-negative integer
#[must_use]
pub fn price_invalid(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "❌ Введите корректное положительное число для цены.")
}

/// Price saved
#[must_use]
pub fn price_updated(to: ChatId, product_name: &str, price: Money) -> OutboundMessage {
    main_menu_after(
        to,
        &format!(
            "✅ Цена для продукта {} успешно обновлена до <b>{price}</b>.",
            escape(product_name)
        ),
    )
}

/// Price update matched no row
#[must_use]
pub fn price_update_failed(to: ChatId) -> OutboundMessage {
    main_menu_after(to, "❌ Ошибка при обновлении цены в БД.")
}

/// Discount code menu
#[must_use]
pub fn promo_menu(to: ChatId) -> OutboundMessage {
    promo_menu_after(to, "")
}

/// Discount code menu preceded by the outcome of the last step
#[must_use]
pub fn promo_menu_after(to: ChatId, outcome: &str) -> OutboundMessage {
    let mut text = String::from(outcome);
    if !text.is_empty() {
        text.push_str("\n\n");
    }
    text.push_str("🎁 <b>Управление промокодами</b>\nВыберите действие:");
    OutboundMessage::text(to, text).with_keyboard(promo_keyboard())
}

/// `CODE PERCENT` prompt
#[must_use]
pub fn promo_entry_prompt(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(
        to,
        "✍️ <b>Введите данные для нового промокода в формате:</b>\n\n<code>КОД ПРОЦЕНТ</code>\n\n\
         Например: <code>SALE15 15</code> (создаст промокод SALE15 со скидкой 15%).",
    )
    .with_keyboard(vec![admin("🔙 Назад в меню промокодов", AdminButton::Promos)])
}

/// Entry that does not match `CODE PERCENT`
#[must_use]
pub fn promo_format_invalid(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(
        to,
        "❌ Неверный формат. Пожалуйста, введите в формате <code>КОД ПРОЦЕНТ</code> (например, <code>SALE15 15</code>).",
    )
}

/// Percent outside 1..=99
#[must_use]
pub fn percent_out_of_range(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "❌ Процент скидки должен быть от 1 до 99.")
}

/// Duplicate code
#[must_use]
pub fn promo_exists(to: ChatId, code: &str) -> OutboundMessage {
    OutboundMessage::text(to, format!("❌ Промокод <code>{}</code> уже существует!", escape(code)))
}

/// Code insert failed for another reason
#[must_use]
pub fn promo_insert_failed(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "❌ Произошла ошибка при добавлении промокода в БД.")
}

/// Product membership screen for a new code
#[must_use]
pub fn link_products(to: ChatId, code: &DiscountCode, products: &[Product], linked: &[ProductId]) -> OutboundMessage {
    let text = format!(
        "✅ Промокод <code>{}</code> ({}) успешно создан. Выберите продукты, \
         к которым он будет применяться (нажмите, чтобы добавить/удалить). \
         Нажмите <b>Готово</b>, чтобы завершить.",
        escape(&code.code),
        code.percent
    );
    let mut keyboard: Keyboard = products
        .iter()
        .map(|p| {
            let marker = if linked.contains(&p.id) { "🟢" } else { "⚪" };
            admin(format!("{marker} {}", p.name), AdminButton::LinkProduct(p.id))
        })
        .collect();
    keyboard.push(admin("💾 Готово (Завершить привязку)", AdminButton::FinishLinking));
    OutboundMessage::text(to, text).with_keyboard(keyboard)
}

/// Linking finished
#[must_use]
pub fn linking_done(to: ChatId, code: &str) -> OutboundMessage {
    promo_menu_after(
        to,
        &format!("🎉 Привязка продуктов для промокода <code>{}</code> завершена!", escape(code)),
    )
}

/// No codes yet
#[must_use]
pub fn no_promos(to: ChatId) -> OutboundMessage {
    promo_menu_after(to, "📋 <b>Список промокодов</b>\nПромокоды не найдены.")
}

/// Code list, newest first, each button flipping the active flag
#[must_use]
pub fn promo_list(to: ChatId, codes: &[DiscountCode], notice: Option<&str>) -> OutboundMessage {
    let mut text = String::new();
    if let Some(notice) = notice {
        text.push_str(notice);
        text.push_str("\n\n");
    }
    text.push_str("📋 <b>Список промокодов</b>\nНажмите, чтобы изменить статус:");

    let mut keyboard: Keyboard = codes
        .iter()
        .map(|code| {
            let status = if code.active { "🟢 Активен" } else { "🔴 Неактивен" };
            admin(
                format!("{} ({}) — {status}", code.code, code.percent),
                AdminButton::TogglePromo {
                    id: code.id,
                    active: !code.active,
                },
            )
        })
        .collect();
    keyboard.push(admin("🔙 Назад", AdminButton::Promos));
    OutboundMessage::text(to, text).with_keyboard(keyboard)
}

/// Outcome line shown above the refreshed code list
#[must_use]
pub const fn toggle_notice(active: bool, changed: bool) -> &'static str {
    match (changed, active) {
        (false, _) => "❌ Ошибка при изменении статуса.",
        (true, true) => "Промокод активирован.",
        (true, false) => "Промокод деактивирован.",
    }
}

/// Nothing to issue
#[must_use]
pub fn no_products_to_issue(to: ChatId) -> OutboundMessage {
    main_menu_after(to, "❌ Нет доступных продуктов.")
}

/// Product choice for a manual ticket
#[must_use]
pub fn issue_products(to: ChatId, products: &[Product]) -> OutboundMessage {
    OutboundMessage::text(to, "🎫 <b>Ручная выдача</b>\nВыберите продукт для выдачи:")
        .with_keyboard(product_buttons(products, AdminButton::IssueProduct))
}

/// Holder name prompt
#[must_use]
pub fn issue_name_prompt(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "✍️ Введите <b>имя</b> покупателя (ФИО):")
}

/// Holder email prompt
#[must_use]
pub fn issue_email_prompt(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "📧 Введите <b>email</b> покупателя:")
}

/// Holder email without the expected shape
#[must_use]
pub fn issue_email_invalid(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(to, "❌ Введите корректный email адрес:")
}

/// Confirmation screen for a free ticket
#[must_use]
pub fn issue_confirmation(to: ChatId, product: &Product, name: &str, email: &str) -> OutboundMessage {
    let text = format!(
        "❓ <b>Подтвердите выдачу билета (БЕСПЛАТНО):</b>\n\n\
         <b>Продукт:</b> {} ({})\n<b>Имя:</b> {}\n<b>Email:</b> {}",
        escape(&product.name),
        product.price,
        escape(name),
        escape(email),
    );
    OutboundMessage::text(to, text).with_keyboard(vec![
        admin("✅ Подтвердить выдачу", AdminButton::ConfirmIssue),
        admin("❌ Отменить", AdminButton::MainMenu),
    ])
}

/// Text while the confirmation buttons are expected
#[must_use]
pub fn issue_reminder(to: ChatId) -> OutboundMessage {
    OutboundMessage::text(
        to,
        "Пожалуйста, нажмите <b>'✅ Подтвердить выдачу'</b> или <b>'❌ Отменить'</b>.",
    )
}

/// Free ticket issued
#[must_use]
pub fn free_ticket_issued(to: ChatId, name: &str) -> OutboundMessage {
    main_menu_after(to, &format!("🎉 <b>БЕСПЛАТНЫЙ</b> билет для {} выдан!", escape(name)))
}

/// Free ticket could not be stored
#[must_use]
pub fn free_ticket_failed(to: ChatId) -> OutboundMessage {
    main_menu_after(
        to,
        "❌ Произошла ошибка при регистрации билета в БД. Свяжитесь с поддержкой.",
    )
}
