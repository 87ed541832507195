//! Transition rules of the operator panel.

use super::{AdminAction, AdminEnvironment, AdminSession, ProductPurpose};
use crate::command::AdminButton;
use crate::issuance::artifact;
use crate::{messages, reply};
use boxoffice_core::effect::Effect;
use boxoffice_core::error::{DeskError, Result};
use boxoffice_core::ports::RecordStore;
use boxoffice_core::reducer::Reducer;
use boxoffice_core::types::{ChatId, DiscountCodeId, Money, Product, ProductId, TicketId};
use boxoffice_core::validation::{self, InputError};
use boxoffice_core::{SmallVec, async_effect, detached_effect, smallvec};
use std::sync::Arc;

type Effects = SmallVec<[Effect<AdminAction>; 4]>;

/// Operator panel reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminReducer;

// ============================================================================
// Store calls
// ============================================================================

async fn linking_screen(records: &dyn RecordStore, code: DiscountCodeId) -> Result<(Vec<Product>, Vec<ProductId>)> {
    let products = records.active_products().await?;
    let linked = records.discount_code_products(code).await?;
    Ok((products, linked))
}

/// Removes the link if present, adds it otherwise
async fn flip_link(records: &dyn RecordStore, code: DiscountCodeId, product: ProductId) -> Result<()> {
    let linked = records.discount_code_products(code).await?;
    if linked.contains(&product) {
        records.remove_discount_code_product(code, product).await
    } else {
        records.add_discount_code_product(code, product).await
    }
}

impl AdminReducer {
    fn lookup(env: &AdminEnvironment, chat: ChatId, id: TicketId) -> Effect<AdminAction> {
        let records = Arc::clone(&env.records);
        async_effect! {
            let result = records.find_ticket(id.clone()).await;
            Some(AdminAction::TicketLoaded { chat, id, result })
        }
    }

    fn load_products(env: &AdminEnvironment, chat: ChatId, purpose: ProductPurpose) -> Effect<AdminAction> {
        let records = Arc::clone(&env.records);
        async_effect! {
            let result = records.active_products().await;
            Some(AdminAction::ProductsLoaded { chat, purpose, result })
        }
    }

    fn load_product(env: &AdminEnvironment, chat: ChatId, purpose: ProductPurpose, id: ProductId) -> Effect<AdminAction> {
        let records = Arc::clone(&env.records);
        async_effect! {
            let result = records.product_by_id(id).await;
            Some(AdminAction::ProductLoaded { chat, purpose, result })
        }
    }

    fn load_linking(env: &AdminEnvironment, chat: ChatId, code: DiscountCodeId) -> Effect<AdminAction> {
        let records = Arc::clone(&env.records);
        async_effect! {
            let result = linking_screen(records.as_ref(), code).await;
            Some(AdminAction::LinkingLoaded { chat, result })
        }
    }

    fn load_codes(env: &AdminEnvironment, chat: ChatId) -> Effect<AdminAction> {
        let records = Arc::clone(&env.records);
        async_effect! {
            let result = records.list_discount_codes().await;
            Some(AdminAction::CodesLoaded { chat, notice: None, result })
        }
    }

    /// Sends the activated ticket to its holder without holding up the turn
    fn notify_holder(env: &AdminEnvironment, id: TicketId) -> Effect<AdminAction> {
        let records = Arc::clone(&env.records);
        let notifier = Arc::clone(&env.notifier);
        let qr = Arc::clone(&env.qr);
        detached_effect! {
            let ticket = match records.find_ticket(id.clone()).await {
                Ok(Some(ticket)) => ticket,
                Ok(None) => {
                    tracing::warn!(ticket = %id, "Activated ticket vanished before the holder notice");
                    return;
                },
                Err(error) => {
                    tracing::warn!(ticket = %id, %error, "Failed to re-read activated ticket");
                    return;
                },
            };
            let Some(to) = ticket.buyer_chat else {
                tracing::debug!(ticket = %id, "Holder chat unknown, no notice sent");
                return;
            };
            let png = qr
                .render_png(ticket.id.as_str())
                .map_err(|error| tracing::warn!(ticket = %id, %error, "QR rendering failed, sending text only"))
                .ok();
            if let Err(error) = notifier.deliver(artifact(to, png, messages::ticket_caption(&ticket))).await {
                tracing::error!(ticket = %id, chat = %to, %error, "Activation notice delivery failed");
            }
        }
    }

    /// Back to the main menu with the store apology
    fn failed(state: &mut AdminSession, env: &AdminEnvironment, chat: ChatId, error: &DeskError) -> Effects {
        tracing::error!(chat = %chat, step = state.step(), %error, "Operator step aborted by store failure");
        *state = AdminSession::Menu;
        smallvec![reply(&env.notifier, messages::menu_apology(chat))]
    }

    fn enter(state: &mut AdminSession, env: &AdminEnvironment, chat: ChatId) -> Effects {
        if chat != env.operator {
            tracing::warn!(chat = %chat, "Panel access denied");
            return smallvec![reply(&env.notifier, messages::access_denied(chat))];
        }
        *state = AdminSession::AwaitingPassword;
        smallvec![reply(&env.notifier, messages::password_prompt(chat))]
    }

    fn on_text(state: &mut AdminSession, env: &AdminEnvironment, chat: ChatId, text: &str) -> Effects {
        match state {
            AdminSession::AwaitingPassword => {
                if constant_time_eq::constant_time_eq(text.as_bytes(), env.password.as_bytes()) {
                    tracing::info!(chat = %chat, "Operator logged in");
                    *state = AdminSession::Menu;
                    smallvec![reply(&env.notifier, messages::logged_in(chat))]
                } else {
                    tracing::warn!(chat = %chat, "Wrong panel password");
                    smallvec![reply(&env.notifier, messages::wrong_password(chat))]
                }
            },
            AdminSession::CheckingTicket => match TicketId::from_input(text) {
                Some(id) => smallvec![Self::lookup(env, chat, id)],
                None => smallvec![reply(&env.notifier, messages::ticket_id_required(chat))],
            },
            AdminSession::EnteringPrice { product } => match Money::parse(text) {
                Ok(price) => {
                    let records = Arc::clone(&env.records);
                    let product_name = product.name.clone();
                    smallvec![async_effect! {
                        let result = records.update_product_price(product_name.clone(), price).await;
                        Some(AdminAction::PriceUpdated { chat, product_name, price, result })
                    }]
                },
                Err(_) => smallvec![reply(&env.notifier, messages::price_invalid(chat))],
            },
            AdminSession::EnteringPromo => match validation::discount_entry(text) {
                Ok(entry) => {
                    let records = Arc::clone(&env.records);
                    smallvec![async_effect! {
                        let result = records.insert_discount_code(entry.code.clone(), entry.percent).await;
                        Some(AdminAction::CodeCreated { chat, code: entry.code, result })
                    }]
                },
                Err(InputError::PercentOutOfRange) => {
                    smallvec![reply(&env.notifier, messages::percent_out_of_range(chat))]
                },
                Err(_) => smallvec![reply(&env.notifier, messages::promo_format_invalid(chat))],
            },
            AdminSession::EnteringIssueName { product } => {
                let name = text.trim();
                if name.is_empty() {
                    return smallvec![reply(&env.notifier, messages::issue_name_prompt(chat))];
                }
                *state = AdminSession::EnteringIssueEmail {
                    product: product.clone(),
                    name: name.to_owned(),
                };
                smallvec![reply(&env.notifier, messages::issue_email_prompt(chat))]
            },
            AdminSession::EnteringIssueEmail { product, name } => match validation::email(text) {
                Ok(email) => {
                    let confirmation = messages::issue_confirmation(chat, product, name, &email);
                    *state = AdminSession::ConfirmingIssue {
                        product: product.clone(),
                        name: name.clone(),
                        email,
                    };
                    smallvec![reply(&env.notifier, confirmation)]
                },
                Err(_) => smallvec![reply(&env.notifier, messages::issue_email_invalid(chat))],
            },
            AdminSession::ConfirmingIssue { .. } => smallvec![reply(&env.notifier, messages::issue_reminder(chat))],
            AdminSession::Idle => smallvec![reply(&env.notifier, messages::buy_hint(chat))],
            AdminSession::Menu
            | AdminSession::ChoosingPriceProduct
            | AdminSession::PromoMenu
            | AdminSession::LinkingPromoProducts { .. }
            | AdminSession::ListingPromos
            | AdminSession::ChoosingIssueProduct => smallvec![reply(&env.notifier, messages::use_buttons(chat))],
        }
    }

    fn on_scan(state: &AdminSession, env: &AdminEnvironment, chat: ChatId, payload: Option<String>) -> Effects {
        if *state != AdminSession::CheckingTicket {
            return smallvec![reply(&env.notifier, messages::use_buttons(chat))];
        }
        match payload.as_deref().and_then(TicketId::from_input) {
            Some(id) => smallvec![Self::lookup(env, chat, id)],
            None => smallvec![reply(&env.notifier, messages::qr_not_recognised(chat))],
        }
    }

    fn on_button(state: &mut AdminSession, env: &AdminEnvironment, chat: ChatId, button: AdminButton) -> Effects {
        if !state.is_logged_in() {
            return smallvec![reply(&env.notifier, messages::stale_button(chat))];
        }

        match button {
            AdminButton::MainMenu => {
                *state = AdminSession::Menu;
                smallvec![reply(&env.notifier, messages::main_menu(chat))]
            },
            AdminButton::Exit => {
                tracing::info!(chat = %chat, "Operator left the panel");
                *state = AdminSession::Idle;
                smallvec![reply(&env.notifier, messages::exited(chat))]
            },
            AdminButton::CheckTicket => {
                *state = AdminSession::CheckingTicket;
                smallvec![reply(&env.notifier, messages::check_prompt(chat))]
            },
            AdminButton::EditPrices => smallvec![Self::load_products(env, chat, ProductPurpose::Pricing)],
            AdminButton::IssueTicket => smallvec![Self::load_products(env, chat, ProductPurpose::Issuing)],
            AdminButton::Promos => {
                *state = AdminSession::PromoMenu;
                smallvec![reply(&env.notifier, messages::promo_menu(chat))]
            },
            AdminButton::AddPromo => {
                *state = AdminSession::EnteringPromo;
                smallvec![reply(&env.notifier, messages::promo_entry_prompt(chat))]
            },
            AdminButton::ListPromos => smallvec![Self::load_codes(env, chat)],

            AdminButton::Activate(id) if *state == AdminSession::CheckingTicket => {
                let records = Arc::clone(&env.records);
                smallvec![async_effect! {
                    let result = records.activate_ticket(id.clone()).await;
                    Some(AdminAction::Activated { chat, id, result })
                }]
            },
            AdminButton::EditPrice(product) if *state == AdminSession::ChoosingPriceProduct => {
                smallvec![Self::load_product(env, chat, ProductPurpose::Pricing, product)]
            },
            AdminButton::IssueProduct(product) if *state == AdminSession::ChoosingIssueProduct => {
                smallvec![Self::load_product(env, chat, ProductPurpose::Issuing, product)]
            },
            AdminButton::TogglePromo { id, active } if *state == AdminSession::ListingPromos => {
                let records = Arc::clone(&env.records);
                smallvec![async_effect! {
                    let changed = match records.set_discount_code_active(id, active).await {
                        Ok(changed) => changed,
                        Err(error) => {
                            tracing::error!(code = %id, %error, "Failed to flip discount code");
                            false
                        },
                    };
                    if changed {
                        tracing::info!(code = %id, active, "Discount code flipped");
                    }
                    let result = records.list_discount_codes().await;
                    Some(AdminAction::CodesLoaded {
                        chat,
                        notice: Some(messages::toggle_notice(active, changed)),
                        result,
                    })
                }]
            },
            AdminButton::LinkProduct(product) => {
                let AdminSession::LinkingPromoProducts { code } = state else {
                    return smallvec![reply(&env.notifier, messages::stale_button(chat))];
                };
                let records = Arc::clone(&env.records);
                let code = code.id;
                smallvec![async_effect! {
                    let result = match flip_link(records.as_ref(), code, product).await {
                        Ok(()) => linking_screen(records.as_ref(), code).await,
                        Err(error) => Err(error),
                    };
                    Some(AdminAction::LinkingLoaded { chat, result })
                }]
            },
            AdminButton::FinishLinking => {
                let AdminSession::LinkingPromoProducts { code } = state else {
                    return smallvec![reply(&env.notifier, messages::stale_button(chat))];
                };
                let done = messages::linking_done(chat, &code.code);
                *state = AdminSession::PromoMenu;
                smallvec![reply(&env.notifier, done)]
            },
            AdminButton::ConfirmIssue if matches!(state, AdminSession::ConfirmingIssue { .. }) => {
                let AdminSession::ConfirmingIssue { product, name, email } = std::mem::replace(state, AdminSession::Menu)
                else {
                    return SmallVec::new();
                };
                let request = env.free_ticket(&product, name.clone(), email);
                let issuer = env.issuer.clone();
                let notifier = Arc::clone(&env.notifier);
                // Uploads can outlast the effect timeout, so the whole issuance runs detached
                smallvec![detached_effect! {
                    let outcome = match issuer.issue(request).await {
                        Ok(ticket) => {
                            tracing::info!(chat = %chat, ticket = %ticket.id, product = %ticket.product_name, "Free ticket issued");
                            messages::free_ticket_issued(chat, &name)
                        },
                        Err(error) => {
                            tracing::error!(chat = %chat, %error, "Free ticket issuance failed");
                            messages::free_ticket_failed(chat)
                        },
                    };
                    if let Err(error) = notifier.deliver(outcome).await {
                        tracing::error!(chat = %chat, %error, "Reply delivery failed");
                    }
                }]
            },
            _ => smallvec![reply(&env.notifier, messages::stale_button(chat))],
        }
    }
}

impl Reducer for AdminReducer {
    type State = AdminSession;
    type Action = AdminAction;
    type Environment = AdminEnvironment;

    #[allow(clippy::too_many_lines)]
    fn reduce(&self, state: &mut AdminSession, action: AdminAction, env: &AdminEnvironment) -> Effects {
        match action {
            AdminAction::Enter { chat } => Self::enter(state, env, chat),

            AdminAction::Text { chat, text } => Self::on_text(state, env, chat, &text),

            AdminAction::Scan { chat, payload } => Self::on_scan(state, env, chat, payload),

            AdminAction::Pressed { chat, button } => Self::on_button(state, env, chat, button),

            AdminAction::Cancel { chat } => {
                tracing::debug!(chat = %chat, step = state.step(), "Panel session cancelled");
                *state = AdminSession::Idle;
                SmallVec::new()
            },

            AdminAction::TicketLoaded { chat, id, result } => match result {
                Ok(Some(ticket)) => smallvec![reply(&env.notifier, messages::ticket_status(chat, &ticket))],
                Ok(None) => smallvec![reply(&env.notifier, messages::ticket_not_found(chat, &id))],
                Err(error) => Self::failed(state, env, chat, &error),
            },

            AdminAction::Activated { chat, id, result } => match result {
                Ok(true) => {
                    tracing::info!(chat = %chat, ticket = %id, "Ticket activated");
                    *state = AdminSession::Menu;
                    smallvec![
                        reply(&env.notifier, messages::activated(chat, &id)),
                        Self::notify_holder(env, id),
                    ]
                },
                Ok(false) => {
                    tracing::warn!(chat = %chat, ticket = %id, "Ticket was not activated");
                    *state = AdminSession::Menu;
                    smallvec![reply(&env.notifier, messages::activation_failed(chat, &id))]
                },
                Err(error) => Self::failed(state, env, chat, &error),
            },

            AdminAction::ProductsLoaded { chat, purpose, result } => match (purpose, result) {
                (ProductPurpose::Pricing, Ok(products)) if products.is_empty() => {
                    *state = AdminSession::Menu;
                    smallvec![reply(&env.notifier, messages::no_products_to_edit(chat))]
                },
                (ProductPurpose::Issuing, Ok(products)) if products.is_empty() => {
                    *state = AdminSession::Menu;
                    smallvec![reply(&env.notifier, messages::no_products_to_issue(chat))]
                },
                (ProductPurpose::Pricing, Ok(products)) => {
                    *state = AdminSession::ChoosingPriceProduct;
                    smallvec![reply(&env.notifier, messages::price_products(chat, &products))]
                },
                (ProductPurpose::Issuing, Ok(products)) => {
                    *state = AdminSession::ChoosingIssueProduct;
                    smallvec![reply(&env.notifier, messages::issue_products(chat, &products))]
                },
                (_, Err(error)) => Self::failed(state, env, chat, &error),
            },

            AdminAction::ProductLoaded { chat, purpose, result } => match result {
                Ok(Some(product)) => {
                    let prompt = match purpose {
                        ProductPurpose::Pricing => messages::price_prompt(chat, &product),
                        ProductPurpose::Issuing => messages::issue_name_prompt(chat),
                    };
                    *state = match purpose {
                        ProductPurpose::Pricing => AdminSession::EnteringPrice { product },
                        ProductPurpose::Issuing => AdminSession::EnteringIssueName { product },
                    };
                    smallvec![reply(&env.notifier, prompt)]
                },
                Ok(None) => {
                    *state = AdminSession::Menu;
                    smallvec![reply(&env.notifier, messages::product_not_found(chat))]
                },
                Err(error) => Self::failed(state, env, chat, &error),
            },

            AdminAction::PriceUpdated {
                chat,
                product_name,
                price,
                result,
            } => match result {
                Ok(true) => {
                    tracing::info!(chat = %chat, product = %product_name, price = price.amount(), "Price updated");
                    *state = AdminSession::Menu;
                    smallvec![reply(&env.notifier, messages::price_updated(chat, &product_name, price))]
                },
                Ok(false) => {
                    tracing::warn!(chat = %chat, product = %product_name, "Price update matched no product");
                    *state = AdminSession::Menu;
                    smallvec![reply(&env.notifier, messages::price_update_failed(chat))]
                },
                Err(error) => Self::failed(state, env, chat, &error),
            },

            AdminAction::CodeCreated { chat, code, result } => match result {
                Ok(created) => {
                    tracing::info!(chat = %chat, code = %created.code, percent = created.percent.get(), "Discount code created");
                    let load = Self::load_linking(env, chat, created.id);
                    *state = AdminSession::LinkingPromoProducts { code: created };
                    smallvec![load]
                },
                Err(DeskError::AlreadyExists(_)) => smallvec![reply(&env.notifier, messages::promo_exists(chat, &code))],
                Err(error) => {
                    tracing::error!(chat = %chat, code = %code, %error, "Failed to create discount code");
                    smallvec![reply(&env.notifier, messages::promo_insert_failed(chat))]
                },
            },

            AdminAction::LinkingLoaded { chat, result } => {
                let AdminSession::LinkingPromoProducts { code } = state else {
                    return SmallVec::new();
                };
                match result {
                    Ok((products, linked)) => {
                        smallvec![reply(&env.notifier, messages::link_products(chat, code, &products, &linked))]
                    },
                    Err(error) => Self::failed(state, env, chat, &error),
                }
            },

            AdminAction::CodesLoaded { chat, notice, result } => match result {
                Ok(codes) if codes.is_empty() => {
                    *state = AdminSession::PromoMenu;
                    smallvec![reply(&env.notifier, messages::no_promos(chat))]
                },
                Ok(codes) => {
                    *state = AdminSession::ListingPromos;
                    smallvec![reply(&env.notifier, messages::promo_list(chat, &codes, notice))]
                },
                Err(error) => Self::failed(state, env, chat, &error),
            },
        }
    }
}
