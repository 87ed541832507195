//! Declarative macros for ergonomic effect construction
//!
//! Reducers build most of their effects from an `async move` block that calls
//! a collaborator and maps the outcome to a follow-up action. These macros
//! remove the `Box::pin` noise from that pattern.

/// Create an `Effect::Future` from an async block yielding `Option<Action>`
///
/// # Example
///
/// ```rust,ignore
/// use boxoffice_core::async_effect;
///
/// let records = Arc::clone(&env.records);
/// async_effect! {
///     let result = records.active_products().await;
///     Some(BuyerAction::ProductsLoaded { result })
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(::std::boxed::Box::pin(async move { $($body)* }))
    };
}

/// Create an `Effect::Detached` from an async block yielding `()`
///
/// # Example
///
/// ```rust,ignore
/// use boxoffice_core::detached_effect;
///
/// detached_effect! {
///     if let Err(error) = notifier.deliver(message).await {
///         tracing::warn!(%error, "Buyer notification failed");
///     }
/// }
/// ```
#[macro_export]
macro_rules! detached_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Detached(::std::boxed::Box::pin(async move { $($body)* }))
    };
}

#[cfg(test)]
mod tests {
    use crate::effect::Effect;

    #[test]
    fn async_effect_builds_future_variant() {
        let value = 7_u32;
        let effect: Effect<u32> = async_effect! { Some(value) };
        assert!(matches!(effect, Effect::Future(_)));
    }

    #[test]
    fn detached_effect_builds_detached_variant() {
        let effect: Effect<u32> = detached_effect! {};
        assert!(matches!(effect, Effect::Detached(_)));
    }
}
