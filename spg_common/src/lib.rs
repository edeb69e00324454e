mod money;

pub mod helpers;
pub mod op;
mod secret;

pub use money::{Money, MoneyError, USD_CURRENCY_CODE, USD_CURRENCY_CODE_LOWER};
pub use secret::Secret;
