mod checkout_signature;
mod method_aliases;
mod provider_status;
mod query_string;

pub use checkout_signature::{sign_checkout_fields, signature_base_string, verify_signature, SignatureError};
pub use method_aliases::MethodAliases;
pub use provider_status::is_provider_success;
pub use query_string::encode_query;
