use std::collections::HashMap;

use crate::db_types::PaymentMethod;

/// Maps the aliases that storefront clients send for a payment method onto the canonical enum.
///
/// The table is policy, not code: the default below is the set of aliases observed in the wild, but deployments can
/// supply their own. Unknown aliases are rejected (the caller reports an unsupported payment method) rather than
/// silently dropped.
#[derive(Debug, Clone)]
pub struct MethodAliases {
    map: HashMap<String, PaymentMethod>,
}

impl Default for MethodAliases {
    fn default() -> Self {
        use PaymentMethod::*;
        let entries = [
            ("COD", CashOnDelivery),
            ("CASH_ON_DELIVERY", CashOnDelivery),
            ("ABA", AbaQr),
            ("ABA_QR", AbaQr),
            ("QR", AbaQr),
            ("KHQR", AbaQr),
            ("AC", AcQr),
            ("AC_QR", AcQr),
            ("ABA_PAYWAY", AbaPayway),
        ];
        let map = entries.into_iter().map(|(alias, method)| (alias.to_string(), method)).collect();
        Self { map }
    }
}

impl MethodAliases {
    pub fn new(map: HashMap<String, PaymentMethod>) -> Self {
        let map = map.into_iter().map(|(k, v)| (k.trim().to_uppercase(), v)).collect();
        Self { map }
    }

    /// Resolves a client-supplied method string, case-insensitively. `None` means the alias is not recognised.
    pub fn normalize(&self, raw: &str) -> Option<PaymentMethod> {
        let key = raw.trim().to_uppercase();
        if key.is_empty() {
            return None;
        }
        self.map.get(&key).copied()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_table_covers_observed_aliases() {
        let aliases = MethodAliases::default();
        assert_eq!(aliases.normalize("KHQR"), Some(PaymentMethod::AbaQr));
        assert_eq!(aliases.normalize("qr"), Some(PaymentMethod::AbaQr));
        assert_eq!(aliases.normalize("aba"), Some(PaymentMethod::AbaQr));
        assert_eq!(aliases.normalize("cash_on_delivery"), Some(PaymentMethod::CashOnDelivery));
        assert_eq!(aliases.normalize(" AC "), Some(PaymentMethod::AcQr));
        assert_eq!(aliases.normalize("ABA_PAYWAY"), Some(PaymentMethod::AbaPayway));
    }

    #[test]
    fn unknown_aliases_are_rejected() {
        let aliases = MethodAliases::default();
        assert_eq!(aliases.normalize("PAYPAL"), None);
        assert_eq!(aliases.normalize(""), None);
    }
}
