use serde_json::Value;

/// Human-readable terminal-success tokens the provider has been observed to send in the `status` field.
const SUCCESS_TOKENS: [&str; 6] = ["SUCCESS", "SUCCEEDED", "APPROVED", "PAID", "COMPLETED", "OK"];

/// Status codes that mean success. The provider sends these in `status_code`, `response_code` or `result`,
/// depending on the API version.
const SUCCESS_CODES: [&str; 6] = ["0", "00", "000", "SUCCESS", "APPROVED", "OK"];

/// Decides whether a provider callback reports a successful payment. Both the textual status and the numeric
/// status-code fields must be checked; either one is sufficient.
pub fn is_provider_success(status_text: &str, payload: &Value) -> bool {
    let status = status_text.trim().to_uppercase();
    if SUCCESS_TOKENS.contains(&status.as_str()) {
        return true;
    }
    let code = ["status_code", "response_code", "result"]
        .iter()
        .find_map(|key| payload.get(*key))
        .map(json_field_to_string)
        .unwrap_or_default();
    let code = code.trim().to_uppercase();
    SUCCESS_CODES.contains(&code.as_str())
}

fn json_field_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn textual_success_tokens() {
        for token in ["SUCCESS", "success", "Approved", "PAID", "completed", "ok"] {
            assert!(is_provider_success(token, &json!({})), "{token} should be a success");
        }
    }

    #[test]
    fn numeric_status_codes() {
        assert!(is_provider_success("", &json!({"status_code": "00"})));
        assert!(is_provider_success("", &json!({"response_code": 0})));
        assert!(is_provider_success("", &json!({"result": "000"})));
    }

    #[test]
    fn failures_are_not_success() {
        assert!(!is_provider_success("FAILED", &json!({})));
        assert!(!is_provider_success("", &json!({})));
        assert!(!is_provider_success("", &json!({"status_code": "99"})));
        assert!(!is_provider_success("PENDING", &json!({"other": "1"})));
    }
}
