use actix_web::HttpRequest;

use crate::{config::ReceiptConfig, data_objects::ReceiptFile, errors::ServerError};

/// Whether the request arrived over HTTPS (directly or as reported by a trusted reverse proxy via
/// `X-Forwarded-Proto`/`Forwarded`, which actix folds into the connection info).
pub fn is_secure_delivery(req: &HttpRequest) -> bool {
    req.connection_info().scheme().eq_ignore_ascii_case("https")
}

/// Validates a receipt upload before it is attached to a payment: the file must be present, within the size
/// limit, and carry an allowed extension. Content types are unreliable across clients, so the extension check is
/// the primary gate.
pub fn validate_receipt_upload(file: &ReceiptFile, config: &ReceiptConfig) -> Result<(), ServerError> {
    if file.reference.is_empty() {
        return Err(ServerError::InvalidRequestBody("Receipt file is required.".into()));
    }
    if file.size_bytes > config.max_bytes() {
        return Err(ServerError::InvalidRequestBody(format!(
            "File too large. Max size is {} MB.",
            config.max_megabytes
        )));
    }
    let extension = file.name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase()).unwrap_or_default();
    if !config.allowed_extensions.contains(&extension) {
        return Err(ServerError::InvalidRequestBody("Unsupported file type. Use jpg, png, or pdf.".into()));
    }
    Ok(())
}
