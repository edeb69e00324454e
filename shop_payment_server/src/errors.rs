use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use shop_payment_engine::ReconciliationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient permissions. {0}")]
    InsufficientPermissions(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "detail": self.to_string() }).to_string())
    }
}

impl From<ReconciliationError> for ServerError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::Configuration(_) => Self::ConfigurationError(e.to_string()),
            ReconciliationError::EmptyOrder
            | ReconciliationError::TotalNotPositive
            | ReconciliationError::UnsupportedPaymentMethod(_)
            | ReconciliationError::InvalidAmount(_)
            | ReconciliationError::AmountMismatch { .. }
            | ReconciliationError::MissingField(_)
            | ReconciliationError::ProductNotFound(_) => Self::InvalidRequestBody(e.to_string()),
            ReconciliationError::OrderNotFound(_) | ReconciliationError::PaymentNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            ReconciliationError::Forbidden => Self::InsufficientPermissions(e.to_string()),
            ReconciliationError::DatabaseError(s) => Self::BackendError(s),
        }
    }
}
