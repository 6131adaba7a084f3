use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Rejections of a submitted incidence form. The display text is shown
/// to the end user as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Faltan datos requeridos.")]
    MissingFields,

    #[error("Tipo de incidencia no válido.")]
    InvalidType,

    #[error("Modalidad no válida.")]
    InvalidModality,

    #[error("Motivo supera 300 caracteres.")]
    ReasonTooLong,

    #[error("Indica hora inicio y fin para modalidad por horas.")]
    MissingTimeRange,

    #[error("Fecha u hora con formato no válido.")]
    InvalidDate,
}

/// Step of the submission transaction that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStage {
    Begin,
    InsertIncidence,
    InsertAttachments,
    Commit,
}

impl TransactionStage {
    pub fn message(&self) -> &'static str {
        match self {
            TransactionStage::Begin => "No se pudo iniciar la transacción.",
            TransactionStage::InsertIncidence => "Error al crear incidencia.",
            TransactionStage::InsertAttachments => {
                "No se pudo registrar adjuntos; operación revertida."
            }
            TransactionStage::Commit => "Error al confirmar transacción.",
        }
    }
}

impl std::fmt::Display for TransactionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransactionStage::Begin => "begin",
            TransactionStage::InsertIncidence => "insert incidence",
            TransactionStage::InsertAttachments => "insert attachments",
            TransactionStage::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transaction error at {stage}: {source}")]
    Transaction {
        stage: TransactionStage,
        #[source]
        source: sqlx::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn transaction(stage: TransactionStage, source: sqlx::Error) -> Self {
        AppError::Transaction { stage, source }
    }

    /// HTTP status and user-facing message
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::Transaction { stage, source } => {
                tracing::error!("Transaction failed at {}: {:?}", stage, source);
                (StatusCode::INTERNAL_SERVER_ERROR, stage.message().to_string())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Error de base de datos.".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Error interno.".to_string())
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Error de almacenamiento.".to_string())
            }
        }
    }
}

/// API response wrapper: `{ "ok": true, ...data }` or `{ "ok": false, "msg": ... }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            msg: None,
            data: Some(data),
        }
    }

    pub fn error(message: &str) -> ApiResponse<()> {
        ApiResponse {
            ok: false,
            msg: Some(message.to_string()),
            data: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        let body = Json(ApiResponse::<()>::error(&message));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
