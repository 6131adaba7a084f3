use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Longest accepted `motivo`, in characters
pub const MAX_REASON_CHARS: usize = 300;

/// Kind of attendance exception
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidenceType {
    Retardo,
    Falta,
    SalidaAnticipada,
    SinRegistro,
    Otro,
}

impl IncidenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidenceType::Retardo => "retardo",
            IncidenceType::Falta => "falta",
            IncidenceType::SalidaAnticipada => "salida_anticipada",
            IncidenceType::SinRegistro => "sin_registro",
            IncidenceType::Otro => "otro",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "retardo" => Some(IncidenceType::Retardo),
            "falta" => Some(IncidenceType::Falta),
            "salida_anticipada" => Some(IncidenceType::SalidaAnticipada),
            "sin_registro" => Some(IncidenceType::SinRegistro),
            "otro" => Some(IncidenceType::Otro),
            _ => None,
        }
    }
}

/// Whether an incidence covers whole days or a time range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Modality {
    PorDias,
    PorHoras,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::PorDias => "por-dias",
            Modality::PorHoras => "por-horas",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "por-dias" => Some(Modality::PorDias),
            "por-horas" => Some(Modality::PorHoras),
            _ => None,
        }
    }
}

/// Approval status. New incidences always start as `Pendiente`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncidenceStatus {
    Pendiente,
    Aprobado,
    Rechazado,
    Cancelado,
}

impl IncidenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidenceStatus::Pendiente => "Pendiente",
            IncidenceStatus::Aprobado => "Aprobado",
            IncidenceStatus::Rechazado => "Rechazado",
            IncidenceStatus::Cancelado => "Cancelado",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pendiente" => Some(IncidenceStatus::Pendiente),
            "Aprobado" => Some(IncidenceStatus::Aprobado),
            "Rechazado" => Some(IncidenceStatus::Rechazado),
            "Cancelado" => Some(IncidenceStatus::Cancelado),
            _ => None,
        }
    }
}

/// Incidence row
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Incidence {
    pub id_incidencia: i64,
    pub id_usuario: i64,
    pub tipo: String,
    pub modalidad: String,
    pub estatus: String,
    pub id_aprobador: Option<i64>,
    pub comentario_resolucion: Option<String>,
    pub fecha_inicio: NaiveDate,
    pub fecha_fin: NaiveDate,
    pub hora_inicio: Option<NaiveTime>,
    pub hora_fin: Option<NaiveTime>,
    pub goce_sueldo: bool,
    pub motivo: String,
    pub observaciones: Option<String>,
    pub created_at: String,
}

/// Attachment row
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Attachment {
    pub id_adjunto: i64,
    pub id_incidencia: i64,
    pub nombre_original: String,
    pub ruta: String,
    pub mime: Option<String>,
    pub tamano: Option<i64>,
    pub created_at: String,
}

/// Raw text fields of `POST /incidencias`, before validation
#[derive(Debug, Clone, Default)]
pub struct IncidenceForm {
    pub id_usuario: Option<String>,
    pub tipo: Option<String>,
    pub modalidad: Option<String>,
    pub inicio: Option<String>,
    pub fin: Option<String>,
    pub h_inicio: Option<String>,
    pub h_fin: Option<String>,
    pub goce: Option<String>,
    pub motivo: Option<String>,
}

impl IncidenceForm {
    /// Store a text part by its form field name. Unknown names are ignored.
    pub fn set_field(&mut self, name: &str, value: String) {
        let slot = match name {
            "id_usuario" => &mut self.id_usuario,
            "tipo" => &mut self.tipo,
            "modalidad" => &mut self.modalidad,
            "inicio" => &mut self.inicio,
            "fin" => &mut self.fin,
            "hInicio" => &mut self.h_inicio,
            "hFin" => &mut self.h_fin,
            "goce" => &mut self.goce,
            "motivo" => &mut self.motivo,
            _ => return,
        };
        *slot = Some(value);
    }
}

/// Validated and normalized incidence, ready to insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIncidence {
    pub id_usuario: i64,
    pub tipo: IncidenceType,
    pub modalidad: Modality,
    pub fecha_inicio: NaiveDate,
    pub fecha_fin: NaiveDate,
    pub hora_inicio: Option<NaiveTime>,
    pub hora_fin: Option<NaiveTime>,
    pub goce_sueldo: bool,
    pub motivo: String,
}

/// A file already written to upload storage for the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Client-supplied name, untrusted
    pub original_name: String,
    /// Key inside the upload storage
    pub storage_key: String,
    /// Server-relative path persisted in `incidencia_adjuntos.ruta`
    pub ruta: String,
    pub mime: Option<String>,
    pub size: Option<i64>,
}

/// Successful submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmitIncidenceResponse {
    pub id_incidencia: i64,
    pub estatus: IncidenceStatus,
    pub saved_files: u64,
}

/// Incidence with its attachments
#[derive(Debug, Serialize)]
pub struct IncidenceDetail {
    pub incidencia: Incidence,
    pub adjuntos: Vec<Attachment>,
}

/// Query parameters of `GET /incidencias`
#[derive(Debug, Default, Deserialize)]
pub struct IncidenceQuery {
    pub estatus: Option<String>,
    pub desde: Option<String>,
    pub hasta: Option<String>,
    pub page: Option<String>,
    #[serde(rename = "perPage")]
    pub per_page: Option<String>,
}

/// Page of the current user's incidences
#[derive(Debug, Serialize)]
pub struct IncidenceListResponse {
    pub items: Vec<Incidence>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

/// Count of incidences awaiting approval
#[derive(Debug, Serialize)]
pub struct PendingCountResponse {
    pub total: i64,
}
