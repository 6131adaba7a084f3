use chrono::{NaiveDate, NaiveTime};
use sqlx::{QueryBuilder, Sqlite, Transaction};

use crate::db::Database;
use crate::error::{AppError, Result, TransactionStage, ValidationError};
use crate::models::{
    Attachment, Incidence, IncidenceDetail, IncidenceForm, IncidenceListResponse, IncidenceQuery,
    IncidenceStatus, IncidenceType, Modality, NewIncidence, SubmitIncidenceResponse, UploadedFile,
    MAX_REASON_CHARS,
};
use crate::services::UploadService;
use crate::storage::StorageProvider;

const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 100;

/// Incidence service
pub struct IncidenceService;

impl IncidenceService {
    /// Validate and normalize a submitted form. Checks run in a fixed
    /// order and the first failure is returned.
    pub fn validate(form: &IncidenceForm) -> std::result::Result<NewIncidence, ValidationError> {
        let id_usuario = leading_int(trimmed(&form.id_usuario)).unwrap_or(0);
        let tipo = trimmed(&form.tipo);
        let modalidad = trimmed(&form.modalidad);
        let inicio = trimmed(&form.inicio);
        let fin = trimmed(&form.fin);
        let h_inicio = trimmed(&form.h_inicio);
        let h_fin = trimmed(&form.h_fin);
        let motivo = trimmed(&form.motivo);
        let goce_sueldo = trimmed(&form.goce) == "con-goce";

        if id_usuario == 0
            || tipo.is_empty()
            || modalidad.is_empty()
            || inicio.is_empty()
            || motivo.is_empty()
        {
            return Err(ValidationError::MissingFields);
        }

        let tipo = IncidenceType::parse(tipo).ok_or(ValidationError::InvalidType)?;
        let modalidad = Modality::parse(modalidad).ok_or(ValidationError::InvalidModality)?;

        if motivo.chars().count() > MAX_REASON_CHARS {
            return Err(ValidationError::ReasonTooLong);
        }

        let fin = if fin.is_empty() { inicio } else { fin };

        let (hora_inicio, hora_fin) = match modalidad {
            Modality::PorDias => (None, None),
            Modality::PorHoras => {
                if h_inicio.is_empty() || h_fin.is_empty() {
                    return Err(ValidationError::MissingTimeRange);
                }
                (Some(parse_time(h_inicio)?), Some(parse_time(h_fin)?))
            }
        };

        Ok(NewIncidence {
            id_usuario,
            tipo,
            modalidad,
            fecha_inicio: parse_date(inicio)?,
            fecha_fin: parse_date(fin)?,
            hora_inicio,
            hora_fin,
            goce_sueldo,
            motivo: motivo.to_string(),
        })
    }

    /// Validate a submission and persist it with its attachments in one
    /// transaction. On any failure the uploaded files are removed from
    /// storage and nothing is left in the database.
    pub async fn submit(
        db: &Database,
        storage: &dyn StorageProvider,
        form: IncidenceForm,
        files: Vec<UploadedFile>,
    ) -> Result<SubmitIncidenceResponse> {
        let incidence = match Self::validate(&form) {
            Ok(incidence) => incidence,
            Err(e) => {
                tracing::debug!("Rejected incidence submission: {}", e);
                UploadService::discard(storage, &files).await;
                return Err(e.into());
            }
        };

        match Self::persist(db, &incidence, &files).await {
            Ok(response) => {
                tracing::info!(
                    "Created incidence {} for user {} with {} attachment(s)",
                    response.id_incidencia,
                    incidence.id_usuario,
                    response.saved_files
                );
                Ok(response)
            }
            Err(e) => {
                UploadService::discard(storage, &files).await;
                Err(e)
            }
        }
    }

    async fn persist(
        db: &Database,
        incidence: &NewIncidence,
        files: &[UploadedFile],
    ) -> Result<SubmitIncidenceResponse> {
        let mut tx = db
            .pool()
            .begin()
            .await
            .map_err(|e| AppError::transaction(TransactionStage::Begin, e))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO incidencias
                (id_usuario, tipo, modalidad, estatus, id_aprobador, comentario_resolucion,
                 fecha_inicio, fecha_fin, hora_inicio, hora_fin,
                 goce_sueldo, motivo, observaciones)
            VALUES
                (?, ?, ?, ?, NULL, NULL,
                 ?, ?, ?, ?,
                 ?, ?, NULL)
            "#,
        )
        .bind(incidence.id_usuario)
        .bind(incidence.tipo.as_str())
        .bind(incidence.modalidad.as_str())
        .bind(IncidenceStatus::Pendiente.as_str())
        .bind(incidence.fecha_inicio)
        .bind(incidence.fecha_fin)
        .bind(incidence.hora_inicio)
        .bind(incidence.hora_fin)
        .bind(incidence.goce_sueldo)
        .bind(&incidence.motivo)
        .execute(&mut *tx)
        .await;

        let id_incidencia = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(e) => {
                Self::rollback(tx).await;
                return Err(AppError::transaction(TransactionStage::InsertIncidence, e));
            }
        };

        let saved_files = if files.is_empty() {
            0
        } else {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO incidencia_adjuntos (id_incidencia, nombre_original, ruta, mime, tamano) ",
            );
            builder.push_values(files, |mut row, file| {
                row.push_bind(id_incidencia)
                    .push_bind(file.original_name.clone())
                    .push_bind(file.ruta.clone())
                    .push_bind(file.mime.clone())
                    .push_bind(file.size);
            });

            match builder.build().execute(&mut *tx).await {
                Ok(result) => result.rows_affected(),
                Err(e) => {
                    Self::rollback(tx).await;
                    return Err(AppError::transaction(TransactionStage::InsertAttachments, e));
                }
            }
        };

        // A failed commit drops the transaction, which rolls it back
        tx.commit()
            .await
            .map_err(|e| AppError::transaction(TransactionStage::Commit, e))?;

        Ok(SubmitIncidenceResponse {
            id_incidencia,
            estatus: IncidenceStatus::Pendiente,
            saved_files,
        })
    }

    async fn rollback(tx: Transaction<'_, Sqlite>) {
        if let Err(e) = tx.rollback().await {
            tracing::error!("Rollback failed: {:?}", e);
        }
    }

    /// Get an incidence and its attachments
    pub async fn get_incidence(db: &Database, id_incidencia: i64) -> Result<IncidenceDetail> {
        let incidencia: Incidence =
            sqlx::query_as("SELECT * FROM incidencias WHERE id_incidencia = ?")
                .bind(id_incidencia)
                .fetch_optional(db.pool())
                .await?
                .ok_or_else(|| AppError::NotFound("Incidencia no encontrada.".to_string()))?;

        let adjuntos: Vec<Attachment> = sqlx::query_as(
            "SELECT * FROM incidencia_adjuntos WHERE id_incidencia = ? ORDER BY id_adjunto",
        )
        .bind(id_incidencia)
        .fetch_all(db.pool())
        .await?;

        Ok(IncidenceDetail {
            incidencia,
            adjuntos,
        })
    }

    /// List a user's incidences, newest first
    pub async fn list_for_user(
        db: &Database,
        id_usuario: i64,
        query: &IncidenceQuery,
    ) -> Result<IncidenceListResponse> {
        let page = parse_positive(&query.page).unwrap_or(1).max(1);
        let per_page = parse_positive(&query.per_page)
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        let offset = (page - 1)
            .checked_mul(per_page)
            .ok_or_else(|| AppError::BadRequest("Página fuera de rango.".to_string()))?;

        let estatus = match trimmed(&query.estatus) {
            "" => None,
            s => Some(
                IncidenceStatus::parse(s)
                    .ok_or_else(|| AppError::BadRequest("Estatus no válido.".to_string()))?,
            ),
        };
        let desde = match trimmed(&query.desde) {
            "" => NaiveDate::from_ymd_opt(1970, 1, 1),
            s => Some(parse_date(s)?),
        };
        let hasta = match trimmed(&query.hasta) {
            "" => NaiveDate::from_ymd_opt(2100, 12, 31),
            s => Some(parse_date(s)?),
        };
        let estatus = estatus.map(|s| s.as_str());

        let items: Vec<Incidence> = sqlx::query_as(
            r#"
            SELECT * FROM incidencias
            WHERE id_usuario = ?
              AND (? IS NULL OR estatus = ?)
              AND fecha_inicio BETWEEN ? AND ?
            ORDER BY id_incidencia DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(id_usuario)
        .bind(estatus)
        .bind(estatus)
        .bind(desde)
        .bind(hasta)
        .bind(per_page)
        .bind(offset)
        .fetch_all(db.pool())
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM incidencias
            WHERE id_usuario = ?
              AND (? IS NULL OR estatus = ?)
              AND fecha_inicio BETWEEN ? AND ?
            "#,
        )
        .bind(id_usuario)
        .bind(estatus)
        .bind(estatus)
        .bind(desde)
        .bind(hasta)
        .fetch_one(db.pool())
        .await?;

        Ok(IncidenceListResponse {
            items,
            page,
            per_page,
            total,
        })
    }

    /// Number of incidences awaiting approval
    pub async fn count_pending(db: &Database) -> Result<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incidencias WHERE estatus = ?")
            .bind(IncidenceStatus::Pendiente.as_str())
            .fetch_one(db.pool())
            .await?;
        Ok(total)
    }
}

fn trimmed(value: &Option<String>) -> &str {
    value.as_deref().map(str::trim).unwrap_or("")
}

/// Integer from the leading sign and digits of `s`, ignoring whatever
/// follows them ("12abc" and "12.0" both give 12)
fn leading_int(s: &str) -> Option<i64> {
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let value: i64 = rest[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

fn parse_positive(value: &Option<String>) -> Option<i64> {
    trimmed(value).parse().ok()
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate)
}

fn parse_time(s: &str) -> std::result::Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| ValidationError::InvalidDate)
}
