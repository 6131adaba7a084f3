use axum::{
    extract::{Multipart, Path, Query, State},
    Extension, Json,
};
use bytes::BytesMut;

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{
    CurrentUser, IncidenceDetail, IncidenceForm, IncidenceListResponse, IncidenceQuery,
    PendingCountResponse, SubmitIncidenceResponse, UploadedFile,
};
use crate::services::{IncidenceService, UploadService};
use crate::AppState;

/// Multipart field carrying attachments
const FILES_FIELD: &str = "files";

/// Submit an incidence with attachments
/// POST /incidencias
pub async fn create_incidence(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<SubmitIncidenceResponse>>> {
    let mut files = Vec::new();

    let form = match read_submission(&state, &mut multipart, &mut files).await {
        Ok(form) => form,
        Err(e) => {
            UploadService::discard(state.storage.as_ref(), &files).await;
            return Err(e);
        }
    };

    let response =
        IncidenceService::submit(&state.db, state.storage.as_ref(), form, files).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Read text fields into the form and write each file part to upload
/// storage, enforcing the count and size limits. Files saved before an
/// error are left in `files` for the caller to discard.
async fn read_submission(
    state: &AppState,
    multipart: &mut Multipart,
    files: &mut Vec<UploadedFile>,
) -> Result<IncidenceForm> {
    let limits = &state.config.upload;
    let mut form = IncidenceForm::default();

    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(format!("No se pudo procesar el formulario: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();

        if name != FILES_FIELD {
            if field.file_name().is_some() {
                continue;
            }
            let text = field.text().await.map_err(|e| {
                AppError::BadRequest(format!("No se pudo leer el campo {}: {}", name, e))
            })?;
            form.set_field(&name, text);
            continue;
        }

        // Empty <input type="file"> parts have no name and no content
        let original_name = field.file_name().unwrap_or("").to_string();
        if original_name.is_empty() {
            continue;
        }

        if files.len() >= limits.max_files {
            return Err(AppError::BadRequest("Demasiados archivos.".to_string()));
        }

        let content_type = field.content_type().map(|s| s.to_string());

        let mut data = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| {
            AppError::BadRequest(format!("No se pudo leer el archivo: {}", e))
        })? {
            if data.len() + chunk.len() > limits.max_file_size {
                return Err(AppError::BadRequest(
                    "Archivo supera el tamaño máximo.".to_string(),
                ));
            }
            data.extend_from_slice(&chunk);
        }

        let file = UploadService::store(
            state.storage.as_ref(),
            &original_name,
            content_type,
            data.freeze(),
        )
        .await?;
        files.push(file);
    }

    Ok(form)
}

/// List the current user's incidences
/// GET /incidencias?estatus=&desde=&hasta=&page=&perPage=
pub async fn list_incidences(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<IncidenceQuery>,
) -> Result<Json<ApiResponse<IncidenceListResponse>>> {
    let page = IncidenceService::list_for_user(&state.db, current_user.id_usuario, &query).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// Get an incidence with its attachments
/// GET /incidencias/:id
pub async fn get_incidence(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<IncidenceDetail>>> {
    let detail = IncidenceService::get_incidence(&state.db, id).await?;

    // Check ownership
    if detail.incidencia.id_usuario != current_user.id_usuario {
        return Err(AppError::Forbidden("Acceso denegado.".to_string()));
    }

    Ok(Json(ApiResponse::success(detail)))
}

/// Count incidences awaiting approval
/// GET /incidencias/pendientes
pub async fn count_pending(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PendingCountResponse>>> {
    let total = IncidenceService::count_pending(&state.db).await?;
    Ok(Json(ApiResponse::success(PendingCountResponse { total })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::Database;
    use crate::storage::LocalStorage;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";
    const BOUNDARY: &str = "----incidencias-test-boundary";

    struct TestApp {
        router: Router,
        db: Database,
        upload_dir: TempDir,
    }

    impl TestApp {
        async fn new(max_files: usize, max_file_size: usize) -> Self {
            let db = Database::in_memory().await.unwrap();
            db.run_migrations().await.unwrap();
            for name in ["Ana", "Luis"] {
                sqlx::query("INSERT INTO usuarios (nombre) VALUES (?)")
                    .bind(name)
                    .execute(db.pool())
                    .await
                    .unwrap();
            }

            let upload_dir = tempfile::tempdir().unwrap();
            let mut config = Config::default();
            config.jwt.secret = SECRET.to_string();
            config.upload.dir = upload_dir.path().display().to_string();
            config.upload.max_files = max_files;
            config.upload.max_file_size = max_file_size;

            let state = AppState {
                db: db.clone(),
                storage: Arc::new(LocalStorage::new(upload_dir.path())),
                config: Arc::new(config),
            };

            Self {
                router: crate::create_router(state),
                db,
                upload_dir,
            }
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }

        fn stored_files(&self) -> usize {
            std::fs::read_dir(self.upload_dir.path()).unwrap().count()
        }

        async fn incidence_count(&self) -> i64 {
            sqlx::query_scalar("SELECT COUNT(*) FROM incidencias")
                .fetch_one(self.db.pool())
                .await
                .unwrap()
        }
    }

    fn token(id_usuario: i64) -> String {
        encode(
            &Header::default(),
            &json!({ "id_usuario": id_usuario, "exp": chrono::Utc::now().timestamp() + 600 }),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        for (file_name, data) in files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n",
                    BOUNDARY, file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(data.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn submit(fields: &[(&str, &str)], files: &[(&str, &str)]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/incidencias")
            .header(header::AUTHORIZATION, format!("Bearer {}", token(1)))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(fields, files)))
            .unwrap()
    }

    fn get(uri: &str, id_usuario: i64) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token(id_usuario)))
            .body(Body::empty())
            .unwrap()
    }

    const POR_HORAS: &[(&str, &str)] = &[
        ("id_usuario", "1"),
        ("tipo", "retardo"),
        ("modalidad", "por-horas"),
        ("inicio", "2024-02-01"),
        ("hInicio", "08:00"),
        ("hFin", "09:30"),
        ("motivo", "Traffic"),
    ];

    #[tokio::test]
    async fn test_submit_with_files() {
        let app = TestApp::new(10, 1024).await;

        let (status, body) = app
            .send(submit(POR_HORAS, &[("nota.pdf", "one"), ("otra nota.pdf", "two")]))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["estatus"], "Pendiente");
        assert_eq!(body["saved_files"], 2);
        assert!(body["id_incidencia"].as_i64().unwrap() > 0);
        assert_eq!(app.stored_files(), 2);

        let id = body["id_incidencia"].as_i64().unwrap();
        let (status, detail) = app.send(get(&format!("/incidencias/{}", id), 1)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["incidencia"]["hora_inicio"], "08:00:00");
        assert_eq!(detail["adjuntos"][1]["nombre_original"], "otra nota.pdf");
        assert!(detail["adjuntos"][1]["ruta"]
            .as_str()
            .unwrap()
            .starts_with("uploads/"));
    }

    #[tokio::test]
    async fn test_missing_time_range_is_bad_request() {
        let app = TestApp::new(10, 1024).await;
        let fields: Vec<_> = POR_HORAS.iter().copied().filter(|(k, _)| *k != "hInicio").collect();

        let (status, body) = app.send(submit(&fields, &[("nota.pdf", "one")])).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert!(body["msg"].as_str().unwrap().starts_with("Indica hora inicio y fin"));
        assert_eq!(app.stored_files(), 0);
        assert_eq!(app.incidence_count().await, 0);
    }

    #[tokio::test]
    async fn test_reason_too_long() {
        let app = TestApp::new(10, 1024).await;
        let motivo = "m".repeat(301);
        let fields: Vec<_> = POR_HORAS
            .iter()
            .map(|(k, v)| if *k == "motivo" { (*k, motivo.as_str()) } else { (*k, *v) })
            .collect();

        let (status, body) = app.send(submit(&fields, &[])).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "ok": false, "msg": "Motivo supera 300 caracteres." }));
        assert_eq!(app.incidence_count().await, 0);
    }

    #[tokio::test]
    async fn test_attachment_failure_is_server_error() {
        let app = TestApp::new(10, 1024).await;
        sqlx::query(
            "CREATE TRIGGER fail_adjuntos BEFORE INSERT ON incidencia_adjuntos
             BEGIN SELECT RAISE(ABORT, 'simulated attachment failure'); END",
        )
        .execute(app.db.pool())
        .await
        .unwrap();

        let (status, body) = app.send(submit(POR_HORAS, &[("nota.pdf", "one")])).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["msg"], "No se pudo registrar adjuntos; operación revertida.");
        assert_eq!(app.incidence_count().await, 0);
        assert_eq!(app.stored_files(), 0);
    }

    #[tokio::test]
    async fn test_too_many_files() {
        let app = TestApp::new(2, 1024).await;

        let (status, body) = app
            .send(submit(POR_HORAS, &[("a.pdf", "a"), ("b.pdf", "b"), ("c.pdf", "c")]))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "Demasiados archivos.");
        assert_eq!(app.stored_files(), 0);
        assert_eq!(app.incidence_count().await, 0);
    }

    #[tokio::test]
    async fn test_file_too_large() {
        let app = TestApp::new(10, 4).await;

        let (status, body) = app
            .send(submit(POR_HORAS, &[("ok.pdf", "1234"), ("big.pdf", "12345")]))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "Archivo supera el tamaño máximo.");
        assert_eq!(app.stored_files(), 0);
    }

    #[tokio::test]
    async fn test_requires_token() {
        let app = TestApp::new(10, 1024).await;
        let request = Request::builder()
            .uri("/incidencias/pendientes")
            .body(Body::empty())
            .unwrap();

        let (status, body) = app.send(request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["msg"], "No autenticado (falta token)");
    }

    #[tokio::test]
    async fn test_token_cookie_accepted() {
        let app = TestApp::new(10, 1024).await;
        let request = Request::builder()
            .uri("/incidencias/pendientes")
            .header(header::COOKIE, format!("token={}", token(2)))
            .body(Body::empty())
            .unwrap();

        let (status, body) = app.send(request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "total": 0 }));
    }

    #[tokio::test]
    async fn test_other_users_incidence_is_forbidden() {
        let app = TestApp::new(10, 1024).await;
        let (_, created) = app.send(submit(POR_HORAS, &[])).await;
        let id = created["id_incidencia"].as_i64().unwrap();

        let (status, _) = app.send(get(&format!("/incidencias/{}", id), 2)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app.send(get("/incidencias/9999", 1)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_own_incidences() {
        let app = TestApp::new(10, 1024).await;
        app.send(submit(POR_HORAS, &[])).await;
        app.send(submit(POR_HORAS, &[])).await;

        let (status, body) = app.send(get("/incidencias?perPage=1", 1)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["per_page"], 1);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);

        let (_, body) = app.send(get("/incidencias", 2)).await;
        assert_eq!(body["total"], 0);

        let (_, body) = app.send(get("/incidencias/pendientes", 2)).await;
        assert_eq!(body["total"], 2);
    }
}
