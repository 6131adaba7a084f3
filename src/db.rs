use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::error::Result;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Private in-memory database. A single connection, since every
    /// connection to `:memory:` opens its own empty database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usuarios (
                id_usuario INTEGER PRIMARY KEY AUTOINCREMENT,
                nombre TEXT NOT NULL,
                correo TEXT UNIQUE,
                activo INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS incidencias (
                id_incidencia INTEGER PRIMARY KEY AUTOINCREMENT,
                id_usuario INTEGER NOT NULL,
                tipo TEXT NOT NULL
                    CHECK (tipo IN ('retardo', 'falta', 'salida_anticipada', 'sin_registro', 'otro')),
                modalidad TEXT NOT NULL
                    CHECK (modalidad IN ('por-dias', 'por-horas')),
                estatus TEXT NOT NULL DEFAULT 'Pendiente'
                    CHECK (estatus IN ('Pendiente', 'Aprobado', 'Rechazado', 'Cancelado')),
                id_aprobador INTEGER,
                comentario_resolucion TEXT,
                fecha_inicio TEXT NOT NULL,
                fecha_fin TEXT NOT NULL,
                hora_inicio TEXT,
                hora_fin TEXT,
                goce_sueldo INTEGER NOT NULL DEFAULT 0,
                motivo TEXT NOT NULL,
                observaciones TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                CHECK (
                    (modalidad = 'por-horas' AND hora_inicio IS NOT NULL AND hora_fin IS NOT NULL)
                    OR (modalidad = 'por-dias' AND hora_inicio IS NULL AND hora_fin IS NULL)
                ),
                FOREIGN KEY (id_usuario) REFERENCES usuarios(id_usuario),
                FOREIGN KEY (id_aprobador) REFERENCES usuarios(id_usuario)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS incidencia_adjuntos (
                id_adjunto INTEGER PRIMARY KEY AUTOINCREMENT,
                id_incidencia INTEGER NOT NULL,
                nombre_original TEXT NOT NULL,
                ruta TEXT NOT NULL,
                mime TEXT,
                tamano INTEGER,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                FOREIGN KEY (id_incidencia) REFERENCES incidencias(id_incidencia) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Create indexes
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_incidencias_usuario ON incidencias(id_usuario)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_incidencias_estatus ON incidencias(estatus)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_incidencia_adjuntos_incidencia ON incidencia_adjuntos(id_incidencia)",
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }
}
