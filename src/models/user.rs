use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JWT claims issued by the portal's login. The user id has been
/// issued under several names over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_usuario: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    pub exp: usize, // expiration time
}

impl Claims {
    /// First of `id_usuario`, `id`, `user_id` holding a positive integer
    /// (as a JSON number or numeric string)
    pub fn user_id(&self) -> Option<i64> {
        [&self.id_usuario, &self.id, &self.user_id]
            .into_iter()
            .flatten()
            .find_map(|v| {
                let id = match v {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                };
                id.filter(|id| *id > 0)
            })
    }
}

/// Authenticated caller, stored in request extensions
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id_usuario: i64,
    pub correo: Option<String>,
}
