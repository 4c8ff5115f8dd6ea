use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Designation {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Crane Operator")]
    pub name: String,
    #[schema(example = 1, nullable = true)]
    pub department_id: Option<u64>,
    #[schema(nullable = true)]
    pub description: Option<String>,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}
