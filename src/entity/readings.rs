use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One immutable telemetry record. Never updated or deleted once written;
/// `recorded_at` is assigned by the server at insert time.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "readings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub device_id: Uuid,
    pub observed_at: DateTimeWithTimeZone,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: Option<f64>,
    pub pest_count_primary: i32,
    pub pest_count_secondary: i32,
    pub rainfall_detected: bool,
    pub irrigation_active: bool,
    pub model_confidence: Option<f64>,
    pub recorded_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::devices::Entity",
        from = "Column::DeviceId",
        to = "super::devices::Column::Id"
    )]
    Device,
    #[sea_orm(has_one = "super::alert_logs::Entity")]
    AlertLog,
}

impl Related<super::devices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Device.def()
    }
}

impl Related<super::alert_logs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AlertLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
