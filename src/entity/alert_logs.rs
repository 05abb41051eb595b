use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Durable record that a threshold breach was detected and a notification
/// was attempted. `reading_id` carries a unique index: at most one alert
/// per reading, whatever the evaluator is invoked with.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "alert_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub reading_id: Uuid,
    pub alert_kind: String,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub dispatched_to: String,
    pub dispatched_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::readings::Entity",
        from = "Column::ReadingId",
        to = "super::readings::Column::Id"
    )]
    Reading,
}

impl Related<super::readings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reading.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
