use sea_orm::entity::prelude::*;

/// Singleton row holding settings shared by every user.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "global_config")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,

    pub reports_location: String,

    #[sea_orm(nullable)]
    pub livy_session_id: Option<i64>,

    #[sea_orm(nullable)]
    pub livy_session_state: Option<String>,

    #[sea_orm(nullable)]
    pub livy_session_updated_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
