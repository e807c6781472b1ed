use super::Scope;
use super::model::{PolicyRow, RowKind};
use crate::db;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};

pub mod entity {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "permission_policy")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        /// role | deny
        pub kind: String,
        pub user_id: String,
        /// 角色名或 resource:action
        pub value: String,
        pub scope: String,
        pub scope_id: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

use entity::{ActiveModel, Column, Entity as PolicyEntity};

/// 策略表 (角色分配 + 黑名单) 的持久化
#[derive(Clone)]
pub struct PolicyStore {
    db: DatabaseConnection,
}

impl PolicyStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn init(&self) -> Result<(), DbErr> {
        db::create_table(&self.db, PolicyEntity).await
    }

    pub async fn load(&self) -> Result<Vec<PolicyRow>, DbErr> {
        let models = PolicyEntity::find().all(&self.db).await?;
        Ok(models.into_iter().filter_map(to_row).collect())
    }

    /// 插入一行，已存在时不做任何事。返回是否发生了写入。
    pub async fn insert(&self, row: &PolicyRow) -> Result<bool, DbErr> {
        let exists = PolicyEntity::find()
            .filter(row_condition(row))
            .count(&self.db)
            .await?
            > 0;
        if exists {
            return Ok(false);
        }

        ActiveModel {
            kind: Set(row.kind.as_str().to_string()),
            user_id: Set(row.user_id.clone()),
            value: Set(row.value.clone()),
            scope: Set(row.scope.as_str().to_string()),
            scope_id: Set(row.scope_id.clone()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(true)
    }

    /// 删除一行，返回是否真的删除了数据
    pub async fn delete(&self, row: &PolicyRow) -> Result<bool, DbErr> {
        let res = PolicyEntity::delete_many()
            .filter(row_condition(row))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }
}

fn row_condition(row: &PolicyRow) -> Condition {
    Condition::all()
        .add(Column::Kind.eq(row.kind.as_str()))
        .add(Column::UserId.eq(row.user_id.as_str()))
        .add(Column::Value.eq(row.value.as_str()))
        .add(Column::Scope.eq(row.scope.as_str()))
        .add(Column::ScopeId.eq(row.scope_id.as_str()))
}

fn to_row(model: entity::Model) -> Option<PolicyRow> {
    let Some(kind) = RowKind::parse(&model.kind) else {
        warn!(target: "Permission", "忽略未知类型的策略行 #{}: {}", model.id, model.kind);
        return None;
    };
    let scope = match model.scope.parse::<Scope>() {
        Ok(s) => s,
        Err(e) => {
            warn!(target: "Permission", "忽略策略行 #{}: {}", model.id, e);
            return None;
        }
    };
    Some(PolicyRow {
        kind,
        user_id: model.user_id,
        value: model.value,
        scope,
        scope_id: model.scope_id,
    })
}
