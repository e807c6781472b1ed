use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema};
use std::path::Path;
use tokio::fs;

/// 初始化数据库连接
pub async fn init(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    // sqlite:data/bot.db?mode=rwc -> data/
    if let Some(dir) = sqlite_parent_dir(db_url)
        && !Path::new(dir).exists()
    {
        let _ = fs::create_dir_all(dir).await;
    }

    let db = Database::connect(db_url).await?;

    info!(target: "Database", "连接成功: {}", db_url);

    Ok(db)
}

/// 根据实体定义建表 (已存在则跳过)
pub async fn create_table<E>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();

    db.execute(builder.build(&stmt)).await?;
    Ok(())
}

fn sqlite_parent_dir(db_url: &str) -> Option<&str> {
    let path = db_url.strip_prefix("sqlite:")?;
    let path = path.trim_start_matches("//");
    let path = path.split('?').next()?;
    if path.is_empty() || path.starts_with(':') {
        return None;
    }
    let dir = Path::new(path).parent()?.to_str()?;
    if dir.is_empty() { None } else { Some(dir) }
}

/// 测试用内存库。内存 SQLite 每个连接各自独立，连接池只保留一个连接。
#[cfg(test)]
pub async fn memory() -> DatabaseConnection {
    let mut opt = sea_orm::ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    Database::connect(opt).await.unwrap()
}
