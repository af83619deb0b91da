// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service catalog queries. Display-only data; never affects ordering.

use rusqlite::params;

use filaq_core::{FilaqError, Service};

use crate::database::{map_tr_err, Database};

/// Active services for a shop, oldest first.
pub async fn list_active(db: &Database, shop_code: &str) -> Result<Vec<Service>, FilaqError> {
    let shop_code = shop_code.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, shop_code, name, duration_minutes, active FROM services \
                 WHERE shop_code = ?1 AND active = 1 \
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let services = stmt
                .query_map(params![shop_code], |row| {
                    Ok(Service {
                        id: row.get(0)?,
                        shop_code: row.get(1)?,
                        name: row.get(2)?,
                        duration_minutes: row.get(3)?,
                        active: row.get::<_, i64>(4)? != 0,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(services)
        })
        .await
        .map_err(map_tr_err)
}

/// Add a service to the catalog.
pub async fn create(
    db: &Database,
    shop_code: &str,
    name: &str,
    duration_minutes: Option<i64>,
) -> Result<Service, FilaqError> {
    let shop_code = shop_code.to_string();
    let name = name.to_string();
    let id = uuid::Uuid::new_v4().to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO services (id, shop_code, name, duration_minutes, active) \
                 VALUES (?1, ?2, ?3, ?4, 1)",
                params![id, shop_code, name, duration_minutes],
            )?;
            Ok(Service {
                id,
                shop_code,
                name,
                duration_minutes,
                active: true,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Soft-delete a service. Returns false when the id is unknown.
pub async fn deactivate(db: &Database, service_id: &str) -> Result<bool, FilaqError> {
    let service_id = service_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE services SET active = 0 WHERE id = ?1",
                params![service_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn catalog_lifecycle() {
        let (db, _dir) = setup_db().await;
        let fade = create(&db, "shop-a", "fade", Some(30)).await.unwrap();
        create(&db, "shop-a", "trim", None).await.unwrap();
        create(&db, "shop-b", "shave", Some(15)).await.unwrap();

        let services = list_active(&db, "shop-a").await.unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].name, "fade");
        assert_eq!(services[0].duration_minutes, Some(30));

        assert!(deactivate(&db, &fade.id).await.unwrap());
        let services = list_active(&db, "shop-a").await.unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "trim");

        assert!(!deactivate(&db, "no-such-id").await.unwrap());
        db.close().await.unwrap();
    }
}
