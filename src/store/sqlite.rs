use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, TrackerError};
use crate::store::{
    Attribute, AttributeStore, DomainMetadata, Item, Predicate, ReplaceableAttribute, Select,
    UpdateCondition, MAX_SELECT_LIMIT,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock()?;

        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| TrackerError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            TrackerError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn require_domain(conn: &Connection, domain: &str) -> Result<()> {
        let found = conn
            .query_row(
                "SELECT 1 FROM domains WHERE name = ?1",
                params![domain],
                |_| Ok(()),
            )
            .optional()?;

        found.ok_or_else(|| TrackerError::DomainNotFound(domain.to_string()))
    }

    fn attribute_exists(conn: &Connection, domain: &str, item: &str, name: &str) -> Result<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM attributes WHERE domain = ?1 AND item_name = ?2 AND name = ?3",
                params![domain, item, name],
                |_| Ok(()),
            )
            .optional()?;

        Ok(found.is_some())
    }

    /// Builds the `FROM ... WHERE ...` part of a select over item names.
    /// `?1` is always the domain.
    fn filtered_items(select: &Select, params: &mut Vec<String>) -> String {
        params.push(select.domain.clone());

        let mut sql = String::from(
            "FROM (SELECT DISTINCT item_name FROM attributes WHERE domain = ?1) k",
        );
        let mut clauses = Vec::new();

        if let Some(ref name) = select.item_name {
            params.push(name.clone());
            clauses.push(format!("k.item_name = ?{}", params.len()));
        }

        for predicate in &select.predicates {
            let (attribute, negate) = match predicate {
                Predicate::IsNull(a) => (a, true),
                Predicate::IsNotNull(a) => (a, false),
            };
            params.push(attribute.clone());
            clauses.push(format!(
                "{}EXISTS (SELECT 1 FROM attributes a
                   WHERE a.domain = ?1 AND a.item_name = k.item_name AND a.name = ?{})",
                if negate { "NOT " } else { "" },
                params.len()
            ));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        sql
    }

    fn load_attributes(conn: &Connection, domain: &str, item: &str) -> Result<Vec<Attribute>> {
        let mut stmt = conn.prepare_cached(
            "SELECT name, value FROM attributes
             WHERE domain = ?1 AND item_name = ?2 ORDER BY name",
        )?;

        let attributes = stmt
            .query_map(params![domain, item], |row| {
                Ok(Attribute {
                    name: row.get(0)?,
                    value: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(attributes)
    }
}

impl AttributeStore for SqliteStore {
    fn ensure_domain(&self, domain: &str) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR IGNORE INTO domains (name, created_at) VALUES (?1, ?2)",
            params![domain, Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }

    fn domain_metadata(&self, domain: &str) -> Result<DomainMetadata> {
        let conn = self.lock()?;
        Self::require_domain(&conn, domain)?;

        let metadata = conn.query_row(
            "SELECT COUNT(DISTINCT item_name), COUNT(DISTINCT name), COUNT(*)
             FROM attributes WHERE domain = ?1",
            params![domain],
            |row| {
                Ok(DomainMetadata {
                    item_count: row.get::<_, i64>(0)? as u64,
                    attribute_name_count: row.get::<_, i64>(1)? as u64,
                    attribute_value_count: row.get::<_, i64>(2)? as u64,
                })
            },
        )?;

        Ok(metadata)
    }

    fn put_attributes(
        &self,
        domain: &str,
        item: &str,
        attributes: &[ReplaceableAttribute],
        condition: Option<&UpdateCondition>,
    ) -> Result<()> {
        if attributes.is_empty() {
            return Err(TrackerError::InvalidQuery(
                "put requires at least one attribute".into(),
            ));
        }

        let mut conn = self.lock()?;
        Self::require_domain(&conn, domain)?;

        // Immediate so the condition check and the write hold one write lock,
        // also against other processes sharing the database file.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(condition) = condition {
            let exists = Self::attribute_exists(&tx, domain, item, &condition.name)?;
            if exists != condition.exists {
                return Err(TrackerError::ConditionalCheckFailed {
                    item: item.to_string(),
                    attribute: condition.name.clone(),
                });
            }
        }

        for attribute in attributes {
            if attribute.replace {
                tx.execute(
                    "INSERT INTO attributes (domain, item_name, name, value) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(domain, item_name, name) DO UPDATE SET value = excluded.value",
                    params![domain, item, attribute.name, attribute.value],
                )?;
            } else {
                tx.execute(
                    "INSERT OR IGNORE INTO attributes (domain, item_name, name, value)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![domain, item, attribute.name, attribute.value],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_attributes(&self, domain: &str, item: &str, names: &[&str]) -> Result<()> {
        let mut conn = self.lock()?;
        Self::require_domain(&conn, domain)?;

        let tx = conn.transaction()?;
        for name in names {
            tx.execute(
                "DELETE FROM attributes WHERE domain = ?1 AND item_name = ?2 AND name = ?3",
                params![domain, item, name],
            )?;
        }
        tx.commit()?;

        Ok(())
    }

    fn select(&self, select: &Select) -> Result<Vec<Item>> {
        if select.limit == 0 || select.limit > MAX_SELECT_LIMIT {
            return Err(TrackerError::InvalidQuery(format!(
                "limit must be between 1 and {}, got {}",
                MAX_SELECT_LIMIT, select.limit
            )));
        }

        let conn = self.lock()?;
        Self::require_domain(&conn, &select.domain)?;

        let mut params = Vec::new();
        let mut sql = format!("SELECT k.item_name {}", Self::filtered_items(select, &mut params));

        if let Some(ref order_by) = select.order_by {
            params.push(order_by.clone());
            sql.push_str(&format!(
                " ORDER BY (SELECT a.value FROM attributes a
                   WHERE a.domain = ?1 AND a.item_name = k.item_name AND a.name = ?{}) ASC,
                   k.item_name ASC",
                params.len()
            ));
        }
        sql.push_str(&format!(" LIMIT {}", select.limit));

        let names = {
            let mut stmt = conn.prepare(&sql)?;
            let names = stmt
                .query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            names
        };

        let mut items = Vec::with_capacity(names.len());
        for name in names {
            let attributes = Self::load_attributes(&conn, &select.domain, &name)?;
            items.push(Item { name, attributes });
        }

        Ok(items)
    }

    fn count(&self, select: &Select) -> Result<u64> {
        let conn = self.lock()?;
        Self::require_domain(&conn, &select.domain)?;

        let mut params = Vec::new();
        let sql = format!("SELECT COUNT(*) {}", Self::filtered_items(select, &mut params));

        let count: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;

        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "entries";

    fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.ensure_domain(DOMAIN).unwrap();
        store
    }

    #[test]
    fn test_put_and_select_item() {
        let store = store();
        store
            .put_attributes(
                DOMAIN,
                "a",
                &[ReplaceableAttribute::replacing("seen_at", "2024/01/01 00:00:00")],
                None,
            )
            .unwrap();

        let items = store.select(&Select::from_domain(DOMAIN).item("a")).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "a");
        assert_eq!(items[0].attribute("seen_at"), Some("2024/01/01 00:00:00"));
    }

    #[test]
    fn test_replace_false_keeps_existing_value() {
        let store = store();
        store
            .put_attributes(DOMAIN, "a", &[ReplaceableAttribute::if_absent("created", "first")], None)
            .unwrap();
        store
            .put_attributes(DOMAIN, "a", &[ReplaceableAttribute::if_absent("created", "second")], None)
            .unwrap();

        let items = store.select(&Select::from_domain(DOMAIN).item("a")).unwrap();
        assert_eq!(items[0].attribute("created"), Some("first"));
    }

    #[test]
    fn test_replace_true_overwrites() {
        let store = store();
        store
            .put_attributes(DOMAIN, "a", &[ReplaceableAttribute::replacing("seen_at", "1")], None)
            .unwrap();
        store
            .put_attributes(DOMAIN, "a", &[ReplaceableAttribute::replacing("seen_at", "2")], None)
            .unwrap();

        let items = store.select(&Select::from_domain(DOMAIN).item("a")).unwrap();
        assert_eq!(items[0].attribute("seen_at"), Some("2"));
    }

    #[test]
    fn test_failed_condition_writes_nothing() {
        let store = store();
        let condition = UpdateCondition::absent("consuming");
        store
            .put_attributes(
                DOMAIN,
                "a",
                &[ReplaceableAttribute::replacing("consuming", "t1")],
                Some(&condition),
            )
            .unwrap();

        let err = store
            .put_attributes(
                DOMAIN,
                "a",
                &[
                    ReplaceableAttribute::replacing("consuming", "t2"),
                    ReplaceableAttribute::replacing("other", "x"),
                ],
                Some(&condition),
            )
            .unwrap_err();
        assert!(err.is_conditional_check_failed());

        let items = store.select(&Select::from_domain(DOMAIN).item("a")).unwrap();
        assert_eq!(items[0].attribute("consuming"), Some("t1"));
        assert!(!items[0].has("other"));
    }

    #[test]
    fn test_condition_requiring_presence() {
        let store = store();
        let err = store
            .put_attributes(
                DOMAIN,
                "a",
                &[ReplaceableAttribute::replacing("consumed", "t")],
                Some(&UpdateCondition::present("consuming")),
            )
            .unwrap_err();
        assert!(err.is_conditional_check_failed());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = store();
        store
            .put_attributes(
                DOMAIN,
                "a",
                &[
                    ReplaceableAttribute::replacing("seen_at", "t"),
                    ReplaceableAttribute::replacing("consuming", "t"),
                ],
                None,
            )
            .unwrap();

        store.delete_attributes(DOMAIN, "a", &["consuming"]).unwrap();
        store.delete_attributes(DOMAIN, "a", &["consuming"]).unwrap();

        let items = store.select(&Select::from_domain(DOMAIN).item("a")).unwrap();
        assert!(!items[0].has("consuming"));
        assert!(items[0].has("seen_at"));
    }

    #[test]
    fn test_item_disappears_with_its_last_attribute() {
        let store = store();
        store
            .put_attributes(DOMAIN, "a", &[ReplaceableAttribute::replacing("seen_at", "t")], None)
            .unwrap();
        store.delete_attributes(DOMAIN, "a", &["seen_at"]).unwrap();

        assert!(store.select(&Select::from_domain(DOMAIN).item("a")).unwrap().is_empty());
    }

    #[test]
    fn test_select_predicates_and_ordering() {
        let store = store();
        for (name, seen) in [("b", "2024/01/02 00:00:00"), ("c", "2024/01/01 00:00:00"), ("d", "2024/01/03 00:00:00")] {
            store
                .put_attributes(DOMAIN, name, &[ReplaceableAttribute::replacing("seen_at", seen)], None)
                .unwrap();
        }
        store
            .put_attributes(DOMAIN, "d", &[ReplaceableAttribute::replacing("consumed", "x")], None)
            .unwrap();

        let select = Select::from_domain(DOMAIN)
            .is_null("consumed")
            .is_not_null("seen_at")
            .order_by("seen_at");
        let names: Vec<String> = store
            .select(&select)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["c", "b"]);
        assert_eq!(store.count(&select).unwrap(), 2);
        assert_eq!(store.count(&Select::from_domain(DOMAIN).is_not_null("consumed")).unwrap(), 1);
    }

    #[test]
    fn test_select_limit_is_a_hard_ceiling() {
        let store = store();
        for i in 0..5 {
            store
                .put_attributes(
                    DOMAIN,
                    &format!("item-{}", i),
                    &[ReplaceableAttribute::replacing("seen_at", "t")],
                    None,
                )
                .unwrap();
        }

        assert_eq!(store.select(&Select::from_domain(DOMAIN).limit(3)).unwrap().len(), 3);
        assert!(matches!(
            store.select(&Select::from_domain(DOMAIN).limit(MAX_SELECT_LIMIT + 1)),
            Err(TrackerError::InvalidQuery(_))
        ));
        assert!(matches!(
            store.select(&Select::from_domain(DOMAIN).limit(0)),
            Err(TrackerError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_unknown_domain() {
        let store = store();
        assert!(matches!(
            store.domain_metadata("missing"),
            Err(TrackerError::DomainNotFound(_))
        ));
        assert!(matches!(
            store.put_attributes("missing", "a", &[ReplaceableAttribute::replacing("x", "y")], None),
            Err(TrackerError::DomainNotFound(_))
        ));
    }

    #[test]
    fn test_domain_metadata_counts() {
        let store = store();
        store.ensure_domain(DOMAIN).unwrap();
        store
            .put_attributes(
                DOMAIN,
                "a",
                &[
                    ReplaceableAttribute::replacing("seen_at", "t"),
                    ReplaceableAttribute::replacing("created", "t"),
                ],
                None,
            )
            .unwrap();
        store
            .put_attributes(DOMAIN, "b", &[ReplaceableAttribute::replacing("seen_at", "t")], None)
            .unwrap();

        let metadata = store.domain_metadata(DOMAIN).unwrap();
        assert_eq!(metadata.item_count, 2);
        assert_eq!(metadata.attribute_name_count, 2);
        assert_eq!(metadata.attribute_value_count, 3);
    }

    #[test]
    fn test_empty_put_rejected() {
        let store = store();
        assert!(matches!(
            store.put_attributes(DOMAIN, "a", &[], None),
            Err(TrackerError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            store.ensure_domain(DOMAIN).unwrap();
            store
                .put_attributes(DOMAIN, "a", &[ReplaceableAttribute::replacing("seen_at", "t")], None)
                .unwrap();
        }

        let store = SqliteStore::new(&path).unwrap();
        assert_eq!(store.count(&Select::from_domain(DOMAIN)).unwrap(), 1);
    }
}
