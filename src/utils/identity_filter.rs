use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;

/// Expected capacity and false-positive rate.
const FILTER_CAPACITY: usize = 200_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

/// Unique identifiers the filter tracks; each lives in its own namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Username,
    EmployeeEmail,
    FileNumber,
}

impl Identity {
    fn namespace(self) -> &'static str {
        match self {
            Identity::Username => "user",
            Identity::EmployeeEmail => "email",
            Identity::FileNumber => "file",
        }
    }
}

static IDENTITY_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

#[inline]
fn entry(kind: Identity, value: &str) -> String {
    format!("{}:{}", kind.namespace(), value.trim().to_lowercase())
}

/// false => definitely unused; true => maybe taken, ask the database.
pub fn might_exist(kind: Identity, value: &str) -> bool {
    let key = entry(kind, value);
    IDENTITY_FILTER
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .contains(&key)
}

pub fn insert(kind: Identity, value: &str) {
    let key = entry(kind, value);
    IDENTITY_FILTER
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .add(&key);
}

pub fn remove(kind: Identity, value: &str) {
    let key = entry(kind, value);
    IDENTITY_FILTER
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .remove(&key);
}

fn insert_batch(keys: &[String]) {
    let mut filter = IDENTITY_FILTER
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    for key in keys {
        filter.add(key);
    }
}

async fn warmup_column(pool: &MySqlPool, kind: Identity, sql: &str, batch_size: usize) -> Result<usize> {
    let mut stream = sqlx::query_as::<_, (String,)>(sql).fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (value,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

        batch.push(entry(kind, &value));
        total += 1;

        if batch.len() == batch_size {
            insert_batch(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch);
    }

    Ok(total)
}

/// Warm up the filter using streaming + batching
pub async fn warmup_identity_filter(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let users = warmup_column(pool, Identity::Username, "SELECT username FROM users", batch_size).await?;
    let emails =
        warmup_column(pool, Identity::EmployeeEmail, "SELECT email FROM employees", batch_size).await?;
    let files = warmup_column(
        pool,
        Identity::FileNumber,
        "SELECT file_number FROM employees",
        batch_size,
    )
    .await?;

    log::info!(
        "Identity filter warmup complete: {} users, {} emails, {} file numbers",
        users,
        emails,
        files
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_values_are_found_case_insensitively() {
        insert(Identity::Username, "Filter.Test.Alice");
        assert!(might_exist(Identity::Username, "filter.test.alice"));
        assert!(might_exist(Identity::Username, "  FILTER.TEST.ALICE "));
    }

    #[test]
    fn namespaces_do_not_collide() {
        insert(Identity::FileNumber, "EMP-7781");
        assert!(might_exist(Identity::FileNumber, "emp-7781"));
        assert!(!might_exist(Identity::EmployeeEmail, "EMP-7781"));
    }

    #[test]
    fn removed_values_are_gone() {
        insert(Identity::EmployeeEmail, "gone@filter.test");
        remove(Identity::EmployeeEmail, "gone@filter.test");
        assert!(!might_exist(Identity::EmployeeEmail, "gone@filter.test"));
    }
}
