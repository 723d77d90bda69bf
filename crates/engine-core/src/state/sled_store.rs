use crate::state::{TaskStore, models::TaskRecord};
use async_trait::async_trait;
use std::{error::Error, path::Path};

pub struct SledTaskStore {
    db: sled::Db,
}

impl SledTaskStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    #[inline]
    fn task_key(task_id: &str) -> String {
        format!("task:{}", task_id)
    }
}

#[async_trait]
impl TaskStore for SledTaskStore {
    async fn save_task(&self, record: &TaskRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        let key = Self::task_key(&record.task_id);
        let value = bincode::serialize(record)?;
        self.db.insert(key, value)?;
        Ok(())
    }

    async fn load_task(
        &self,
        task_id: &str,
    ) -> Result<Option<TaskRecord>, Box<dyn Error + Send + Sync>> {
        match self.db.get(Self::task_key(task_id))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_tasks(&self) -> Result<Vec<TaskRecord>, Box<dyn Error + Send + Sync>> {
        let mut records = Vec::new();
        for item in self.db.scan_prefix("task:") {
            let (_key, value) = item?;
            let record: TaskRecord = bincode::deserialize(&value)?;
            records.push(record);
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}
