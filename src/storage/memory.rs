use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use super::{Row, RowStore, StoreError};
use crate::error::Result;
use crate::types::{RowId, Value};

#[derive(Debug, Default)]
struct MemTable {
    rows: BTreeMap<RowId, Row>,
}

impl MemTable {
    fn next_rowid(&self) -> std::result::Result<RowId, StoreError> {
        match self.rows.keys().next_back() {
            None => Ok(1),
            Some(&max) => max.checked_add(1).ok_or(StoreError::RowIdExhausted),
        }
    }
}

/// In-memory row store backed by one ordered map per table
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, MemTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, name: &str) -> std::result::Result<&MemTable, StoreError> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::NoSuchTable(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> std::result::Result<&mut MemTable, StoreError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::NoSuchTable(name.to_string()))
    }
}

impl RowStore for MemoryStore {
    fn create_table(&mut self, table: &str) -> std::result::Result<(), StoreError> {
        if self.tables.contains_key(table) {
            return Err(StoreError::TableExists(table.to_string()));
        }
        self.tables.insert(table.to_string(), MemTable::default());
        Ok(())
    }

    fn drop_table(&mut self, table: &str) -> std::result::Result<(), StoreError> {
        self.tables
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| StoreError::NoSuchTable(table.to_string()))
    }

    fn insert(&mut self, table: &str, row: Row) -> std::result::Result<RowId, StoreError> {
        let mem = self.table_mut(table)?;
        let rowid = mem.next_rowid()?;
        mem.rows.insert(rowid, row);
        trace!(table, rowid, "row stored");
        Ok(rowid)
    }

    fn insert_at(
        &mut self,
        table: &str,
        rowid: RowId,
        row: Row,
    ) -> std::result::Result<(), StoreError> {
        let mem = self.table_mut(table)?;
        if mem.rows.contains_key(&rowid) {
            return Err(StoreError::DuplicateRowId {
                table: table.to_string(),
                rowid,
            });
        }
        mem.rows.insert(rowid, row);
        trace!(table, rowid, "row stored");
        Ok(())
    }

    fn next_rowid(&self, table: &str) -> std::result::Result<RowId, StoreError> {
        self.table(table)?.next_rowid()
    }

    fn scan(
        &self,
        table: &str,
        predicate: &mut dyn FnMut(&[Value]) -> Result<bool>,
    ) -> Result<Vec<(RowId, Row)>> {
        let mem = self.table(table)?;
        let mut out = Vec::new();
        for (rowid, row) in &mem.rows {
            if predicate(row)? {
                out.push((*rowid, row.clone()));
            }
        }
        Ok(out)
    }

    fn delete(&mut self, table: &str, rowid: RowId) -> std::result::Result<bool, StoreError> {
        Ok(self.table_mut(table)?.rows.remove(&rowid).is_some())
    }

    fn len(&self, table: &str) -> std::result::Result<usize, StoreError> {
        Ok(self.table(table)?.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all(_: &[Value]) -> Result<bool> {
        Ok(true)
    }

    #[test]
    fn test_insert_and_scan() {
        let mut store = MemoryStore::new();
        store.create_table("t").unwrap();
        assert!(store.is_empty("t").unwrap());

        let a = store.insert("t", vec![Value::Integer(10)]).unwrap();
        let b = store.insert("t", vec![Value::Integer(20)]).unwrap();
        assert_eq!((a, b), (1, 2));

        let rows = store
            .scan("t", &mut |row: &[Value]| -> Result<bool> { Ok(row[0].to_i64() > 10) })
            .unwrap();
        assert_eq!(rows, vec![(2, vec![Value::Integer(20)])]);
        assert_eq!(store.len("t").unwrap(), 2);
    }

    #[test]
    fn test_explicit_rowids() {
        let mut store = MemoryStore::new();
        store.create_table("t").unwrap();
        store.insert_at("t", 100, vec![Value::Null]).unwrap();
        assert_eq!(store.next_rowid("t").unwrap(), 101);
        assert_eq!(
            store.insert_at("t", 100, vec![Value::Null]),
            Err(StoreError::DuplicateRowId {
                table: "t".into(),
                rowid: 100
            })
        );

        store.insert_at("t", i64::MAX, vec![Value::Null]).unwrap();
        assert_eq!(store.next_rowid("t"), Err(StoreError::RowIdExhausted));
    }

    #[test]
    fn test_delete_and_drop() {
        let mut store = MemoryStore::new();
        store.create_table("t").unwrap();
        let id = store.insert("t", vec![Value::Integer(1)]).unwrap();
        assert!(store.delete("t", id).unwrap());
        assert!(!store.delete("t", id).unwrap());
        assert_eq!(store.scan("t", &mut all).unwrap().len(), 0);

        assert_eq!(
            store.create_table("t"),
            Err(StoreError::TableExists("t".into()))
        );
        store.drop_table("t").unwrap();
        assert!(matches!(
            store.len("t"),
            Err(StoreError::NoSuchTable(_))
        ));
    }
}
