//! Transaction Management
//!
//! [`TransactionGuard`] is the scoped form of `Database::transaction`: the
//! transaction is rolled back when the guard goes out of scope without an
//! explicit commit.

use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use crate::database::Database;
use crate::error::OrmResult;

/// An open transaction on a borrowed [`Database`]
///
/// Derefs to the database so statements run inside the transaction.
#[derive(Debug)]
pub struct TransactionGuard<'db> {
    db: &'db mut Database,
    finished: bool,
}

impl<'db> TransactionGuard<'db> {
    pub(crate) fn begin(db: &'db mut Database) -> OrmResult<Self> {
        db.begin_transaction()?;
        debug!("Transaction started");
        Ok(Self {
            db,
            finished: false,
        })
    }

    pub fn commit(mut self) -> OrmResult<()> {
        self.db.commit()?;
        self.finished = true;
        debug!("Transaction committed");
        Ok(())
    }

    pub fn rollback(mut self) -> OrmResult<()> {
        self.db.rollback()?;
        self.finished = true;
        debug!("Transaction rolled back");
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        !self.finished && self.db.in_transaction()
    }
}

impl Deref for TransactionGuard<'_> {
    type Target = Database;

    fn deref(&self) -> &Database {
        self.db
    }
}

impl DerefMut for TransactionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Database {
        self.db
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if self.finished || !self.db.in_transaction() {
            return;
        }
        warn!("Transaction dropped without explicit commit or rollback; rolling back");
        if let Err(e) = self.db.rollback() {
            warn!("Rollback of dropped transaction failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::backends::MemoryConnection;
    use crate::database::Database;
    use crate::error::OrmError;

    fn setup() -> (Database, crate::backends::MemoryHandle) {
        let conn = MemoryConnection::new();
        let handle = conn.handle();
        (Database::new(Box::new(conn)), handle)
    }

    #[test]
    fn test_guard_commit() {
        let (mut db, handle) = setup();
        let mut tx = db.begin().unwrap();
        assert!(tx.is_active());
        tx.exec("UPDATE users SET name = 'b' WHERE id = 1").unwrap();
        tx.commit().unwrap();

        assert!(!db.in_transaction());
        assert_eq!(handle.update_count(), 1);
        assert_eq!(handle.transactions_committed(), 1);
    }

    #[test]
    fn test_guard_drop_rolls_back() {
        let (mut db, handle) = setup();
        {
            let mut tx = db.begin().unwrap();
            tx.exec("DELETE FROM users WHERE id = 1").unwrap();
        }

        assert!(!db.in_transaction());
        assert_eq!(handle.delete_count(), 0);
        assert_eq!(handle.transactions_rolled_back(), 1);
    }

    #[test]
    fn test_guard_explicit_rollback() {
        let (mut db, handle) = setup();
        let tx = db.begin().unwrap();
        tx.rollback().unwrap();
        assert_eq!(handle.transactions_rolled_back(), 1);
    }

    #[test]
    fn test_second_guard_rejected() {
        let (mut db, _) = setup();
        let mut tx = db.begin().unwrap();
        assert_eq!(tx.begin_transaction(), Err(OrmError::TransactionAlreadyActive));
        tx.commit().unwrap();
    }
}
