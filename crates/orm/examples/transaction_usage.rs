//! Transaction Usage Examples
//!
//! Callback transactions and RAII guards against an in-process SQLite
//! database.

use strata_orm::{CrudOperations, Database, Model, OrmError, OrmResult};

#[derive(Debug, Clone, Model)]
struct Transfer {
    id: i64,
    from_account: String,
    to_account: String,
    amount: i64,
}

fn transfer(from: &str, to: &str, amount: i64) -> Transfer {
    Transfer {
        id: 0,
        from_account: from.to_string(),
        to_account: to.to_string(),
        amount,
    }
}

fn main() -> OrmResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter("strata_orm=debug")
        .init();

    let mut db = Database::connect_url("sqlite::memory:")?;
    db.exec(
        "CREATE TABLE transfers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            from_account TEXT NOT NULL,
            to_account TEXT NOT NULL,
            amount INTEGER NOT NULL
        )",
    )?;

    // Commits when the callback returns Ok
    db.transaction(|db| {
        Transfer::create(db, &transfer("alice", "bob", 50))?;
        Transfer::create(db, &transfer("bob", "carol", 20))?;
        Ok(())
    })?;

    // Rolls back, then hands the error back
    let rejected: OrmResult<()> = db.transaction(|db| {
        Transfer::create(db, &transfer("carol", "dave", 1_000))?;
        Err(OrmError::UpdateFailed("insufficient funds".to_string()))
    });
    println!("rejected transfer: {}", rejected.unwrap_err());

    // Guards roll back unless committed
    {
        let mut tx = db.begin()?;
        Transfer::create(&mut tx, &transfer("dave", "erin", 5))?;
    }

    let mut tx = db.begin()?;
    Transfer::create(&mut tx, &transfer("erin", "frank", 7))?;
    tx.commit()?;

    for t in Transfer::all(&mut db)? {
        println!("#{} {} -> {}: {}", t.id, t.from_account, t.to_account, t.amount);
    }
    println!("{} transfers recorded", Transfer::count(&mut db)?);
    Ok(())
}
