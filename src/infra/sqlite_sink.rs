use rusqlite::{params, Connection, Transaction};
use std::path::Path;
use tracing::{debug, info};

use crate::app::ports::TableSinkPort;
use crate::constants::{CATEGORIES_TABLE, PRODUCTS_TABLE, PRODUCT_CATEGORIES_TABLE, SELLERS_TABLE};
use crate::error::Result;
use crate::types::{LoadSummary, NormalizedTables};

const PRODUCTS_DDL: &str = r#"
    CREATE TABLE products (
        id            TEXT PRIMARY KEY,
        title         TEXT,
        price         REAL,
        condition     TEXT,
        sold_quantity INTEGER,
        created_at    TEXT,
        permalink     TEXT,
        thumbnail     TEXT
    );
"#;

const SELLERS_DDL: &str = r#"
    CREATE TABLE sellers (
        seller_id         TEXT,
        name              TEXT,
        transaction_count INTEGER,
        reputation_tier   TEXT NOT NULL
    );
"#;

const CATEGORIES_DDL: &str = r#"
    CREATE TABLE categories (
        category_id TEXT NOT NULL,
        name        TEXT
    );
"#;

const PRODUCT_CATEGORIES_DDL: &str = r#"
    CREATE TABLE product_categories (
        product_id  TEXT NOT NULL,
        category_id TEXT NOT NULL
    );
"#;

/// SQLite sink that fully replaces the four tables on every load.
///
/// Product ids are only declared unique when the batch was checked for
/// duplicates; seller and category rows repeat per listing.
pub struct SqliteSink {
    conn: Connection,
    unique_product_ids: bool,
}

impl SqliteSink {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        Ok(Self {
            conn,
            unique_product_ids: true,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            unique_product_ids: true,
        })
    }

    /// Drop the primary key on `products.id`; needed when lenient normalization
    /// lets duplicate ids through.
    pub fn allow_duplicate_product_ids(mut self) -> Self {
        self.unique_product_ids = false;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Release the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }

    fn products_ddl(&self) -> String {
        if self.unique_product_ids {
            PRODUCTS_DDL.to_string()
        } else {
            PRODUCTS_DDL.replace("TEXT PRIMARY KEY", "TEXT NOT NULL")
        }
    }
}

fn recreate(tx: &Transaction<'_>, table: &str, ddl: &str) -> Result<()> {
    tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", table))?;
    tx.execute_batch(ddl)?;
    Ok(())
}

impl TableSinkPort for SqliteSink {
    fn replace_tables(&mut self, tables: &NormalizedTables) -> Result<LoadSummary> {
        let products_ddl = self.products_ddl();

        let tx = self.conn.transaction()?;
        recreate(&tx, PRODUCTS_TABLE, &products_ddl)?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO products (id, title, price, condition, sold_quantity, created_at, permalink, thumbnail)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for p in &tables.products {
                stmt.execute(params![
                    p.id,
                    p.title,
                    p.price,
                    p.condition,
                    p.sold_quantity,
                    p.created_at.map(|ts| ts.to_rfc3339()),
                    p.permalink,
                    p.thumbnail,
                ])?;
            }
        }
        tx.commit()?;
        crate::metrics::load::rows_written(PRODUCTS_TABLE, tables.products.len());
        debug!("Replaced {} with {} rows", PRODUCTS_TABLE, tables.products.len());

        let tx = self.conn.transaction()?;
        recreate(&tx, SELLERS_TABLE, SELLERS_DDL)?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sellers (seller_id, name, transaction_count, reputation_tier)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for s in &tables.sellers {
                stmt.execute(params![s.seller_id, s.name, s.transaction_count, s.reputation_tier])?;
            }
        }
        tx.commit()?;
        crate::metrics::load::rows_written(SELLERS_TABLE, tables.sellers.len());
        debug!("Replaced {} with {} rows", SELLERS_TABLE, tables.sellers.len());

        let tx = self.conn.transaction()?;
        recreate(&tx, CATEGORIES_TABLE, CATEGORIES_DDL)?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO categories (category_id, name) VALUES (?1, ?2)")?;
            for c in &tables.categories {
                stmt.execute(params![c.category_id, c.name])?;
            }
        }
        tx.commit()?;
        crate::metrics::load::rows_written(CATEGORIES_TABLE, tables.categories.len());
        debug!("Replaced {} with {} rows", CATEGORIES_TABLE, tables.categories.len());

        let tx = self.conn.transaction()?;
        recreate(&tx, PRODUCT_CATEGORIES_TABLE, PRODUCT_CATEGORIES_DDL)?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO product_categories (product_id, category_id) VALUES (?1, ?2)",
            )?;
            for pc in &tables.product_categories {
                stmt.execute(params![pc.product_id, pc.category_id])?;
            }
        }
        tx.commit()?;
        crate::metrics::load::rows_written(
            PRODUCT_CATEGORIES_TABLE,
            tables.product_categories.len(),
        );

        let summary = LoadSummary::from_tables(tables);
        info!(
            "Loaded {} products, {} sellers, {} categories, {} product_categories",
            summary.products, summary.sellers, summary.categories, summary.product_categories
        );
        Ok(summary)
    }
}
