use crate::domain::errors::LedgerError;
use crate::domain::repositories::{SaleRecord, TradeLedger};
use crate::persistence::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::debug;

pub struct SqliteSaleLedger {
    pool: DbPool,
}

impl SqliteSaleLedger {
    pub fn new(pool: DbPool) -> Self {
        SqliteSaleLedger { pool }
    }
}

#[async_trait]
impl TradeLedger for SqliteSaleLedger {
    async fn record_sale(&self, sale: &SaleRecord) -> Result<(), LedgerError> {
        let pnl_pct = if sale.entry_cost > 0.0 {
            sale.pnl / sale.entry_cost * 100.0
        } else {
            0.0
        };
        sqlx::query(
            r#"
            INSERT INTO sales (
                executed_at, symbol, quantity, entry_cost, proceeds,
                fees, pnl, pnl_pct, reason, synced
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(sale.executed_at)
        .bind(&sale.symbol)
        .bind(sale.quantity)
        .bind(sale.entry_cost)
        .bind(sale.proceeds)
        .bind(sale.fees_quote)
        .bind(sale.pnl)
        .bind(pnl_pct)
        .bind(&sale.reason)
        .bind(sale.synced)
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Query(e.to_string()))?;

        debug!(symbol = %sale.symbol, pnl = sale.pnl, "sale recorded");
        Ok(())
    }

    async fn recent_sales(&self, limit: usize) -> Result<Vec<SaleRecord>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT executed_at, symbol, quantity, entry_cost, proceeds,
                   fees, pnl, reason, synced
            FROM sales
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Query(e.to_string()))?;

        let mut sales = Vec::with_capacity(rows.len());
        for row in rows {
            let executed_at: DateTime<Utc> = row
                .try_get("executed_at")
                .map_err(|e| LedgerError::Query(e.to_string()))?;
            sales.push(SaleRecord {
                symbol: row.try_get("symbol").map_err(|e| LedgerError::Query(e.to_string()))?,
                quantity: row.try_get("quantity").map_err(|e| LedgerError::Query(e.to_string()))?,
                entry_cost: row
                    .try_get("entry_cost")
                    .map_err(|e| LedgerError::Query(e.to_string()))?,
                proceeds: row.try_get("proceeds").map_err(|e| LedgerError::Query(e.to_string()))?,
                fees_quote: row.try_get("fees").map_err(|e| LedgerError::Query(e.to_string()))?,
                pnl: row.try_get("pnl").map_err(|e| LedgerError::Query(e.to_string()))?,
                reason: row.try_get("reason").map_err(|e| LedgerError::Query(e.to_string()))?,
                synced: row.try_get("synced").map_err(|e| LedgerError::Query(e.to_string()))?,
                executed_at,
            });
        }
        Ok(sales)
    }
}
