//! Asset, contribution, gap loan and access grant operations for the repository.

use crate::domain::{
    Asset, AssetId, AssetPurchase, Contribution, ContributionId, GapLoan, LoanId, PurchaseId,
    UserId,
};
use sqlx::sqlite::{SqliteExecutor, SqliteRow};
use sqlx::Row;

use super::{opt_time_col, parse_col, time_col, Repository, UnitOfWork};

const ASSET_COLUMNS: &str = r#"
    id, title, target_price, platform_fee, access_price, current_collected, status,
    total_purchases, total_revenue, total_profit_distributed, platform_margin,
    delivery_info, created_at, purchased_at, available_at
"#;

const CONTRIBUTION_COLUMNS: &str = r#"
    id, user_id, asset_id, amount, excess_amount, profit_share_ratio,
    total_profit_received, status, created_at
"#;

const LOAN_COLUMNS: &str = r#"
    id, user_id, asset_id, loan_amount, repaid_amount, remaining_amount, status, created_at
"#;

const PURCHASE_COLUMNS: &str = r#"
    id, user_id, asset_id, purchase_amount, access_key, source, delivery_expiry, created_at
"#;

fn asset_from_row(row: &SqliteRow) -> Result<Asset, sqlx::Error> {
    let delivery_info = row
        .try_get::<Option<String>, _>("delivery_info")?
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: "delivery_info".to_string(),
            source: Box::new(e),
        })?;

    Ok(Asset {
        id: AssetId::new(row.try_get::<String, _>("id")?),
        title: row.try_get("title")?,
        target_price: parse_col(row, "target_price")?,
        platform_fee: parse_col(row, "platform_fee")?,
        access_price: parse_col(row, "access_price")?,
        current_collected: parse_col(row, "current_collected")?,
        status: parse_col(row, "status")?,
        total_purchases: row.try_get("total_purchases")?,
        total_revenue: parse_col(row, "total_revenue")?,
        total_profit_distributed: parse_col(row, "total_profit_distributed")?,
        platform_margin: parse_col(row, "platform_margin")?,
        delivery_info,
        created_at: time_col(row, "created_at")?,
        purchased_at: opt_time_col(row, "purchased_at")?,
        available_at: opt_time_col(row, "available_at")?,
    })
}

fn contribution_from_row(row: &SqliteRow) -> Result<Contribution, sqlx::Error> {
    Ok(Contribution {
        id: ContributionId::new(row.try_get::<String, _>("id")?),
        user: UserId::new(row.try_get::<String, _>("user_id")?),
        asset_id: AssetId::new(row.try_get::<String, _>("asset_id")?),
        amount: parse_col(row, "amount")?,
        excess_amount: parse_col(row, "excess_amount")?,
        profit_share_ratio: parse_col(row, "profit_share_ratio")?,
        total_profit_received: parse_col(row, "total_profit_received")?,
        status: parse_col(row, "status")?,
        created_at: time_col(row, "created_at")?,
    })
}

fn loan_from_row(row: &SqliteRow) -> Result<GapLoan, sqlx::Error> {
    Ok(GapLoan {
        id: LoanId::new(row.try_get::<String, _>("id")?),
        user: UserId::new(row.try_get::<String, _>("user_id")?),
        asset_id: AssetId::new(row.try_get::<String, _>("asset_id")?),
        loan_amount: parse_col(row, "loan_amount")?,
        repaid_amount: parse_col(row, "repaid_amount")?,
        remaining_amount: parse_col(row, "remaining_amount")?,
        status: parse_col(row, "status")?,
        created_at: time_col(row, "created_at")?,
    })
}

fn purchase_from_row(row: &SqliteRow) -> Result<AssetPurchase, sqlx::Error> {
    Ok(AssetPurchase {
        id: PurchaseId::new(row.try_get::<String, _>("id")?),
        user: UserId::new(row.try_get::<String, _>("user_id")?),
        asset_id: AssetId::new(row.try_get::<String, _>("asset_id")?),
        purchase_amount: parse_col(row, "purchase_amount")?,
        access_key: row.try_get("access_key")?,
        source: parse_col(row, "source")?,
        delivery_expiry: time_col(row, "delivery_expiry")?,
        created_at: time_col(row, "created_at")?,
    })
}

fn delivery_json(asset: &Asset) -> Result<Option<String>, sqlx::Error> {
    asset
        .delivery_info
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| sqlx::Error::Protocol(format!("unserializable delivery info: {}", e)))
}

async fn fetch_asset<'e, E: SqliteExecutor<'e>>(
    ex: E,
    id: &AssetId,
) -> Result<Option<Asset>, sqlx::Error> {
    let sql = format!("SELECT {} FROM assets WHERE id = ?", ASSET_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.as_str())
        .fetch_optional(ex)
        .await?;
    row.as_ref().map(asset_from_row).transpose()
}

async fn fetch_contributions<'e, E: SqliteExecutor<'e>>(
    ex: E,
    asset: &AssetId,
) -> Result<Vec<Contribution>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM contributions WHERE asset_id = ? ORDER BY created_at ASC, rowid ASC",
        CONTRIBUTION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(asset.as_str())
        .fetch_all(ex)
        .await?;
    rows.iter().map(contribution_from_row).collect()
}

async fn fetch_contribution<'e, E: SqliteExecutor<'e>>(
    ex: E,
    user: &UserId,
    asset: &AssetId,
) -> Result<Option<Contribution>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM contributions WHERE user_id = ? AND asset_id = ?",
        CONTRIBUTION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(user.as_str())
        .bind(asset.as_str())
        .fetch_optional(ex)
        .await?;
    row.as_ref().map(contribution_from_row).transpose()
}

async fn fetch_loans<'e, E: SqliteExecutor<'e>>(
    ex: E,
    asset: &AssetId,
) -> Result<Vec<GapLoan>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM gap_loans WHERE asset_id = ? ORDER BY created_at ASC, rowid ASC",
        LOAN_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(asset.as_str())
        .fetch_all(ex)
        .await?;
    rows.iter().map(loan_from_row).collect()
}

async fn fetch_purchase<'e, E: SqliteExecutor<'e>>(
    ex: E,
    user: &UserId,
    asset: &AssetId,
) -> Result<Option<AssetPurchase>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM asset_purchases WHERE user_id = ? AND asset_id = ?",
        PURCHASE_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(user.as_str())
        .bind(asset.as_str())
        .fetch_optional(ex)
        .await?;
    row.as_ref().map(purchase_from_row).transpose()
}

impl UnitOfWork {
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn asset(&mut self, id: &AssetId) -> Result<Option<Asset>, sqlx::Error> {
        fetch_asset(self.conn(), id).await
    }

    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_asset(&mut self, asset: &Asset) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO assets
            (id, title, target_price, platform_fee, access_price, current_collected, status,
             total_purchases, total_revenue, total_profit_distributed, platform_margin,
             delivery_info, created_at, purchased_at, available_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(asset.id.as_str())
        .bind(asset.title.as_str())
        .bind(asset.target_price.to_canonical_string())
        .bind(asset.platform_fee.to_string())
        .bind(asset.access_price.to_canonical_string())
        .bind(asset.current_collected.to_canonical_string())
        .bind(asset.status.as_str())
        .bind(asset.total_purchases)
        .bind(asset.total_revenue.to_canonical_string())
        .bind(asset.total_profit_distributed.to_canonical_string())
        .bind(asset.platform_margin.to_canonical_string())
        .bind(delivery_json(asset)?)
        .bind(asset.created_at.as_ms())
        .bind(asset.purchased_at.map(|t| t.as_ms()))
        .bind(asset.available_at.map(|t| t.as_ms()))
        .execute(self.conn())
        .await?;
        Ok(())
    }

    /// Write back the mutable state of an asset.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn save_asset(&mut self, asset: &Asset) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE assets SET
                current_collected = ?, status = ?, total_purchases = ?, total_revenue = ?,
                total_profit_distributed = ?, platform_margin = ?, delivery_info = ?,
                purchased_at = ?, available_at = ?
            WHERE id = ?
            "#,
        )
        .bind(asset.current_collected.to_canonical_string())
        .bind(asset.status.as_str())
        .bind(asset.total_purchases)
        .bind(asset.total_revenue.to_canonical_string())
        .bind(asset.total_profit_distributed.to_canonical_string())
        .bind(asset.platform_margin.to_canonical_string())
        .bind(delivery_json(asset)?)
        .bind(asset.purchased_at.map(|t| t.as_ms()))
        .bind(asset.available_at.map(|t| t.as_ms()))
        .bind(asset.id.as_str())
        .execute(self.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    /// Contributions to an asset in creation order.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn contributions_for_asset(
        &mut self,
        asset: &AssetId,
    ) -> Result<Vec<Contribution>, sqlx::Error> {
        fetch_contributions(self.conn(), asset).await
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn contribution(
        &mut self,
        user: &UserId,
        asset: &AssetId,
    ) -> Result<Option<Contribution>, sqlx::Error> {
        fetch_contribution(self.conn(), user, asset).await
    }

    /// # Errors
    /// Returns a unique violation if the user already contributed to the asset.
    pub async fn insert_contribution(&mut self, c: &Contribution) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO contributions
            (id, user_id, asset_id, amount, excess_amount, profit_share_ratio,
             total_profit_received, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(c.id.as_str())
        .bind(c.user.as_str())
        .bind(c.asset_id.as_str())
        .bind(c.amount.to_canonical_string())
        .bind(c.excess_amount.to_canonical_string())
        .bind(c.profit_share_ratio.to_canonical_string())
        .bind(c.total_profit_received.to_canonical_string())
        .bind(c.status.as_str())
        .bind(c.created_at.as_ms())
        .execute(self.conn())
        .await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the update fails.
    pub async fn save_contribution(&mut self, c: &Contribution) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE contributions SET
                excess_amount = ?, profit_share_ratio = ?, total_profit_received = ?, status = ?
            WHERE id = ?
            "#,
        )
        .bind(c.excess_amount.to_canonical_string())
        .bind(c.profit_share_ratio.to_canonical_string())
        .bind(c.total_profit_received.to_canonical_string())
        .bind(c.status.as_str())
        .bind(c.id.as_str())
        .execute(self.conn())
        .await?;
        Ok(())
    }

    /// Gap loans on an asset in creation order, any status.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn loans_for_asset(&mut self, asset: &AssetId) -> Result<Vec<GapLoan>, sqlx::Error> {
        fetch_loans(self.conn(), asset).await
    }

    /// # Errors
    /// Returns a unique violation if the user already has an active loan on the asset.
    pub async fn insert_loan(&mut self, loan: &GapLoan) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO gap_loans
            (id, user_id, asset_id, loan_amount, repaid_amount, remaining_amount, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(loan.id.as_str())
        .bind(loan.user.as_str())
        .bind(loan.asset_id.as_str())
        .bind(loan.loan_amount.to_canonical_string())
        .bind(loan.repaid_amount.to_canonical_string())
        .bind(loan.remaining_amount.to_canonical_string())
        .bind(loan.status.as_str())
        .bind(loan.created_at.as_ms())
        .execute(self.conn())
        .await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the update fails.
    pub async fn save_loan(&mut self, loan: &GapLoan) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE gap_loans SET repaid_amount = ?, remaining_amount = ?, status = ?
            WHERE id = ?
            "#,
        )
        .bind(loan.repaid_amount.to_canonical_string())
        .bind(loan.remaining_amount.to_canonical_string())
        .bind(loan.status.as_str())
        .bind(loan.id.as_str())
        .execute(self.conn())
        .await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn purchase(
        &mut self,
        user: &UserId,
        asset: &AssetId,
    ) -> Result<Option<AssetPurchase>, sqlx::Error> {
        fetch_purchase(self.conn(), user, asset).await
    }

    /// # Errors
    /// Returns a unique violation if the user already holds a grant for the asset.
    pub async fn insert_purchase(&mut self, p: &AssetPurchase) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO asset_purchases
            (id, user_id, asset_id, purchase_amount, access_key, source, delivery_expiry, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(p.id.as_str())
        .bind(p.user.as_str())
        .bind(p.asset_id.as_str())
        .bind(p.purchase_amount.to_canonical_string())
        .bind(p.access_key.as_str())
        .bind(p.source.as_str())
        .bind(p.delivery_expiry.as_ms())
        .bind(p.created_at.as_ms())
        .execute(self.conn())
        .await?;
        Ok(())
    }
}

impl Repository {
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn asset(&self, id: &AssetId) -> Result<Option<Asset>, sqlx::Error> {
        fetch_asset(&self.pool, id).await
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn contributions_for_asset(
        &self,
        asset: &AssetId,
    ) -> Result<Vec<Contribution>, sqlx::Error> {
        fetch_contributions(&self.pool, asset).await
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn contribution(
        &self,
        user: &UserId,
        asset: &AssetId,
    ) -> Result<Option<Contribution>, sqlx::Error> {
        fetch_contribution(&self.pool, user, asset).await
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn loans_for_asset(&self, asset: &AssetId) -> Result<Vec<GapLoan>, sqlx::Error> {
        fetch_loans(&self.pool, asset).await
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn purchase(
        &self,
        user: &UserId,
        asset: &AssetId,
    ) -> Result<Option<AssetPurchase>, sqlx::Error> {
        fetch_purchase(&self.pool, user, asset).await
    }

    /// Every access grant on an asset, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn purchases_for_asset(
        &self,
        asset: &AssetId,
    ) -> Result<Vec<AssetPurchase>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM asset_purchases WHERE asset_id = ? ORDER BY created_at ASC, rowid ASC",
            PURCHASE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(asset.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(purchase_from_row).collect()
    }
}
