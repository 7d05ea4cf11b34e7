//! Profit distribution and profit share operations for the repository.

use crate::domain::{
    AssetId, ContributionId, DistributionId, ProfitDistribution, ProfitShare, UserId,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{parse_col, time_col, Repository, UnitOfWork};

fn distribution_from_row(row: &SqliteRow) -> Result<ProfitDistribution, sqlx::Error> {
    Ok(ProfitDistribution {
        id: DistributionId::new(row.try_get::<String, _>("id")?),
        asset_id: AssetId::new(row.try_get::<String, _>("asset_id")?),
        revenue: parse_col(row, "revenue")?,
        loan_repaid: parse_col(row, "loan_repaid")?,
        contributor_profit: parse_col(row, "contributor_profit")?,
        platform_margin: parse_col(row, "platform_margin")?,
        shares_paid: row.try_get("shares_paid")?,
        policy: row.try_get("policy")?,
        created_at: time_col(row, "created_at")?,
    })
}

fn share_from_row(row: &SqliteRow) -> Result<ProfitShare, sqlx::Error> {
    Ok(ProfitShare {
        distribution_id: DistributionId::new(row.try_get::<String, _>("distribution_id")?),
        contribution_id: ContributionId::new(row.try_get::<String, _>("contribution_id")?),
        asset_id: AssetId::new(row.try_get::<String, _>("asset_id")?),
        user: UserId::new(row.try_get::<String, _>("user_id")?),
        amount: parse_col(row, "amount")?,
        ratio: parse_col(row, "ratio")?,
        created_at: time_col(row, "created_at")?,
    })
}

impl UnitOfWork {
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_distribution(&mut self, d: &ProfitDistribution) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO profit_distributions
            (id, asset_id, revenue, loan_repaid, contributor_profit, platform_margin,
             shares_paid, policy, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(d.id.as_str())
        .bind(d.asset_id.as_str())
        .bind(d.revenue.to_canonical_string())
        .bind(d.loan_repaid.to_canonical_string())
        .bind(d.contributor_profit.to_canonical_string())
        .bind(d.platform_margin.to_canonical_string())
        .bind(d.shares_paid)
        .bind(d.policy.as_str())
        .bind(d.created_at.as_ms())
        .execute(self.conn())
        .await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_profit_share(&mut self, s: &ProfitShare) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO profit_shares
            (distribution_id, contribution_id, asset_id, user_id, amount, ratio, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(s.distribution_id.as_str())
        .bind(s.contribution_id.as_str())
        .bind(s.asset_id.as_str())
        .bind(s.user.as_str())
        .bind(s.amount.to_canonical_string())
        .bind(s.ratio.to_canonical_string())
        .bind(s.created_at.as_ms())
        .execute(self.conn())
        .await?;
        Ok(())
    }
}

impl Repository {
    /// Revenue events on an asset, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn distributions_for_asset(
        &self,
        asset: &AssetId,
    ) -> Result<Vec<ProfitDistribution>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, asset_id, revenue, loan_repaid, contributor_profit, platform_margin,
                   shares_paid, policy, created_at
            FROM profit_distributions
            WHERE asset_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(asset.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(distribution_from_row).collect()
    }

    /// Profit credits received by a user, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn profit_shares_for_user(
        &self,
        user: &UserId,
        limit: i64,
    ) -> Result<Vec<ProfitShare>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT distribution_id, contribution_id, asset_id, user_id, amount, ratio, created_at
            FROM profit_shares
            WHERE user_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(user.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(share_from_row).collect()
    }
}
