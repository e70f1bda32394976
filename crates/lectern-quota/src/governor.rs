// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user daily message and token budgets.
//!
//! A quota day starts at the configured reset hour, service-local time.
//! Before that hour the previous calendar date is still current. Counter
//! rows are created lazily and admission is a single conditional increment
//! in storage, so concurrent requests for one user cannot overshoot.

use std::sync::Arc;

use chrono::{DateTime, Days, Local, NaiveDate, Timelike, Utc};
use lectern_config::model::QuotaConfig;
use lectern_core::types::{DailyLimit, format_timestamp, timestamp_now};
use lectern_core::{LecternError, StorageAdapter};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classifier::{QueryWeight, WeightClassifier};

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Admission-time token estimate for a message: one token per four
/// characters, rounded up.
pub fn estimate_tokens(text: &str) -> i64 {
    (text.chars().count() as i64 + 3) / 4
}

/// Outcome of a quota check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub allowed: bool,
    pub remaining: i64,
    pub limit: i64,
    /// Start of the next quota day, UTC.
    pub reset_at: String,
}

/// What an admitted message was charged.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageReceipt {
    /// Quota date the charge landed on; settle against the same date.
    pub date: String,
    pub weight: QueryWeight,
    pub messages_charged: i64,
    pub tokens_charged: i64,
    pub messages_remaining: i64,
    pub tokens_remaining: i64,
}

pub struct QuotaGovernor {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    config: QuotaConfig,
    classifier: WeightClassifier,
    clock: Arc<dyn Clock>,
}

impl QuotaGovernor {
    pub fn new(storage: Arc<dyn StorageAdapter + Send + Sync>, config: QuotaConfig) -> Self {
        Self::with_clock(storage, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        config: QuotaConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            config,
            classifier: WeightClassifier::new(),
            clock,
        }
    }

    pub fn classifier(&self) -> &WeightClassifier {
        &self.classifier
    }

    /// Current quota date.
    pub fn today(&self) -> NaiveDate {
        self.quota_date(self.clock.now())
    }

    fn quota_date(&self, now: DateTime<Local>) -> NaiveDate {
        let date = now.date_naive();
        if now.hour() < self.config.reset_hour {
            date.pred_opt().unwrap_or(date)
        } else {
            date
        }
    }

    /// When the current quota day ends, formatted as a UTC timestamp.
    pub fn next_reset(&self) -> String {
        let now = self.clock.now();
        let next_day = self
            .quota_date(now)
            .checked_add_days(Days::new(1))
            .unwrap_or_else(|| now.date_naive());
        let reset = next_day
            .and_hms_opt(self.config.reset_hour, 0, 0)
            .and_then(|naive| naive.and_local_timezone(Local).earliest())
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| now.with_timezone(&Utc));
        format_timestamp(reset)
    }

    /// Today's row for `user_id`, created with default limits if absent.
    pub async fn daily_limit(&self, user_id: &str) -> Result<DailyLimit, LecternError> {
        let date = self.today().format("%Y-%m-%d").to_string();
        if let Some(row) = self.storage.get_daily_limit(user_id, &date).await? {
            return Ok(row);
        }
        let now = timestamp_now();
        let row = DailyLimit {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            date,
            messages_used: 0,
            messages_limit: self.config.daily_message_limit,
            tokens_used: 0,
            tokens_limit: self.config.daily_token_limit,
            created_at: now.clone(),
            updated_at: now,
        };
        let stored = self.storage.create_daily_limit(&row).await?;
        debug!(user_id, date = %stored.date, "created daily limit row");
        Ok(stored)
    }

    pub async fn check_message_quota(&self, user_id: &str) -> Result<QuotaStatus, LecternError> {
        let row = self.daily_limit(user_id).await?;
        Ok(QuotaStatus {
            allowed: row.messages_used < row.messages_limit,
            remaining: (row.messages_limit - row.messages_used).max(0),
            limit: row.messages_limit,
            reset_at: self.next_reset(),
        })
    }

    pub async fn check_token_quota(
        &self,
        user_id: &str,
        estimated_tokens: i64,
    ) -> Result<QuotaStatus, LecternError> {
        let row = self.daily_limit(user_id).await?;
        Ok(QuotaStatus {
            allowed: row.tokens_used + estimated_tokens <= row.tokens_limit,
            remaining: (row.tokens_limit - row.tokens_used).max(0),
            limit: row.tokens_limit,
            reset_at: self.next_reset(),
        })
    }

    /// Weighs `query_text` and charges it plus `tokens_used` in one atomic
    /// step. Nothing is charged when either budget would be exceeded, and
    /// the call fails with [`LecternError::QuotaExceeded`].
    pub async fn record_usage(
        &self,
        user_id: &str,
        query_text: &str,
        tokens_used: i64,
    ) -> Result<UsageReceipt, LecternError> {
        let row = self.daily_limit(user_id).await?;
        let weight = self.classifier.classify(query_text);
        let cost = weight.message_cost();

        let date = row.date.clone();

        let updated = self
            .storage
            .try_increment_daily_limit(user_id, &date, cost, tokens_used)
            .await?;

        let Some(updated) = updated else {
            let current = self
                .storage
                .get_daily_limit(user_id, &date)
                .await?
                .unwrap_or(row);
            let messages_exhausted = current.messages_used + cost > current.messages_limit;
            let (remaining, limit) = if messages_exhausted {
                (current.messages_limit - current.messages_used, current.messages_limit)
            } else {
                (current.tokens_limit - current.tokens_used, current.tokens_limit)
            };
            info!(
                user_id,
                cost,
                tokens_used,
                messages_exhausted,
                "quota denied"
            );
            return Err(LecternError::QuotaExceeded {
                remaining: remaining.max(0),
                limit,
                reset_at: self.next_reset(),
            });
        };

        if updated.messages_used * 5 >= updated.messages_limit * 4 {
            warn!(
                user_id,
                used = updated.messages_used,
                limit = updated.messages_limit,
                "approaching daily message limit (80%+)"
            );
        }
        debug!(
            user_id,
            category = %weight.category,
            weight = weight.weight,
            cost,
            "usage recorded"
        );

        Ok(UsageReceipt {
            date: updated.date,
            weight,
            messages_charged: cost,
            tokens_charged: tokens_used,
            messages_remaining: (updated.messages_limit - updated.messages_used).max(0),
            tokens_remaining: (updated.tokens_limit - updated.tokens_used).max(0),
        })
    }

    /// Corrects the token estimate charged at admission once the real
    /// usage is known. Positive deltas may push usage past the limit.
    pub async fn settle_tokens(
        &self,
        user_id: &str,
        receipt: &UsageReceipt,
        actual_tokens: i64,
    ) -> Result<(), LecternError> {
        let delta = actual_tokens - receipt.tokens_charged;
        if delta == 0 {
            return Ok(());
        }
        self.storage
            .add_daily_tokens(user_id, &receipt.date, delta)
            .await
    }

    /// Drops counter rows from quota days that have ended.
    pub async fn reset_expired_daily_limits(&self) -> Result<u64, LecternError> {
        let today = self.today().format("%Y-%m-%d").to_string();
        let removed = self.storage.delete_daily_limits_before(&today).await?;
        if removed > 0 {
            info!(removed, before = %today, "expired daily limits cleared");
        }
        Ok(removed)
    }
}
