// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily usage quotas for the Lectern catalog assistant.
//!
//! [`WeightClassifier`] prices a message in budget units; [`QuotaGovernor`]
//! admits or denies it against the user's daily row in storage.

pub mod classifier;
pub mod governor;

pub use classifier::{QueryWeight, WeightCategory, WeightClassifier};
pub use governor::{
    Clock, QuotaGovernor, QuotaStatus, SystemClock, UsageReceipt, estimate_tokens,
};
