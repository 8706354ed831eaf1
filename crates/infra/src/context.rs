use std::sync::Arc;

use chrono::NaiveDate;

use crate::activity_log::ActivityLogger;
use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::error::LedgerResult;
use crate::store::Store;

/// What every ledger service needs: the store, the warehouse defaults, a
/// clock and the activity log handle.
pub struct LedgerContext<S: Store> {
    pub store: Arc<S>,
    pub config: Arc<LedgerConfig>,
    pub clock: Arc<dyn Clock>,
    pub activity: ActivityLogger,
}

impl<S: Store> Clone for LedgerContext<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
            clock: self.clock.clone(),
            activity: self.activity.clone(),
        }
    }
}

impl<S: Store> LedgerContext<S> {
    /// System clock, activity logging disabled.
    pub fn new(store: Arc<S>, config: LedgerConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
            activity: ActivityLogger::disabled(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_activity(mut self, activity: ActivityLogger) -> Self {
        self.activity = activity;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub async fn begin(&self) -> LedgerResult<S::Tx> {
        Ok(self.store.begin().await?)
    }
}
