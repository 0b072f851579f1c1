use async_trait::async_trait;
use tomato_core::ids::StatisticsId;

use crate::error::AccountingError;
use crate::statistics::UsageStatistics;

/// Persistence seam for usage statistics, mirrored by `tomato-storage`.
#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn get(&self, id: StatisticsId) -> Result<UsageStatistics, AccountingError>;
    async fn save(&self, stats: &UsageStatistics) -> Result<(), AccountingError>;
}
