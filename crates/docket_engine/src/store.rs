use chrono::NaiveDate;
use docket_core::{Case, REJECTED_FLAG};
use engine_logging::{engine_debug, engine_warn};
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::{Connection, Row};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot connect to case store: {0}")]
    Connect(String),
    #[error("case store query failed: {0}")]
    Query(String),
}

/// Rows touched by a selection reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionReset {
    pub cleared: u64,
    pub selected: u64,
}

/// The work-item store. Implementations open and close their connection per
/// call; nothing spans more than one operation.
#[async_trait::async_trait]
pub trait CaseStore: Send + Sync {
    /// Cases selected for this run.
    async fn select_pending_cases(&self) -> Result<Vec<Case>, StoreError>;

    /// Record that a case has no retrievable document.
    async fn mark_rejected(&self, simple_name: &str) -> Result<(), StoreError>;

    /// Clear every selection, then select cases filed on or after `cutoff`.
    async fn reset_selection(&self, cutoff: NaiveDate) -> Result<SelectionReset, StoreError>;

    /// Give selected cases that were rejected earlier another attempt.
    async fn clear_stale_rejections(&self) -> Result<u64, StoreError>;
}

const SELECT_PENDING: &str = "SELECT court, CAST(pacerId AS CHAR) AS pacer_id, simpleName, \
     DATE(dateFiled) AS date_filed, CAST(flagEmail AS SIGNED) AS flag_email, \
     CAST(flagMisc AS SIGNED) AS flag_misc FROM vw_new_cases";
const MARK_REJECTED: &str = "UPDATE vw_case_info SET flagMisc = ? WHERE simpleName = ?";
const CLEAR_SELECTION: &str = "UPDATE vw_case_info SET flagEmail = 0 WHERE flagEmail = 1";
const SELECT_SINCE: &str = "UPDATE vw_case_info SET flagEmail = 1 WHERE DATE(dateFiled) >= ?";
const CLEAR_REJECTIONS: &str =
    "UPDATE vw_case_info SET flagMisc = 0 WHERE flagEmail = 1 AND flagMisc = ?";

/// MySQL-backed store over the `vw_case_info` / `vw_new_cases` views.
#[derive(Debug, Clone)]
pub struct MySqlCaseStore {
    url: String,
}

impl MySqlCaseStore {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    async fn connect(&self) -> Result<MySqlConnection, StoreError> {
        MySqlConnection::connect(&self.url)
            .await
            .map_err(|err| StoreError::Connect(err.to_string()))
    }
}

fn query_err(err: sqlx::Error) -> StoreError {
    StoreError::Query(err.to_string())
}

async fn close(conn: MySqlConnection) {
    if let Err(err) = conn.close().await {
        engine_warn!("Closing case store connection failed: {}", err);
    }
}

fn case_from_row(row: &MySqlRow) -> Result<Option<Case>, sqlx::Error> {
    let court: String = row.try_get("court")?;
    let pacer_id: String = row.try_get("pacer_id")?;
    let simple_name: String = row.try_get("simpleName")?;
    let date_filed: Option<NaiveDate> = row.try_get("date_filed")?;
    let flag_email: Option<i64> = row.try_get("flag_email")?;
    let flag_misc: Option<i64> = row.try_get("flag_misc")?;

    let mut case = match Case::new(court, pacer_id, simple_name) {
        Ok(case) => case,
        Err(err) => {
            engine_warn!("Ignoring case row: {}", err);
            return Ok(None);
        }
    };
    case.date_filed = date_filed;
    case.flag_email = flag_email.unwrap_or(0) != 0;
    case.flag_misc = flag_misc.unwrap_or(0);
    Ok(Some(case))
}

#[async_trait::async_trait]
impl CaseStore for MySqlCaseStore {
    async fn select_pending_cases(&self) -> Result<Vec<Case>, StoreError> {
        let mut conn = self.connect().await?;
        let rows = sqlx::query(SELECT_PENDING).fetch_all(&mut conn).await;
        close(conn).await;

        let mut cases = Vec::new();
        for row in rows.map_err(query_err)? {
            if let Some(case) = case_from_row(&row).map_err(query_err)? {
                cases.push(case);
            }
        }
        engine_debug!("Loaded {} pending case(s)", cases.len());
        Ok(cases)
    }

    async fn mark_rejected(&self, simple_name: &str) -> Result<(), StoreError> {
        let mut conn = self.connect().await?;
        let result = sqlx::query(MARK_REJECTED)
            .bind(REJECTED_FLAG)
            .bind(simple_name)
            .execute(&mut conn)
            .await;
        close(conn).await;
        result.map_err(query_err)?;
        Ok(())
    }

    async fn reset_selection(&self, cutoff: NaiveDate) -> Result<SelectionReset, StoreError> {
        let mut conn = self.connect().await?;
        let result = async {
            let cleared = sqlx::query(CLEAR_SELECTION)
                .execute(&mut conn)
                .await?
                .rows_affected();
            let selected = sqlx::query(SELECT_SINCE)
                .bind(cutoff)
                .execute(&mut conn)
                .await?
                .rows_affected();
            Ok::<_, sqlx::Error>(SelectionReset { cleared, selected })
        }
        .await;
        close(conn).await;
        result.map_err(query_err)
    }

    async fn clear_stale_rejections(&self) -> Result<u64, StoreError> {
        let mut conn = self.connect().await?;
        let result = sqlx::query(CLEAR_REJECTIONS)
            .bind(REJECTED_FLAG)
            .execute(&mut conn)
            .await;
        close(conn).await;
        Ok(result.map_err(query_err)?.rows_affected())
    }
}
