use chrono::Utc;
use uuid::Uuid;

/// Time-plus-random identifier: `<prefix>-<unix millis>-<8 hex chars>`.
///
/// Synced projects are the exception and use the stable derived key
/// `gh-<remote id>` instead, so repeated syncs hit the same row.
pub fn generate(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let random = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{millis}-{}", &random[..8])
}
