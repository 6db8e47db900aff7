/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate an opaque document id (UUID v4, simple form)
pub fn document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
