pub async fn health() -> &'static str {
    "ok"
}

pub async fn ready() -> &'static str {
    "ready"
}
