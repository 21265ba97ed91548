pub mod health;

pub async fn root() -> &'static str {
    "OK"
}
