/// Read access to same-origin cookies (the session jar).
pub trait CookieSourcePort: Send + Sync {
    fn cookie(&self, name: &str) -> Option<String>;
}
