/// HTTP middleware
///
/// - `security`: security response headers (HSTS in production)

pub mod security;
