mod pg_session_lifecycle;

pub use pg_session_lifecycle::{DetachedSessionLifecycle, PgSessionLifecycle};
