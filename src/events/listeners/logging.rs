use async_trait::async_trait;

use crate::events::{AuthEvent, Listener};

/// Writes each event as one `key=value` log line under
/// `portcullis::events`.
///
/// Failed logins and denied authorizations go out at a separate level so
/// they can be routed to an audit sink on their own.
///
/// ```rust,ignore
/// register_event_listeners(|registry| {
///     registry.listen(LoggingListener::new().failures_at(log::Level::Error));
/// });
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LoggingListener {
    level: log::Level,
    failure_level: log::Level,
}

impl LoggingListener {
    pub fn new() -> Self {
        Self {
            level: log::Level::Info,
            failure_level: log::Level::Warn,
        }
    }

    /// Level for successful events.
    #[must_use]
    pub fn with_level(self, level: log::Level) -> Self {
        Self { level, ..self }
    }

    /// Level for failure events.
    #[must_use]
    pub fn failures_at(self, level: log::Level) -> Self {
        Self {
            failure_level: level,
            ..self
        }
    }

    fn level_for(&self, event: &AuthEvent) -> log::Level {
        if event.is_failure() {
            self.failure_level
        } else {
            self.level
        }
    }
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new()
    }
}

fn format_event(event: &AuthEvent) -> String {
    let mut line = format!("event={} user_id=\"{}\"", event.name(), event.user_id());
    if let Some(client_id) = event.client_id() {
        line.push_str(&format!(" client_id=\"{client_id}\""));
    }
    if let Some((key, value)) = event.detail() {
        line.push_str(&format!(" {key}=\"{value}\""));
    }
    line.push_str(&format!(" at={}", event.timestamp().to_rfc3339()));
    line
}

#[async_trait]
impl Listener for LoggingListener {
    async fn handle(&self, event: &AuthEvent) {
        log::log!(
            target: "portcullis::events",
            self.level_for(event),
            "{}",
            format_event(event)
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::repository::GrantType;

    #[test]
    fn test_levels() {
        let listener = LoggingListener::new().failures_at(log::Level::Error);
        let at = Utc::now();

        let failed = AuthEvent::LoginFailed {
            user_id: "alice".to_owned(),
            reason: "invalid password".to_owned(),
            at,
        };
        let success = AuthEvent::LoginSuccess {
            user_id: "alice".to_owned(),
            at,
        };

        assert_eq!(listener.level_for(&failed), log::Level::Error);
        assert_eq!(listener.level_for(&success), log::Level::Info);
        assert_eq!(
            listener.with_level(log::Level::Debug).level_for(&success),
            log::Level::Debug
        );
    }

    #[test]
    fn test_format_event() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let issued = AuthEvent::TokenIssued {
            client_id: "c1".to_owned(),
            user_id: "alice".to_owned(),
            grant_type: GrantType::AuthorizationCode,
            at,
        };
        assert_eq!(
            format_event(&issued),
            "event=oauth.token.issued user_id=\"alice\" client_id=\"c1\" grant_type=\"authorization_code\" at=2024-01-02T03:04:05+00:00"
        );

        let logout = AuthEvent::LogoutSuccess {
            user_id: "alice".to_owned(),
            at,
        };
        assert_eq!(
            format_event(&logout),
            "event=auth.logout.success user_id=\"alice\" at=2024-01-02T03:04:05+00:00"
        );
    }

    #[tokio::test]
    async fn test_handle() {
        let event = AuthEvent::TokenRefreshed {
            client_id: "c1".to_owned(),
            user_id: "alice".to_owned(),
            at: Utc::now(),
        };
        LoggingListener::default().handle(&event).await;
    }
}
