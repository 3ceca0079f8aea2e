//! Connection endpoint for a call's realtime channel.

use carewatch_core::CallId;

/// Builds `<ws-base>/ws/<call_id>?token=<token>`.
///
/// A trailing `/` on the base URL is ignored.
pub fn connection_url(ws_base: &str, call_id: &CallId, token: &str) -> String {
    let base = ws_base.trim_end_matches('/');
    format!("{base}/ws/{call_id}?token={token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_url() {
        let url = connection_url("ws://localhost:8000", &CallId::from(42), "abc.def");
        assert_eq!(url, "ws://localhost:8000/ws/42?token=abc.def");
    }

    #[test]
    fn test_connection_url_trims_trailing_slash() {
        let url = connection_url("wss://care.example.com/", &CallId::new("7"), "t");
        assert_eq!(url, "wss://care.example.com/ws/7?token=t");
    }
}
