//! Domain error types.

/// Top-level error type for cbrotor.
#[derive(Debug, thiserror::Error)]
pub enum CbrotorError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("cache error for {feed} on {date}: {reason}")]
    Cache {
        feed: String,
        date: String,
        reason: String,
    },

    #[error("feed {feed} unavailable on {date}: {reason}")]
    FeedUnavailable {
        feed: String,
        date: String,
        reason: String,
    },

    #[error("execution error for {order_book_id}: {reason}")]
    Execution {
        order_book_id: String,
        reason: String,
    },

    #[error("journal error: {reason}")]
    Journal { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&CbrotorError> for std::process::ExitCode {
    fn from(err: &CbrotorError) -> Self {
        let code: u8 = match err {
            CbrotorError::Io(_) => 1,
            CbrotorError::ConfigParse { .. }
            | CbrotorError::ConfigMissing { .. }
            | CbrotorError::ConfigInvalid { .. } => 2,
            CbrotorError::Cache { .. } => 3,
            CbrotorError::FeedUnavailable { .. } => 4,
            CbrotorError::Execution { .. } | CbrotorError::Journal { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_failing_part() {
        let err = CbrotorError::FeedUnavailable {
            feed: "bond_price".to_string(),
            date: "2023-04-14".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "feed bond_price unavailable on 2023-04-14: connection refused"
        );

        let err = CbrotorError::ConfigMissing {
            section: "rebalance".to_string(),
            key: "top".to_string(),
        };
        assert_eq!(err.to_string(), "missing config key [rebalance] top");
    }

    #[test]
    fn exit_codes_group_by_failure_class() {
        use std::process::ExitCode;

        // ExitCode doesn't implement PartialEq, so compare debug renderings.
        fn code_of(err: &CbrotorError) -> String {
            format!("{:?}", ExitCode::from(err))
        }
        fn expected(code: u8) -> String {
            format!("{:?}", ExitCode::from(code))
        }

        let io = CbrotorError::Io(std::io::Error::other("x"));
        assert_eq!(code_of(&io), expected(1));

        let cfg = CbrotorError::ConfigInvalid {
            section: "rebalance".to_string(),
            key: "top".to_string(),
            reason: "must be at least 1".to_string(),
        };
        assert_eq!(code_of(&cfg), expected(2));

        let cache = CbrotorError::Cache {
            feed: "indicators".to_string(),
            date: "2023-04-14".to_string(),
            reason: "permission denied".to_string(),
        };
        assert_eq!(code_of(&cache), expected(3));

        let feed = CbrotorError::FeedUnavailable {
            feed: "call_info".to_string(),
            date: "2023-04-14".to_string(),
            reason: "timeout".to_string(),
        };
        assert_eq!(code_of(&feed), expected(4));

        let exec = CbrotorError::Execution {
            order_book_id: "110038.XSHG".to_string(),
            reason: "no price".to_string(),
        };
        assert_eq!(code_of(&exec), expected(5));
    }
}
