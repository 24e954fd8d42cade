use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutoShutdownError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("{component} can only be armed once")]
    AlreadyArmed { component: &'static str },

    #[error("System error: {message}")]
    System { message: String },
}

impl AutoShutdownError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AutoShutdownError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let armed = AutoShutdownError::AlreadyArmed {
            component: "Watchdog",
        };
        assert_eq!(armed.to_string(), "Watchdog can only be armed once");

        let system = AutoShutdownError::system("no runtime");
        assert_eq!(system.to_string(), "System error: no runtime");
    }

    #[test]
    fn test_config_errors_convert() {
        let err: AutoShutdownError = config::ConfigError::Message("bad hour".to_string()).into();
        assert!(matches!(err, AutoShutdownError::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: bad hour");
    }
}
