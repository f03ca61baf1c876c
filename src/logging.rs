// Macros file - tracing macros are imported within the macro definitions

/// Standardized logging macros for consistent field names and message
/// patterns across the application.

/// Log system startup, shutdown, and configuration events.
#[macro_export]
macro_rules! log_system_event {
    (startup, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "startup",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (shutdown, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "shutdown",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (config, $msg:expr) => {
        tracing::info!(event_type = "configuration", "System event: {}", $msg);
    };
}

/// Log validation results consistently.
#[macro_export]
macro_rules! log_validation {
    (success, $component:expr, $msg:expr) => {
        tracing::debug!(
            event_type = "validation",
            component = $component,
            result = "success",
            "Validation completed: {}",
            $msg
        );
    };
    (failure, $component:expr, error = $error:expr) => {
        tracing::warn!(
            event_type = "validation",
            component = $component,
            result = "failure",
            error = %$error,
            "Validation failed"
        );
    };
}

/// Log pipeline lifecycle events with deck context.
#[macro_export]
macro_rules! log_pipeline {
    (accepted, deck_id = $deck_id:expr, filename = $filename:expr) => {
        tracing::info!(
            component = "ingestion",
            deck_id = %$deck_id,
            filename = %$filename,
            "Pipeline run accepted"
        );
    };
    (rejected, deck_id = $deck_id:expr, error = $error:expr) => {
        tracing::warn!(
            component = "ingestion",
            deck_id = %$deck_id,
            error = %$error,
            "Pipeline run rejected"
        );
    };
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    #[test]
    fn test_logging_macros_compile() {
        let deck_id = Uuid::new_v4();
        let error = anyhow::anyhow!("test error");

        log_system_event!(startup, component = "server", "server starting");
        log_system_event!(shutdown, component = "server", "server stopping");
        log_system_event!(config, "configuration loaded");

        log_validation!(success, "configuration", "validated");
        log_validation!(failure, "configuration", error = error);

        log_pipeline!(accepted, deck_id = deck_id, filename = "notes.txt");
        log_pipeline!(rejected, deck_id = deck_id, error = "already generating");
    }
}
