use log::LevelFilter;

use crate::error::ImportError;

/// Initialize the logger used by the command-line tool.
///
/// `RUST_LOG` still overrides the level chosen here.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let result = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .try_init();

    if result.is_err() {
        log::warn!("Logging system already initialized");
    }
}

/// Log an [`ImportError`] at error level with optional context.
pub fn log_import_error(error: &ImportError, context: Option<&str>) {
    match context {
        Some(ctx) => log::error!("{}: [{}] {}", ctx, error.code(), error),
        None => log::error!("[{}] {}", error.code(), error),
    }
}

/// Result extension for convenient error logging.
pub trait ResultExt<T, E> {
    fn log_error(self, context: Option<&str>) -> Self;
}

impl<T> ResultExt<T, ImportError> for Result<T, ImportError> {
    fn log_error(self, context: Option<&str>) -> Self {
        if let Err(ref error) = self {
            log_import_error(error, context);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_error_result_when_logging_then_result_is_passed_through() {
        let result: Result<(), ImportError> = Err(ImportError::ArmatureMismatch {
            bone: "Spine".to_string(),
        });

        let passed = result.clone().log_error(Some("reorder"));

        assert_eq!(passed, result);
    }
}
