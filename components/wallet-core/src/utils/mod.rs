use hiro_system_kit::slog;

/// Carried through every layer of the engine (System -> WalletManager ->
/// Wallet -> Transfer) so logging stays structured end to end, the same
/// way `chainhook-sdk`'s `Context` threads through the observer loop.
#[derive(Debug, Clone)]
pub struct Context {
    pub logger: Option<slog::Logger>,
    pub tracer: bool,
}

impl Context {
    pub fn empty() -> Context {
        Context {
            logger: None,
            tracer: false,
        }
    }

    pub fn try_log<F>(&self, closure: F)
    where
        F: FnOnce(&slog::Logger),
    {
        if let Some(ref logger) = self.logger {
            closure(logger)
        }
    }

    pub fn expect_logger(&self) -> &slog::Logger {
        self.logger.as_ref().expect("Context requires a logger")
    }
}

#[macro_export]
macro_rules! try_info {
    ($ctx:expr, $($arg:tt)*) => {
        $ctx.try_log(|logger| hiro_system_kit::slog::info!(logger, $($arg)*))
    };
}

#[macro_export]
macro_rules! try_warn {
    ($ctx:expr, $($arg:tt)*) => {
        $ctx.try_log(|logger| hiro_system_kit::slog::warn!(logger, $($arg)*))
    };
}

#[macro_export]
macro_rules! try_error {
    ($ctx:expr, $($arg:tt)*) => {
        $ctx.try_log(|logger| hiro_system_kit::slog::error!(logger, $($arg)*))
    };
}

#[macro_export]
macro_rules! try_debug {
    ($ctx:expr, $($arg:tt)*) => {
        $ctx.try_log(|logger| hiro_system_kit::slog::debug!(logger, $($arg)*))
    };
}
