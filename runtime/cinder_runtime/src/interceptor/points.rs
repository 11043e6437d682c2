//! Well-known interception points.

pub const ON_RUNTIME_START: &str = "onRuntimeStart";
pub const ON_RUNTIME_SHUTDOWN: &str = "onRuntimeShutdown";
pub const ON_APPLICATION_START: &str = "onApplicationStart";
pub const ON_APPLICATION_END: &str = "onApplicationEnd";
pub const ON_APPLICATION_RESTART: &str = "onApplicationRestart";
pub const ON_SESSION_START: &str = "onSessionStart";
pub const ON_SESSION_END: &str = "onSessionEnd";
pub const PRE_FUNCTION_INVOKE: &str = "preFunctionInvoke";
pub const POST_FUNCTION_INVOKE: &str = "postFunctionInvoke";
pub const ON_EXCEPTION: &str = "onException";

/// Every point a runtime registers at startup.
pub const CORE_POINTS: &[&str] = &[
    ON_RUNTIME_START,
    ON_RUNTIME_SHUTDOWN,
    ON_APPLICATION_START,
    ON_APPLICATION_END,
    ON_APPLICATION_RESTART,
    ON_SESSION_START,
    ON_SESSION_END,
    PRE_FUNCTION_INVOKE,
    POST_FUNCTION_INVOKE,
    ON_EXCEPTION,
];
